//! Edge services

use uplink_runtime::{EdgeConfig, EdgeRegisterAccessOptions, EdgeShareUrlOptions};

use super::{classify, Operation};
use crate::bridge::Bridge;
use crate::error::BridgeError;
use crate::marshal::{credentials_value, Args, Param};
use crate::registry::HandleKind;
use crate::scheduler::Pending;
use crate::value::Value;

const OPTIONS: Param = Param::map("options").optional();

pub(super) const OPERATIONS: &[Operation] = &[
    Operation::new(
        "edgeRegisterAccess",
        &[
            Param::map("config"),
            Param::handle("access", HandleKind::Access),
            OPTIONS,
        ],
        edge_register_access,
    ),
    Operation::new(
        "edgeJoinShareUrl",
        &[
            Param::string("baseUrl"),
            Param::string("accessKeyId"),
            Param::string("bucket").optional(),
            Param::string("key").optional(),
            OPTIONS,
        ],
        edge_join_share_url,
    ),
];

fn edge_register_access(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    let config = args.options(0)?;
    let config = EdgeConfig {
        auth_service_address: config.required_string("authServiceAddress")?,
        certificate_pem: config.string("certificatePem")?,
        insecure_unencrypted_connection: config.bool("insecureUnencryptedConnection", false)?,
    };
    let options = EdgeRegisterAccessOptions {
        is_public: args.options(2)?.bool("isPublic", false)?,
    };
    Ok(bridge.submit(
        op,
        (config, args.handle(1)?, options),
        |rt, (config, access, options)| rt.edge_register_access(config, *access, options),
        move |_, result, _| Ok(credentials_value(&classify(op, result)?)),
    ))
}

fn edge_join_share_url(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    let options = EdgeShareUrlOptions {
        raw: args.options(4)?.bool("raw", false)?,
    };
    let input = (
        args.string(0)?,
        args.string(1)?,
        args.opt_string(2)?.unwrap_or_default(),
        args.opt_string(3)?.unwrap_or_default(),
        options,
    );
    Ok(bridge.submit(
        op,
        input,
        |rt, (base_url, access_key_id, bucket, key, options)| {
            rt.edge_join_share_url(base_url, access_key_id, bucket, key, options)
        },
        move |_, result, _| Ok(Value::from(classify(op, result)?)),
    ))
}
