//! Access grants

use uplink_runtime::{Permission, SharePrefix};

use super::{classify, config_from, Operation};
use crate::bridge::Bridge;
use crate::error::BridgeError;
use crate::marshal::{Args, Options, Param};
use crate::registry::HandleKind;
use crate::scheduler::Pending;
use crate::value::Value;

const ACCESS: Param = Param::handle("access", HandleKind::Access);

pub(super) const OPERATIONS: &[Operation] = &[
    Operation::new("parseAccess", &[Param::string("accessGrant")], parse_access),
    Operation::new(
        "requestAccessWithPassphrase",
        &[
            Param::string("satelliteAddress"),
            Param::string("apiKey"),
            Param::string("passphrase"),
        ],
        request_access_with_passphrase,
    ),
    Operation::new(
        "configRequestAccessWithPassphrase",
        &[
            Param::map("config"),
            Param::string("satelliteAddress"),
            Param::string("apiKey"),
            Param::string("passphrase"),
        ],
        config_request_access_with_passphrase,
    ),
    Operation::new("accessSatelliteAddress", &[ACCESS], access_satellite_address),
    Operation::new("accessSerialize", &[ACCESS], access_serialize),
    Operation::new(
        "accessShare",
        &[ACCESS, Param::map("permission"), Param::array("prefixes").optional()],
        access_share,
    ),
    Operation::new(
        "accessOverrideEncryptionKey",
        &[
            ACCESS,
            Param::string("bucket"),
            Param::string("prefix"),
            Param::handle("encryptionKey", HandleKind::EncryptionKey),
        ],
        access_override_encryption_key,
    ),
    Operation::new("freeAccess", &[ACCESS], free_access),
];

fn parse_access(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    let grant = args.string(0)?;
    Ok(bridge.submit(
        op,
        grant,
        |rt, grant| rt.parse_access(grant),
        move |_, result, registry| {
            let raw = classify(op, result)?;
            Ok(Value::Handle(registry.register_default(raw, HandleKind::Access, "access")))
        },
    ))
}

fn request_access_with_passphrase(
    bridge: &Bridge,
    args: Args,
) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    let input = (args.string(0)?, args.string(1)?, args.string(2)?);
    Ok(bridge.submit(
        op,
        input,
        |rt, (satellite, api_key, passphrase)| {
            rt.request_access_with_passphrase(satellite, api_key, passphrase)
        },
        move |(satellite, _, _), result, registry| {
            let raw = classify(op, result)?;
            Ok(Value::Handle(registry.register_default(
                raw,
                HandleKind::Access,
                format!("access@{satellite}"),
            )))
        },
    ))
}

fn config_request_access_with_passphrase(
    bridge: &Bridge,
    args: Args,
) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    let config = config_from(&args.options(0)?)?;
    let input = (config, args.string(1)?, args.string(2)?, args.string(3)?);
    Ok(bridge.submit(
        op,
        input,
        |rt, (config, satellite, api_key, passphrase)| {
            rt.config_request_access_with_passphrase(config, satellite, api_key, passphrase)
        },
        move |(_, satellite, _, _), result, registry| {
            let raw = classify(op, result)?;
            Ok(Value::Handle(registry.register_default(
                raw,
                HandleKind::Access,
                format!("access@{satellite}"),
            )))
        },
    ))
}

fn access_satellite_address(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    Ok(bridge.submit(
        op,
        args.handle(0)?,
        |rt, access| rt.access_satellite_address(*access),
        move |_, result, _| Ok(Value::from(classify(op, result)?)),
    ))
}

fn access_serialize(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    Ok(bridge.submit(
        op,
        args.handle(0)?,
        |rt, access| rt.access_serialize(*access),
        move |_, result, _| Ok(Value::from(classify(op, result)?)),
    ))
}

fn permission_from(options: &Options<'_>) -> Result<Permission, BridgeError> {
    Ok(Permission {
        allow_download: options.bool("allowDownload", false)?,
        allow_upload: options.bool("allowUpload", false)?,
        allow_list: options.bool("allowList", false)?,
        allow_delete: options.bool("allowDelete", false)?,
        not_before: options.integer("notBefore", 0)?,
        not_after: options.integer("notAfter", 0)?,
    })
}

fn share_prefixes(op: &'static str, values: &[Value]) -> Result<Vec<SharePrefix>, BridgeError> {
    values
        .iter()
        .map(|value| -> Result<SharePrefix, BridgeError> {
            let map = value.as_object().ok_or_else(|| {
                BridgeError::type_error(format!(
                    "{op}: share prefix must be an object, got {}",
                    value.type_name()
                ))
            })?;
            let options = Options::new(op, Some(map));
            let bucket = options.string("bucket")?.ok_or_else(|| {
                BridgeError::type_error(format!("{op}: share prefix needs a bucket"))
            })?;
            Ok(SharePrefix {
                bucket,
                prefix: options.string("prefix")?.unwrap_or_default(),
            })
        })
        .collect()
}

fn access_share(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    let access = args.handle(0)?;
    let permission = permission_from(&args.options(1)?)?;
    let prefixes = share_prefixes(op, args.array(2)?)?;
    Ok(bridge.submit(
        op,
        (access, permission, prefixes),
        |rt, (access, permission, prefixes)| rt.access_share(*access, permission, prefixes),
        move |_, result, registry| {
            let raw = classify(op, result)?;
            Ok(Value::Handle(registry.register_default(
                raw,
                HandleKind::Access,
                "shared access",
            )))
        },
    ))
}

fn access_override_encryption_key(
    bridge: &Bridge,
    args: Args,
) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    let input = (
        args.handle(0)?,
        args.string(1)?,
        args.string(2)?,
        args.handle(3)?,
    );
    Ok(bridge.submit(
        op,
        input,
        |rt, (access, bucket, prefix, key)| {
            rt.access_override_encryption_key(*access, bucket, prefix, *key)
        },
        move |_, result, _| {
            classify(op, result)?;
            Ok(Value::Undefined)
        },
    ))
}

fn free_access(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let reference = args.handle_ref(0)?;
    Ok(bridge.submit(
        args.operation(),
        args.handle(0)?,
        |rt, access| rt.free_access(*access),
        move |_, (), registry| {
            registry.unregister(reference);
            Ok(Value::Undefined)
        },
    ))
}
