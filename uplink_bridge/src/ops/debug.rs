//! Diagnostics

use tracing::info;
use uplink_runtime::NativeError;

use super::Operation;
use crate::bridge::Bridge;
use crate::error::{BridgeError, StorageError};
use crate::marshal::{Args, Param};
use crate::scheduler::Pending;
use crate::value::Value;

pub(super) const OPERATIONS: &[Operation] = &[
    Operation::new("internalUniverseIsEmpty", &[], universe_is_empty),
    Operation::new(
        "testThrowTypedError",
        &[
            Param::integer("code", i32::MIN as i64, i32::MAX as i64),
            Param::string("message"),
        ],
        throw_typed_error,
    ),
];

fn universe_is_empty(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    Ok(bridge.submit(
        args.operation(),
        (),
        |rt, ()| rt.universe_is_empty(),
        |(), empty, _| Ok(Value::Bool(empty)),
    ))
}

/// Always rejects with the typed error for `code`.
fn throw_typed_error(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let code = i32::try_from(args.integer(0)?)
        .map_err(|_| BridgeError::range_error("code is out of range"))?;
    let message = args.string(1)?;
    Ok(bridge.submit(
        args.operation(),
        NativeError::new(code, message),
        |_, _| (),
        |error, (), _| {
            info!(code = error.code, "rejecting with typed error");
            Err::<Value, _>(StorageError::from_native(error))
        },
    ))
}
