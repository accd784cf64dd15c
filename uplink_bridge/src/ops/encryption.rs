//! Encryption keys

use super::{classify, Operation};
use crate::bridge::Bridge;
use crate::error::BridgeError;
use crate::marshal::{Args, Param};
use crate::pin::PinnedBuffer;
use crate::registry::HandleKind;
use crate::scheduler::Pending;
use crate::value::Value;

pub(super) const OPERATIONS: &[Operation] = &[
    Operation::new(
        "deriveEncryptionKey",
        &[Param::string("passphrase"), Param::buffer("salt")],
        derive_encryption_key,
    ),
    Operation::new(
        "freeEncryptionKey",
        &[Param::handle("encryptionKey", HandleKind::EncryptionKey)],
        free_encryption_key,
    ),
];

fn derive_encryption_key(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    let salt = args.buffer(1)?;
    let salt = PinnedBuffer::new(&salt, salt.len())?;
    Ok(bridge.submit(
        op,
        (args.string(0)?, salt),
        |rt, (passphrase, salt)| salt.with_slice(|salt| rt.derive_encryption_key(passphrase, salt)),
        move |_, result, registry| {
            let raw = classify(op, result)?;
            Ok(Value::Handle(registry.register_default(
                raw,
                HandleKind::EncryptionKey,
                "encryption key",
            )))
        },
    ))
}

fn free_encryption_key(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let reference = args.handle_ref(0)?;
    Ok(bridge.submit(
        args.operation(),
        args.handle(0)?,
        |rt, key| rt.free_encryption_key(*key),
        move |_, (), registry| {
            registry.unregister(reference);
            Ok(Value::Undefined)
        },
    ))
}
