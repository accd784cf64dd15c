//! Cursor protocol shared by the four listing kinds
//!
//! `next` advances, `item` reads the current entry, `err` reports the
//! deferred listing error, `free` releases the cursor. The handle kind was
//! already checked by argument extraction, so one implementation serves
//! every listing.

use super::Operation;
use crate::bridge::Bridge;
use crate::error::{BridgeError, StorageError};
use crate::marshal::{list_item_value, Args, Param};
use crate::scheduler::Pending;
use crate::value::Value;

pub(super) fn next(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let iterator = args.handle(0)?;
    Ok(bridge.submit(
        args.operation(),
        iterator,
        |rt, iterator| rt.iterator_next(*iterator),
        |_, more, _| Ok(Value::Bool(more)),
    ))
}

pub(super) fn item(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let iterator = args.handle(0)?;
    Ok(bridge.submit(
        args.operation(),
        iterator,
        |rt, iterator| rt.iterator_item(*iterator),
        |_, item, _| Ok(item.as_ref().map_or(Value::Null, list_item_value)),
    ))
}

/// Resolves with the error value itself; never rejects.
pub(super) fn err(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let iterator = args.handle(0)?;
    Ok(bridge.submit(
        args.operation(),
        iterator,
        |rt, iterator| rt.iterator_err(*iterator),
        |_, error, _| Ok(Value::from(error.map(StorageError::from_native))),
    ))
}

pub(super) fn free(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let iterator = args.handle(0)?;
    let reference = args.handle_ref(0)?;
    Ok(bridge.submit(
        args.operation(),
        iterator,
        |rt, iterator| rt.free_iterator(*iterator),
        move |_, (), registry| {
            registry.unregister(reference);
            Ok(Value::Undefined)
        },
    ))
}

/// `next`, `item`, `err` and `free` for one cursor kind.
pub(super) const fn cursor_operations(
    params: &'static [Param],
    names: [&'static str; 4],
) -> [Operation; 4] {
    [
        Operation::new(names[0], params, next),
        Operation::new(names[1], params, item),
        Operation::new(names[2], params, err),
        Operation::new(names[3], params, free),
    ]
}
