//! Objects

use uplink_runtime::ListObjectsOptions;

use super::listing::cursor_operations;
use super::{classify, Operation};
use crate::bridge::Bridge;
use crate::error::BridgeError;
use crate::marshal::{metadata_from_map, object_value, Args, Options, Param};
use crate::registry::HandleKind;
use crate::scheduler::Pending;
use crate::value::Value;

const PROJECT: Param = Param::handle("project", HandleKind::Project);
const BUCKET: Param = Param::string("bucket");
const KEY: Param = Param::string("key");
const OPTIONS: Param = Param::map("options").optional();
const RELOCATE: &[Param] = &[
    PROJECT,
    BUCKET,
    KEY,
    Param::string("newBucket"),
    Param::string("newKey"),
    OPTIONS,
];

pub(super) const OPERATIONS: &[Operation] = &[
    Operation::new("statObject", &[PROJECT, BUCKET, KEY], stat_object),
    Operation::new("deleteObject", &[PROJECT, BUCKET, KEY], delete_object),
    Operation::new(
        "listObjectsCreate",
        &[PROJECT, BUCKET, OPTIONS],
        list_objects_create,
    ),
    Operation::new("copyObject", RELOCATE, copy_object),
    Operation::new("moveObject", RELOCATE, move_object),
    Operation::new(
        "updateObjectMetadata",
        &[PROJECT, BUCKET, KEY, Param::map("metadata"), OPTIONS],
        update_object_metadata,
    ),
];

pub(super) const CURSOR: [Operation; 4] = cursor_operations(
    &[Param::handle("iterator", HandleKind::ObjectIterator)],
    [
        "objectIteratorNext",
        "objectIteratorItem",
        "objectIteratorErr",
        "freeObjectIterator",
    ],
);

fn stat_object(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    Ok(bridge.submit(
        op,
        (args.handle(0)?, args.string(1)?, args.string(2)?),
        |rt, (project, bucket, key)| rt.stat_object(*project, bucket, key),
        move |_, result, _| Ok(object_value(&classify(op, result)?)),
    ))
}

fn delete_object(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    Ok(bridge.submit(
        op,
        (args.handle(0)?, args.string(1)?, args.string(2)?),
        |rt, (project, bucket, key)| rt.delete_object(*project, bucket, key),
        move |_, result, _| {
            classify(op, result)?;
            Ok(Value::Undefined)
        },
    ))
}

/// Listing options shared by objects and pending uploads.
pub(super) fn list_options(options: &Options<'_>) -> Result<ListObjectsOptions, BridgeError> {
    let defaults = ListObjectsOptions::default();
    Ok(ListObjectsOptions {
        prefix: options.string("prefix")?,
        cursor: options.string("cursor")?,
        recursive: options.bool("recursive", defaults.recursive)?,
        system: options.bool("system", defaults.system)?,
        custom: options.bool("custom", defaults.custom)?,
    })
}

fn list_objects_create(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let options = list_options(&args.options(2)?)?;
    Ok(bridge.submit(
        args.operation(),
        (args.handle(0)?, args.string(1)?, options),
        |rt, (project, bucket, options)| rt.list_objects(*project, bucket, options),
        |(_, bucket, _), iterator, registry| {
            Ok(Value::Handle(registry.register_default(
                iterator,
                HandleKind::ObjectIterator,
                format!("object listing of {bucket}"),
            )))
        },
    ))
}

fn copy_object(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    let input = (
        args.handle(0)?,
        args.string(1)?,
        args.string(2)?,
        args.string(3)?,
        args.string(4)?,
    );
    Ok(bridge.submit(
        op,
        input,
        |rt, (project, bucket, key, new_bucket, new_key)| {
            rt.copy_object(*project, bucket, key, new_bucket, new_key)
        },
        move |_, result, _| Ok(object_value(&classify(op, result)?)),
    ))
}

fn move_object(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    let input = (
        args.handle(0)?,
        args.string(1)?,
        args.string(2)?,
        args.string(3)?,
        args.string(4)?,
    );
    Ok(bridge.submit(
        op,
        input,
        |rt, (project, bucket, key, new_bucket, new_key)| {
            rt.move_object(*project, bucket, key, new_bucket, new_key)
        },
        move |_, result, _| {
            classify(op, result)?;
            Ok(Value::Undefined)
        },
    ))
}

fn update_object_metadata(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    let metadata = match args.options(3)?.as_map() {
        Some(map) => metadata_from_map(op, map)?,
        None => Vec::new(),
    };
    Ok(bridge.submit(
        op,
        (args.handle(0)?, args.string(1)?, args.string(2)?, metadata),
        |rt, (project, bucket, key, metadata)| {
            rt.update_object_metadata(*project, bucket, key, metadata)
        },
        move |_, result, _| {
            classify(op, result)?;
            Ok(Value::Undefined)
        },
    ))
}
