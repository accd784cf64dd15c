//! Buckets

use uplink_runtime::{Bucket, ListBucketsOptions, NativeResult, RawHandle, StorageRuntime};

use super::listing::cursor_operations;
use super::{classify, Operation};
use crate::bridge::Bridge;
use crate::error::BridgeError;
use crate::marshal::{bucket_value, Args, Param};
use crate::registry::HandleKind;
use crate::scheduler::Pending;
use crate::value::Value;

const PROJECT: Param = Param::handle("project", HandleKind::Project);
const BUCKET: Param = Param::string("bucket");
const BY_NAME: &[Param] = &[PROJECT, BUCKET];

pub(super) const OPERATIONS: &[Operation] = &[
    Operation::new("createBucket", BY_NAME, create_bucket),
    Operation::new("ensureBucket", BY_NAME, ensure_bucket),
    Operation::new("statBucket", BY_NAME, stat_bucket),
    Operation::new("deleteBucket", BY_NAME, delete_bucket),
    Operation::new("deleteBucketWithObjects", BY_NAME, delete_bucket_with_objects),
    Operation::new(
        "listBucketsCreate",
        &[PROJECT, Param::map("options").optional()],
        list_buckets_create,
    ),
];

pub(super) const CURSOR: [Operation; 4] = cursor_operations(
    &[Param::handle("iterator", HandleKind::BucketIterator)],
    [
        "bucketIteratorNext",
        "bucketIteratorItem",
        "bucketIteratorErr",
        "freeBucketIterator",
    ],
);

type BucketCall = fn(&dyn StorageRuntime, RawHandle, &str) -> NativeResult<Bucket>;

/// Project and bucket name in, bucket record out.
fn by_name(
    bridge: &Bridge,
    args: &Args,
    call: BucketCall,
    resolve: fn(&Bucket) -> Value,
) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    Ok(bridge.submit(
        op,
        (args.handle(0)?, args.string(1)?),
        move |rt, (project, bucket)| call(rt, *project, bucket),
        move |_, result, _| Ok(resolve(&classify(op, result)?)),
    ))
}

fn create_bucket(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    by_name(bridge, &args, |rt, p, b| rt.create_bucket(p, b), bucket_value)
}

fn ensure_bucket(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    by_name(bridge, &args, |rt, p, b| rt.ensure_bucket(p, b), bucket_value)
}

fn stat_bucket(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    by_name(bridge, &args, |rt, p, b| rt.stat_bucket(p, b), bucket_value)
}

fn delete_bucket(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    by_name(bridge, &args, |rt, p, b| rt.delete_bucket(p, b), |_| Value::Undefined)
}

fn delete_bucket_with_objects(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    by_name(
        bridge,
        &args,
        |rt, p, b| rt.delete_bucket_with_objects(p, b),
        |_| Value::Undefined,
    )
}

fn list_buckets_create(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let options = ListBucketsOptions {
        cursor: args.options(1)?.string("cursor")?,
    };
    Ok(bridge.submit(
        args.operation(),
        (args.handle(0)?, options),
        |rt, (project, options)| rt.list_buckets(*project, options),
        |_, iterator, registry| {
            Ok(Value::Handle(registry.register_default(
                iterator,
                HandleKind::BucketIterator,
                "bucket listing",
            )))
        },
    ))
}
