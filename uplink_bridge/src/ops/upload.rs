//! Single-shot uploads

use uplink_runtime::{NativeResult, UploadOptions, WriteResult};

use super::{classify, reject, Operation};
use crate::bridge::Bridge;
use crate::error::{BridgeError, StorageError};
use crate::marshal::{metadata_from_map, object_value, Args, Options, Param};
use crate::pin::PinnedBuffer;
use crate::registry::{HandleKind, HandleRef, HandleRegistry};
use crate::scheduler::Pending;
use crate::value::Value;

const UPLOAD: Param = Param::handle("upload", HandleKind::Upload);

pub(super) const OPERATIONS: &[Operation] = &[
    Operation::new(
        "uploadObject",
        &[
            Param::handle("project", HandleKind::Project),
            Param::string("bucket"),
            Param::string("key"),
            Param::map("options").optional(),
        ],
        upload_object,
    ),
    Operation::new(
        "uploadWrite",
        &[UPLOAD, Param::buffer("buffer"), Param::length("length")],
        upload_write,
    ),
    Operation::new("uploadCommit", &[UPLOAD], upload_commit),
    Operation::new("uploadAbort", &[UPLOAD], upload_abort),
    Operation::new(
        "uploadSetCustomMetadata",
        &[UPLOAD, Param::map("metadata")],
        upload_set_custom_metadata,
    ),
    Operation::new("uploadInfo", &[UPLOAD], upload_info),
];

pub(super) fn upload_options(options: &Options<'_>) -> Result<UploadOptions, BridgeError> {
    Ok(UploadOptions {
        expires: options.integer("expires", 0)?,
    })
}

/// Pin `length` bytes of the buffer argument at `index`.
pub(super) fn pin_argument(args: &Args, index: usize) -> Result<PinnedBuffer, BridgeError> {
    let length = usize::try_from(args.integer(index + 1)?)
        .map_err(|_| BridgeError::range_error("length does not fit in memory"))?;
    PinnedBuffer::new(&args.buffer(index)?, length)
}

/// Outcome of a streaming write. A failed write rejects even if it
/// accepted some bytes.
pub(super) fn written(op: &str, result: WriteResult) -> Result<Value, StorageError> {
    match result.error {
        Some(error) => Err(reject(op, error)),
        None => Ok(Value::from(result.bytes_written)),
    }
}

/// Drops the registry entry when `result` is a success. The native side
/// has already freed the resource in that case.
pub(super) fn finish(
    op: &str,
    reference: HandleRef,
    result: NativeResult<()>,
    registry: &mut HandleRegistry,
) -> Result<Value, StorageError> {
    classify(op, result)?;
    registry.unregister(reference);
    Ok(Value::Undefined)
}

fn upload_object(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    let options = upload_options(&args.options(3)?)?;
    Ok(bridge.submit(
        op,
        (args.handle(0)?, args.string(1)?, args.string(2)?, options),
        |rt, (project, bucket, key, options)| rt.upload_object(*project, bucket, key, options),
        move |(_, bucket, key, _), result, registry| {
            let raw = classify(op, result)?;
            Ok(Value::Handle(registry.register_default(
                raw,
                HandleKind::Upload,
                format!("upload {bucket}/{key}"),
            )))
        },
    ))
}

fn upload_write(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    let pinned = pin_argument(&args, 1)?;
    Ok(bridge.submit(
        op,
        (args.handle(0)?, pinned),
        |rt, (upload, pinned)| pinned.with_slice(|data| rt.upload_write(*upload, data)),
        move |_, result, _| written(op, result),
    ))
}

fn upload_commit(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    let reference = args.handle_ref(0)?;
    Ok(bridge.submit(
        op,
        args.handle(0)?,
        |rt, upload| {
            let committed = rt.upload_commit(*upload);
            if committed.is_ok() {
                rt.free_upload(*upload);
            }
            committed
        },
        move |_, result, registry| finish(op, reference, result, registry),
    ))
}

fn upload_abort(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    let reference = args.handle_ref(0)?;
    Ok(bridge.submit(
        op,
        args.handle(0)?,
        |rt, upload| {
            let aborted = rt.upload_abort(*upload);
            if aborted.is_ok() {
                rt.free_upload(*upload);
            }
            aborted
        },
        move |_, result, registry| finish(op, reference, result, registry),
    ))
}

fn upload_set_custom_metadata(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    let metadata = match args.options(1)?.as_map() {
        Some(map) => metadata_from_map(op, map)?,
        None => Vec::new(),
    };
    Ok(bridge.submit(
        op,
        (args.handle(0)?, metadata),
        |rt, (upload, metadata)| rt.upload_set_custom_metadata(*upload, metadata),
        move |_, result, _| {
            classify(op, result)?;
            Ok(Value::Undefined)
        },
    ))
}

fn upload_info(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    Ok(bridge.submit(
        op,
        args.handle(0)?,
        |rt, upload| rt.upload_info(*upload),
        move |_, result, _| Ok(object_value(&classify(op, result)?)),
    ))
}
