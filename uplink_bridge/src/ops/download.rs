//! Downloads

use uplink_runtime::DownloadOptions;

use super::upload::pin_argument;
use super::{classify, reject, Operation};
use crate::bridge::Bridge;
use crate::error::BridgeError;
use crate::marshal::{object_value, Args, Param};
use crate::registry::HandleKind;
use crate::scheduler::Pending;
use crate::value::Value;

const DOWNLOAD: Param = Param::handle("download", HandleKind::Download);

pub(super) const OPERATIONS: &[Operation] = &[
    Operation::new(
        "downloadObject",
        &[
            Param::handle("project", HandleKind::Project),
            Param::string("bucket"),
            Param::string("key"),
            Param::map("options").optional(),
        ],
        download_object,
    ),
    Operation::new(
        "downloadRead",
        &[DOWNLOAD, Param::buffer("buffer"), Param::length("length")],
        download_read,
    ),
    Operation::new("downloadInfo", &[DOWNLOAD], download_info),
    Operation::new("closeDownload", &[DOWNLOAD], close_download),
];

fn download_object(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    let options = args.options(3)?;
    let defaults = DownloadOptions::default();
    let options = DownloadOptions {
        offset: options.integer("offset", defaults.offset)?,
        length: options.integer("length", defaults.length)?,
    };
    Ok(bridge.submit(
        op,
        (args.handle(0)?, args.string(1)?, args.string(2)?, options),
        |rt, (project, bucket, key, options)| rt.download_object(*project, bucket, key, options),
        move |(_, bucket, key, _), result, registry| {
            let raw = classify(op, result)?;
            let download = registry.register_default(
                raw,
                HandleKind::Download,
                format!("download {bucket}/{key}"),
            );
            Ok(Value::object([("downloadHandle", Value::Handle(download))]))
        },
    ))
}

/// Bytes land in the caller's buffer in place. A failed read, end of data
/// included, rejects with the number of bytes copied before it.
fn download_read(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    let pinned = pin_argument(&args, 1)?;
    Ok(bridge.submit(
        op,
        (args.handle(0)?, pinned),
        |rt, (download, pinned)| pinned.with_slice_mut(|buf| rt.download_read(*download, buf)),
        move |_, result, _| match result.error {
            Some(error) => Err(reject(op, error).with_bytes_read(result.bytes_read)),
            None => Ok(Value::object([(
                "bytesRead",
                Value::from(result.bytes_read),
            )])),
        },
    ))
}

fn download_info(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    Ok(bridge.submit(
        op,
        args.handle(0)?,
        |rt, download| rt.download_info(*download),
        move |_, result, _| Ok(object_value(&classify(op, result)?)),
    ))
}

/// The download is released whatever the close reports.
fn close_download(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    let reference = args.handle_ref(0)?;
    Ok(bridge.submit(
        op,
        args.handle(0)?,
        |rt, download| {
            let closed = rt.close_download(*download);
            rt.free_download(*download);
            closed
        },
        move |_, result, registry| {
            registry.unregister(reference);
            classify(op, result)?;
            Ok(Value::Undefined)
        },
    ))
}
