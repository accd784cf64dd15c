//! Multipart uploads

use uplink_runtime::{CommitUploadOptions, ListUploadPartsOptions};

use super::listing::cursor_operations;
use super::object::list_options;
use super::upload::{finish, pin_argument, upload_options, written};
use super::{classify, Operation};
use crate::bridge::Bridge;
use crate::error::BridgeError;
use crate::marshal::{object_value, part_value, upload_info_value, Args, Param, MAX_PART_NUMBER};
use crate::registry::HandleKind;
use crate::scheduler::Pending;
use crate::value::Value;

const PROJECT: Param = Param::handle("project", HandleKind::Project);
const BUCKET: Param = Param::string("bucket");
const KEY: Param = Param::string("key");
const UPLOAD_ID: Param = Param::string("uploadId");
const OPTIONS: Param = Param::map("options").optional();
const PART: Param = Param::handle("partUpload", HandleKind::PartUpload);

pub(super) const OPERATIONS: &[Operation] = &[
    Operation::new("beginUpload", &[PROJECT, BUCKET, KEY, OPTIONS], begin_upload),
    Operation::new(
        "commitUpload",
        &[PROJECT, BUCKET, KEY, UPLOAD_ID, OPTIONS],
        commit_upload,
    ),
    Operation::new("abortUpload", &[PROJECT, BUCKET, KEY, UPLOAD_ID], abort_upload),
    Operation::new(
        "uploadPart",
        &[
            PROJECT,
            BUCKET,
            KEY,
            UPLOAD_ID,
            Param::integer("partNumber", 1, MAX_PART_NUMBER),
        ],
        upload_part,
    ),
    Operation::new(
        "partUploadWrite",
        &[PART, Param::buffer("buffer"), Param::length("length")],
        part_upload_write,
    ),
    Operation::new("partUploadCommit", &[PART], part_upload_commit),
    Operation::new("partUploadAbort", &[PART], part_upload_abort),
    Operation::new(
        "partUploadSetEtag",
        &[PART, Param::string("etag")],
        part_upload_set_etag,
    ),
    Operation::new("partUploadInfo", &[PART], part_upload_info),
    Operation::new(
        "listUploadPartsCreate",
        &[PROJECT, BUCKET, KEY, UPLOAD_ID, OPTIONS],
        list_upload_parts_create,
    ),
    Operation::new(
        "listUploadsCreate",
        &[PROJECT, BUCKET, OPTIONS],
        list_uploads_create,
    ),
];

pub(super) const PART_CURSOR: [Operation; 4] = cursor_operations(
    &[Param::handle("iterator", HandleKind::PartIterator)],
    [
        "partIteratorNext",
        "partIteratorItem",
        "partIteratorErr",
        "freePartIterator",
    ],
);

pub(super) const UPLOAD_CURSOR: [Operation; 4] = cursor_operations(
    &[Param::handle("iterator", HandleKind::UploadIterator)],
    [
        "uploadIteratorNext",
        "uploadIteratorItem",
        "uploadIteratorErr",
        "freeUploadIterator",
    ],
);

fn begin_upload(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    let options = upload_options(&args.options(3)?)?;
    Ok(bridge.submit(
        op,
        (args.handle(0)?, args.string(1)?, args.string(2)?, options),
        |rt, (project, bucket, key, options)| rt.begin_upload(*project, bucket, key, options),
        move |_, result, _| Ok(upload_info_value(&classify(op, result)?)),
    ))
}

fn commit_upload(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    let options = CommitUploadOptions {
        custom_metadata: args.options(4)?.metadata("customMetadata")?,
    };
    let input = (
        args.handle(0)?,
        args.string(1)?,
        args.string(2)?,
        args.string(3)?,
        options,
    );
    Ok(bridge.submit(
        op,
        input,
        |rt, (project, bucket, key, upload_id, options)| {
            rt.commit_upload(*project, bucket, key, upload_id, options)
        },
        move |_, result, _| Ok(object_value(&classify(op, result)?)),
    ))
}

fn abort_upload(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    let input = (
        args.handle(0)?,
        args.string(1)?,
        args.string(2)?,
        args.string(3)?,
    );
    Ok(bridge.submit(
        op,
        input,
        |rt, (project, bucket, key, upload_id)| rt.abort_upload(*project, bucket, key, upload_id),
        move |_, result, _| {
            classify(op, result)?;
            Ok(Value::Undefined)
        },
    ))
}

fn upload_part(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    let part_number = u32::try_from(args.integer(4)?)
        .map_err(|_| BridgeError::range_error("partNumber is out of range"))?;
    let input = (
        args.handle(0)?,
        args.string(1)?,
        args.string(2)?,
        args.string(3)?,
        part_number,
    );
    Ok(bridge.submit(
        op,
        input,
        |rt, (project, bucket, key, upload_id, part_number)| {
            rt.upload_part(*project, bucket, key, upload_id, *part_number)
        },
        move |(_, _, key, _, part_number), result, registry| {
            let raw = classify(op, result)?;
            Ok(Value::Handle(registry.register_default(
                raw,
                HandleKind::PartUpload,
                format!("part {part_number} of {key}"),
            )))
        },
    ))
}

fn part_upload_write(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    let pinned = pin_argument(&args, 1)?;
    Ok(bridge.submit(
        op,
        (args.handle(0)?, pinned),
        |rt, (part, pinned)| pinned.with_slice(|data| rt.part_upload_write(*part, data)),
        move |_, result, _| written(op, result),
    ))
}

fn part_upload_commit(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    let reference = args.handle_ref(0)?;
    Ok(bridge.submit(
        op,
        args.handle(0)?,
        |rt, part| {
            let committed = rt.part_upload_commit(*part);
            if committed.is_ok() {
                rt.free_part_upload(*part);
            }
            committed
        },
        move |_, result, registry| finish(op, reference, result, registry),
    ))
}

fn part_upload_abort(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    let reference = args.handle_ref(0)?;
    Ok(bridge.submit(
        op,
        args.handle(0)?,
        |rt, part| {
            let aborted = rt.part_upload_abort(*part);
            if aborted.is_ok() {
                rt.free_part_upload(*part);
            }
            aborted
        },
        move |_, result, registry| finish(op, reference, result, registry),
    ))
}

fn part_upload_set_etag(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    Ok(bridge.submit(
        op,
        (args.handle(0)?, args.string(1)?),
        |rt, (part, etag)| rt.part_upload_set_etag(*part, etag),
        move |_, result, _| {
            classify(op, result)?;
            Ok(Value::Undefined)
        },
    ))
}

fn part_upload_info(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    Ok(bridge.submit(
        op,
        args.handle(0)?,
        |rt, part| rt.part_upload_info(*part),
        move |_, result, _| Ok(part_value(&classify(op, result)?)),
    ))
}

fn list_upload_parts_create(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let cursor = args.options(4)?.integer("cursor", 0)?;
    let options = ListUploadPartsOptions {
        cursor: u32::try_from(cursor)
            .map_err(|_| BridgeError::range_error("cursor is out of range"))?,
    };
    let input = (
        args.handle(0)?,
        args.string(1)?,
        args.string(2)?,
        args.string(3)?,
        options,
    );
    Ok(bridge.submit(
        args.operation(),
        input,
        |rt, (project, bucket, key, upload_id, options)| {
            rt.list_upload_parts(*project, bucket, key, upload_id, options)
        },
        |(_, _, key, _, _), iterator, registry| {
            Ok(Value::Handle(registry.register_default(
                iterator,
                HandleKind::PartIterator,
                format!("part listing of {key}"),
            )))
        },
    ))
}

fn list_uploads_create(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let options = list_options(&args.options(2)?)?;
    Ok(bridge.submit(
        args.operation(),
        (args.handle(0)?, args.string(1)?, options),
        |rt, (project, bucket, options)| rt.list_uploads(*project, bucket, options),
        |(_, bucket, _), iterator, registry| {
            Ok(Value::Handle(registry.register_default(
                iterator,
                HandleKind::UploadIterator,
                format!("upload listing of {bucket}"),
            )))
        },
    ))
}
