//! Function surface of the wrapped storage-client library.
//!
//! The library is blocking and hands out opaque integer identifiers for
//! every resource it creates. Nothing here is async: the bridge crate runs
//! these calls on worker threads.

pub mod error_codes;
mod runtime_trait;
mod types;

pub use runtime_trait::StorageRuntime;
pub use types::{
    Bucket, CommitUploadOptions, Config, CustomMetadata, DownloadOptions,
    EdgeConfig, EdgeCredentials, EdgeRegisterAccessOptions, EdgeShareUrlOptions, ListBucketsOptions,
    ListItem, ListObjectsOptions, ListUploadPartsOptions, ListUploadsOptions,
    NativeError, NativeResult, Object, Part, Permission, RawHandle, ReadResult, SharePrefix,
    SystemMetadata, UploadInfo, UploadOptions, WriteResult,
};
