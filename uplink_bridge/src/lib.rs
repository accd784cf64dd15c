//! Asynchronous bridge over a blocking, handle-based storage client.
//!
//! The host issues named operations through [`Bridge::call`]. Arguments are
//! validated and handles resolved synchronously; the native call then runs
//! on a worker thread and its result is delivered as a [`Pending`] future.

pub mod bridge;
pub mod buffer;
pub mod config;
pub mod error;
pub mod listing;
pub mod marshal;
pub mod multipart;
mod ops;
pub mod pin;
pub mod registry;
pub mod scheduler;
pub mod value;

pub use bridge::Bridge;
pub use buffer::{HostBuffer, WeakHostBuffer};
pub use config::{init_logging, BridgeConfig, ConfigError};
pub use error::{
    BridgeError, ErrorCategory, ErrorClass, ErrorClasses, ErrorKind, StorageError, BASE_CLASS,
};
pub use listing::{ListEntry, Listing, ListingState};
pub use marshal::{FromValue, Param, ParamKind};
pub use multipart::{MultipartUpload, PartState, PartUpload, UploadState};
pub use ops::Operation;
pub use pin::PinnedBuffer;
pub use registry::{HandleKind, HandleRef, HandleRegistry};
pub use scheduler::{CancelHandle, Pending, TaskId};
pub use value::{Map, Value};
