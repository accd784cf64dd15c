//! Error taxonomy
//!
//! Every native failure carries a numeric code. `ErrorKind` maps each code
//! to one class of a closed hierarchy rooted at `StorjError`. The end of a
//! streaming read travels through the same channel with code `-1`.

use uplink_runtime::{error_codes, NativeError};

use crate::registry::HandleKind;

/// Name of the common base class.
pub const BASE_CLASS: &str = "StorjError";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    General,
    Bucket,
    Object,
    Edge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // General
    Internal,
    Canceled,
    InvalidHandle,
    TooManyRequests,
    BandwidthLimitExceeded,
    StorageLimitExceeded,
    SegmentsLimitExceeded,
    PermissionDenied,
    // Bucket
    BucketNameInvalid,
    BucketAlreadyExists,
    BucketNotEmpty,
    BucketNotFound,
    // Object
    ObjectKeyInvalid,
    ObjectNotFound,
    UploadDone,
    // Edge
    EdgeAuthDialFailed,
    EdgeRegisterAccessFailed,
    /// No more data in a streaming read.
    EndOfData,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 18] = [
        Self::Internal,
        Self::Canceled,
        Self::InvalidHandle,
        Self::TooManyRequests,
        Self::BandwidthLimitExceeded,
        Self::StorageLimitExceeded,
        Self::SegmentsLimitExceeded,
        Self::PermissionDenied,
        Self::BucketNameInvalid,
        Self::BucketAlreadyExists,
        Self::BucketNotEmpty,
        Self::BucketNotFound,
        Self::ObjectKeyInvalid,
        Self::ObjectNotFound,
        Self::UploadDone,
        Self::EdgeAuthDialFailed,
        Self::EdgeRegisterAccessFailed,
        Self::EndOfData,
    ];

    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Internal => error_codes::INTERNAL,
            Self::Canceled => error_codes::CANCELED,
            Self::InvalidHandle => error_codes::INVALID_HANDLE,
            Self::TooManyRequests => error_codes::TOO_MANY_REQUESTS,
            Self::BandwidthLimitExceeded => error_codes::BANDWIDTH_LIMIT_EXCEEDED,
            Self::StorageLimitExceeded => error_codes::STORAGE_LIMIT_EXCEEDED,
            Self::SegmentsLimitExceeded => error_codes::SEGMENTS_LIMIT_EXCEEDED,
            Self::PermissionDenied => error_codes::PERMISSION_DENIED,
            Self::BucketNameInvalid => error_codes::BUCKET_NAME_INVALID,
            Self::BucketAlreadyExists => error_codes::BUCKET_ALREADY_EXISTS,
            Self::BucketNotEmpty => error_codes::BUCKET_NOT_EMPTY,
            Self::BucketNotFound => error_codes::BUCKET_NOT_FOUND,
            Self::ObjectKeyInvalid => error_codes::OBJECT_KEY_INVALID,
            Self::ObjectNotFound => error_codes::OBJECT_NOT_FOUND,
            Self::UploadDone => error_codes::UPLOAD_DONE,
            Self::EdgeAuthDialFailed => error_codes::EDGE_AUTH_DIAL_FAILED,
            Self::EdgeRegisterAccessFailed => error_codes::EDGE_REGISTER_ACCESS_FAILED,
            Self::EndOfData => error_codes::EOF,
        }
    }

    #[must_use]
    pub fn category(self) -> ErrorCategory {
        match self {
            Self::BucketNameInvalid
            | Self::BucketAlreadyExists
            | Self::BucketNotEmpty
            | Self::BucketNotFound => ErrorCategory::Bucket,
            Self::ObjectKeyInvalid | Self::ObjectNotFound | Self::UploadDone => {
                ErrorCategory::Object
            }
            Self::EdgeAuthDialFailed | Self::EdgeRegisterAccessFailed => ErrorCategory::Edge,
            _ => ErrorCategory::General,
        }
    }

    /// Host-visible class name. End of data has no class of its own.
    #[must_use]
    pub fn class_name(self) -> &'static str {
        match self {
            Self::Internal => "InternalError",
            Self::Canceled => "CanceledError",
            Self::InvalidHandle => "InvalidHandleError",
            Self::TooManyRequests => "TooManyRequestsError",
            Self::BandwidthLimitExceeded => "BandwidthLimitExceededError",
            Self::StorageLimitExceeded => "StorageLimitExceededError",
            Self::SegmentsLimitExceeded => "SegmentsLimitExceededError",
            Self::PermissionDenied => "PermissionDeniedError",
            Self::BucketNameInvalid => "BucketNameInvalidError",
            Self::BucketAlreadyExists => "BucketAlreadyExistsError",
            Self::BucketNotEmpty => "BucketNotEmptyError",
            Self::BucketNotFound => "BucketNotFoundError",
            Self::ObjectKeyInvalid => "ObjectKeyInvalidError",
            Self::ObjectNotFound => "ObjectNotFoundError",
            Self::UploadDone => "UploadDoneError",
            Self::EdgeAuthDialFailed => "EdgeAuthDialFailedError",
            Self::EdgeRegisterAccessFailed => "EdgeRegisterAccessFailedError",
            Self::EndOfData => BASE_CLASS,
        }
    }

    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::Internal => "Internal error",
            Self::Canceled => "Operation canceled",
            Self::InvalidHandle => "Invalid handle",
            Self::TooManyRequests => "Too many requests",
            Self::BandwidthLimitExceeded => "Bandwidth limit exceeded",
            Self::StorageLimitExceeded => "Storage limit exceeded",
            Self::SegmentsLimitExceeded => "Segments limit exceeded",
            Self::PermissionDenied => "Permission denied",
            Self::BucketNameInvalid => "Invalid bucket name",
            Self::BucketAlreadyExists => "Bucket already exists",
            Self::BucketNotEmpty => "Bucket is not empty",
            Self::BucketNotFound => "Bucket not found",
            Self::ObjectKeyInvalid => "Invalid object key",
            Self::ObjectNotFound => "Object not found",
            Self::UploadDone => "Upload already done",
            Self::EdgeAuthDialFailed => "Edge auth dial failed",
            Self::EdgeRegisterAccessFailed => "Edge register access failed",
            Self::EndOfData => "EOF",
        }
    }
}

/// Typed rejection value of a storage operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}{}", .kind.message(), detail_suffix(.details.as_deref()))]
pub struct StorageError {
    pub kind: ErrorKind,
    /// Code as reported by the native side; differs from `kind.code()` only
    /// for codes outside the taxonomy.
    pub code: i32,
    pub details: Option<String>,
    /// Bytes copied before a streaming read failed.
    pub bytes_read: Option<usize>,
}

impl StorageError {
    #[must_use]
    pub fn new(kind: ErrorKind, details: impl Into<String>) -> Self {
        Self {
            kind,
            code: kind.code(),
            details: Some(details.into()),
            bytes_read: None,
        }
    }

    /// Classify a native error record. Unknown codes keep their raw value
    /// under the internal class.
    #[must_use]
    pub fn from_native(error: NativeError) -> Self {
        let kind = ErrorKind::from_code(error.code).unwrap_or(ErrorKind::Internal);
        Self {
            kind,
            code: error.code,
            details: error.message.filter(|m| !m.is_empty()),
            bytes_read: None,
        }
    }

    #[must_use]
    pub fn canceled(operation: &str) -> Self {
        Self::new(ErrorKind::Canceled, format!("{operation} was canceled"))
    }

    #[must_use]
    pub fn internal(details: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, details)
    }

    #[must_use]
    pub fn with_bytes_read(mut self, bytes_read: usize) -> Self {
        self.bytes_read = Some(bytes_read);
        self
    }

    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.kind == ErrorKind::EndOfData
    }

    #[must_use]
    pub fn class_name(&self) -> &'static str {
        self.kind.class_name()
    }

    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }
}

fn detail_suffix(details: Option<&str>) -> String {
    details.map(|details| format!(": {details}")).unwrap_or_default()
}

impl From<NativeError> for StorageError {
    fn from(error: NativeError) -> Self {
        Self::from_native(error)
    }
}

/// Failure to issue an operation. Raised synchronously, before any task
/// exists and before any native call.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Missing argument, wrong shape, unknown operation.
    #[error("TypeError: {0}")]
    Type(String),

    /// Numeric argument outside its declared range.
    #[error("RangeError: {0}")]
    Range(String),

    /// Handle reference of the wrong kind, freed, or malformed.
    #[error("Invalid handle: expected {expected:?}")]
    InvalidHandle { expected: HandleKind },

    /// Upload or part used after commit or abort.
    #[error("{what} is already {state}")]
    Closed {
        what: &'static str,
        state: &'static str,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl BridgeError {
    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Self::Type(message.into())
    }

    pub(crate) fn range_error(message: impl Into<String>) -> Self {
        Self::Range(message.into())
    }

    /// The typed storage error for this failure, if the host should see one.
    #[must_use]
    pub fn as_storage(&self) -> Option<StorageError> {
        match self {
            Self::InvalidHandle { expected } => Some(StorageError::new(
                ErrorKind::InvalidHandle,
                format!("expected {}", expected.name()),
            )),
            Self::Storage(error) => Some(error.clone()),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Error classes exposed to the host
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorClass {
    pub name: &'static str,
    /// `None` for the base class.
    pub code: Option<i32>,
    pub parent: String,
}

/// The hierarchy handed to the host at initialization.
///
/// Every class derives from `StorjError`, which in turn derives from the
/// host's own base exception type, so `is_a` checks against that base
/// succeed for every error the bridge raises.
#[derive(Debug, Clone)]
pub struct ErrorClasses {
    base: String,
    classes: Vec<ErrorClass>,
}

impl ErrorClasses {
    #[must_use]
    pub fn init(host_base: Option<&str>) -> Self {
        let base = host_base.unwrap_or("Error").to_string();
        let mut classes = vec![ErrorClass {
            name: BASE_CLASS,
            code: None,
            parent: base.clone(),
        }];
        classes.extend(
            ErrorKind::ALL
                .into_iter()
                .filter(|kind| *kind != ErrorKind::EndOfData)
                .map(|kind| ErrorClass {
                    name: kind.class_name(),
                    code: Some(kind.code()),
                    parent: BASE_CLASS.to_string(),
                }),
        );
        Self { base, classes }
    }

    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn classes(&self) -> impl Iterator<Item = &ErrorClass> {
        self.classes.iter()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ErrorClass> {
        self.classes.iter().find(|class| class.name == name)
    }

    /// Class the bridge instantiates for a native code.
    #[must_use]
    pub fn for_code(&self, code: i32) -> &ErrorClass {
        let name = ErrorKind::from_code(code).map_or("InternalError", ErrorKind::class_name);
        self.get(name).unwrap_or(&self.classes[0])
    }

    /// `true` if `error` is an instance of `class_name` or one of its subclasses.
    #[must_use]
    pub fn is_a(&self, error: &StorageError, class_name: &str) -> bool {
        let mut current = error.class_name().to_string();
        loop {
            if current == class_name {
                return true;
            }
            match self.get(&current) {
                Some(class) => current.clone_from(&class.parent),
                None => return false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_code_round_trips() {
        for kind in ErrorKind::ALL {
            assert_eq!(ErrorKind::from_code(kind.code()), Some(kind));
        }
    }

    #[test]
    fn categories() {
        assert_eq!(ErrorKind::PermissionDenied.category(), ErrorCategory::General);
        assert_eq!(ErrorKind::BucketNotEmpty.category(), ErrorCategory::Bucket);
        assert_eq!(ErrorKind::UploadDone.category(), ErrorCategory::Object);
        assert_eq!(ErrorKind::EdgeAuthDialFailed.category(), ErrorCategory::Edge);
    }

    #[test]
    fn unknown_code_is_internal_with_raw_code() {
        let err = StorageError::from_native(NativeError::new(0x99, "mystery"));
        assert_eq!(err.kind, ErrorKind::Internal);
        assert_eq!(err.code, 0x99);
        assert_eq!(err.to_string(), "Internal error: mystery");
    }

    #[test]
    fn message_without_details() {
        let err = StorageError::from_native(NativeError::bare(error_codes::BUCKET_NOT_FOUND));
        assert_eq!(err.to_string(), "Bucket not found");
        assert_eq!(err.class_name(), "BucketNotFoundError");
    }

    #[test]
    fn message_with_details() {
        let err = StorageError::new(ErrorKind::ObjectNotFound, "photos/a.jpg");
        assert_eq!(
            err.to_string(),
            format!("{}: photos/a.jpg", ErrorKind::ObjectNotFound.message())
        );
        let wrapped = BridgeError::from(err);
        assert!(wrapped.to_string().ends_with(": photos/a.jpg"));
    }

    #[test]
    fn eof_is_base_class() {
        let err = StorageError::from_native(NativeError::bare(error_codes::EOF)).with_bytes_read(7);
        assert!(err.is_eof());
        assert_eq!(err.class_name(), BASE_CLASS);
        assert_eq!(err.bytes_read, Some(7));
    }

    #[test]
    fn classes_chain_to_host_base() {
        let classes = ErrorClasses::init(Some("HostError"));
        assert_eq!(classes.classes().count(), 18);
        let err = StorageError::new(ErrorKind::ObjectNotFound, "k");
        assert!(classes.is_a(&err, "ObjectNotFoundError"));
        assert!(classes.is_a(&err, BASE_CLASS));
        assert!(classes.is_a(&err, "HostError"));
        assert!(!classes.is_a(&err, "BucketNotFoundError"));
        assert_eq!(classes.for_code(0x13).name, "BucketNotFoundError");
        assert_eq!(classes.for_code(0x77).name, "InternalError");
    }
}
