use std::fmt;

/// Opaque identifier of a resource living inside the native library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawHandle(pub usize);

impl fmt::Display for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Error record returned by a failed native call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("native error {code}: {}", message.as_deref().unwrap_or("no details"))]
pub struct NativeError {
    pub code: i32,
    pub message: Option<String>,
}

impl NativeError {
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    #[must_use]
    pub fn bare(code: i32) -> Self {
        Self {
            code,
            message: None,
        }
    }
}

pub type NativeResult<T> = Result<T, NativeError>;

/// Ordered key/value pairs attached to an object by the user.
pub type CustomMetadata = Vec<(String, String)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub name: String,
    /// Unix seconds.
    pub created: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemMetadata {
    pub created: i64,
    /// Zero or negative when the object never expires.
    pub expires: i64,
    pub content_length: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    pub key: String,
    pub is_prefix: bool,
    pub system: SystemMetadata,
    pub custom: CustomMetadata,
}

/// A pending multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadInfo {
    pub upload_id: String,
    pub key: String,
    pub is_prefix: bool,
    pub system: SystemMetadata,
    pub custom: CustomMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub part_number: u32,
    pub size: u64,
    pub modified: i64,
    pub etag: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeCredentials {
    pub access_key_id: String,
    pub secret_key: String,
    pub endpoint: String,
}

/// Item produced by a native listing cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListItem {
    Bucket(Bucket),
    Object(Object),
    Upload(UploadInfo),
    Part(Part),
}

/// Outcome of a streaming read. Bytes may have been copied even when an
/// error, including end of data, is reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadResult {
    pub bytes_read: usize,
    pub error: Option<NativeError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteResult {
    pub bytes_written: usize,
    pub error: Option<NativeError>,
}

// ---------------------------------------------------------------------------
// Call options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub user_agent: Option<String>,
    pub dial_timeout_milliseconds: i32,
    pub temp_directory: Option<String>,
}

/// What a derived access grant is allowed to do. Times are Unix seconds,
/// zero meaning unbounded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permission {
    pub allow_download: bool,
    pub allow_upload: bool,
    pub allow_list: bool,
    pub allow_delete: bool,
    pub not_before: i64,
    pub not_after: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharePrefix {
    pub bucket: String,
    pub prefix: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListBucketsOptions {
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListObjectsOptions {
    pub prefix: Option<String>,
    pub cursor: Option<String>,
    pub recursive: bool,
    pub system: bool,
    pub custom: bool,
}

impl Default for ListObjectsOptions {
    fn default() -> Self {
        Self {
            prefix: None,
            cursor: None,
            recursive: false,
            system: true,
            custom: false,
        }
    }
}

pub type ListUploadsOptions = ListObjectsOptions;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListUploadPartsOptions {
    pub cursor: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadOptions {
    /// Unix seconds, zero for no expiration.
    pub expires: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    pub offset: i64,
    /// Negative reads to the end of the object.
    pub length: i64,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            offset: 0,
            length: -1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitUploadOptions {
    pub custom_metadata: CustomMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeConfig {
    pub auth_service_address: String,
    pub certificate_pem: Option<String>,
    pub insecure_unencrypted_connection: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeRegisterAccessOptions {
    pub is_public: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeShareUrlOptions {
    pub raw: bool,
}
