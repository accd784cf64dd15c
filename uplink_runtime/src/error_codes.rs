//! Numeric error codes reported by the native library.

pub const INTERNAL: i32 = 0x02;
pub const CANCELED: i32 = 0x03;
pub const INVALID_HANDLE: i32 = 0x04;
pub const TOO_MANY_REQUESTS: i32 = 0x05;
pub const BANDWIDTH_LIMIT_EXCEEDED: i32 = 0x06;
pub const STORAGE_LIMIT_EXCEEDED: i32 = 0x07;
pub const SEGMENTS_LIMIT_EXCEEDED: i32 = 0x08;
pub const PERMISSION_DENIED: i32 = 0x09;

pub const BUCKET_NAME_INVALID: i32 = 0x10;
pub const BUCKET_ALREADY_EXISTS: i32 = 0x11;
pub const BUCKET_NOT_EMPTY: i32 = 0x12;
pub const BUCKET_NOT_FOUND: i32 = 0x13;

pub const OBJECT_KEY_INVALID: i32 = 0x20;
pub const OBJECT_NOT_FOUND: i32 = 0x21;
pub const UPLOAD_DONE: i32 = 0x22;

pub const EDGE_AUTH_DIAL_FAILED: i32 = 0x30;
pub const EDGE_REGISTER_ACCESS_FAILED: i32 = 0x31;

/// End of a streaming read. Reported through the error channel.
pub const EOF: i32 = -1;
