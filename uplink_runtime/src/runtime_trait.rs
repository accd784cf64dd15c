use crate::types::{
    Bucket, CommitUploadOptions, Config, CustomMetadata, DownloadOptions, EdgeConfig,
    EdgeCredentials, EdgeRegisterAccessOptions, EdgeShareUrlOptions, ListBucketsOptions, ListItem,
    ListObjectsOptions, ListUploadPartsOptions, ListUploadsOptions, NativeError, NativeResult,
    Object, Part, Permission, RawHandle, ReadResult, SharePrefix, UploadInfo, UploadOptions,
    WriteResult,
};

/// Blocking function surface of the storage-client library.
///
/// Every resource is referenced by a `RawHandle`. A handle is valid from the
/// call that returned it until the matching `free_*` call; the library never
/// checks resource types for the caller, so passing the wrong kind of handle
/// yields an `INVALID_HANDLE` error at best.
///
/// Every method may block for a long time (network round trips), so callers
/// must keep them off the control thread.
pub trait StorageRuntime: Send + Sync {
    // --- access -----------------------------------------------------------

    fn parse_access(&self, serialized: &str) -> NativeResult<RawHandle>;

    fn request_access_with_passphrase(
        &self,
        satellite_address: &str,
        api_key: &str,
        passphrase: &str,
    ) -> NativeResult<RawHandle>;

    fn config_request_access_with_passphrase(
        &self,
        config: &Config,
        satellite_address: &str,
        api_key: &str,
        passphrase: &str,
    ) -> NativeResult<RawHandle>;

    fn access_satellite_address(&self, access: RawHandle) -> NativeResult<String>;

    fn access_serialize(&self, access: RawHandle) -> NativeResult<String>;

    /// Derive a restricted access grant.
    fn access_share(
        &self,
        access: RawHandle,
        permission: &Permission,
        prefixes: &[SharePrefix],
    ) -> NativeResult<RawHandle>;

    fn access_override_encryption_key(
        &self,
        access: RawHandle,
        bucket: &str,
        prefix: &str,
        encryption_key: RawHandle,
    ) -> NativeResult<()>;

    fn free_access(&self, access: RawHandle);

    // --- project ----------------------------------------------------------

    fn open_project(&self, access: RawHandle) -> NativeResult<RawHandle>;

    fn config_open_project(&self, config: &Config, access: RawHandle) -> NativeResult<RawHandle>;

    /// Close the project connection. The handle still has to be freed.
    fn close_project(&self, project: RawHandle) -> NativeResult<()>;

    fn free_project(&self, project: RawHandle);

    fn revoke_access(&self, project: RawHandle, access: RawHandle) -> NativeResult<()>;

    // --- buckets ----------------------------------------------------------

    fn create_bucket(&self, project: RawHandle, bucket: &str) -> NativeResult<Bucket>;

    fn ensure_bucket(&self, project: RawHandle, bucket: &str) -> NativeResult<Bucket>;

    fn stat_bucket(&self, project: RawHandle, bucket: &str) -> NativeResult<Bucket>;

    fn delete_bucket(&self, project: RawHandle, bucket: &str) -> NativeResult<Bucket>;

    fn delete_bucket_with_objects(&self, project: RawHandle, bucket: &str)
        -> NativeResult<Bucket>;

    /// Start a bucket listing. Failures surface through `iterator_err`.
    fn list_buckets(&self, project: RawHandle, options: &ListBucketsOptions) -> RawHandle;

    // --- objects ----------------------------------------------------------

    fn stat_object(&self, project: RawHandle, bucket: &str, key: &str) -> NativeResult<Object>;

    fn delete_object(&self, project: RawHandle, bucket: &str, key: &str) -> NativeResult<()>;

    fn list_objects(
        &self,
        project: RawHandle,
        bucket: &str,
        options: &ListObjectsOptions,
    ) -> RawHandle;

    fn copy_object(
        &self,
        project: RawHandle,
        bucket: &str,
        key: &str,
        new_bucket: &str,
        new_key: &str,
    ) -> NativeResult<Object>;

    fn move_object(
        &self,
        project: RawHandle,
        bucket: &str,
        key: &str,
        new_bucket: &str,
        new_key: &str,
    ) -> NativeResult<()>;

    fn update_object_metadata(
        &self,
        project: RawHandle,
        bucket: &str,
        key: &str,
        metadata: &CustomMetadata,
    ) -> NativeResult<()>;

    // --- uploads ----------------------------------------------------------

    fn upload_object(
        &self,
        project: RawHandle,
        bucket: &str,
        key: &str,
        options: &UploadOptions,
    ) -> NativeResult<RawHandle>;

    fn upload_write(&self, upload: RawHandle, data: &[u8]) -> WriteResult;

    fn upload_commit(&self, upload: RawHandle) -> NativeResult<()>;

    fn upload_abort(&self, upload: RawHandle) -> NativeResult<()>;

    fn upload_set_custom_metadata(
        &self,
        upload: RawHandle,
        metadata: &CustomMetadata,
    ) -> NativeResult<()>;

    fn upload_info(&self, upload: RawHandle) -> NativeResult<Object>;

    fn free_upload(&self, upload: RawHandle);

    // --- downloads --------------------------------------------------------

    fn download_object(
        &self,
        project: RawHandle,
        bucket: &str,
        key: &str,
        options: &DownloadOptions,
    ) -> NativeResult<RawHandle>;

    /// Read the next chunk directly into `buffer`.
    fn download_read(&self, download: RawHandle, buffer: &mut [u8]) -> ReadResult;

    fn download_info(&self, download: RawHandle) -> NativeResult<Object>;

    fn close_download(&self, download: RawHandle) -> NativeResult<()>;

    fn free_download(&self, download: RawHandle);

    // --- encryption -------------------------------------------------------

    fn derive_encryption_key(&self, passphrase: &str, salt: &[u8]) -> NativeResult<RawHandle>;

    fn free_encryption_key(&self, key: RawHandle);

    // --- multipart --------------------------------------------------------

    fn begin_upload(
        &self,
        project: RawHandle,
        bucket: &str,
        key: &str,
        options: &UploadOptions,
    ) -> NativeResult<UploadInfo>;

    fn commit_upload(
        &self,
        project: RawHandle,
        bucket: &str,
        key: &str,
        upload_id: &str,
        options: &CommitUploadOptions,
    ) -> NativeResult<Object>;

    fn abort_upload(
        &self,
        project: RawHandle,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> NativeResult<()>;

    fn upload_part(
        &self,
        project: RawHandle,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
    ) -> NativeResult<RawHandle>;

    fn part_upload_write(&self, part: RawHandle, data: &[u8]) -> WriteResult;

    fn part_upload_commit(&self, part: RawHandle) -> NativeResult<()>;

    fn part_upload_abort(&self, part: RawHandle) -> NativeResult<()>;

    fn part_upload_set_etag(&self, part: RawHandle, etag: &str) -> NativeResult<()>;

    fn part_upload_info(&self, part: RawHandle) -> NativeResult<Part>;

    fn free_part_upload(&self, part: RawHandle);

    fn list_upload_parts(
        &self,
        project: RawHandle,
        bucket: &str,
        key: &str,
        upload_id: &str,
        options: &ListUploadPartsOptions,
    ) -> RawHandle;

    fn list_uploads(
        &self,
        project: RawHandle,
        bucket: &str,
        options: &ListUploadsOptions,
    ) -> RawHandle;

    // --- listing cursors --------------------------------------------------

    /// Advance the cursor. `false` once the result set is exhausted or an
    /// error occurred.
    fn iterator_next(&self, iterator: RawHandle) -> bool;

    /// Item at the current position, if `iterator_next` returned `true`.
    fn iterator_item(&self, iterator: RawHandle) -> Option<ListItem>;

    fn iterator_err(&self, iterator: RawHandle) -> Option<NativeError>;

    fn free_iterator(&self, iterator: RawHandle);

    // --- edge services ----------------------------------------------------

    fn edge_register_access(
        &self,
        config: &EdgeConfig,
        access: RawHandle,
        options: &EdgeRegisterAccessOptions,
    ) -> NativeResult<EdgeCredentials>;

    fn edge_join_share_url(
        &self,
        base_url: &str,
        access_key_id: &str,
        bucket: &str,
        key: &str,
        options: &EdgeShareUrlOptions,
    ) -> NativeResult<String>;

    // --- diagnostics ------------------------------------------------------

    /// `true` when no native resource is alive.
    fn universe_is_empty(&self) -> bool;
}
