//! In-memory storage-client library.
//!
//! `MemoryStorage` implements the full native surface without a network:
//!
//! - buckets, objects and pending multipart uploads live in a `Store`;
//! - every handle it hands out is tracked in a `Universe`, so tests can
//!   check that nothing leaked;
//! - `fail_next` injects a native error into the next call of an operation;
//! - `set_read_chunk` caps how many bytes a single `download_read` copies;
//! - `hold_calls`/`release_calls` park worker threads at a gate.

mod gate;
mod grant;
mod store;
mod universe;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use uplink_runtime::{
    error_codes, Bucket, CommitUploadOptions, Config, CustomMetadata, DownloadOptions, EdgeConfig,
    EdgeCredentials, EdgeRegisterAccessOptions, EdgeShareUrlOptions, ListBucketsOptions, ListItem,
    ListObjectsOptions, ListUploadPartsOptions, ListUploadsOptions, NativeError, NativeResult,
    Object, Part, Permission, RawHandle, ReadResult, SharePrefix, StorageRuntime, SystemMetadata,
    UploadInfo, UploadOptions, WriteResult,
};

use crate::gate::Gate;
use crate::grant::{Action, Grant};
use crate::store::{validate_bucket_name, validate_key, PendingUpload, Store, StoredObject, StoredPart};
use crate::universe::{
    CursorState, DownloadState, PartState, ProjectState, Resource, Universe, UploadState,
};

const EPOCH: i64 = 1_700_000_000;

struct State {
    store: Store,
    universe: Universe,
    revoked: HashSet<String>,
    next_upload_id: u64,
    clock: i64,
}

impl State {
    fn now(&mut self) -> i64 {
        self.clock += 1;
        self.clock
    }
}

pub struct MemoryStorage {
    state: Mutex<State>,
    gate: Gate,
    calls: AtomicUsize,
    read_chunk: AtomicUsize,
    faults: Mutex<HashMap<String, NativeError>>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                store: Store::default(),
                universe: Universe::default(),
                revoked: HashSet::new(),
                next_upload_id: 1,
                clock: EPOCH,
            }),
            gate: Gate::default(),
            calls: AtomicUsize::new(0),
            read_chunk: AtomicUsize::new(0),
            faults: Mutex::new(HashMap::new()),
        }
    }

    /// Number of native calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make the next call of `operation` fail with `error`.
    pub fn fail_next(&self, operation: &str, error: NativeError) {
        self.faults.lock().insert(operation.to_string(), error);
    }

    /// Limit the bytes copied by one `download_read`. Zero means no limit.
    pub fn set_read_chunk(&self, limit: usize) {
        self.read_chunk.store(limit, Ordering::SeqCst);
    }

    pub fn hold_calls(&self) {
        self.gate.hold();
    }

    pub fn release_calls(&self) {
        self.gate.release();
    }

    /// Calls currently parked by `hold_calls`.
    pub fn parked_calls(&self) -> usize {
        self.gate.parked()
    }

    pub fn live_resources(&self) -> usize {
        self.state.lock().universe.len()
    }

    /// Serialized root grant usable with `parse_access`.
    ///
    /// # Errors
    /// Empty satellite address or API key.
    pub fn serialized_grant(
        satellite_address: &str,
        api_key: &str,
        passphrase: &str,
    ) -> NativeResult<String> {
        Grant::root(satellite_address, api_key, passphrase)?.serialize()
    }

    /// Store an object directly, creating the bucket if needed.
    #[allow(clippy::missing_panics_doc)]
    #[allow(clippy::unwrap_used)]
    pub fn seed_object(&self, bucket: &str, key: &str, data: &[u8]) {
        let mut state = self.state.lock();
        let now = state.now();
        let stored = StoredObject {
            data: data.to_vec(),
            created: now,
            expires: 0,
            custom: CustomMetadata::new(),
        };
        state.store.ensure_bucket(bucket, now).unwrap();
        state.store.put_object(bucket, key, stored).unwrap();
    }

    pub fn object_data(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        let state = self.state.lock();
        state.store.object(bucket, key).ok().map(|o| o.data.clone())
    }

    fn enter(&self, operation: &str) -> NativeResult<()> {
        self.gate.pass();
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.faults.lock().remove(operation) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn call<T>(
        &self,
        operation: &str,
        f: impl FnOnce(&mut State) -> NativeResult<T>,
    ) -> NativeResult<T> {
        self.enter(operation)?;
        let mut state = self.state.lock();
        f(&mut *state)
    }

    fn free(&self, operation: &str, handle: RawHandle, matches: fn(&Resource) -> bool) {
        let _ = self.enter(operation);
        self.state.lock().universe.free(handle, matches);
    }

    fn open_listing(
        &self,
        operation: &str,
        project: RawHandle,
        list: impl FnOnce(&Store, &Grant) -> NativeResult<Vec<ListItem>>,
    ) -> RawHandle {
        let fault = self.enter(operation).err();
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let items = match fault {
            Some(error) => Err(error),
            None => match state.universe.open_project(project) {
                Ok(grant) => list(&state.store, &grant),
                Err(error) => Err(error),
            },
        };
        state.universe.add(Resource::Cursor(CursorState::new(items)))
    }

    fn write_to(
        &self,
        operation: &str,
        data: &[u8],
        f: impl FnOnce(&mut State) -> NativeResult<&mut Vec<u8>>,
    ) -> WriteResult {
        let target = self.enter(operation).and_then(|()| {
            let mut state = self.state.lock();
            f(&mut *state).map(|buf| buf.extend_from_slice(data))
        });
        match target {
            Ok(()) => WriteResult {
                bytes_written: data.len(),
                error: None,
            },
            Err(error) => WriteResult {
                bytes_written: 0,
                error: Some(error),
            },
        }
    }
}

fn upload_done() -> NativeError {
    NativeError::new(error_codes::UPLOAD_DONE, "upload already committed or aborted")
}

fn open_project_in(state: &mut State, access: RawHandle) -> NativeResult<RawHandle> {
    let grant = state.universe.access(access)?.clone();
    if state.revoked.contains(&grant.serialize()?) {
        return Err(NativeError::new(
            error_codes::PERMISSION_DENIED,
            "access grant revoked",
        ));
    }
    Ok(state.universe.add(Resource::Project(ProjectState {
        grant,
        closed: false,
    })))
}

fn passphrase_key(passphrase: &str, salt: &[u8]) -> Vec<u8> {
    let mut key = vec![0u8; 32];
    for (i, byte) in passphrase.bytes().chain(salt.iter().copied()).enumerate() {
        let slot = i % key.len();
        key[slot] = key[slot].wrapping_mul(31).wrapping_add(byte);
    }
    key
}

impl StorageRuntime for MemoryStorage {
    fn parse_access(&self, serialized: &str) -> NativeResult<RawHandle> {
        self.call("parse_access", |state| {
            let grant = Grant::parse(serialized)?;
            Ok(state.universe.add(Resource::Access(grant)))
        })
    }

    fn request_access_with_passphrase(
        &self,
        satellite_address: &str,
        api_key: &str,
        passphrase: &str,
    ) -> NativeResult<RawHandle> {
        self.call("request_access_with_passphrase", |state| {
            let grant = Grant::root(satellite_address, api_key, passphrase)?;
            Ok(state.universe.add(Resource::Access(grant)))
        })
    }

    fn config_request_access_with_passphrase(
        &self,
        config: &Config,
        satellite_address: &str,
        api_key: &str,
        passphrase: &str,
    ) -> NativeResult<RawHandle> {
        self.call("config_request_access_with_passphrase", |state| {
            if config.dial_timeout_milliseconds < 0 {
                return Err(NativeError::new(
                    error_codes::INTERNAL,
                    "dial timeout must not be negative",
                ));
            }
            let grant = Grant::root(satellite_address, api_key, passphrase)?;
            Ok(state.universe.add(Resource::Access(grant)))
        })
    }

    fn access_satellite_address(&self, access: RawHandle) -> NativeResult<String> {
        self.call("access_satellite_address", |state| {
            Ok(state.universe.access(access)?.satellite_address.clone())
        })
    }

    fn access_serialize(&self, access: RawHandle) -> NativeResult<String> {
        self.call("access_serialize", |state| {
            state.universe.access(access)?.serialize()
        })
    }

    fn access_share(
        &self,
        access: RawHandle,
        permission: &Permission,
        prefixes: &[SharePrefix],
    ) -> NativeResult<RawHandle> {
        self.call("access_share", |state| {
            let shared = state.universe.access(access)?.share(permission, prefixes)?;
            Ok(state.universe.add(Resource::Access(shared)))
        })
    }

    fn access_override_encryption_key(
        &self,
        access: RawHandle,
        bucket: &str,
        prefix: &str,
        encryption_key: RawHandle,
    ) -> NativeResult<()> {
        self.call("access_override_encryption_key", |state| {
            validate_bucket_name(bucket)?;
            state.universe.encryption_key(encryption_key)?;
            let grant = state.universe.access(access)?;
            grant.overrides.push((bucket.to_string(), prefix.to_string()));
            Ok(())
        })
    }

    fn free_access(&self, access: RawHandle) {
        self.free("free_access", access, |r| matches!(r, Resource::Access(_)));
    }

    fn open_project(&self, access: RawHandle) -> NativeResult<RawHandle> {
        self.call("open_project", |state| open_project_in(state, access))
    }

    fn config_open_project(&self, config: &Config, access: RawHandle) -> NativeResult<RawHandle> {
        self.call("config_open_project", |state| {
            if config.dial_timeout_milliseconds < 0 {
                return Err(NativeError::new(
                    error_codes::INTERNAL,
                    "dial timeout must not be negative",
                ));
            }
            open_project_in(state, access)
        })
    }

    fn close_project(&self, project: RawHandle) -> NativeResult<()> {
        self.call("close_project", |state| {
            let project = state.universe.project(project)?;
            if project.closed {
                return Err(NativeError::new(error_codes::INTERNAL, "project closed"));
            }
            project.closed = true;
            Ok(())
        })
    }

    fn free_project(&self, project: RawHandle) {
        self.free("free_project", project, |r| matches!(r, Resource::Project(_)));
    }

    fn revoke_access(&self, project: RawHandle, access: RawHandle) -> NativeResult<()> {
        self.call("revoke_access", |state| {
            state.universe.open_project(project)?;
            let serialized = state.universe.access(access)?.serialize()?;
            state.revoked.insert(serialized);
            Ok(())
        })
    }

    fn create_bucket(&self, project: RawHandle, bucket: &str) -> NativeResult<Bucket> {
        self.call("create_bucket", |state| {
            let grant = state.universe.open_project(project)?;
            grant.check(Action::Write, bucket, "")?;
            let now = state.now();
            state.store.create_bucket(bucket, now)
        })
    }

    fn ensure_bucket(&self, project: RawHandle, bucket: &str) -> NativeResult<Bucket> {
        self.call("ensure_bucket", |state| {
            let grant = state.universe.open_project(project)?;
            grant.check(Action::Write, bucket, "")?;
            let now = state.now();
            state.store.ensure_bucket(bucket, now)
        })
    }

    fn stat_bucket(&self, project: RawHandle, bucket: &str) -> NativeResult<Bucket> {
        self.call("stat_bucket", |state| {
            state.universe.open_project(project)?;
            state.store.stat_bucket(bucket)
        })
    }

    fn delete_bucket(&self, project: RawHandle, bucket: &str) -> NativeResult<Bucket> {
        self.call("delete_bucket", |state| {
            let grant = state.universe.open_project(project)?;
            grant.check(Action::Delete, bucket, "")?;
            state.store.delete_bucket(bucket, false)
        })
    }

    fn delete_bucket_with_objects(
        &self,
        project: RawHandle,
        bucket: &str,
    ) -> NativeResult<Bucket> {
        self.call("delete_bucket_with_objects", |state| {
            let grant = state.universe.open_project(project)?;
            grant.check(Action::Delete, bucket, "")?;
            state.store.delete_bucket(bucket, true)
        })
    }

    fn list_buckets(&self, project: RawHandle, options: &ListBucketsOptions) -> RawHandle {
        self.open_listing("list_buckets", project, |store, _| {
            Ok(store.list_buckets(options.cursor.as_deref()))
        })
    }

    fn stat_object(&self, project: RawHandle, bucket: &str, key: &str) -> NativeResult<Object> {
        self.call("stat_object", |state| {
            let grant = state.universe.open_project(project)?;
            grant.check(Action::Read, bucket, key)?;
            Ok(state.store.object(bucket, key)?.to_object(key))
        })
    }

    fn delete_object(&self, project: RawHandle, bucket: &str, key: &str) -> NativeResult<()> {
        self.call("delete_object", |state| {
            let grant = state.universe.open_project(project)?;
            grant.check(Action::Delete, bucket, key)?;
            state.store.remove_object(bucket, key).map(drop)
        })
    }

    fn list_objects(
        &self,
        project: RawHandle,
        bucket: &str,
        options: &ListObjectsOptions,
    ) -> RawHandle {
        self.open_listing("list_objects", project, |store, grant| {
            grant.check(Action::List, bucket, options.prefix.as_deref().unwrap_or(""))?;
            store.list_objects(bucket, options)
        })
    }

    fn copy_object(
        &self,
        project: RawHandle,
        bucket: &str,
        key: &str,
        new_bucket: &str,
        new_key: &str,
    ) -> NativeResult<Object> {
        self.call("copy_object", |state| {
            let grant = state.universe.open_project(project)?;
            grant.check(Action::Read, bucket, key)?;
            grant.check(Action::Write, new_bucket, new_key)?;
            let mut copy = state.store.object(bucket, key)?.clone();
            copy.created = state.now();
            state.store.put_object(new_bucket, new_key, copy.clone())?;
            Ok(copy.to_object(new_key))
        })
    }

    fn move_object(
        &self,
        project: RawHandle,
        bucket: &str,
        key: &str,
        new_bucket: &str,
        new_key: &str,
    ) -> NativeResult<()> {
        self.call("move_object", |state| {
            let grant = state.universe.open_project(project)?;
            grant.check(Action::Delete, bucket, key)?;
            grant.check(Action::Write, new_bucket, new_key)?;
            validate_key(new_key)?;
            state.store.bucket(new_bucket)?;
            let moved = state.store.remove_object(bucket, key)?;
            state.store.put_object(new_bucket, new_key, moved)
        })
    }

    fn update_object_metadata(
        &self,
        project: RawHandle,
        bucket: &str,
        key: &str,
        metadata: &CustomMetadata,
    ) -> NativeResult<()> {
        self.call("update_object_metadata", |state| {
            let grant = state.universe.open_project(project)?;
            grant.check(Action::Write, bucket, key)?;
            state.store.object_mut(bucket, key)?.custom = metadata.clone();
            Ok(())
        })
    }

    fn upload_object(
        &self,
        project: RawHandle,
        bucket: &str,
        key: &str,
        options: &UploadOptions,
    ) -> NativeResult<RawHandle> {
        self.call("upload_object", |state| {
            let grant = state.universe.open_project(project)?;
            grant.check(Action::Write, bucket, key)?;
            validate_key(key)?;
            state.store.bucket(bucket)?;
            Ok(state.universe.add(Resource::Upload(UploadState {
                grant,
                bucket: bucket.to_string(),
                key: key.to_string(),
                data: Vec::new(),
                expires: options.expires,
                custom: CustomMetadata::new(),
                done: false,
            })))
        })
    }

    fn upload_write(&self, upload: RawHandle, data: &[u8]) -> WriteResult {
        self.write_to("upload_write", data, |state| {
            let upload = state.universe.upload(upload)?;
            if upload.done {
                return Err(upload_done());
            }
            Ok(&mut upload.data)
        })
    }

    fn upload_commit(&self, upload: RawHandle) -> NativeResult<()> {
        self.call("upload_commit", |state| {
            let now = state.now();
            let upload = state.universe.upload(upload)?;
            if upload.done {
                return Err(upload_done());
            }
            let stored = StoredObject {
                data: upload.data.clone(),
                created: now,
                expires: upload.expires,
                custom: upload.custom.clone(),
            };
            let (bucket, key) = (upload.bucket.clone(), upload.key.clone());
            upload.done = true;
            state.store.put_object(&bucket, &key, stored)
        })
    }

    fn upload_abort(&self, upload: RawHandle) -> NativeResult<()> {
        self.call("upload_abort", |state| {
            let upload = state.universe.upload(upload)?;
            if upload.done {
                return Err(upload_done());
            }
            upload.done = true;
            upload.data.clear();
            Ok(())
        })
    }

    fn upload_set_custom_metadata(
        &self,
        upload: RawHandle,
        metadata: &CustomMetadata,
    ) -> NativeResult<()> {
        self.call("upload_set_custom_metadata", |state| {
            let upload = state.universe.upload(upload)?;
            if upload.done {
                return Err(upload_done());
            }
            upload.custom = metadata.clone();
            Ok(())
        })
    }

    fn upload_info(&self, upload: RawHandle) -> NativeResult<Object> {
        self.call("upload_info", |state| {
            let upload = state.universe.upload(upload)?;
            Ok(Object {
                key: upload.key.clone(),
                is_prefix: false,
                system: SystemMetadata {
                    created: 0,
                    expires: upload.expires,
                    content_length: upload.data.len() as i64,
                },
                custom: upload.custom.clone(),
            })
        })
    }

    fn free_upload(&self, upload: RawHandle) {
        self.free("free_upload", upload, |r| matches!(r, Resource::Upload(_)));
    }

    fn download_object(
        &self,
        project: RawHandle,
        bucket: &str,
        key: &str,
        options: &DownloadOptions,
    ) -> NativeResult<RawHandle> {
        self.call("download_object", |state| {
            let grant = state.universe.open_project(project)?;
            grant.check(Action::Read, bucket, key)?;
            let stored = state.store.object(bucket, key)?;
            let size = stored.data.len();
            let start = usize::try_from(options.offset)
                .ok()
                .filter(|offset| *offset <= size)
                .ok_or_else(|| NativeError::new(error_codes::INTERNAL, "offset out of range"))?;
            let end = usize::try_from(options.length)
                .map_or(size, |length| start.saturating_add(length).min(size));
            let download = DownloadState {
                object: stored.to_object(key),
                data: stored.data[start..end].to_vec(),
                pos: 0,
                closed: false,
            };
            Ok(state.universe.add(Resource::Download(download)))
        })
    }

    fn download_read(&self, download: RawHandle, buffer: &mut [u8]) -> ReadResult {
        if let Err(error) = self.enter("download_read") {
            return ReadResult {
                bytes_read: 0,
                error: Some(error),
            };
        }
        let chunk = self.read_chunk.load(Ordering::SeqCst);
        let mut state = self.state.lock();
        let download = match state.universe.download(download) {
            Ok(download) if !download.closed => download,
            Ok(_) => {
                return ReadResult {
                    bytes_read: 0,
                    error: Some(NativeError::new(error_codes::INTERNAL, "download closed")),
                }
            }
            Err(error) => {
                return ReadResult {
                    bytes_read: 0,
                    error: Some(error),
                }
            }
        };
        let remaining = download.data.len() - download.pos;
        let mut n = remaining.min(buffer.len());
        if chunk > 0 {
            n = n.min(chunk);
        }
        buffer[..n].copy_from_slice(&download.data[download.pos..download.pos + n]);
        download.pos += n;
        let exhausted = download.pos == download.data.len() && n < buffer.len();
        ReadResult {
            bytes_read: n,
            error: exhausted.then(|| NativeError::bare(error_codes::EOF)),
        }
    }

    fn download_info(&self, download: RawHandle) -> NativeResult<Object> {
        self.call("download_info", |state| {
            Ok(state.universe.download(download)?.object.clone())
        })
    }

    fn close_download(&self, download: RawHandle) -> NativeResult<()> {
        self.call("close_download", |state| {
            let download = state.universe.download(download)?;
            if download.closed {
                return Err(NativeError::new(error_codes::INTERNAL, "download closed"));
            }
            download.closed = true;
            Ok(())
        })
    }

    fn free_download(&self, download: RawHandle) {
        self.free("free_download", download, |r| {
            matches!(r, Resource::Download(_))
        });
    }

    fn derive_encryption_key(&self, passphrase: &str, salt: &[u8]) -> NativeResult<RawHandle> {
        self.call("derive_encryption_key", |state| {
            if passphrase.is_empty() {
                return Err(NativeError::new(
                    error_codes::INTERNAL,
                    "passphrase must not be empty",
                ));
            }
            let key = passphrase_key(passphrase, salt);
            Ok(state.universe.add(Resource::EncryptionKey(key)))
        })
    }

    fn free_encryption_key(&self, key: RawHandle) {
        self.free("free_encryption_key", key, |r| {
            matches!(r, Resource::EncryptionKey(_))
        });
    }

    fn begin_upload(
        &self,
        project: RawHandle,
        bucket: &str,
        key: &str,
        options: &UploadOptions,
    ) -> NativeResult<UploadInfo> {
        self.call("begin_upload", |state| {
            let grant = state.universe.open_project(project)?;
            grant.check(Action::Write, bucket, key)?;
            validate_key(key)?;
            let now = state.now();
            let upload_id = format!("upload-{}", state.next_upload_id);
            state.next_upload_id += 1;
            let pending = PendingUpload {
                key: key.to_string(),
                created: now,
                expires: options.expires,
                parts: Default::default(),
            };
            let info = pending.to_info(&upload_id);
            state.store.bucket_mut(bucket)?.uploads.insert(upload_id, pending);
            Ok(info)
        })
    }

    fn commit_upload(
        &self,
        project: RawHandle,
        bucket: &str,
        key: &str,
        upload_id: &str,
        options: &CommitUploadOptions,
    ) -> NativeResult<Object> {
        self.call("commit_upload", |state| {
            let grant = state.universe.open_project(project)?;
            grant.check(Action::Write, bucket, key)?;
            let pending = state.store.pending(bucket, upload_id)?;
            if pending.key != key {
                return Err(NativeError::new(error_codes::OBJECT_NOT_FOUND, format!("{key:?}")));
            }
            let data: Vec<u8> = pending
                .parts
                .values()
                .flat_map(|part| part.data.iter().copied())
                .collect();
            let expires = pending.expires;
            let now = state.now();
            state.store.bucket_mut(bucket)?.uploads.remove(upload_id);
            let stored = StoredObject {
                data,
                created: now,
                expires,
                custom: options.custom_metadata.clone(),
            };
            let object = stored.to_object(key);
            state.store.put_object(bucket, key, stored)?;
            Ok(object)
        })
    }

    fn abort_upload(
        &self,
        project: RawHandle,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> NativeResult<()> {
        self.call("abort_upload", |state| {
            let grant = state.universe.open_project(project)?;
            grant.check(Action::Write, bucket, key)?;
            if state.store.pending(bucket, upload_id)?.key != key {
                return Err(NativeError::new(error_codes::OBJECT_NOT_FOUND, format!("{key:?}")));
            }
            state.store.bucket_mut(bucket)?.uploads.remove(upload_id);
            Ok(())
        })
    }

    fn upload_part(
        &self,
        project: RawHandle,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
    ) -> NativeResult<RawHandle> {
        self.call("upload_part", |state| {
            let grant = state.universe.open_project(project)?;
            grant.check(Action::Write, bucket, key)?;
            if state.store.pending(bucket, upload_id)?.key != key {
                return Err(NativeError::new(error_codes::OBJECT_NOT_FOUND, format!("{key:?}")));
            }
            Ok(state.universe.add(Resource::PartUpload(PartState {
                bucket: bucket.to_string(),
                key: key.to_string(),
                upload_id: upload_id.to_string(),
                part_number,
                data: Vec::new(),
                etag: String::new(),
                done: false,
            })))
        })
    }

    fn part_upload_write(&self, part: RawHandle, data: &[u8]) -> WriteResult {
        self.write_to("part_upload_write", data, |state| {
            let part = state.universe.part(part)?;
            if part.done {
                return Err(upload_done());
            }
            Ok(&mut part.data)
        })
    }

    fn part_upload_commit(&self, part: RawHandle) -> NativeResult<()> {
        self.call("part_upload_commit", |state| {
            let now = state.now();
            let part = state.universe.part(part)?;
            if part.done {
                return Err(upload_done());
            }
            let stored = StoredPart {
                data: part.data.clone(),
                etag: part.etag.clone(),
                modified: now,
            };
            let (bucket, upload_id, number) =
                (part.bucket.clone(), part.upload_id.clone(), part.part_number);
            part.done = true;
            state
                .store
                .pending_mut(&bucket, &upload_id)?
                .parts
                .insert(number, stored);
            Ok(())
        })
    }

    fn part_upload_abort(&self, part: RawHandle) -> NativeResult<()> {
        self.call("part_upload_abort", |state| {
            let part = state.universe.part(part)?;
            if part.done {
                return Err(upload_done());
            }
            part.done = true;
            part.data.clear();
            Ok(())
        })
    }

    fn part_upload_set_etag(&self, part: RawHandle, etag: &str) -> NativeResult<()> {
        self.call("part_upload_set_etag", |state| {
            let part = state.universe.part(part)?;
            if part.done {
                return Err(upload_done());
            }
            part.etag = etag.to_string();
            Ok(())
        })
    }

    fn part_upload_info(&self, part: RawHandle) -> NativeResult<Part> {
        self.call("part_upload_info", |state| {
            let part = state.universe.part(part)?;
            Ok(Part {
                part_number: part.part_number,
                size: part.data.len() as u64,
                modified: 0,
                etag: part.etag.clone(),
            })
        })
    }

    fn free_part_upload(&self, part: RawHandle) {
        self.free("free_part_upload", part, |r| {
            matches!(r, Resource::PartUpload(_))
        });
    }

    fn list_upload_parts(
        &self,
        project: RawHandle,
        bucket: &str,
        key: &str,
        upload_id: &str,
        options: &ListUploadPartsOptions,
    ) -> RawHandle {
        self.open_listing("list_upload_parts", project, |store, grant| {
            grant.check(Action::List, bucket, key)?;
            store.list_parts(bucket, key, upload_id, options.cursor)
        })
    }

    fn list_uploads(
        &self,
        project: RawHandle,
        bucket: &str,
        options: &ListUploadsOptions,
    ) -> RawHandle {
        self.open_listing("list_uploads", project, |store, grant| {
            grant.check(Action::List, bucket, options.prefix.as_deref().unwrap_or(""))?;
            store.list_uploads(bucket, options)
        })
    }

    fn iterator_next(&self, iterator: RawHandle) -> bool {
        let fault = self.enter("iterator_next").err();
        let mut state = self.state.lock();
        let Ok(cursor) = state.universe.cursor(iterator) else {
            return false;
        };
        if let Some(error) = fault {
            cursor.error = Some(error);
        }
        if cursor.error.is_some() {
            cursor.current = None;
            return false;
        }
        cursor.current = cursor.pending.pop_front();
        cursor.current.is_some()
    }

    fn iterator_item(&self, iterator: RawHandle) -> Option<ListItem> {
        let _ = self.enter("iterator_item");
        let mut state = self.state.lock();
        state.universe.cursor(iterator).ok()?.current.clone()
    }

    fn iterator_err(&self, iterator: RawHandle) -> Option<NativeError> {
        let _ = self.enter("iterator_err");
        let mut state = self.state.lock();
        match state.universe.cursor(iterator) {
            Ok(cursor) => cursor.error.clone(),
            Err(error) => Some(error),
        }
    }

    fn free_iterator(&self, iterator: RawHandle) {
        self.free("free_iterator", iterator, |r| matches!(r, Resource::Cursor(_)));
    }

    fn edge_register_access(
        &self,
        config: &EdgeConfig,
        access: RawHandle,
        options: &EdgeRegisterAccessOptions,
    ) -> NativeResult<EdgeCredentials> {
        self.call("edge_register_access", |state| {
            let address = config.auth_service_address.as_str();
            if address.is_empty() || address.starts_with("unreachable") {
                return Err(NativeError::new(
                    error_codes::EDGE_AUTH_DIAL_FAILED,
                    format!("dial {address:?}"),
                ));
            }
            let grant = state.universe.access(access)?;
            if config.certificate_pem.is_none() && !config.insecure_unencrypted_connection {
                return Err(NativeError::new(
                    error_codes::EDGE_REGISTER_ACCESS_FAILED,
                    "TLS requires a certificate",
                ));
            }
            let fingerprint = passphrase_key(&grant.api_key, grant.satellite_address.as_bytes());
            let hex: String = fingerprint.iter().take(12).map(|b| format!("{b:02x}")).collect();
            Ok(EdgeCredentials {
                access_key_id: format!("jw{hex}"),
                secret_key: format!("sk{hex}{}", if options.is_public { "p" } else { "" }),
                endpoint: "https://gateway.storj.test".to_string(),
            })
        })
    }

    fn edge_join_share_url(
        &self,
        base_url: &str,
        access_key_id: &str,
        bucket: &str,
        key: &str,
        options: &EdgeShareUrlOptions,
    ) -> NativeResult<String> {
        self.call("edge_join_share_url", |_| {
            if base_url.is_empty() {
                return Err(NativeError::new(error_codes::INTERNAL, "base url is required"));
            }
            if access_key_id.is_empty() {
                return Err(NativeError::new(
                    error_codes::INTERNAL,
                    "access key id is required",
                ));
            }
            if bucket.is_empty() && !key.is_empty() {
                return Err(NativeError::new(
                    error_codes::INTERNAL,
                    "bucket is required if key is specified",
                ));
            }
            let kind = if options.raw { "raw" } else { "s" };
            let mut url = format!("{}/{kind}/{access_key_id}", base_url.trim_end_matches('/'));
            if !bucket.is_empty() {
                url.push('/');
                url.push_str(bucket);
            }
            if !key.is_empty() {
                url.push('/');
                url.push_str(key);
            }
            Ok(url)
        })
    }

    fn universe_is_empty(&self) -> bool {
        self.state.lock().universe.is_empty()
    }
}
