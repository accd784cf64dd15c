//! Handle registry
//!
//! An arena mapping generated keys to live native resources. The host only
//! ever sees a `HandleRef`; resolving it checks the resource kind, so a
//! handle of the wrong type never reaches the native library.
//!
//! Keys are never reused. A reference that was unregistered stays invalid
//! forever and resolves exactly like one that never existed.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, trace, warn};
use uplink_runtime::{RawHandle, StorageRuntime};

use crate::error::BridgeError;

/// Releases a native resource. Called at most once per entry.
pub type ReleaseFn = fn(&dyn StorageRuntime, RawHandle);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Access,
    Project,
    Upload,
    Download,
    EncryptionKey,
    PartUpload,
    BucketIterator,
    ObjectIterator,
    UploadIterator,
    PartIterator,
}

impl HandleKind {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Project => "project",
            Self::Upload => "upload",
            Self::Download => "download",
            Self::EncryptionKey => "encryption key",
            Self::PartUpload => "part upload",
            Self::BucketIterator => "bucket iterator",
            Self::ObjectIterator => "object iterator",
            Self::UploadIterator => "upload iterator",
            Self::PartIterator => "part iterator",
        }
    }

    /// Default way to give the resource back to the native library.
    #[must_use]
    pub fn release_fn(self) -> ReleaseFn {
        match self {
            Self::Access => |rt, raw| rt.free_access(raw),
            Self::Project => |rt, raw| {
                if let Err(e) = rt.close_project(raw) {
                    warn!(raw = %raw, error = %e, "release: close project failed");
                }
                rt.free_project(raw);
            },
            Self::Upload => |rt, raw| rt.free_upload(raw),
            Self::Download => |rt, raw| {
                if let Err(e) = rt.close_download(raw) {
                    warn!(raw = %raw, error = %e, "release: close download failed");
                }
                rt.free_download(raw);
            },
            Self::EncryptionKey => |rt, raw| rt.free_encryption_key(raw),
            Self::PartUpload => |rt, raw| rt.free_part_upload(raw),
            Self::BucketIterator
            | Self::ObjectIterator
            | Self::UploadIterator
            | Self::PartIterator => |rt, raw| rt.free_iterator(raw),
        }
    }
}

/// What the host holds in place of a native resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleRef {
    key: u64,
}

impl HandleRef {
    #[must_use]
    pub fn key(&self) -> u64 {
        self.key
    }

    /// A reference that was never issued. Useful for probing.
    #[must_use]
    pub fn dangling(key: u64) -> Self {
        Self { key }
    }
}

impl fmt::Display for HandleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle:{}", self.key)
    }
}

pub struct Entry {
    pub raw: RawHandle,
    pub kind: HandleKind,
    pub label: String,
    release: Option<ReleaseFn>,
}

impl Entry {
    /// Give the resource back to the native library.
    pub fn release(self, runtime: &dyn StorageRuntime) {
        if let Some(release) = self.release {
            release(runtime, self.raw);
        }
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("raw", &self.raw)
            .field("kind", &self.kind)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

pub struct HandleRegistry {
    entries: HashMap<u64, Entry>,
    next_key: u64,
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_key: 1,
        }
    }

    pub fn register(
        &mut self,
        raw: RawHandle,
        kind: HandleKind,
        label: impl Into<String>,
        release: Option<ReleaseFn>,
    ) -> HandleRef {
        let key = self.next_key;
        self.next_key += 1;
        let label = label.into();
        debug!(handle = key, raw = %raw, kind = kind.name(), label = %label, "register");
        self.entries.insert(
            key,
            Entry {
                raw,
                kind,
                label,
                release,
            },
        );
        HandleRef { key }
    }

    /// Register with the kind's default release function.
    pub fn register_default(
        &mut self,
        raw: RawHandle,
        kind: HandleKind,
        label: impl Into<String>,
    ) -> HandleRef {
        self.register(raw, kind, label, Some(kind.release_fn()))
    }

    /// # Errors
    /// `InvalidHandle` if the reference is unknown, freed, or of another kind.
    pub fn resolve(
        &self,
        reference: HandleRef,
        expected: HandleKind,
    ) -> Result<RawHandle, BridgeError> {
        match self.entries.get(&reference.key) {
            Some(entry) if entry.kind == expected => {
                trace!(handle = reference.key, raw = %entry.raw, "resolve");
                Ok(entry.raw)
            }
            _ => {
                debug!(handle = reference.key, expected = expected.name(), "resolve failed");
                Err(BridgeError::InvalidHandle { expected })
            }
        }
    }

    /// Drop the entry. The caller takes over releasing the native resource.
    pub fn unregister(&mut self, reference: HandleRef) -> Option<Entry> {
        let entry = self.entries.remove(&reference.key);
        if let Some(entry) = &entry {
            debug!(handle = reference.key, raw = %entry.raw, kind = entry.kind.name(), "unregister");
        }
        entry
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Remove every entry, oldest first.
    pub fn drain(&mut self) -> Vec<Entry> {
        let mut keys: Vec<u64> = self.entries.keys().copied().collect();
        keys.sort_unstable();
        keys.into_iter()
            .filter_map(|key| self.entries.remove(&key))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Arc;

    use parking_lot::Mutex;
    use uplink_runtime::{error_codes, NativeError};
    use uplink_runtime_mocked::MemoryStorage;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_close_on_release_is_logged() {
        let storage = MemoryStorage::new();
        let grant = MemoryStorage::serialized_grant("sat.test:7777", "key", "secret").unwrap();
        let access = storage.parse_access(&grant).unwrap();
        let project = storage.open_project(access).unwrap();
        storage.fail_next(
            "close_project",
            NativeError::new(error_codes::INTERNAL, "connection reset"),
        );
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            (HandleKind::Project.release_fn())(&storage, project);
        });
        storage.free_access(access);

        let logs = String::from_utf8(capture.0.lock().clone()).unwrap();
        assert!(logs.contains("close project failed"), "{logs}");
        assert!(logs.contains("connection reset"), "{logs}");
        assert_eq!(storage.live_resources(), 0);
    }

    #[test]
    fn resolve_checks_kind() {
        let mut registry = HandleRegistry::new();
        let access = registry.register(RawHandle(7), HandleKind::Access, "access", None);
        assert_eq!(
            registry.resolve(access, HandleKind::Access).unwrap(),
            RawHandle(7)
        );
        assert!(matches!(
            registry.resolve(access, HandleKind::Project),
            Err(BridgeError::InvalidHandle {
                expected: HandleKind::Project
            })
        ));
    }

    #[test]
    fn freed_and_unknown_look_the_same() {
        let mut registry = HandleRegistry::new();
        let project = registry.register(RawHandle(1), HandleKind::Project, "p", None);
        registry.unregister(project).unwrap();
        let freed = registry.resolve(project, HandleKind::Project).unwrap_err();
        let unknown = registry
            .resolve(HandleRef::dangling(999), HandleKind::Project)
            .unwrap_err();
        assert_eq!(freed.to_string(), unknown.to_string());
        assert!(registry.is_empty());
    }

    #[test]
    fn keys_are_not_reused() {
        let mut registry = HandleRegistry::new();
        let first = registry.register(RawHandle(1), HandleKind::Upload, "u", None);
        registry.unregister(first);
        let second = registry.register(RawHandle(1), HandleKind::Upload, "u", None);
        assert_ne!(first, second);
        assert!(registry.resolve(first, HandleKind::Upload).is_err());
    }

    #[test]
    fn drain_is_oldest_first() {
        let mut registry = HandleRegistry::new();
        registry.register(RawHandle(10), HandleKind::Access, "a", None);
        registry.register(RawHandle(20), HandleKind::Project, "p", None);
        let drained: Vec<RawHandle> = registry.drain().into_iter().map(|e| e.raw).collect();
        assert_eq!(drained, vec![RawHandle(10), RawHandle(20)]);
        assert_eq!(registry.len(), 0);
    }
}
