//! Multipart upload coordinator
//!
//! `MultipartUpload` tracks one upload id through `Active` to `Committed` or
//! `Aborted`; `PartUpload` tracks one part through `Open` to `Committed` or
//! `Aborted`. A part shares its parent's state, so it is usable only while
//! the parent is active. Any call on a closed upload or part fails with
//! `BridgeError::Closed` before reaching the bridge. Parts still open when
//! the parent commits or aborts are aborted by the parent.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};
use uplink_runtime::{Object, Part, UploadInfo};

use crate::bridge::Bridge;
use crate::buffer::HostBuffer;
use crate::error::BridgeError;
use crate::listing::Listing;
use crate::marshal::FromValue;
use crate::registry::HandleRef;
use crate::value::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Active,
    Committed,
    Aborted,
}

impl UploadState {
    fn name(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Committed => "committed",
            Self::Aborted => "aborted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartState {
    Open,
    Committed,
    Aborted,
}

impl PartState {
    fn name(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Committed => "committed",
            Self::Aborted => "aborted",
        }
    }
}

fn typed<T: FromValue>(operation: &str, value: &Value) -> Result<T, BridgeError> {
    T::from_value(value).ok_or_else(|| {
        BridgeError::type_error(format!(
            "{operation}: unexpected result shape {}",
            value.type_name()
        ))
    })
}

/// Staging buffer size of `PartUpload::write_all`.
pub const WRITE_CHUNK: usize = 64 * 1024;

/// State shared by an upload and its parts.
struct Shared {
    state: UploadState,
    parts: HashMap<HandleRef, PartState>,
}

fn handle_of(operation: &str, value: &Value) -> Result<HandleRef, BridgeError> {
    value
        .as_handle()
        .ok_or_else(|| BridgeError::type_error(format!("{operation} did not return a handle")))
}

pub struct MultipartUpload {
    bridge: Bridge,
    project: HandleRef,
    bucket: String,
    key: String,
    upload_id: String,
    shared: Arc<Mutex<Shared>>,
}

impl MultipartUpload {
    /// Start a new multipart upload of `bucket/key`.
    ///
    /// # Errors
    /// Whatever `beginUpload` rejects with.
    pub async fn begin(
        bridge: &Bridge,
        project: HandleRef,
        bucket: &str,
        key: &str,
        options: Option<Map>,
    ) -> Result<Self, BridgeError> {
        let args = vec![
            project.into(),
            bucket.into(),
            key.into(),
            options.map(Value::Object).into(),
        ];
        let info: UploadInfo = typed("beginUpload", &bridge.call_async("beginUpload", args).await?)?;
        debug!(bucket, key, upload_id = %info.upload_id, "multipart upload started");
        Ok(Self::resume(bridge, project, bucket, key, &info.upload_id))
    }

    /// Attach to an upload id obtained elsewhere, for example from a
    /// listing of pending uploads.
    #[must_use]
    pub fn resume(
        bridge: &Bridge,
        project: HandleRef,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Self {
        Self {
            bridge: bridge.clone(),
            project,
            bucket: bucket.to_string(),
            key: key.to_string(),
            upload_id: upload_id.to_string(),
            shared: Arc::new(Mutex::new(Shared {
                state: UploadState::Active,
                parts: HashMap::new(),
            })),
        }
    }

    #[must_use]
    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn state(&self) -> UploadState {
        self.shared.lock().state
    }

    fn ensure_active(&self) -> Result<(), BridgeError> {
        match self.state() {
            UploadState::Active => Ok(()),
            state => Err(BridgeError::Closed {
                what: "multipart upload",
                state: state.name(),
            }),
        }
    }

    fn location(&self) -> Vec<Value> {
        vec![
            self.project.into(),
            self.bucket.as_str().into(),
            self.key.as_str().into(),
            self.upload_id.as_str().into(),
        ]
    }

    /// Open part `part_number` for writing.
    ///
    /// # Errors
    /// `Closed` unless active; `Range` outside `1..=10000`.
    pub async fn upload_part(&self, part_number: u32) -> Result<PartUpload, BridgeError> {
        self.ensure_active()?;
        let mut args = self.location();
        args.push(part_number.into());
        let handle = handle_of("uploadPart", &self.bridge.call_async("uploadPart", args).await?)?;
        self.shared.lock().parts.insert(handle, PartState::Open);
        Ok(PartUpload {
            bridge: self.bridge.clone(),
            handle,
            part_number,
            shared: Arc::clone(&self.shared),
        })
    }

    /// Assemble the committed parts into the final object.
    ///
    /// # Errors
    /// `Closed` unless active; a rejected commit leaves the upload active.
    pub async fn commit(&mut self, custom_metadata: Option<Map>) -> Result<Object, BridgeError> {
        self.ensure_active()?;
        let mut args = self.location();
        args.push(custom_metadata.map_or(Value::Undefined, |metadata| {
            Value::object([("customMetadata", Value::Object(metadata))])
        }));
        let object = self.bridge.call_async("commitUpload", args).await?;
        self.close(UploadState::Committed).await;
        debug!(upload_id = %self.upload_id, "multipart upload committed");
        typed("commitUpload", &object)
    }

    /// # Errors
    /// `Closed` unless active; a rejected abort leaves the upload active.
    pub async fn abort(&mut self) -> Result<(), BridgeError> {
        self.ensure_active()?;
        self.bridge.call_async("abortUpload", self.location()).await?;
        self.close(UploadState::Aborted).await;
        debug!(upload_id = %self.upload_id, "multipart upload aborted");
        Ok(())
    }

    /// Move to `state` and abort the parts left open.
    async fn close(&self, state: UploadState) {
        let open: Vec<HandleRef> = {
            let mut shared = self.shared.lock();
            shared.state = state;
            shared
                .parts
                .iter()
                .filter(|(_, part)| **part == PartState::Open)
                .map(|(handle, _)| *handle)
                .collect()
        };
        for handle in open {
            match self
                .bridge
                .call_async("partUploadAbort", vec![handle.into()])
                .await
            {
                Ok(_) => {
                    self.shared.lock().parts.insert(handle, PartState::Aborted);
                }
                Err(e) => warn!(part = %handle, error = %e, "cannot abort open part"),
            }
        }
    }

    /// Committed parts of this upload.
    ///
    /// # Errors
    /// `Closed` unless active.
    pub async fn list_parts(&self) -> Result<Listing<Part>, BridgeError> {
        self.ensure_active()?;
        Listing::open(&self.bridge, self.location()).await
    }
}

pub struct PartUpload {
    bridge: Bridge,
    handle: HandleRef,
    part_number: u32,
    shared: Arc<Mutex<Shared>>,
}

impl PartUpload {
    #[must_use]
    pub fn part_number(&self) -> u32 {
        self.part_number
    }

    #[must_use]
    pub fn handle(&self) -> HandleRef {
        self.handle
    }

    #[must_use]
    pub fn state(&self) -> PartState {
        self.shared
            .lock()
            .parts
            .get(&self.handle)
            .copied()
            .unwrap_or(PartState::Aborted)
    }

    fn set_state(&self, state: PartState) {
        self.shared.lock().parts.insert(self.handle, state);
    }

    fn ensure_open(&self) -> Result<(), BridgeError> {
        let parent = self.shared.lock().state;
        if parent != UploadState::Active {
            return Err(BridgeError::Closed {
                what: "multipart upload",
                state: parent.name(),
            });
        }
        match self.state() {
            PartState::Open => Ok(()),
            state => Err(BridgeError::Closed {
                what: "part upload",
                state: state.name(),
            }),
        }
    }

    /// Write the first `length` bytes of `buffer`. Returns the number of
    /// bytes accepted.
    ///
    /// # Errors
    /// `Closed` unless open; `Range` if `length` exceeds the buffer.
    pub async fn write(&self, buffer: &HostBuffer, length: usize) -> Result<usize, BridgeError> {
        self.ensure_open()?;
        let args = vec![self.handle.into(), buffer.clone().into(), length.into()];
        let written = self.bridge.call_async("partUploadWrite", args).await?;
        written
            .as_i64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| BridgeError::type_error("partUploadWrite: expected a byte count"))
    }

    /// Write all of `data`, issuing as many writes as it takes.
    ///
    /// # Errors
    /// As [`PartUpload::write`].
    pub async fn write_all(&self, data: &[u8]) -> Result<(), BridgeError> {
        let chunk = HostBuffer::new(data.len().min(WRITE_CHUNK));
        let mut offset = 0;
        while offset < data.len() {
            let length = (data.len() - offset).min(chunk.len());
            chunk.lock()[..length].copy_from_slice(&data[offset..offset + length]);
            let written = self.write(&chunk, length).await?;
            if written == 0 {
                return Err(BridgeError::type_error("partUploadWrite: no progress"));
            }
            offset += written;
        }
        Ok(())
    }

    /// # Errors
    /// `Closed` unless open.
    pub async fn set_etag(&self, etag: &str) -> Result<(), BridgeError> {
        self.ensure_open()?;
        self.bridge
            .call_async("partUploadSetEtag", vec![self.handle.into(), etag.into()])
            .await?;
        Ok(())
    }

    /// # Errors
    /// `Closed` unless open.
    pub async fn info(&self) -> Result<Part, BridgeError> {
        self.ensure_open()?;
        let part = self
            .bridge
            .call_async("partUploadInfo", vec![self.handle.into()])
            .await?;
        typed("partUploadInfo", &part)
    }

    /// # Errors
    /// `Closed` unless open; a rejected commit leaves the part open.
    pub async fn commit(&mut self) -> Result<(), BridgeError> {
        self.ensure_open()?;
        self.bridge
            .call_async("partUploadCommit", vec![self.handle.into()])
            .await?;
        self.set_state(PartState::Committed);
        Ok(())
    }

    /// # Errors
    /// `Closed` unless open; a rejected abort leaves the part open.
    pub async fn abort(&mut self) -> Result<(), BridgeError> {
        self.ensure_open()?;
        self.bridge
            .call_async("partUploadAbort", vec![self.handle.into()])
            .await?;
        self.set_state(PartState::Aborted);
        Ok(())
    }
}

impl Drop for PartUpload {
    fn drop(&mut self) {
        if self.state() == PartState::Open {
            warn!(part = self.part_number, handle = %self.handle, "part upload dropped while open");
        }
    }
}
