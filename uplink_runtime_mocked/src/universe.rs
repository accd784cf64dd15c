//! Live native resources, keyed by raw handle.

use std::collections::HashMap;

use uplink_runtime::{error_codes, CustomMetadata, ListItem, NativeError, NativeResult, Object, RawHandle};

use crate::grant::Grant;

pub struct ProjectState {
    pub grant: Grant,
    pub closed: bool,
}

pub struct UploadState {
    pub grant: Grant,
    pub bucket: String,
    pub key: String,
    pub data: Vec<u8>,
    pub expires: i64,
    pub custom: CustomMetadata,
    pub done: bool,
}

pub struct DownloadState {
    pub object: Object,
    pub data: Vec<u8>,
    pub pos: usize,
    pub closed: bool,
}

pub struct PartState {
    pub bucket: String,
    pub key: String,
    pub upload_id: String,
    pub part_number: u32,
    pub data: Vec<u8>,
    pub etag: String,
    pub done: bool,
}

/// Snapshot of a listing taken when the cursor was created.
pub struct CursorState {
    pub pending: std::collections::VecDeque<ListItem>,
    pub current: Option<ListItem>,
    pub error: Option<NativeError>,
}

impl CursorState {
    pub fn new(result: NativeResult<Vec<ListItem>>) -> Self {
        match result {
            Ok(items) => Self {
                pending: items.into(),
                current: None,
                error: None,
            },
            Err(error) => Self {
                pending: std::collections::VecDeque::new(),
                current: None,
                error: Some(error),
            },
        }
    }
}

pub enum Resource {
    Access(Grant),
    Project(ProjectState),
    Upload(UploadState),
    Download(DownloadState),
    EncryptionKey(Vec<u8>),
    PartUpload(PartState),
    Cursor(CursorState),
}

macro_rules! accessor {
    ($name:ident, $variant:ident, $ty:ty) => {
        pub fn $name(&mut self, handle: RawHandle) -> NativeResult<&mut $ty> {
            match self.resources.get_mut(&handle.0) {
                Some(Resource::$variant(inner)) => Ok(inner),
                _ => Err(invalid_handle(handle)),
            }
        }
    };
}

pub fn invalid_handle(handle: RawHandle) -> NativeError {
    NativeError::new(error_codes::INVALID_HANDLE, format!("invalid handle {handle}"))
}

pub struct Universe {
    resources: HashMap<usize, Resource>,
    next_id: usize,
}

impl Default for Universe {
    fn default() -> Self {
        Self {
            resources: HashMap::new(),
            next_id: 1,
        }
    }
}

impl Universe {
    pub fn add(&mut self, resource: Resource) -> RawHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.resources.insert(id, resource);
        RawHandle(id)
    }

    /// Drop the resource if it has the expected shape. Freeing an unknown
    /// handle is a no-op, matching the native library.
    pub fn free(&mut self, handle: RawHandle, matches: fn(&Resource) -> bool) {
        if self.resources.get(&handle.0).is_some_and(matches) {
            self.resources.remove(&handle.0);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    accessor!(access, Access, Grant);
    accessor!(project, Project, ProjectState);
    accessor!(upload, Upload, UploadState);
    accessor!(download, Download, DownloadState);
    accessor!(encryption_key, EncryptionKey, Vec<u8>);
    accessor!(part, PartUpload, PartState);
    accessor!(cursor, Cursor, CursorState);

    /// Grant of an open project.
    pub fn open_project(&mut self, handle: RawHandle) -> NativeResult<Grant> {
        let project = self.project(handle)?;
        if project.closed {
            return Err(NativeError::new(error_codes::INTERNAL, "project closed"));
        }
        Ok(project.grant.clone())
    }
}
