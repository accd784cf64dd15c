//! Typed listings over the cursor operations
//!
//! A `Listing<T>` walks one cursor: `next()` yields entries until the cursor
//! is exhausted, then reports whether it ended cleanly or with a deferred
//! listing error. The cursor must be freed; `collect_all` frees it on every
//! path.

use std::marker::PhantomData;

use tracing::warn;
use uplink_runtime::{Bucket, Object, Part, UploadInfo};

use crate::bridge::Bridge;
use crate::error::{BridgeError, StorageError};
use crate::marshal::FromValue;
use crate::registry::HandleRef;
use crate::value::{Map, Value};

/// Operation names of one listing kind.
#[derive(Debug)]
pub struct CursorOps {
    pub create: &'static str,
    pub next: &'static str,
    pub item: &'static str,
    pub err: &'static str,
    pub free: &'static str,
}

pub trait ListEntry: FromValue {
    const OPS: CursorOps;
}

impl ListEntry for Bucket {
    const OPS: CursorOps = CursorOps {
        create: "listBucketsCreate",
        next: "bucketIteratorNext",
        item: "bucketIteratorItem",
        err: "bucketIteratorErr",
        free: "freeBucketIterator",
    };
}

impl ListEntry for Object {
    const OPS: CursorOps = CursorOps {
        create: "listObjectsCreate",
        next: "objectIteratorNext",
        item: "objectIteratorItem",
        err: "objectIteratorErr",
        free: "freeObjectIterator",
    };
}

impl ListEntry for UploadInfo {
    const OPS: CursorOps = CursorOps {
        create: "listUploadsCreate",
        next: "uploadIteratorNext",
        item: "uploadIteratorItem",
        err: "uploadIteratorErr",
        free: "freeUploadIterator",
    };
}

impl ListEntry for Part {
    const OPS: CursorOps = CursorOps {
        create: "listUploadPartsCreate",
        next: "partIteratorNext",
        item: "partIteratorItem",
        err: "partIteratorErr",
        free: "freePartIterator",
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingState {
    Ready,
    Exhausted,
    Errored,
    Freed,
}

impl ListingState {
    fn name(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Exhausted => "exhausted",
            Self::Errored => "errored",
            Self::Freed => "freed",
        }
    }
}

pub struct Listing<T: ListEntry> {
    bridge: Bridge,
    iterator: HandleRef,
    state: ListingState,
    _entry: PhantomData<fn() -> T>,
}

impl<T: ListEntry> Listing<T> {
    /// Run the listing's create operation with `args`.
    ///
    /// # Errors
    /// Whatever the create operation rejects with.
    pub async fn open(bridge: &Bridge, args: Vec<Value>) -> Result<Self, BridgeError> {
        let created = bridge.call_async(T::OPS.create, args).await?;
        let iterator = created.as_handle().ok_or_else(|| {
            BridgeError::type_error(format!("{} did not return a handle", T::OPS.create))
        })?;
        Ok(Self {
            bridge: bridge.clone(),
            iterator,
            state: ListingState::Ready,
            _entry: PhantomData,
        })
    }

    #[must_use]
    pub fn handle(&self) -> HandleRef {
        self.iterator
    }

    #[must_use]
    pub fn state(&self) -> ListingState {
        self.state
    }

    fn handle_arg(&self) -> Vec<Value> {
        vec![Value::Handle(self.iterator)]
    }

    /// The next entry, or `None` once the listing has ended cleanly.
    ///
    /// # Errors
    /// The deferred listing error, once. After that, and after `free`,
    /// `Closed`.
    pub async fn next(&mut self) -> Result<Option<T>, BridgeError> {
        match self.state {
            ListingState::Ready => {}
            ListingState::Exhausted => return Ok(None),
            state => {
                return Err(BridgeError::Closed {
                    what: "listing",
                    state: state.name(),
                })
            }
        }
        let more = self.bridge.call_async(T::OPS.next, self.handle_arg()).await?;
        if more.as_bool() == Some(true) {
            let item = self.bridge.call_async(T::OPS.item, self.handle_arg()).await?;
            return T::from_value(&item).map(Some).ok_or_else(|| {
                BridgeError::type_error(format!(
                    "{}: unexpected item shape {}",
                    T::OPS.item,
                    item.type_name()
                ))
            });
        }
        match self.bridge.call_async(T::OPS.err, self.handle_arg()).await? {
            Value::Error(error) => {
                self.state = ListingState::Errored;
                Err(error.into())
            }
            _ => {
                self.state = ListingState::Exhausted;
                Ok(None)
            }
        }
    }

    /// The deferred listing error, without advancing.
    ///
    /// # Errors
    /// `Closed` after `free`.
    pub async fn error(&self) -> Result<Option<StorageError>, BridgeError> {
        if self.state == ListingState::Freed {
            return Err(BridgeError::Closed {
                what: "listing",
                state: self.state.name(),
            });
        }
        let error = self.bridge.call_async(T::OPS.err, self.handle_arg()).await?;
        Ok(error.as_error().cloned())
    }

    /// Release the cursor. Freeing twice is a no-op.
    ///
    /// # Errors
    /// Only if the bridge refuses the call.
    pub async fn free(&mut self) -> Result<(), BridgeError> {
        if self.state == ListingState::Freed {
            return Ok(());
        }
        self.bridge.call_async(T::OPS.free, self.handle_arg()).await?;
        self.state = ListingState::Freed;
        Ok(())
    }

    /// Drain the listing and free the cursor.
    ///
    /// # Errors
    /// The listing error, if any; the cursor is freed regardless.
    pub async fn collect_all(mut self) -> Result<Vec<T>, BridgeError> {
        let mut entries = Vec::new();
        let drained = loop {
            match self.next().await {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.free().await?;
        drained.map(|()| entries)
    }
}

impl Listing<Bucket> {
    /// # Errors
    /// See [`Listing::open`].
    pub async fn buckets(
        bridge: &Bridge,
        project: HandleRef,
        options: Option<Map>,
    ) -> Result<Self, BridgeError> {
        Self::open(bridge, vec![project.into(), options.map(Value::Object).into()]).await
    }
}

impl Listing<Object> {
    /// # Errors
    /// See [`Listing::open`].
    pub async fn objects(
        bridge: &Bridge,
        project: HandleRef,
        bucket: &str,
        options: Option<Map>,
    ) -> Result<Self, BridgeError> {
        Self::open(
            bridge,
            vec![project.into(), bucket.into(), options.map(Value::Object).into()],
        )
        .await
    }
}

impl Listing<UploadInfo> {
    /// # Errors
    /// See [`Listing::open`].
    pub async fn uploads(
        bridge: &Bridge,
        project: HandleRef,
        bucket: &str,
        options: Option<Map>,
    ) -> Result<Self, BridgeError> {
        Self::open(
            bridge,
            vec![project.into(), bucket.into(), options.map(Value::Object).into()],
        )
        .await
    }
}

impl<T: ListEntry> Drop for Listing<T> {
    fn drop(&mut self) {
        if self.state != ListingState::Freed {
            warn!(iterator = %self.iterator, kind = T::OPS.create, "listing dropped without free");
        }
    }
}
