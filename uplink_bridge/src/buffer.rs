//! Host-owned byte buffer
//!
//! The host's binary buffer type: fixed length, shared by clone, guarded by
//! a `parking_lot::Mutex`. The storage is a boxed slice, so it is never
//! reallocated and a worker thread can write into it in place.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};

pub(crate) struct BufferInner {
    data: Mutex<Box<[u8]>>,
    /// Fixed at construction; readable while a worker holds `data`.
    len: usize,
    /// Outstanding pins. Bookkeeping only; retention comes from the `Arc`.
    pub(crate) pins: AtomicUsize,
}

/// Guard to buffer contents. The lock is released when dropped.
pub struct BufferGuard<'a>(MutexGuard<'a, Box<[u8]>>);

impl Deref for BufferGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl DerefMut for BufferGuard<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

/// Shared fixed-size buffer
///
/// # Example
///
/// ```
/// use uplink_bridge::HostBuffer;
///
/// let buffer = HostBuffer::from(b"hello".as_slice());
/// assert_eq!(buffer.len(), 5);
/// assert_eq!(&*buffer.lock(), b"hello");
/// ```
#[derive(Clone)]
pub struct HostBuffer(pub(crate) Arc<BufferInner>);

impl HostBuffer {
    /// Zero-filled buffer of `len` bytes.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self::from(vec![0u8; len])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lock the buffer for direct access.
    ///
    /// Blocks while a worker thread writes into the buffer.
    pub fn lock(&self) -> BufferGuard<'_> {
        BufferGuard(self.0.data.lock())
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.lock().to_vec()
    }

    /// Number of in-flight operations holding this buffer.
    #[must_use]
    pub fn pin_count(&self) -> usize {
        self.0.pins.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakHostBuffer {
        WeakHostBuffer(Arc::downgrade(&self.0))
    }

    #[must_use]
    pub fn same_as(&self, other: &HostBuffer) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<Vec<u8>> for HostBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self(Arc::new(BufferInner {
            len: data.len(),
            data: Mutex::new(data.into_boxed_slice()),
            pins: AtomicUsize::new(0),
        }))
    }
}

impl From<&[u8]> for HostBuffer {
    fn from(data: &[u8]) -> Self {
        Self::from(data.to_vec())
    }
}

impl PartialEq for HostBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl fmt::Debug for HostBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostBuffer")
            .field("len", &self.len())
            .field("pins", &self.pin_count())
            .finish()
    }
}

/// Non-owning view, for observing whether a buffer is still retained.
#[derive(Clone)]
pub struct WeakHostBuffer(Weak<BufferInner>);

impl WeakHostBuffer {
    #[must_use]
    pub fn upgrade(&self) -> Option<HostBuffer> {
        self.0.upgrade().map(HostBuffer)
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}
