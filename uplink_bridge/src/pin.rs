//! Buffer pinning
//!
//! A `PinnedBuffer` is the retention token an in-flight task holds on a
//! caller's buffer. It keeps the buffer alive even if the caller drops every
//! reference, and limits the worker to a bounded prefix of it. The token is
//! released when dropped; the scheduler drops task inputs on the control
//! thread as part of completion, on every path.

use std::fmt;
use std::sync::atomic::Ordering;

use tracing::trace;

use crate::buffer::HostBuffer;
use crate::error::BridgeError;
use crate::value::Value;

pub struct PinnedBuffer {
    buffer: HostBuffer,
    len: usize,
}

impl PinnedBuffer {
    /// Pin the first `len` bytes of `buffer`.
    ///
    /// # Errors
    /// `Range` if `len` exceeds the buffer.
    pub fn new(buffer: &HostBuffer, len: usize) -> Result<Self, BridgeError> {
        if len > buffer.len() {
            return Err(BridgeError::range_error(format!(
                "Length exceeds buffer size ({len} > {})",
                buffer.len()
            )));
        }
        let pins = buffer.0.pins.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(len, pins, "pin buffer");
        Ok(Self {
            buffer: buffer.clone(),
            len,
        })
    }

    /// Pin a host value, which must be a buffer.
    ///
    /// # Errors
    /// `Type` for non-buffer values, `Range` for an oversized `len`.
    pub fn from_value(value: &Value, len: usize) -> Result<Self, BridgeError> {
        match value {
            Value::Buffer(buffer) => Self::new(buffer, len),
            other => Err(BridgeError::type_error(format!(
                "expected a buffer, got {}",
                other.type_name()
            ))),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read access to the pinned region.
    pub fn with_slice<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let guard = self.buffer.lock();
        f(&guard[..self.len])
    }

    /// Write access to the pinned region, in place.
    pub fn with_slice_mut<R>(&mut self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut guard = self.buffer.lock();
        f(&mut guard[..self.len])
    }
}

impl Drop for PinnedBuffer {
    fn drop(&mut self) {
        let before = self.buffer.0.pins.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(before > 0, "pinned buffer released twice");
        trace!(len = self.len, pins = before - 1, "unpin buffer");
    }
}

impl fmt::Debug for PinnedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinnedBuffer")
            .field("len", &self.len)
            .field("buffer_len", &self.buffer.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_counts_are_balanced() {
        let buffer = HostBuffer::new(8);
        let first = PinnedBuffer::new(&buffer, 8).unwrap();
        let second = PinnedBuffer::new(&buffer, 2).unwrap();
        assert_eq!(buffer.pin_count(), 2);
        drop(first);
        assert_eq!(buffer.pin_count(), 1);
        drop(second);
        assert_eq!(buffer.pin_count(), 0);
    }

    #[test]
    fn pin_outlives_caller_reference() {
        let buffer = HostBuffer::new(3);
        let weak = buffer.downgrade();
        let mut pinned = PinnedBuffer::new(&buffer, 3).unwrap();
        drop(buffer);
        assert!(weak.is_alive());
        pinned.with_slice_mut(|slice| slice.copy_from_slice(b"xyz"));
        assert_eq!(weak.upgrade().unwrap().to_vec(), b"xyz");
        drop(pinned);
        assert!(!weak.is_alive());
    }

    #[test]
    fn bounded_view() {
        let buffer = HostBuffer::from(b"abcdef".as_slice());
        let pinned = PinnedBuffer::new(&buffer, 4).unwrap();
        assert_eq!(pinned.with_slice(<[u8]>::to_vec), b"abcd");
    }

    #[test]
    fn oversized_and_non_buffer_are_rejected() {
        let buffer = HostBuffer::new(2);
        assert!(matches!(
            PinnedBuffer::new(&buffer, 3),
            Err(BridgeError::Range(_))
        ));
        assert!(matches!(
            PinnedBuffer::from_value(&Value::from("text"), 1),
            Err(BridgeError::Type(_))
        ));
        assert_eq!(buffer.pin_count(), 0);
    }
}
