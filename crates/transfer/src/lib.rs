//! Chunk sources for the upload engine.
//!
//! A chunk source hands out arbitrary byte ranges of the file being
//! uploaded. The engine never reads more than one range at a time and
//! abandons an in-flight read by dropping its future.

mod chunked;
mod memory;

use std::future::Future;

use bytes::Bytes;

pub use chunked::FileChunkSource;
pub use memory::MemoryChunkSource;

/// Errors produced by chunk sources.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("range {offset}+{len} exceeds source size {size}")]
    OutOfBounds { offset: u64, len: u64, size: u64 },
}

/// A contiguous byte range `[offset, offset + len)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: u64,
    pub len: u64,
}

impl ByteRange {
    pub fn new(offset: u64, len: u64) -> Self {
        Self { offset, len }
    }

    /// Exclusive end offset.
    pub fn end(&self) -> u64 {
        self.offset + self.len
    }

    /// Fails unless the range lies entirely within `size` bytes.
    pub fn check_within(&self, size: u64) -> Result<(), TransferError> {
        match self.offset.checked_add(self.len) {
            Some(end) if end <= size => Ok(()),
            _ => Err(TransferError::OutOfBounds {
                offset: self.offset,
                len: self.len,
                size,
            }),
        }
    }
}

/// Produces byte ranges of the file being uploaded.
pub trait ChunkSource: Send + Sync + 'static {
    /// Total size of the source in bytes, fixed for its lifetime.
    fn size(&self) -> u64;

    /// Reads exactly `range.len` bytes starting at `range.offset`.
    ///
    /// Dropping the returned future abandons the read.
    fn read_range(&self, range: ByteRange) -> impl Future<Output = Result<Bytes, TransferError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_range_bounds() {
        let r = ByteRange::new(8, 2);
        assert_eq!(r.end(), 10);
        assert!(r.check_within(10).is_ok());
        assert!(r.check_within(9).is_err());
        assert!(ByteRange::new(u64::MAX, 2).check_within(u64::MAX).is_err());
    }

    #[test]
    fn transfer_error_display() {
        let err = TransferError::OutOfBounds {
            offset: 8,
            len: 4,
            size: 10,
        };
        assert_eq!(err.to_string(), "range 8+4 exceeds source size 10");
    }
}
