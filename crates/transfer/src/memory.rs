use bytes::Bytes;

use crate::{ByteRange, ChunkSource, TransferError};

/// Serves byte ranges of an in-memory buffer.
#[derive(Debug, Clone)]
pub struct MemoryChunkSource {
    data: Bytes,
}

impl MemoryChunkSource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

impl ChunkSource for MemoryChunkSource {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    async fn read_range(&self, range: ByteRange) -> Result<Bytes, TransferError> {
        range.check_within(self.size())?;
        // Both bounds fit in usize: they are within data.len().
        let start = range.offset as usize;
        let end = range.end() as usize;
        Ok(self.data.slice(start..end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn slices_without_copying() {
        let source = MemoryChunkSource::new(b"hello world".to_vec());
        assert_eq!(source.size(), 11);
        let chunk = source.read_range(ByteRange::new(6, 5)).await.unwrap();
        assert_eq!(&chunk[..], b"world");
    }

    #[tokio::test]
    async fn out_of_bounds() {
        let source = MemoryChunkSource::new(Bytes::from_static(b"abc"));
        assert!(source.read_range(ByteRange::new(2, 2)).await.is_err());
    }
}
