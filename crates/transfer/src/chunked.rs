use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;
use tracing::trace;

use crate::{ByteRange, ChunkSource, TransferError};

/// Serves byte ranges of a file on disk.
///
/// The size is captured when the file is opened; if the file shrinks
/// afterwards, reads past the new end fail with `UnexpectedEof`.
pub struct FileChunkSource {
    file: Mutex<File>,
    path: PathBuf,
    size: u64,
}

impl FileChunkSource {
    /// Opens `path` for ranged reading.
    pub async fn open(path: &Path) -> Result<Self, TransferError> {
        let file = File::open(path).await?;
        let size = file.metadata().await?.len();
        Ok(Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
            size,
        })
    }
}

impl ChunkSource for FileChunkSource {
    fn size(&self) -> u64 {
        self.size
    }

    async fn read_range(&self, range: ByteRange) -> Result<Bytes, TransferError> {
        range.check_within(self.size)?;
        let len = usize::try_from(range.len).map_err(|_| TransferError::OutOfBounds {
            offset: range.offset,
            len: range.len,
            size: self.size,
        })?;

        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(range.offset)).await?;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf).await?;

        trace!(path = %self.path.display(), offset = range.offset, len, "read chunk");
        Ok(Bytes::from(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(data).unwrap();
        path
    }

    #[tokio::test]
    async fn reads_ranges_in_any_order() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "test.bin", b"AABBCCDDEE");

        let source = FileChunkSource::open(&path).await.unwrap();
        assert_eq!(source.size(), 10);

        let c2 = source.read_range(ByteRange::new(4, 4)).await.unwrap();
        assert_eq!(&c2[..], b"CCDD");
        let c1 = source.read_range(ByteRange::new(0, 4)).await.unwrap();
        assert_eq!(&c1[..], b"AABB");
        let c3 = source.read_range(ByteRange::new(8, 2)).await.unwrap();
        assert_eq!(&c3[..], b"EE");
    }

    #[tokio::test]
    async fn range_past_end_rejected() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "test.bin", b"0123456789");

        let source = FileChunkSource::open(&path).await.unwrap();
        let result = source.read_range(ByteRange::new(8, 4)).await;
        assert!(matches!(
            result,
            Err(TransferError::OutOfBounds {
                offset: 8,
                len: 4,
                size: 10
            })
        ));
    }

    #[tokio::test]
    async fn truncated_file_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "test.bin", b"0123456789");

        let source = FileChunkSource::open(&path).await.unwrap();
        std::fs::OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(4)
            .unwrap();

        let result = source.read_range(ByteRange::new(2, 6)).await;
        assert!(matches!(result, Err(TransferError::Io(_))));
    }

    #[tokio::test]
    async fn missing_file_fails_to_open() {
        let dir = TempDir::new().unwrap();
        let result = FileChunkSource::open(&dir.path().join("nope.bin")).await;
        assert!(matches!(result, Err(TransferError::Io(_))));
    }

    #[tokio::test]
    async fn empty_range_reads_nothing() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "test.bin", b"xyz");
        let source = FileChunkSource::open(&path).await.unwrap();
        let data = source.read_range(ByteRange::new(3, 0)).await.unwrap();
        assert!(data.is_empty());
    }
}
