//! File chunking for multipart upload
//!
//! Splits a file into balanced, ordered byte ranges and reads them
//! sequentially from disk.

use crate::{ClientError, Result};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tokio_util::sync::CancellationToken;

/// Half-open byte range `[start, end)`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte
    pub start: u64,
    /// One past the last byte
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Whether the range is empty
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Balanced split of a file into parts
///
/// Instead of fixed-size chunks with a tiny trailing remainder, the chunk
/// size is `ceil(file_size / num_chunks)` so every part is close in size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkPlan {
    /// Size of the file being split
    pub file_size: u64,
    /// Size of every part except possibly the last
    pub chunk_size: u64,
    /// Number of parts
    pub num_chunks: u32,
}

impl ChunkPlan {
    /// Plan parts no larger than `max_chunk_size`
    pub fn new(file_size: u64, max_chunk_size: u64) -> Result<Self> {
        if max_chunk_size == 0 {
            return Err(ClientError::Config(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if file_size == 0 {
            return Ok(Self {
                file_size,
                chunk_size: 0,
                num_chunks: 0,
            });
        }

        let num_chunks = file_size.div_ceil(max_chunk_size);
        let chunk_size = file_size.div_ceil(num_chunks);
        let num_chunks = u32::try_from(num_chunks).map_err(|_| {
            ClientError::Config(format!(
                "{} bytes in parts of {} would need more than {} parts",
                file_size,
                max_chunk_size,
                u32::MAX
            ))
        })?;

        Ok(Self {
            file_size,
            chunk_size,
            num_chunks,
        })
    }

    /// Byte range of a 1-based part number
    pub fn range(&self, part_number: u32) -> Option<ByteRange> {
        if part_number == 0 || part_number > self.num_chunks {
            return None;
        }
        let start = u64::from(part_number - 1) * self.chunk_size;
        let end = (start + self.chunk_size).min(self.file_size);
        Some(ByteRange { start, end })
    }

    /// All parts in ascending order
    pub fn ranges(&self) -> impl Iterator<Item = (u32, ByteRange)> + '_ {
        (1..=self.num_chunks).filter_map(move |n| self.range(n).map(|r| (n, r)))
    }
}

/// One chunk read from disk
#[derive(Clone, Debug)]
pub struct FileChunk {
    /// 1-based part number
    pub part_number: u32,
    /// Bytes of the file this chunk covers
    pub range: ByteRange,
    /// Chunk contents
    pub data: Bytes,
}

/// Sequential reader over a planned file
#[derive(Debug)]
pub struct ChunkReader {
    file: File,
    path: PathBuf,
    plan: ChunkPlan,
    next_part: u32,
}

impl ChunkReader {
    /// Open a file for chunked reading
    pub async fn open(path: impl AsRef<Path>, plan: ChunkPlan) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).await.map_err(|e| {
            ClientError::upload(
                path.display().to_string(),
                format!("cannot open {}: {}", path.display(), e),
            )
        })?;

        Ok(Self {
            file,
            path,
            plan,
            next_part: 1,
        })
    }

    /// The plan this reader follows
    pub fn plan(&self) -> &ChunkPlan {
        &self.plan
    }

    /// Read the next chunk, or `None` once every part has been read
    pub async fn next_chunk(&mut self, cancel: &CancellationToken) -> Result<Option<FileChunk>> {
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        let part_number = self.next_part;
        let Some(range) = self.plan.range(part_number) else {
            return Ok(None);
        };

        self.file
            .seek(SeekFrom::Start(range.start))
            .await
            .map_err(|e| self.read_error(part_number, e))?;

        let mut buffer = vec![0u8; range.len() as usize];
        let mut filled = 0;
        while filled < buffer.len() {
            let read = self
                .file
                .read(&mut buffer[filled..])
                .await
                .map_err(|e| self.read_error(part_number, e))?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        if filled as u64 != range.len() {
            return Err(self.size_changed(part_number));
        }
        if part_number == self.plan.num_chunks {
            let len = self
                .file
                .metadata()
                .await
                .map_err(|e| self.read_error(part_number, e))?
                .len();
            if len != self.plan.file_size {
                return Err(self.size_changed(part_number));
            }
        }

        self.next_part += 1;
        Ok(Some(FileChunk {
            part_number,
            range,
            data: Bytes::from(buffer),
        }))
    }

    fn size_changed(&self, part_number: u32) -> ClientError {
        ClientError::upload(
            self.path.display().to_string(),
            format!(
                "file changed size while reading part {} (planned {} bytes)",
                part_number, self.plan.file_size
            ),
        )
    }

    fn read_error(&self, part_number: u32, err: std::io::Error) -> ClientError {
        ClientError::upload(
            self.path.display().to_string(),
            format!("failed to read part {}: {}", part_number, err),
        )
    }
}
