use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::TransferError;
use crate::types::{ByteRange, ContentDigest};

/// Callback receiving hashing progress in `[0, 100]`, never decreasing.
pub type HashProgress = Arc<dyn Fn(f64) + Send + Sync>;

/// Read size for streaming hashes.
const HASH_BLOCK_SIZE: usize = 2 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Checksum helpers
// ---------------------------------------------------------------------------

/// Computes SHA-256 of `data`.
pub fn checksum_bytes(data: &[u8]) -> ContentDigest {
    let mut hasher = Sha256::new();
    hasher.update(data);
    ContentDigest::from_bytes(&hasher.finalize())
}

/// Streams `path` through SHA-256.
///
/// Files at or below `threshold` bytes report a single 100. Larger files
/// report once per whole percent as blocks are consumed, ending at 100.
pub fn calculate_file_checksum(
    path: &Path,
    threshold: u64,
    on_progress: Option<&(dyn Fn(f64) + Send + Sync)>,
) -> Result<ContentDigest, TransferError> {
    let mut file = std::fs::File::open(path)?;
    let total = file.metadata()?.len();
    let coarse = total > threshold;

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_BLOCK_SIZE];
    let mut processed: u64 = 0;
    let mut last_reported: i64 = -1;

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        processed += n as u64;

        if coarse && let Some(cb) = on_progress {
            let pct = (processed as f64 / total as f64 * 100.0).floor().min(100.0);
            if pct as i64 > last_reported {
                last_reported = pct as i64;
                cb(pct);
            }
        }
    }

    if processed != total {
        return Err(TransferError::HashingFailed(format!(
            "{} changed while hashing: expected {total} bytes, read {processed}",
            path.display()
        )));
    }

    if let Some(cb) = on_progress
        && last_reported < 100
    {
        cb(100.0);
    }

    Ok(ContentDigest::from_bytes(&hasher.finalize()))
}

/// Hashes a file on the blocking pool.
pub async fn hash_file(
    path: PathBuf,
    threshold: u64,
    on_progress: Option<HashProgress>,
) -> Result<ContentDigest, TransferError> {
    tokio::task::spawn_blocking(move || {
        calculate_file_checksum(&path, threshold, on_progress.as_deref())
    })
    .await
    .map_err(|e| TransferError::HashingFailed(format!("task join error: {e}")))?
}

// ---------------------------------------------------------------------------
// ChunkReader
// ---------------------------------------------------------------------------

/// Reads arbitrary byte ranges of one file.
pub struct ChunkReader {
    file: std::fs::File,
    file_size: u64,
}

impl ChunkReader {
    /// Opens `path` for range reads.
    pub fn open(path: &Path) -> Result<Self, TransferError> {
        let file = std::fs::File::open(path)?;
        let file_size = file.metadata()?.len();
        Ok(Self { file, file_size })
    }

    /// Reads exactly the bytes of `range`.
    pub fn read_range(&mut self, range: ByteRange) -> Result<Vec<u8>, TransferError> {
        if range.end > self.file_size || range.start > range.end {
            return Err(TransferError::InvalidPlan(format!(
                "range {}..{} outside file of {} bytes",
                range.start, range.end, self.file_size
            )));
        }
        self.file.seek(SeekFrom::Start(range.start))?;
        let mut buf = vec![0u8; range.len() as usize];
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Total file size in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }
}

/// Reads one range of `path` on the blocking pool.
pub async fn read_chunk(path: PathBuf, range: ByteRange) -> Result<Vec<u8>, TransferError> {
    tokio::task::spawn_blocking(move || ChunkReader::open(&path)?.read_range(range))
        .await
        .map_err(|e| TransferError::HashingFailed(format!("task join error: {e}")))?
}

/// Hashes one range of `path` on the blocking pool.
pub async fn hash_range(path: PathBuf, range: ByteRange) -> Result<ContentDigest, TransferError> {
    tokio::task::spawn_blocking(move || {
        let data = ChunkReader::open(&path)?.read_range(range)?;
        Ok(checksum_bytes(&data))
    })
    .await
    .map_err(|e| TransferError::HashingFailed(format!("task join error: {e}")))?
}
