use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::TransferError;

/// Hex-encoded SHA-256 of a byte sequence.
///
/// Identical content always yields an identical digest; it is the dedup key
/// on the backend and the integrity key for chunk tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Length of the hex encoding.
    pub const HEX_LEN: usize = 64;

    /// Wraps raw digest bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContentDigest {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != Self::HEX_LEN || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(TransferError::InvalidDigest(s.to_string()));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = TransferError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ContentDigest> for String {
    fn from(d: ContentDigest) -> Self {
        d.0
    }
}

/// Half-open byte range `[start, end)` within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// One planned part of a chunked transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpec {
    /// 1-based part number.
    pub part_number: u32,
    pub range: ByteRange,
    /// Presigned URL this part is PUT to.
    pub url: String,
}

/// Ordered partition of a file into parts.
///
/// Ranges cover `[0, file_size)` contiguously and exactly once; part numbers
/// run densely from 1 to N.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    file_size: u64,
    chunk_size: u64,
    chunks: Vec<ChunkSpec>,
    unused_parts: Vec<u32>,
}

impl ChunkPlan {
    /// Number of parts needed to cover `file_size` (at least 1).
    pub fn chunk_count(file_size: u64, chunk_size: u64) -> u32 {
        if file_size == 0 || chunk_size == 0 {
            return 1;
        }
        file_size.div_ceil(chunk_size) as u32
    }

    /// Splits `[0, file_size)` into contiguous ranges of `chunk_size` bytes;
    /// the last range holds the remainder.
    pub fn ranges(file_size: u64, chunk_size: u64) -> Vec<ByteRange> {
        let count = Self::chunk_count(file_size, chunk_size) as u64;
        (0..count)
            .map(|i| {
                let start = i * chunk_size;
                ByteRange {
                    start: start.min(file_size),
                    end: ((i + 1) * chunk_size).min(file_size),
                }
            })
            .collect()
    }

    /// Builds the plan and pairs each part with its presigned URL.
    ///
    /// `urls` may arrive in any order; every part number from 1 to N must be
    /// present exactly once. URLs for parts beyond N are set aside, since the
    /// backend may size its parts smaller than the plan does.
    pub fn build(
        file_size: u64,
        chunk_size: u64,
        urls: impl IntoIterator<Item = (u32, String)>,
    ) -> Result<Self, TransferError> {
        if chunk_size == 0 {
            return Err(TransferError::InvalidPlan("chunk size is zero".into()));
        }

        let mut by_part = BTreeMap::new();
        for (part, url) in urls {
            if by_part.insert(part, url).is_some() {
                return Err(TransferError::InvalidPlan(format!(
                    "duplicate URL for part {part}"
                )));
            }
        }

        let ranges = Self::ranges(file_size, chunk_size);
        let mut chunks = Vec::with_capacity(ranges.len());
        for (i, range) in ranges.into_iter().enumerate() {
            let part_number = i as u32 + 1;
            let url = by_part.remove(&part_number).ok_or_else(|| {
                TransferError::InvalidPlan(format!("no upload URL for part {part_number}"))
            })?;
            chunks.push(ChunkSpec {
                part_number,
                range,
                url,
            });
        }

        Ok(Self {
            file_size,
            chunk_size,
            chunks,
            unused_parts: by_part.into_keys().collect(),
        })
    }

    pub fn chunks(&self) -> &[ChunkSpec] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Part numbers that were issued a URL but are not part of the plan.
    pub fn unused_parts(&self) -> &[u32] {
        &self.unused_parts
    }
}

/// Completion record of one uploaded part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkResult {
    pub part_number: u32,
    /// Completion token (ETag) returned by the object store, or a locally
    /// computed substitute.
    pub etag: String,
    /// Retries spent before the part succeeded.
    pub retries: u32,
}

/// Results keyed by part number.
///
/// Parts complete in any order; [`ChunkResults::into_sorted`] yields them
/// ascending and verifies there is exactly one per planned part.
#[derive(Debug, Default)]
pub struct ChunkResults {
    by_part: BTreeMap<u32, ChunkResult>,
}

impl ChunkResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a result. A second result for the same part is rejected.
    pub fn insert(&mut self, result: ChunkResult) -> Result<(), TransferError> {
        let part = result.part_number;
        if self.by_part.contains_key(&part) {
            return Err(TransferError::DuplicatePart(part));
        }
        self.by_part.insert(part, result);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.by_part.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_part.is_empty()
    }

    /// Returns the results ordered by part number, checking for gaps
    /// against the expected part count.
    pub fn into_sorted(self, expected: u32) -> Result<Vec<ChunkResult>, TransferError> {
        for part in 1..=expected {
            if !self.by_part.contains_key(&part) {
                return Err(TransferError::MissingPart(part));
            }
        }
        if let Some(&extra) = self.by_part.keys().find(|p| **p == 0 || **p > expected) {
            return Err(TransferError::InvalidPlan(format!(
                "result for unplanned part {extra}"
            )));
        }
        Ok(self.by_part.into_values().collect())
    }
}

/// Client-side mirror of a backend chunk-upload session.
///
/// The backend owns the session; this copy lives only as long as the
/// coordinator driving it.
#[derive(Debug, Clone)]
pub struct UploadSession {
    pub upload_id: String,
    pub plan: ChunkPlan,
    /// Lifetime of the presigned URLs in seconds, when the backend reports it.
    pub expires_in: Option<i64>,
}

/// Lifecycle phase of an upload task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Pending,
    Hashing,
    Prechecking,
    Initializing,
    Uploading,
    Finalizing,
    Confirming,
    Completed,
    Aborted,
    Failed,
}

impl Phase {
    /// Returns `true` for `Completed`, `Aborted` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Aborted | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Pending => "pending",
            Phase::Hashing => "hashing",
            Phase::Prechecking => "prechecking",
            Phase::Initializing => "initializing",
            Phase::Uploading => "uploading",
            Phase::Finalizing => "finalizing",
            Phase::Confirming => "confirming",
            Phase::Completed => "completed",
            Phase::Aborted => "aborted",
            Phase::Failed => "failed",
        };
        f.write_str(s)
    }
}
