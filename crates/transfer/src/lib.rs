//! Transfer building blocks for hashdrop uploads.
//!
//! Everything in this crate is free of network I/O: admissibility checks,
//! content digests, strategy selection, chunk planning and the mapping of
//! phase progress onto a 0–100 scale. The upload engine composes these.

mod hasher;
mod progress;
mod strategy;
mod types;
mod validation;

pub use hasher::{
    ChunkReader, HashProgress, calculate_file_checksum, checksum_bytes, hash_file, hash_range,
    read_chunk,
};
pub use progress::{PhaseLayout, ProgressAggregator, ProgressPoint};
pub use strategy::{GIB, MAX_CHUNK_CONCURRENCY, MIB, SINGLE_SHOT_MAX, Strategy, select_strategy};
pub use types::{
    ByteRange, ChunkPlan, ChunkResult, ChunkResults, ChunkSpec, ContentDigest, Phase,
    UploadSession,
};
pub use validation::{
    ALLOWED_CONTENT_TYPES, DANGEROUS_EXTENSIONS, DEFAULT_MAX_FILE_SIZE, FileCandidate,
    MAX_NAME_LENGTH, ValidationError, detect_content_type, validate_file,
};

/// Files at or below this size report hashing progress as a single jump to 100.
pub const DEFAULT_HASH_PROGRESS_THRESHOLD: u64 = 2 * MIB;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("hashing failed: {0}")]
    HashingFailed(String),

    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    #[error("invalid chunk plan: {0}")]
    InvalidPlan(String),

    #[error("duplicate result for part {0}")]
    DuplicatePart(u32),

    #[error("missing result for part {0}")]
    MissingPart(u32),
}
