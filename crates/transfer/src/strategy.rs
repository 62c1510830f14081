use crate::types::ChunkPlan;

pub const MIB: u64 = 1024 * 1024;
pub const GIB: u64 = 1024 * MIB;

/// Largest file sent in a single PUT.
pub const SINGLE_SHOT_MAX: u64 = 50 * MIB;

/// Upper bound on concurrent chunk workers for any one file.
pub const MAX_CHUNK_CONCURRENCY: usize = 5;

/// Size tiers for chunked transfers: (inclusive upper bound, chunk size, workers).
/// Files above the last bound use [`LARGEST_TIER`].
const TIERS: [(u64, u64, usize); 3] = [
    (100 * MIB, 5 * MIB, 2),
    (GIB, 10 * MIB, 3),
    (5 * GIB, 20 * MIB, 4),
];

const LARGEST_TIER: (u64, usize) = (50 * MIB, MAX_CHUNK_CONCURRENCY);

/// How a file's bytes reach the object store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// One PUT of the whole file.
    SingleShot,
    /// Parallel PUTs of fixed-size parts, merged server-side.
    Chunked {
        chunk_size: u64,
        /// Worker ceiling; the pool never exceeds the chunk count either.
        concurrency: usize,
        total_chunks: u32,
    },
}

impl Strategy {
    pub fn is_chunked(&self) -> bool {
        matches!(self, Strategy::Chunked { .. })
    }
}

/// Picks the transfer strategy for a file of `size` bytes.
///
/// Tier bounds are inclusive: exactly 50 MiB is single-shot, exactly
/// 100 MiB uses 5 MiB parts. A plan that would produce a single part falls
/// back to single-shot.
pub fn select_strategy(size: u64) -> Strategy {
    if size <= SINGLE_SHOT_MAX {
        return Strategy::SingleShot;
    }

    let (chunk_size, concurrency) = TIERS
        .iter()
        .find(|(bound, _, _)| size <= *bound)
        .map(|&(_, chunk, workers)| (chunk, workers))
        .unwrap_or(LARGEST_TIER);

    let total_chunks = ChunkPlan::chunk_count(size, chunk_size);
    if total_chunks <= 1 {
        return Strategy::SingleShot;
    }

    Strategy::Chunked {
        chunk_size,
        concurrency: concurrency.min(MAX_CHUNK_CONCURRENCY),
        total_chunks,
    }
}
