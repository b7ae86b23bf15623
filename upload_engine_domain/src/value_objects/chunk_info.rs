//! Chunk slicing: `ChunkInfo` and the pure function that derives a dense,
//! contiguous chunk list from a file size and a chunk size.

use serde::{Deserialize, Serialize};

/// A contiguous byte range of the source file, plus its content hash once
/// computed.
///
/// Invariants (enforced by [`chunks_for_file`], the only constructor):
/// chunks are contiguous and non-overlapping, cover exactly `[0, file_size)`,
/// and `index` is dense starting at 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkInfo {
    pub index: usize,
    pub start: u64,
    pub end: u64,
    /// Empty until the chunk's content hash has been computed.
    pub hash: String,
}

impl ChunkInfo {
    pub fn size(&self) -> u64 {
        self.end - self.start
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = hash.into();
        self
    }
}

/// Builds the dense, contiguous chunk list for a file of `file_size` bytes
/// sliced into chunks of at most `chunk_size` bytes.
///
/// An empty file yields zero chunks. `chunk_size` of 0 is treated as 1 to
/// avoid division by zero; callers are expected to validate chunk size
/// against the adjuster's bounds before calling this.
pub fn chunks_for_file(file_size: u64, chunk_size: u64) -> Vec<ChunkInfo> {
    if file_size == 0 {
        return Vec::new();
    }
    let chunk_size = chunk_size.max(1);
    let count = file_size.div_ceil(chunk_size);
    let mut chunks = Vec::with_capacity(count as usize);
    let mut start = 0u64;
    let mut index = 0usize;
    while start < file_size {
        let end = (start + chunk_size).min(file_size);
        chunks.push(ChunkInfo {
            index,
            start,
            end,
            hash: String::new(),
        });
        start = end;
        index += 1;
    }
    chunks
}
