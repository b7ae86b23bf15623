//! # File Slicer & Hasher — hashing port
//!
//! Slicing lives on [`crate::value_objects::FileDescriptor`]; this module
//! is the non-blocking hashing contract. What matters is the "runs on a
//! separate execution thread" contract, not any specific worker API —
//! the split mirrors a synchronous, CPU-bound checksum algorithm wrapped
//! by an async infrastructure adapter that handles the off-thread
//! scheduling.

use async_trait::async_trait;

use crate::error::UploadError;
use crate::value_objects::FileDescriptor;

/// How hash computation is scheduled relative to the host's main
/// execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashStrategy {
    /// Runs on a separate worker of execution (default). Falls back to
    /// `Cooperative` transparently if unavailable.
    OffThread,
    /// Runs on the host thread but yields periodically.
    Cooperative,
    /// Diagnostic only; not used by the engine itself.
    Blocking,
}

pub type ProgressCallback = Box<dyn Fn(f64) + Send + Sync>;

#[async_trait]
pub trait ChunkHasher: Send + Sync {
    /// Computes a whole-file content hash incrementally (no full-file
    /// memory image), reporting progress via `on_progress`.
    async fn compute_file_hash(
        &self,
        file: &dyn FileDescriptor,
        strategy: HashStrategy,
        on_progress: Option<ProgressCallback>,
    ) -> Result<String, UploadError>;

    /// Hashes a single chunk's byte range with the same primitive used for
    /// the whole-file hash.
    async fn compute_chunk_hash(&self, file: &dyn FileDescriptor, start: u64, end: u64) -> Result<String, UploadError>;
}
