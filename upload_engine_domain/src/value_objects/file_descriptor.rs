//! `FileDescriptor` — the engine's abstraction over a platform file handle.
//!
//! The browser's `File` object cannot be modeled literally in Rust; this
//! trait captures the equivalent contract instead: readable attributes, a
//! lazy, non-copying byte-range view, and "not persistable across process
//! restart" (no `Serialize` impl is provided on purpose).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::UploadError;

/// Attributes of a file available for upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
    pub file_type: String,
    pub last_modified: i64,
}

/// A lazy, non-owning view over a byte range of a file. Slicing MUST NOT
/// copy the file into memory; only reading a range materializes bytes, and
/// only that range's worth.
#[async_trait]
pub trait FileDescriptor: Send + Sync {
    fn info(&self) -> FileInfo;

    /// Reads exactly `end - start` bytes from the file. Bounds are the
    /// caller's responsibility (chunk lists are always built in-bounds by
    /// [`crate::value_objects::chunk_info::chunks_for_file`]).
    async fn slice(&self, start: u64, end: u64) -> Result<Vec<u8>, UploadError>;
}
