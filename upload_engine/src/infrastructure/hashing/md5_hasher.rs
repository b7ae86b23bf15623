//! MD5-backed `ChunkHasher`. MD5 is the reference hash primitive here —
//! content-addressing for deduplication, not a security boundary, so its
//! cryptographic weaknesses are irrelevant.
//!
//! `HashStrategy::OffThread` cannot relocate work onto a true OS thread
//! through a borrowed `&dyn FileDescriptor` (no `'static` bound to hand to
//! a spawned task), so it degrades to `Cooperative` — yielding between
//! reads so the executor can interleave other work on the same thread.
//! `HashStrategy::Blocking` skips the yields for a tight diagnostic run.

use async_trait::async_trait;
use md5::{Digest, Md5};

use upload_engine_domain::error::UploadError;
use upload_engine_domain::services::{ChunkHasher, HashStrategy, ProgressCallback};
use upload_engine_domain::value_objects::FileDescriptor;

/// Bytes read per incremental hashing step.
const STREAM_WINDOW: u64 = 1024 * 1024;

#[derive(Debug, Default, Clone, Copy)]
pub struct Md5ChunkHasher;

impl Md5ChunkHasher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChunkHasher for Md5ChunkHasher {
    async fn compute_file_hash(
        &self,
        file: &dyn FileDescriptor,
        strategy: HashStrategy,
        on_progress: Option<ProgressCallback>,
    ) -> Result<String, UploadError> {
        let total = file.info().size;
        let mut hasher = Md5::new();
        let mut offset = 0u64;

        while offset < total {
            let end = (offset + STREAM_WINDOW).min(total);
            let bytes = file.slice(offset, end).await?;
            hasher.update(&bytes);
            offset = end;

            if let Some(cb) = &on_progress {
                cb(100.0 * offset as f64 / total as f64);
            }
            if !matches!(strategy, HashStrategy::Blocking) {
                tokio::task::yield_now().await;
            }
        }
        Ok(hex::encode(hasher.finalize()))
    }

    async fn compute_chunk_hash(&self, file: &dyn FileDescriptor, start: u64, end: u64) -> Result<String, UploadError> {
        let bytes = file.slice(start, end).await?;
        let mut hasher = Md5::new();
        hasher.update(&bytes);
        Ok(hex::encode(hasher.finalize()))
    }
}
