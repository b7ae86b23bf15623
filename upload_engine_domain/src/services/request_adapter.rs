//! # Request Adapter contract
//!
//! Four wire operations. Concrete transport adapters (Fetch/XHR
//! equivalents) are out of scope; this crate only defines the contract.
//! DTOs are `serde`-derived so a real transport can (de)serialize the
//! logical payloads even though none ships here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::UploadError;
use crate::value_objects::UploadToken;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFileResponse {
    pub upload_token: UploadToken,
    pub negotiated_chunk_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyHashResponse {
    pub file_exists: bool,
    pub file_url: Option<String>,
    pub existing_chunks: Vec<usize>,
    pub missing_chunks: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadChunkResponse {
    pub success: bool,
    pub chunk_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeFileResponse {
    pub success: bool,
    pub file_url: String,
    pub file_id: String,
}

/// The four wire operations. Implementations may retry transport-level
/// errors internally but MUST surface persistent failures as
/// [`UploadError::TransportError`] / [`UploadError::TokenError`].
#[async_trait]
pub trait RequestAdapter: Send + Sync {
    async fn create_file(
        &self,
        file_name: &str,
        file_size: u64,
        file_type: &str,
        preferred_chunk_size: u64,
    ) -> Result<CreateFileResponse, UploadError>;

    async fn verify_hash(
        &self,
        file_hash: &str,
        upload_token: &UploadToken,
        chunk_hashes: Option<&[String]>,
    ) -> Result<VerifyHashResponse, UploadError>;

    /// Carries the chunk's binary body; no base64 expansion.
    async fn upload_chunk(
        &self,
        upload_token: &UploadToken,
        chunk_index: usize,
        chunk_hash: &str,
        chunk_bytes: &[u8],
    ) -> Result<UploadChunkResponse, UploadError>;

    /// Called once per task, only after all chunks are confirmed.
    async fn merge_file(
        &self,
        upload_token: &UploadToken,
        file_hash: &str,
        chunk_hashes: &[String],
    ) -> Result<MergeFileResponse, UploadError>;
}
