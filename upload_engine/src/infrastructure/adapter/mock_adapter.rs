//! In-memory `RequestAdapter` reference implementation.
//!
//! Stands in for a real transport (Fetch/XHR-equivalent) against a real
//! upload server. Exists for tests and local demos only — it has no
//! network layer, no auth, and trusts every chunk hash it's handed.
//! Includes test-only fault injection (`fail_chunk_n_times`) for exercising
//! the retry/backoff path deterministically.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use upload_engine_domain::error::UploadError;
use upload_engine_domain::services::{CreateFileResponse, MergeFileResponse, RequestAdapter, UploadChunkResponse, VerifyHashResponse};
use upload_engine_domain::value_objects::UploadToken;

const MIN_CHUNK_SIZE: u64 = 256 * 1024;
const MAX_CHUNK_SIZE: u64 = 10 * 1024 * 1024;
const TOKEN_TTL_MS: i64 = 60 * 60 * 1000;

struct ServerFile {
    chunks: BTreeMap<usize, Vec<u8>>,
}

#[derive(Default)]
pub struct MockRequestAdapter {
    files: Mutex<HashMap<String, ServerFile>>,
    tokens: Mutex<HashMap<String, UploadToken>>,
    /// content hash -> (file_id, file_url), populated once `merge_file`
    /// succeeds; drives the instant-upload path in `verify_hash`.
    completed_by_hash: Mutex<HashMap<String, (String, String)>>,
    /// chunk_index -> remaining forced failures, for retry tests.
    fail_injection: Mutex<HashMap<usize, AtomicU32>>,
}

impl MockRequestAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `times` calls to `upload_chunk` for `chunk_index` fail with
    /// a recoverable transport error before succeeding.
    pub fn fail_chunk_n_times(&self, chunk_index: usize, times: u32) {
        self.fail_injection.lock().insert(chunk_index, AtomicU32::new(times));
    }

    fn now_ms() -> i64 {
        // Deterministic test double: wall-clock time is read once here, not
        // threaded through as an injectable dependency, since the mock's
        // only consumer of `expires_at` is token-expiry logic exercised
        // with explicit timestamps in tests.
        chrono::Utc::now().timestamp_millis()
    }
}

#[async_trait]
impl RequestAdapter for MockRequestAdapter {
    async fn create_file(
        &self,
        _file_name: &str,
        _file_size: u64,
        _file_type: &str,
        preferred_chunk_size: u64,
    ) -> Result<CreateFileResponse, UploadError> {
        let negotiated_chunk_size = preferred_chunk_size.clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE);
        let file_id = Uuid::new_v4().to_string();
        let token = UploadToken {
            token: Uuid::new_v4().to_string(),
            file_id: file_id.clone(),
            chunk_size: negotiated_chunk_size,
            expires_at: Self::now_ms() + TOKEN_TTL_MS,
        };
        self.files.lock().insert(file_id, ServerFile { chunks: BTreeMap::new() });
        self.tokens.lock().insert(token.token.clone(), token.clone());
        Ok(CreateFileResponse { upload_token: token, negotiated_chunk_size })
    }

    async fn verify_hash(
        &self,
        file_hash: &str,
        upload_token: &UploadToken,
        _chunk_hashes: Option<&[String]>,
    ) -> Result<VerifyHashResponse, UploadError> {
        if let Some((_, file_url)) = self.completed_by_hash.lock().get(file_hash) {
            return Ok(VerifyHashResponse { file_exists: true, file_url: Some(file_url.clone()), existing_chunks: vec![], missing_chunks: vec![] });
        }
        let existing_chunks = self
            .files
            .lock()
            .get(&upload_token.file_id)
            .map(|f| f.chunks.keys().copied().collect())
            .unwrap_or_default();
        Ok(VerifyHashResponse { file_exists: false, file_url: None, existing_chunks, missing_chunks: vec![] })
    }

    async fn upload_chunk(
        &self,
        upload_token: &UploadToken,
        chunk_index: usize,
        chunk_hash: &str,
        chunk_bytes: &[u8],
    ) -> Result<UploadChunkResponse, UploadError> {
        if upload_token.is_expired_at(Self::now_ms()) {
            return Err(UploadError::token("upload token expired"));
        }
        if let Some(remaining) = self.fail_injection.lock().get(&chunk_index) {
            if remaining.load(Ordering::SeqCst) > 0 {
                remaining.fetch_sub(1, Ordering::SeqCst);
                return Err(UploadError::transport(format!("injected failure for chunk {chunk_index}")));
            }
        }
        let mut files = self.files.lock();
        let file = files
            .get_mut(&upload_token.file_id)
            .ok_or_else(|| UploadError::token("unknown upload token"))?;
        file.chunks.insert(chunk_index, chunk_bytes.to_vec());
        Ok(UploadChunkResponse { success: true, chunk_hash: chunk_hash.to_string() })
    }

    async fn merge_file(&self, upload_token: &UploadToken, file_hash: &str, _chunk_hashes: &[String]) -> Result<MergeFileResponse, UploadError> {
        let files = self.files.lock();
        let file = files
            .get(&upload_token.file_id)
            .ok_or_else(|| UploadError::token("unknown upload token"))?;
        if file.chunks.is_empty() {
            return Err(UploadError::validation("cannot merge a file with no uploaded chunks"));
        }
        let file_url = format!("mock://files/{}", upload_token.file_id);
        self.completed_by_hash.lock().insert(file_hash.to_string(), (upload_token.file_id.clone(), file_url.clone()));
        Ok(MergeFileResponse { success: true, file_url, file_id: upload_token.file_id.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handshake_negotiates_chunk_size_within_bounds() {
        let adapter = MockRequestAdapter::new();
        let resp = adapter.create_file("a.bin", 1_000, "application/octet-stream", 64).await.unwrap();
        assert!(resp.negotiated_chunk_size >= MIN_CHUNK_SIZE);
    }

    #[tokio::test]
    async fn merge_requires_at_least_one_chunk() {
        let adapter = MockRequestAdapter::new();
        let resp = adapter.create_file("a.bin", 1_000, "application/octet-stream", 1_000_000).await.unwrap();
        let result = adapter.merge_file(&resp.upload_token, "deadbeef", &[]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn second_upload_of_identical_content_is_flagged_as_existing() {
        let adapter = MockRequestAdapter::new();
        let resp = adapter.create_file("a.bin", 4, "application/octet-stream", 1_000_000).await.unwrap();
        adapter.upload_chunk(&resp.upload_token, 0, "h0", b"data").await.unwrap();
        adapter.merge_file(&resp.upload_token, "filehash", &["h0".into()]).await.unwrap();

        let resp2 = adapter.create_file("a.bin", 4, "application/octet-stream", 1_000_000).await.unwrap();
        let verify = adapter.verify_hash("filehash", &resp2.upload_token, None).await.unwrap();
        assert!(verify.file_exists);
    }

    #[tokio::test]
    async fn fault_injection_fails_then_succeeds() {
        let adapter = MockRequestAdapter::new();
        adapter.fail_chunk_n_times(0, 2);
        let resp = adapter.create_file("a.bin", 4, "application/octet-stream", 1_000_000).await.unwrap();
        assert!(adapter.upload_chunk(&resp.upload_token, 0, "h", b"data").await.is_err());
        assert!(adapter.upload_chunk(&resp.upload_token, 0, "h", b"data").await.is_err());
        assert!(adapter.upload_chunk(&resp.upload_token, 0, "h", b"data").await.is_ok());
    }
}
