//! `UploadToken` — the server-issued handle for one file upload session.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadToken {
    pub token: String,
    pub file_id: String,
    /// Server-negotiated chunk size, in bytes.
    pub chunk_size: u64,
    /// Epoch milliseconds.
    pub expires_at: i64,
}

impl UploadToken {
    pub fn is_expired_at(&self, now_epoch_ms: i64) -> bool {
        now_epoch_ms >= self.expires_at
    }
}
