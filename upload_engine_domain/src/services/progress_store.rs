//! # Durable Progress Store — port
//!
//! A repository-port pattern: the domain defines the contract,
//! infrastructure supplies SQLite and in-memory implementations.
//! `init()` is idempotent and must tolerate persistence being
//! unavailable — implementations flip `is_available()` to `false` rather
//! than erroring out of every subsequent call.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::UploadError;
use crate::value_objects::FileInfo;

/// One persisted record per task. `uploaded_chunks` is a set: the
/// invariant `uploaded_chunks ⊆ [0, total_chunks)` is the caller's
/// responsibility to maintain (the store does not know `total_chunks`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurableRecord {
    pub task_id: String,
    pub file_info: FileInfo,
    pub uploaded_chunks: BTreeSet<usize>,
    pub upload_token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A partial update applied to an existing record.
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    pub uploaded_chunks: Option<BTreeSet<usize>>,
    pub upload_token: Option<String>,
}

#[async_trait]
pub trait DurableProgressStore: Send + Sync {
    /// Idempotent. Must never panic or leave the store half-initialized;
    /// on failure, `is_available()` must subsequently report `false`.
    async fn init(&self) -> Result<(), UploadError>;

    fn is_available(&self) -> bool;

    async fn save_record(&self, record: DurableRecord) -> Result<(), UploadError>;

    async fn get_record(&self, task_id: &str) -> Result<Option<DurableRecord>, UploadError>;

    async fn update_record(&self, task_id: &str, patch: RecordPatch) -> Result<(), UploadError>;

    async fn delete_record(&self, task_id: &str) -> Result<(), UploadError>;

    async fn get_all_records(&self) -> Result<Vec<DurableRecord>, UploadError>;
}
