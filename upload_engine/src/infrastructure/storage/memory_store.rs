//! In-memory `DurableProgressStore`. Demonstrates the graceful-degradation
//! path a host falls back to when no durable backend is configured or the
//! SQLite store fails to initialize: resume-across-restart is unavailable,
//! but the task otherwise behaves identically.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use upload_engine_domain::error::UploadError;
use upload_engine_domain::services::{DurableProgressStore, DurableRecord, RecordPatch};

#[derive(Default)]
pub struct InMemoryProgressStore {
    records: Mutex<HashMap<String, DurableRecord>>,
}

impl InMemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DurableProgressStore for InMemoryProgressStore {
    async fn init(&self) -> Result<(), UploadError> {
        Ok(())
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn save_record(&self, record: DurableRecord) -> Result<(), UploadError> {
        self.records.lock().insert(record.task_id.clone(), record);
        Ok(())
    }

    async fn get_record(&self, task_id: &str) -> Result<Option<DurableRecord>, UploadError> {
        Ok(self.records.lock().get(task_id).cloned())
    }

    async fn update_record(&self, task_id: &str, patch: RecordPatch) -> Result<(), UploadError> {
        let mut records = self.records.lock();
        let record = records
            .get_mut(task_id)
            .ok_or_else(|| UploadError::storage(format!("no record for task {task_id}")))?;
        if let Some(uploaded_chunks) = patch.uploaded_chunks {
            record.uploaded_chunks = uploaded_chunks;
        }
        if let Some(upload_token) = patch.upload_token {
            record.upload_token = upload_token;
        }
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_record(&self, task_id: &str) -> Result<(), UploadError> {
        self.records.lock().remove(task_id);
        Ok(())
    }

    async fn get_all_records(&self) -> Result<Vec<DurableRecord>, UploadError> {
        Ok(self.records.lock().values().cloned().collect())
    }
}
