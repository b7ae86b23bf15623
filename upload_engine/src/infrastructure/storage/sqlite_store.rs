//! SQLite-backed `DurableProgressStore`, following the same
//! create-if-missing-then-migrate shape as a typical `sqlx` repository
//! setup: a connect step that creates the database file on first run, and
//! an idempotent `init()` that applies pending migrations. `file_info` and
//! `uploaded_chunks` are stored as JSON text columns — a plain relational
//! schema isn't worth it for a handful of per-task fields that are never
//! queried by their contents.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use upload_engine_domain::error::UploadError;
use upload_engine_domain::services::{DurableProgressStore, DurableRecord, RecordPatch};
use upload_engine_domain::value_objects::FileInfo;

pub struct SqliteProgressStore {
    pool: SqlitePool,
    available: Arc<AtomicBool>,
}

impl SqliteProgressStore {
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self, UploadError> {
        let options = SqliteConnectOptions::new().filename(path).create_if_missing(true);
        // A single connection avoids each pooled connection opening its own
        // private `:memory:` database and keeps writes serialized, which
        // SQLite requires anyway.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| UploadError::storage(e.to_string()))?;
        Ok(Self { pool, available: Arc::new(AtomicBool::new(true)) })
    }

    fn row_to_record(
        task_id: String,
        file_info: String,
        uploaded_chunks: String,
        upload_token: String,
        created_at: String,
        updated_at: String,
    ) -> Result<DurableRecord, UploadError> {
        let parse_ts = |s: &str| {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| UploadError::storage(e.to_string()))
        };
        let file_info: FileInfo = serde_json::from_str(&file_info)?;
        let uploaded_chunks = serde_json::from_str(&uploaded_chunks)?;
        Ok(DurableRecord {
            task_id,
            file_info,
            uploaded_chunks,
            upload_token,
            created_at: parse_ts(&created_at)?,
            updated_at: parse_ts(&updated_at)?,
        })
    }
}

#[async_trait]
impl DurableProgressStore for SqliteProgressStore {
    async fn init(&self) -> Result<(), UploadError> {
        match sqlx::migrate!("./migrations").run(&self.pool).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.available.store(false, Ordering::SeqCst);
                tracing::warn!(error = %e, "sqlite migration failed; durable persistence disabled for this session");
                Err(UploadError::storage(e.to_string()))
            }
        }
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn save_record(&self, record: DurableRecord) -> Result<(), UploadError> {
        let file_info = serde_json::to_string(&record.file_info)?;
        let uploaded_chunks = serde_json::to_string(&record.uploaded_chunks)?;
        sqlx::query(
            "INSERT INTO upload_records (task_id, file_info, uploaded_chunks, upload_token, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(task_id) DO UPDATE SET
                file_info = excluded.file_info,
                uploaded_chunks = excluded.uploaded_chunks,
                upload_token = excluded.upload_token,
                updated_at = excluded.updated_at",
        )
        .bind(&record.task_id)
        .bind(&file_info)
        .bind(&uploaded_chunks)
        .bind(&record.upload_token)
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| UploadError::storage(e.to_string()))?;
        Ok(())
    }

    async fn get_record(&self, task_id: &str) -> Result<Option<DurableRecord>, UploadError> {
        let row = sqlx::query_as::<_, (String, String, String, String, String, String)>(
            "SELECT task_id, file_info, uploaded_chunks, upload_token, created_at, updated_at
             FROM upload_records WHERE task_id = ?1",
        )
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| UploadError::storage(e.to_string()))?;

        row.map(|(task_id, file_info, uploaded_chunks, upload_token, created_at, updated_at)| {
            Self::row_to_record(task_id, file_info, uploaded_chunks, upload_token, created_at, updated_at)
        })
        .transpose()
    }

    async fn update_record(&self, task_id: &str, patch: RecordPatch) -> Result<(), UploadError> {
        let existing = self
            .get_record(task_id)
            .await?
            .ok_or_else(|| UploadError::storage(format!("no record for task {task_id}")))?;
        let uploaded_chunks = patch.uploaded_chunks.unwrap_or(existing.uploaded_chunks);
        let upload_token = patch.upload_token.unwrap_or(existing.upload_token);
        let uploaded_chunks_json = serde_json::to_string(&uploaded_chunks)?;

        sqlx::query("UPDATE upload_records SET uploaded_chunks = ?1, upload_token = ?2, updated_at = ?3 WHERE task_id = ?4")
            .bind(uploaded_chunks_json)
            .bind(upload_token)
            .bind(Utc::now().to_rfc3339())
            .bind(task_id)
            .execute(&self.pool)
            .await
            .map_err(|e| UploadError::storage(e.to_string()))?;
        Ok(())
    }

    async fn delete_record(&self, task_id: &str) -> Result<(), UploadError> {
        sqlx::query("DELETE FROM upload_records WHERE task_id = ?1")
            .bind(task_id)
            .execute(&self.pool)
            .await
            .map_err(|e| UploadError::storage(e.to_string()))?;
        Ok(())
    }

    async fn get_all_records(&self) -> Result<Vec<DurableRecord>, UploadError> {
        let rows = sqlx::query_as::<_, (String, String, String, String, String, String)>(
            "SELECT task_id, file_info, uploaded_chunks, upload_token, created_at, updated_at FROM upload_records",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| UploadError::storage(e.to_string()))?;

        rows.into_iter()
            .map(|(task_id, file_info, uploaded_chunks, upload_token, created_at, updated_at)| {
                Self::row_to_record(task_id, file_info, uploaded_chunks, upload_token, created_at, updated_at)
            })
            .collect()
    }
}
