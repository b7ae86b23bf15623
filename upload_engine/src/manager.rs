//! UploadManager — owns the task map and enforces `maxConcurrentTasks`
//! across them using the same [`ConcurrencyLimiter`] building block
//! individual tasks use to bound chunk concurrency, just at the task
//! granularity instead of the chunk granularity.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use upload_engine_domain::error::UploadError;
use upload_engine_domain::services::{ChunkHasher, DurableProgressStore, DurableRecord, RequestAdapter};
use upload_engine_domain::value_objects::{FileDescriptor, UploadStatus};
use upload_engine_domain::EngineConfig;

use crate::runtime::ConcurrencyLimiter;
use crate::task::{UploadTask, UploadTaskConfig};

/// Task counts by lifecycle status, as of the moment `get_statistics` was
/// called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStatistics {
    pub idle: usize,
    pub uploading: usize,
    pub paused: usize,
    pub success: usize,
    pub error: usize,
    pub cancelled: usize,
}

impl TaskStatistics {
    pub fn total(&self) -> usize {
        self.idle + self.uploading + self.paused + self.success + self.error + self.cancelled
    }
}

pub struct UploadManager {
    adapter: Arc<dyn RequestAdapter>,
    hasher: Arc<dyn ChunkHasher>,
    store: Arc<dyn DurableProgressStore>,
    config: EngineConfig,
    tasks: Mutex<HashMap<String, Arc<UploadTask>>>,
    limiter: ConcurrencyLimiter,
}

impl UploadManager {
    pub fn new(adapter: Arc<dyn RequestAdapter>, hasher: Arc<dyn ChunkHasher>, store: Arc<dyn DurableProgressStore>, config: EngineConfig) -> Self {
        let limiter = ConcurrencyLimiter::new(config.max_concurrent_tasks);
        Self { adapter, hasher, store, config, tasks: Mutex::new(HashMap::new()), limiter }
    }

    /// Brings up durable storage and reports what a previous process left
    /// unfinished. Idempotent and tolerant of storage being unavailable —
    /// mirrors the per-task `init` a single `UploadTask::start` performs,
    /// just once at the manager's own startup instead of per task.
    pub async fn init(&self) -> Result<(), UploadError> {
        if let Err(e) = self.store.init().await {
            tracing::warn!(error = %e, "durable store init failed; resume across restarts is disabled");
            return Ok(());
        }
        if !self.store.is_available() {
            tracing::warn!("durable store unavailable; resume across restarts is disabled");
            return Ok(());
        }
        let unfinished = self.store.get_all_records().await?;
        tracing::info!(count = unfinished.len(), "loaded unfinished uploads from durable storage");
        Ok(())
    }

    /// Registers a new task for `file` under a generated id and returns a
    /// handle to it. The task stays `idle` until `start_task` is called.
    pub fn create_task(&self, file: Arc<dyn FileDescriptor>) -> Arc<UploadTask> {
        self.create_task_with_id(Uuid::new_v4().to_string(), file)
    }

    pub fn create_task_with_id(&self, task_id: impl Into<String>, file: Arc<dyn FileDescriptor>) -> Arc<UploadTask> {
        let task_id = task_id.into();
        let task = Arc::new(UploadTask::new(
            task_id.clone(),
            file,
            self.adapter.clone(),
            self.hasher.clone(),
            self.store.clone(),
            UploadTaskConfig::from(&self.config),
        ));
        self.tasks.lock().insert(task_id, task.clone());
        task
    }

    pub fn get_task(&self, task_id: &str) -> Option<Arc<UploadTask>> {
        self.tasks.lock().get(task_id).cloned()
    }

    pub fn list_tasks(&self) -> Vec<Arc<UploadTask>> {
        self.tasks.lock().values().cloned().collect()
    }

    pub fn remove_task(&self, task_id: &str) -> Option<Arc<UploadTask>> {
        self.tasks.lock().remove(task_id)
    }

    /// Cancels the task if it is still active, drops it from the map, and
    /// best-effort deletes its durable record. Unlike `remove_task`, this
    /// never leaves an active task running with no owner or a durable
    /// record orphaned behind it.
    pub async fn delete_task(&self, task_id: &str) -> Result<(), UploadError> {
        let task = self.require_task(task_id)?;
        if matches!(task.status(), UploadStatus::Uploading | UploadStatus::Paused) {
            task.cancel()?;
        }
        self.tasks.lock().remove(task_id);
        if self.store.is_available() {
            self.store.delete_record(task_id).await?;
        }
        Ok(())
    }

    fn require_task(&self, task_id: &str) -> Result<Arc<UploadTask>, UploadError> {
        self.get_task(task_id).ok_or_else(|| UploadError::invalid_state(format!("unknown task {task_id}")))
    }

    /// Starts the task, gated by `maxConcurrentTasks`: if the limit is
    /// already reached, this call waits its turn in FIFO order rather than
    /// starting immediately. Multiple manager-owned tasks can be started
    /// concurrently by awaiting several `start_task` futures together; only
    /// `maxConcurrentTasks` of them will be mid-transfer at any moment.
    pub async fn start_task(&self, task_id: &str) -> Result<(), UploadError> {
        let task = self.require_task(task_id)?;
        self.limiter.run(|| async { task.start().await }).await
    }

    pub async fn resume_task(&self, task_id: &str) -> Result<(), UploadError> {
        let task = self.require_task(task_id)?;
        self.limiter.run(|| async { task.resume().await }).await
    }

    pub fn pause_task(&self, task_id: &str) -> Result<(), UploadError> {
        self.require_task(task_id)?.pause()
    }

    pub fn cancel_task(&self, task_id: &str) -> Result<(), UploadError> {
        self.require_task(task_id)?.cancel()
    }

    /// Durable records left behind by a previous process (crash, tab
    /// close, page refresh) that the host can offer to resume by
    /// reattaching a freshly selected `FileDescriptor` for the same
    /// content and calling `create_task` + `start_task` again — the normal
    /// handshake's `verify_hash` is what actually skips already-uploaded
    /// chunks, not anything reconstructed from this record.
    pub async fn list_unfinished(&self) -> Result<Vec<DurableRecord>, UploadError> {
        if !self.store.is_available() {
            return Ok(Vec::new());
        }
        self.store.get_all_records().await
    }

    pub fn active_task_count(&self) -> usize {
        self.limiter.active_count()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Pauses every currently `uploading` task. Tasks in any other status
    /// are left untouched; per-task errors are collected rather than
    /// aborting the whole batch.
    pub fn pause_all(&self) -> Vec<(String, Result<(), UploadError>)> {
        self.list_tasks()
            .into_iter()
            .filter(|task| task.status() == UploadStatus::Uploading)
            .map(|task| (task.task_id().to_string(), task.pause()))
            .collect()
    }

    /// Resumes every `paused` task, gated by `maxConcurrentTasks` the same
    /// way `resume_task` is.
    pub async fn resume_all(&self) -> Vec<(String, Result<(), UploadError>)> {
        let paused: Vec<_> = self.list_tasks().into_iter().filter(|task| task.status() == UploadStatus::Paused).collect();
        let resumes = paused.into_iter().map(|task| {
            let task_id = task.task_id().to_string();
            async move {
                let result = self.limiter.run(|| async { task.resume().await }).await;
                (task_id, result)
            }
        });
        futures::future::join_all(resumes).await
    }

    /// Cancels every active (`uploading` or `paused`) task.
    pub fn cancel_all(&self) -> Vec<(String, Result<(), UploadError>)> {
        self.list_tasks()
            .into_iter()
            .filter(|task| matches!(task.status(), UploadStatus::Uploading | UploadStatus::Paused))
            .map(|task| (task.task_id().to_string(), task.cancel()))
            .collect()
    }

    /// Drops every task in a terminal status (`success`, `error`, or
    /// `cancelled`) from the map. Durable records for these tasks are
    /// already gone — `finalize_success` and `cancel` each delete their own
    /// record — so this only prunes the in-memory registry.
    pub fn clear_completed_tasks(&self) -> usize {
        let mut tasks = self.tasks.lock();
        let before = tasks.len();
        tasks.retain(|_, task| !task.status().is_terminal());
        before - tasks.len()
    }

    /// Current task counts by status, for dashboards and diagnostics.
    pub fn get_statistics(&self) -> TaskStatistics {
        let mut stats = TaskStatistics::default();
        for task in self.tasks.lock().values() {
            match task.status() {
                UploadStatus::Idle => stats.idle += 1,
                UploadStatus::Uploading => stats.uploading += 1,
                UploadStatus::Paused => stats.paused += 1,
                UploadStatus::Success => stats.success += 1,
                UploadStatus::Error => stats.error += 1,
                UploadStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }

    /// Cancels every active task and clears the registry. `DurableProgressStore`
    /// exposes no explicit shutdown hook of its own — closing a backing
    /// connection pool, if any, is the store implementation's `Drop`
    /// responsibility once the manager's last reference to it goes away.
    pub fn close(&self) {
        self.cancel_all();
        self.tasks.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapter::MockRequestAdapter;
    use crate::infrastructure::hashing::Md5ChunkHasher;
    use crate::infrastructure::storage::InMemoryProgressStore;
    use async_trait::async_trait;
    use upload_engine_domain::value_objects::FileInfo;

    struct FixedBytes(Vec<u8>);

    #[async_trait]
    impl FileDescriptor for FixedBytes {
        fn info(&self) -> FileInfo {
            FileInfo { name: "t.bin".into(), size: self.0.len() as u64, file_type: "application/octet-stream".into(), last_modified: 0 }
        }
        async fn slice(&self, start: u64, end: u64) -> Result<Vec<u8>, UploadError> {
            Ok(self.0[start as usize..end as usize].to_vec())
        }
    }

    fn manager(max_concurrent_tasks: usize) -> UploadManager {
        let config = EngineConfig { max_concurrent_tasks, default_chunk_size: 4, ..Default::default() };
        UploadManager::new(Arc::new(MockRequestAdapter::new()), Arc::new(Md5ChunkHasher::new()), Arc::new(InMemoryProgressStore::new()), config)
    }

    #[tokio::test]
    async fn created_task_starts_and_completes() {
        let manager = manager(3);
        let file: Arc<dyn FileDescriptor> = Arc::new(FixedBytes(b"hello world".to_vec()));
        let task = manager.create_task(file);
        manager.start_task(task.task_id()).await.unwrap();
        assert_eq!(task.status(), upload_engine_domain::value_objects::UploadStatus::Success);
    }

    #[tokio::test]
    async fn unknown_task_id_is_invalid_state() {
        let manager = manager(3);
        let result = manager.start_task("does-not-exist").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn delete_task_cancels_paused_task_and_removes_it() {
        let manager = manager(3);
        let file: Arc<dyn FileDescriptor> = Arc::new(FixedBytes(vec![9u8; 64]));
        let task = manager.create_task(file);
        task.on(
            upload_engine_domain::events::Topic::Start,
            Arc::new({
                let task = task.clone();
                move |_: &upload_engine_domain::events::Payload| {
                    let _ = task.pause();
                }
            }),
        );
        manager.start_task(task.task_id()).await.unwrap();
        assert_eq!(task.status(), UploadStatus::Paused);

        manager.delete_task(task.task_id()).await.unwrap();
        assert_eq!(task.status(), UploadStatus::Cancelled);
        assert!(manager.get_task(task.task_id()).is_none());
    }

    #[tokio::test]
    async fn delete_task_on_idle_task_just_removes_it() {
        let manager = manager(3);
        let task = manager.create_task(Arc::new(FixedBytes(b"hello".to_vec())));
        manager.delete_task(task.task_id()).await.unwrap();
        assert!(manager.get_task(task.task_id()).is_none());
    }

    #[tokio::test]
    async fn clear_completed_tasks_drops_only_terminal_ones() {
        let manager = manager(3);
        let finished = manager.create_task(Arc::new(FixedBytes(b"done".to_vec())));
        manager.start_task(finished.task_id()).await.unwrap();
        let idle = manager.create_task(Arc::new(FixedBytes(b"untouched".to_vec())));

        let removed = manager.clear_completed_tasks();
        assert_eq!(removed, 1);
        assert!(manager.get_task(finished.task_id()).is_none());
        assert!(manager.get_task(idle.task_id()).is_some());
    }

    #[tokio::test]
    async fn get_statistics_counts_by_status() {
        let manager = manager(3);
        let finished = manager.create_task(Arc::new(FixedBytes(b"done".to_vec())));
        manager.start_task(finished.task_id()).await.unwrap();
        manager.create_task(Arc::new(FixedBytes(b"untouched".to_vec())));

        let stats = manager.get_statistics();
        assert_eq!(stats.success, 1);
        assert_eq!(stats.idle, 1);
        assert_eq!(stats.total(), 2);
    }

    #[tokio::test]
    async fn close_cancels_active_tasks_and_clears_registry() {
        let manager = manager(3);
        let task = manager.create_task(Arc::new(FixedBytes(vec![1u8; 64])));
        task.on(
            upload_engine_domain::events::Topic::Start,
            Arc::new({
                let task = task.clone();
                move |_: &upload_engine_domain::events::Payload| {
                    let _ = task.cancel();
                }
            }),
        );
        let _ = manager.start_task(task.task_id()).await;

        manager.close();
        assert!(manager.list_tasks().is_empty());
    }
}
