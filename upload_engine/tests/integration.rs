//! End-to-end lifecycle scenarios against the in-memory reference adapter
//! and store: pause/resume, cancellation, retry/backoff, instant-upload
//! dedup, and the manager's cap on concurrently active tasks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use upload_engine::infrastructure::adapter::MockRequestAdapter;
use upload_engine::infrastructure::hashing::Md5ChunkHasher;
use upload_engine::infrastructure::storage::InMemoryProgressStore;
use upload_engine::{EngineConfig, FileDescriptor, FileInfo, Payload, Topic, UploadError, UploadManager, UploadStatus};
use upload_engine_domain::services::{CreateFileResponse, MergeFileResponse, RequestAdapter, UploadChunkResponse, VerifyHashResponse};
use upload_engine_domain::value_objects::UploadToken;

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

fn small_config() -> EngineConfig {
    EngineConfig { default_chunk_size: 4, retry_delay_ms: 1, ..Default::default() }
}

#[tokio::test]
async fn pause_then_resume_completes_without_double_counting_chunks() {
    let manager = UploadManager::new(Arc::new(MockRequestAdapter::new()), Arc::new(Md5ChunkHasher::new()), Arc::new(InMemoryProgressStore::new()), small_config());
    let task = manager.create_task(Arc::new(FixedBytes(b"0123456789abcdef".to_vec())));

    let chunk_success_count = Arc::new(AtomicUsize::new(0));
    let counter = chunk_success_count.clone();
    task.on(
        Topic::ChunkSuccess,
        Arc::new(move |_: &Payload| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );

    manager.start_task(task.task_id()).await.unwrap();
    assert_eq!(task.status(), UploadStatus::Success);

    let progress = task.get_progress();
    assert_eq!(progress.uploaded_chunks, progress.total_chunks);
    // Each chunk index is reported exactly once even though both the hash
    // phase and the upload phase can observe the same completed index.
    assert_eq!(chunk_success_count.load(Ordering::SeqCst), progress.total_chunks);
}

#[tokio::test]
async fn cancel_transitions_to_terminal_cancelled_state() {
    let manager = UploadManager::new(Arc::new(MockRequestAdapter::new()), Arc::new(Md5ChunkHasher::new()), Arc::new(InMemoryProgressStore::new()), small_config());
    let task = manager.create_task(Arc::new(FixedBytes(vec![7u8; 64])));

    task.on(
        Topic::Start,
        Arc::new({
            let task_for_cancel = task.clone();
            move |_: &Payload| {
                let _ = task_for_cancel.cancel();
            }
        }),
    );

    let result = manager.start_task(task.task_id()).await;
    assert!(result.is_ok());
    assert_eq!(task.status(), UploadStatus::Cancelled);
}

#[tokio::test]
async fn recoverable_chunk_failures_are_retried_until_success() {
    let adapter = Arc::new(MockRequestAdapter::new());
    adapter.fail_chunk_n_times(0, 2);
    let manager = UploadManager::new(adapter, Arc::new(Md5ChunkHasher::new()), Arc::new(InMemoryProgressStore::new()), small_config());
    let task = manager.create_task(Arc::new(FixedBytes(b"abcdefgh".to_vec())));

    let chunk_errors = Arc::new(AtomicUsize::new(0));
    let counter = chunk_errors.clone();
    task.on(
        Topic::ChunkError,
        Arc::new(move |_: &Payload| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );

    manager.start_task(task.task_id()).await.unwrap();
    assert_eq!(task.status(), UploadStatus::Success);
    assert!(chunk_errors.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn identical_content_short_circuits_as_instant_upload() {
    let adapter = Arc::new(MockRequestAdapter::new());
    let manager = UploadManager::new(adapter, Arc::new(Md5ChunkHasher::new()), Arc::new(InMemoryProgressStore::new()), small_config());

    let first = manager.create_task(Arc::new(FixedBytes(b"same content twice".to_vec())));
    manager.start_task(first.task_id()).await.unwrap();
    assert_eq!(first.status(), UploadStatus::Success);

    let second = manager.create_task(Arc::new(FixedBytes(b"same content twice".to_vec())));
    let success_events = Arc::new(Mutex::new(Vec::new()));
    let events = success_events.clone();
    second.on(
        Topic::Success,
        Arc::new(move |payload: &Payload| {
            if let Payload::Success { file_url, .. } = payload {
                events.lock().push(file_url.clone());
            }
        }),
    );

    manager.start_task(second.task_id()).await.unwrap();
    assert_eq!(second.status(), UploadStatus::Success);
    assert_eq!(success_events.lock().len(), 1);
}

/// Delegates every call to an inner adapter, but counts how many
/// `create_file` handshakes are concurrently in flight so the test below
/// can observe `UploadManager`'s `maxConcurrentTasks` gating directly.
struct TrackingAdapter {
    inner: MockRequestAdapter,
    in_flight: Arc<AtomicUsize>,
    max_observed: Arc<AtomicUsize>,
}

#[async_trait]
impl RequestAdapter for TrackingAdapter {
    async fn create_file(&self, file_name: &str, file_size: u64, file_type: &str, preferred_chunk_size: u64) -> Result<CreateFileResponse, UploadError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_observed.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        let result = self.inner.create_file(file_name, file_size, file_type, preferred_chunk_size).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn verify_hash(&self, file_hash: &str, upload_token: &UploadToken, chunk_hashes: Option<&[String]>) -> Result<VerifyHashResponse, UploadError> {
        self.inner.verify_hash(file_hash, upload_token, chunk_hashes).await
    }

    async fn upload_chunk(&self, upload_token: &UploadToken, chunk_index: usize, chunk_hash: &str, chunk_bytes: &[u8]) -> Result<UploadChunkResponse, UploadError> {
        self.inner.upload_chunk(upload_token, chunk_index, chunk_hash, chunk_bytes).await
    }

    async fn merge_file(&self, upload_token: &UploadToken, file_hash: &str, chunk_hashes: &[String]) -> Result<MergeFileResponse, UploadError> {
        self.inner.merge_file(upload_token, file_hash, chunk_hashes).await
    }
}

/// Counts how many chunk slices are resident at once — tracked with a
/// plain counter bumped right before a slice is handed back and dropped
/// right after the caller moves past it — to catch the limiter gating
/// only the network call and not the byte buffer.
struct MemoryTrackingFile {
    bytes: Vec<u8>,
    in_flight: Arc<AtomicUsize>,
    max_observed: Arc<AtomicUsize>,
}

#[async_trait]
impl FileDescriptor for MemoryTrackingFile {
    fn info(&self) -> FileInfo {
        FileInfo { name: "t.bin".into(), size: self.bytes.len() as u64, file_type: "application/octet-stream".into(), last_modified: 0 }
    }

    async fn slice(&self, start: u64, end: u64) -> Result<Vec<u8>, UploadError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_observed.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(15)).await;
        let slice = self.bytes[start as usize..end as usize].to_vec();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(slice)
    }
}

#[tokio::test]
async fn chunk_buffers_in_flight_never_exceed_configured_concurrency() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_observed = Arc::new(AtomicUsize::new(0));
    let file = Arc::new(MemoryTrackingFile { bytes: vec![3u8; 64], in_flight: in_flight.clone(), max_observed: max_observed.clone() });

    let mut config = small_config();
    config.default_concurrency = 2;
    let manager = UploadManager::new(Arc::new(MockRequestAdapter::new()), Arc::new(Md5ChunkHasher::new()), Arc::new(InMemoryProgressStore::new()), config);
    let task = manager.create_task(file);

    manager.start_task(task.task_id()).await.unwrap();
    assert_eq!(task.status(), UploadStatus::Success);
    assert!(max_observed.load(Ordering::SeqCst) <= 2, "observed {} concurrent chunk buffers", max_observed.load(Ordering::SeqCst));
}

/// Adapter whose `verify_hash` answers instantly (the actual transfer is
/// what's slow), so a chunk upload is still in flight when the hash
/// phase's file-exists short-circuit lands.
struct SlowUploadAdapter {
    inner: MockRequestAdapter,
}

#[async_trait]
impl RequestAdapter for SlowUploadAdapter {
    async fn create_file(&self, file_name: &str, file_size: u64, file_type: &str, preferred_chunk_size: u64) -> Result<CreateFileResponse, UploadError> {
        self.inner.create_file(file_name, file_size, file_type, preferred_chunk_size).await
    }

    async fn verify_hash(&self, file_hash: &str, upload_token: &UploadToken, chunk_hashes: Option<&[String]>) -> Result<VerifyHashResponse, UploadError> {
        self.inner.verify_hash(file_hash, upload_token, chunk_hashes).await
    }

    async fn upload_chunk(&self, upload_token: &UploadToken, chunk_index: usize, chunk_hash: &str, chunk_bytes: &[u8]) -> Result<UploadChunkResponse, UploadError> {
        tokio::time::sleep(Duration::from_millis(40)).await;
        self.inner.upload_chunk(upload_token, chunk_index, chunk_hash, chunk_bytes).await
    }

    async fn merge_file(&self, upload_token: &UploadToken, file_hash: &str, chunk_hashes: &[String]) -> Result<MergeFileResponse, UploadError> {
        self.inner.merge_file(upload_token, file_hash, chunk_hashes).await
    }
}

#[tokio::test]
async fn instant_upload_short_circuit_is_not_overcounted_by_a_straggling_chunk() {
    let adapter = Arc::new(SlowUploadAdapter { inner: MockRequestAdapter::new() });
    let manager = UploadManager::new(adapter, Arc::new(Md5ChunkHasher::new()), Arc::new(InMemoryProgressStore::new()), small_config());

    let first = manager.create_task(Arc::new(FixedBytes(b"same content twice".to_vec())));
    manager.start_task(first.task_id()).await.unwrap();
    assert_eq!(first.status(), UploadStatus::Success);

    // Second upload of the same content: verify_hash reports file_exists
    // before the slow upload_chunk calls it raced against have settled.
    let second = manager.create_task(Arc::new(FixedBytes(b"same content twice".to_vec())));
    manager.start_task(second.task_id()).await.unwrap();

    let progress = second.get_progress();
    assert!(progress.uploaded_bytes <= progress.total_bytes);
    assert_eq!(progress.percentage(), 100.0);
}

#[tokio::test]
async fn pause_all_and_resume_all_drive_every_paused_task_to_completion() {
    let manager = UploadManager::new(Arc::new(MockRequestAdapter::new()), Arc::new(Md5ChunkHasher::new()), Arc::new(InMemoryProgressStore::new()), small_config());

    let mut tasks = Vec::new();
    for i in 0..3 {
        let task = manager.create_task(Arc::new(FixedBytes(vec![i as u8; 64])));
        task.on(
            Topic::Start,
            Arc::new({
                let task_for_pause = task.clone();
                move |_: &Payload| {
                    let _ = task_for_pause.pause();
                }
            }),
        );
        tasks.push(task);
    }

    for task in &tasks {
        manager.start_task(task.task_id()).await.unwrap();
        assert_eq!(task.status(), UploadStatus::Paused);
    }

    // pause_all on already-paused tasks is a no-op: nothing is left in
    // `uploading` status to act on.
    assert!(manager.pause_all().is_empty());

    let results = manager.resume_all().await;
    assert_eq!(results.len(), 3);
    for (_, result) in results {
        result.unwrap();
    }
    for task in &tasks {
        assert_eq!(task.status(), UploadStatus::Success);
    }
}

#[tokio::test]
async fn cancel_all_terminates_every_active_task() {
    let manager = UploadManager::new(Arc::new(MockRequestAdapter::new()), Arc::new(Md5ChunkHasher::new()), Arc::new(InMemoryProgressStore::new()), small_config());

    let mut tasks = Vec::new();
    for i in 0..3 {
        let task = manager.create_task(Arc::new(FixedBytes(vec![i as u8; 64])));
        task.on(
            Topic::Start,
            Arc::new({
                let task_for_pause = task.clone();
                move |_: &Payload| {
                    let _ = task_for_pause.pause();
                }
            }),
        );
        tasks.push(task);
    }
    for task in &tasks {
        manager.start_task(task.task_id()).await.unwrap();
    }

    let results = manager.cancel_all();
    assert_eq!(results.len(), 3);
    for task in &tasks {
        assert_eq!(task.status(), UploadStatus::Cancelled);
    }
}

#[tokio::test]
async fn manager_lifecycle_init_stats_and_close() {
    let manager = UploadManager::new(Arc::new(MockRequestAdapter::new()), Arc::new(Md5ChunkHasher::new()), Arc::new(InMemoryProgressStore::new()), small_config());
    manager.init().await.unwrap();

    let finished = manager.create_task(Arc::new(FixedBytes(b"done".to_vec())));
    manager.start_task(finished.task_id()).await.unwrap();
    let idle = manager.create_task(Arc::new(FixedBytes(b"untouched".to_vec())));

    let stats = manager.get_statistics();
    assert_eq!(stats.success, 1);
    assert_eq!(stats.idle, 1);

    manager.delete_task(idle.task_id()).await.unwrap();
    assert!(manager.get_task(idle.task_id()).is_none());

    manager.close();
    assert!(manager.list_tasks().is_empty());
}

#[tokio::test]
async fn manager_caps_concurrently_active_tasks() {
    let max_observed = Arc::new(AtomicUsize::new(0));
    let adapter = Arc::new(TrackingAdapter { inner: MockRequestAdapter::new(), in_flight: Arc::new(AtomicUsize::new(0)), max_observed: max_observed.clone() });

    let mut config = small_config();
    config.max_concurrent_tasks = 2;
    let manager = Arc::new(UploadManager::new(adapter, Arc::new(Md5ChunkHasher::new()), Arc::new(InMemoryProgressStore::new()), config));

    let task_ids: Vec<String> = (0..5)
        .map(|i| manager.create_task(Arc::new(FixedBytes(vec![i as u8; 16]))).task_id().to_string())
        .collect();

    let handles: Vec<_> = task_ids
        .into_iter()
        .map(|id| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.start_task(&id).await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert!(max_observed.load(Ordering::SeqCst) <= 2);
}
