//! # UploadTask — the core
//!
//! Orchestrates one file's upload lifecycle: handshake, parallel
//! hash+upload, retry, pause/resume/cancel, progress emission, persistence.
//! This is original orchestration work composed from three building
//! blocks: an async-port style for I/O collaborators, a
//! cooperative-cancellation and exponential-backoff retry loop for chunk
//! transfers, and an observer/execution-state shape for how lifecycle
//! signals and status snapshots are exposed to the owner.
//!
//! The only genuine OS-level parallelism is the hashing worker; chunk
//! dispatch within the upload phase is logically concurrent
//! (`futures::stream::FuturesUnordered`) but cooperatively scheduled on one
//! task, bounded by [`crate::runtime::ConcurrencyLimiter`].

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;

use upload_engine_domain::error::UploadError;
use upload_engine_domain::events::{EventBus, Handler, Payload, Subscription, Topic};
use upload_engine_domain::services::{
    ChunkHasher, ChunkSizeAdjuster, DurableProgressStore, DurableRecord, HashStrategy, RecordPatch, RequestAdapter,
    TcpLikeAdjuster,
};
use upload_engine_domain::value_objects::{chunks_for_file, ChunkInfo, FileDescriptor, UploadProgress, UploadStatus, UploadToken};
use upload_engine_domain::EngineConfig;

use crate::runtime::ConcurrencyLimiter;

/// Per-task tunables, derived from [`EngineConfig`] defaults but
/// overridable per task the way a manager merges options over its own
/// defaults.
#[derive(Debug, Clone)]
pub struct UploadTaskConfig {
    pub default_chunk_size: u64,
    pub retry_count: u32,
    pub retry_delay_ms: u64,
    pub concurrency: usize,
    pub priority_chunk_count: usize,
    pub min_chunk_size: u64,
    pub max_chunk_size: u64,
    pub target_chunk_time_ms: u64,
    pub ssthresh: u64,
}

impl From<&EngineConfig> for UploadTaskConfig {
    fn from(c: &EngineConfig) -> Self {
        Self {
            default_chunk_size: c.default_chunk_size,
            retry_count: c.retry_count,
            retry_delay_ms: c.retry_delay_ms,
            concurrency: c.default_concurrency,
            priority_chunk_count: c.priority_chunk_count,
            min_chunk_size: c.min_chunk_size,
            max_chunk_size: c.max_chunk_size,
            target_chunk_time_ms: c.target_chunk_time_ms,
            ssthresh: c.ssthresh,
        }
    }
}

pub struct UploadTask {
    task_id: String,
    file: Arc<dyn FileDescriptor>,
    adapter: Arc<dyn RequestAdapter>,
    hasher: Arc<dyn ChunkHasher>,
    store: Arc<dyn DurableProgressStore>,
    config: UploadTaskConfig,

    bus: EventBus,
    status: Mutex<UploadStatus>,
    cancel_flag: Arc<AtomicBool>,
    /// Set by Phase H when the server reports the whole file already
    /// exists; tells Phase U to stop dispatching further chunks.
    short_circuit: Arc<AtomicBool>,

    progress: Mutex<UploadProgress>,
    /// Per-index "already counted" guard resolving the Phase H/Phase U
    /// race: a chunk's bytes are rolled into progress and
    /// its `chunkSuccess` emitted exactly once, regardless of which phase
    /// observes its completion first.
    counted: Mutex<HashSet<usize>>,

    chunks: Mutex<Vec<ChunkInfo>>,
    upload_token: Mutex<Option<UploadToken>>,
    file_hash: Mutex<Option<String>>,
    adjuster: Mutex<Box<dyn ChunkSizeAdjuster>>,
    limiter: ConcurrencyLimiter,

    started_at: Mutex<Option<DateTime<Utc>>>,
    ended_at: Mutex<Option<DateTime<Utc>>>,
}

impl UploadTask {
    pub fn new(
        task_id: impl Into<String>,
        file: Arc<dyn FileDescriptor>,
        adapter: Arc<dyn RequestAdapter>,
        hasher: Arc<dyn ChunkHasher>,
        store: Arc<dyn DurableProgressStore>,
        config: UploadTaskConfig,
    ) -> Self {
        let adjuster = TcpLikeAdjuster::new(
            config.default_chunk_size,
            config.ssthresh,
            config.min_chunk_size,
            config.max_chunk_size,
            config.target_chunk_time_ms,
        );
        let concurrency = config.concurrency;
        Self {
            task_id: task_id.into(),
            file,
            adapter,
            hasher,
            store,
            config,
            bus: EventBus::new(),
            status: Mutex::new(UploadStatus::Idle),
            cancel_flag: Arc::new(AtomicBool::new(false)),
            short_circuit: Arc::new(AtomicBool::new(false)),
            progress: Mutex::new(UploadProgress::new(0, 0)),
            counted: Mutex::new(HashSet::new()),
            chunks: Mutex::new(Vec::new()),
            upload_token: Mutex::new(None),
            file_hash: Mutex::new(None),
            adjuster: Mutex::new(Box::new(adjuster)),
            limiter: ConcurrencyLimiter::new(concurrency),
            started_at: Mutex::new(None),
            ended_at: Mutex::new(None),
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn status(&self) -> UploadStatus {
        *self.status.lock()
    }

    /// Defensive copy.
    pub fn get_progress(&self) -> UploadProgress {
        *self.progress.lock()
    }

    pub fn get_duration(&self) -> Option<chrono::Duration> {
        let start = (*self.started_at.lock())?;
        let end = (*self.ended_at.lock()).unwrap_or_else(Utc::now);
        Some(end - start)
    }

    pub fn on(&self, topic: Topic, handler: Handler) -> Subscription {
        self.bus.on(topic, handler)
    }

    pub fn off(&self, subscription: Subscription) {
        self.bus.off(subscription)
    }

    /// Valid only in `idle`; transitions to `uploading`. Runs the full
    /// handshake → hash+upload → merge lifecycle to completion.
    pub async fn start(&self) -> Result<(), UploadError> {
        {
            let mut status = self.status.lock();
            if *status != UploadStatus::Idle {
                return Err(UploadError::invalid_state("start() requires idle"));
            }
            *status = UploadStatus::Uploading;
        }
        self.started_at.lock().replace(Utc::now());
        let info = self.file.info();
        self.bus.emit(
            Topic::Start,
            Payload::Start { task_id: self.task_id.clone(), file_name: info.name.clone(), file_size: info.size },
        );

        if let Err(e) = self.store.init().await {
            tracing::warn!(task_id = %self.task_id, error = %e, "durable store init failed; resume disabled for this task");
        }
        if self.store.is_available() {
            let record = DurableRecord {
                task_id: self.task_id.clone(),
                file_info: info.clone(),
                uploaded_chunks: BTreeSet::new(),
                upload_token: String::new(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            if let Err(e) = self.store.save_record(record).await {
                tracing::warn!(task_id = %self.task_id, error = %e, "failed to persist initial durable record");
            }
        }

        let create = match self
            .adapter
            .create_file(&info.name, info.size, &info.file_type, self.config.default_chunk_size)
            .await
        {
            Ok(c) => c,
            Err(e) => {
                *self.status.lock() = UploadStatus::Error;
                self.bus.emit(Topic::Error, Payload::Error { task_id: self.task_id.clone(), error: e.to_string() });
                self.ended_at.lock().replace(Utc::now());
                return Err(e);
            }
        };

        let token = create.upload_token;
        let negotiated = create.negotiated_chunk_size;
        *self.upload_token.lock() = Some(token.clone());
        if self.store.is_available() {
            let _ = self
                .store
                .update_record(&self.task_id, RecordPatch { upload_token: Some(token.token.clone()), ..Default::default() })
                .await;
        }

        let chunks = chunks_for_file(info.size, negotiated);
        *self.progress.lock() = UploadProgress::new(info.size, chunks.len());
        *self.chunks.lock() = chunks;
        *self.adjuster.lock() = Box::new(TcpLikeAdjuster::new(
            negotiated,
            self.config.ssthresh,
            self.config.min_chunk_size,
            self.config.max_chunk_size,
            self.config.target_chunk_time_ms,
        ));

        self.run_cycle(true).await
    }

    /// Valid only in `uploading`; flips the flag so no new chunk transfers
    /// begin. In-flight chunks run to completion.
    pub fn pause(&self) -> Result<(), UploadError> {
        let mut status = self.status.lock();
        if *status != UploadStatus::Uploading {
            return Err(UploadError::invalid_state("pause() requires uploading"));
        }
        *status = UploadStatus::Paused;
        drop(status);
        self.bus.emit(Topic::Pause, Payload::StateOnly { task_id: self.task_id.clone() });
        Ok(())
    }

    /// Valid only in `paused`; re-runs the dispatch loop, which naturally
    /// skips chunks already in the "already counted" set. The upload token
    /// is retained from the paused state.
    pub async fn resume(&self) -> Result<(), UploadError> {
        {
            let mut status = self.status.lock();
            if *status != UploadStatus::Paused {
                return Err(UploadError::invalid_state("resume() requires paused"));
            }
            *status = UploadStatus::Uploading;
        }
        self.bus.emit(Topic::Resume, Payload::StateOnly { task_id: self.task_id.clone() });
        self.run_cycle(false).await
    }

    /// Valid in `uploading` or `paused`. Transitions to the terminal
    /// `cancelled` state and flips the cancel flag that all running phases
    /// observe at their next yield point. Durable record deletion is
    /// best-effort and happens off the calling thread since `cancel()`
    /// itself is synchronous.
    pub fn cancel(&self) -> Result<(), UploadError> {
        {
            let mut status = self.status.lock();
            if !matches!(*status, UploadStatus::Uploading | UploadStatus::Paused) {
                return Err(UploadError::invalid_state("cancel() requires uploading or paused"));
            }
            *status = UploadStatus::Cancelled;
        }
        self.cancel_flag.store(true, Ordering::SeqCst);
        self.bus.emit(Topic::Cancel, Payload::StateOnly { task_id: self.task_id.clone() });

        let store = self.store.clone();
        let task_id = self.task_id.clone();
        tokio::spawn(async move {
            if store.is_available() {
                if let Err(e) = store.delete_record(&task_id).await {
                    tracing::warn!(%task_id, error = %e, "failed to delete durable record on cancel");
                }
            }
        });
        Ok(())
    }

    /// Runs Phase H (only on first invocation) and Phase U concurrently,
    /// then finalizes the task. Shared by `start()` and `resume()`.
    async fn run_cycle(&self, run_hash_phase: bool) -> Result<(), UploadError> {
        let chunks = self.chunks.lock().clone();

        let phase_h = async {
            if run_hash_phase {
                self.run_phase_hash(&chunks).await;
            }
        };
        let (_, u_res) = tokio::join!(phase_h, self.run_phase_upload(&chunks));

        if self.short_circuit.load(Ordering::SeqCst) {
            return Ok(());
        }
        if self.cancel_flag.load(Ordering::SeqCst) {
            return Ok(());
        }
        if let Err(e) = u_res {
            *self.status.lock() = UploadStatus::Error;
            self.bus.emit(Topic::Error, Payload::Error { task_id: self.task_id.clone(), error: e.to_string() });
            self.ended_at.lock().replace(Utc::now());
            return Err(e);
        }
        if *self.status.lock() == UploadStatus::Paused {
            return Ok(());
        }

        self.finalize_success().await
    }

    /// Phase H: compute file hash off-thread, verify with the server, and
    /// short-circuit (full or partial instant upload) when applicable.
    /// Hash/verify failures are demoted to warnings — never
    /// task-fatal.
    async fn run_phase_hash(&self, chunks: &[ChunkInfo]) {
        let token = match self.upload_token.lock().clone() {
            Some(t) => t,
            None => return,
        };
        let task_id = self.task_id.clone();
        let bus = self.bus.clone();
        let progress_cb = {
            let bus = bus.clone();
            let task_id = task_id.clone();
            Some(Box::new(move |pct: f64| {
                bus.emit(Topic::HashProgress, Payload::HashProgress { task_id: task_id.clone(), percentage: pct });
            }) as upload_engine_domain::services::ProgressCallback)
        };

        let file_hash = match self.hasher.compute_file_hash(self.file.as_ref(), HashStrategy::OffThread, progress_cb).await {
            Ok(h) => h,
            Err(e) => {
                tracing::warn!(task_id = %task_id, error = %e, "hash computation failed; continuing without instant-upload optimization");
                return;
            }
        };
        *self.file_hash.lock() = Some(file_hash.clone());
        bus.emit(Topic::HashComplete, Payload::HashComplete { task_id: task_id.clone(), hash: file_hash.clone() });

        let verify = match self.adapter.verify_hash(&file_hash, &token, None).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(task_id = %task_id, error = %e, "verify_hash failed; continuing without instant-upload optimization");
                return;
            }
        };

        if verify.file_exists {
            self.short_circuit.store(true, Ordering::SeqCst);
            {
                let mut p = self.progress.lock();
                p.uploaded_bytes = p.total_bytes;
                p.uploaded_chunks = p.total_chunks;
            }
            *self.status.lock() = UploadStatus::Success;
            bus.emit(
                Topic::Success,
                Payload::Success { task_id: task_id.clone(), file_url: verify.file_url.clone().unwrap_or_default() },
            );
            self.ended_at.lock().replace(Utc::now());
            if self.store.is_available() {
                let _ = self.store.delete_record(&task_id).await;
            }
            return;
        }

        for idx in verify.existing_chunks {
            let newly_counted = self.counted.lock().insert(idx);
            if !newly_counted {
                continue; // already uploaded concurrently by Phase U; don't double-count
            }
            if let Some(chunk) = chunks.get(idx) {
                self.progress.lock().record_chunk(chunk.size(), 0.0);
            }
            bus.emit(Topic::ChunkSuccess, Payload::ChunkSuccess { task_id: task_id.clone(), chunk_index: idx });
            self.persist_progress().await;
        }
    }

    /// Phase U: dispatch chunks through the concurrency limiter. The
    /// priority set (first `min(priority_chunk_count, total)` chunks) is
    /// pushed first; dispatch order, not a hard barrier, is what makes it
    /// "best-effort".
    async fn run_phase_upload(&self, chunks: &[ChunkInfo]) -> Result<(), UploadError> {
        let priority_n = self.config.priority_chunk_count.min(chunks.len());
        let ordered = chunks.iter().take(priority_n).chain(chunks.iter().skip(priority_n));

        let mut pending = FuturesUnordered::new();
        for chunk in ordered {
            if self.short_circuit.load(Ordering::SeqCst) || self.cancel_flag.load(Ordering::SeqCst) {
                break;
            }
            if *self.status.lock() != UploadStatus::Uploading {
                break;
            }
            if self.counted.lock().contains(&chunk.index) {
                continue;
            }
            pending.push(self.upload_one_chunk(chunk));
        }

        while let Some(result) = pending.next().await {
            result?;
        }
        Ok(())
    }

    async fn upload_one_chunk(&self, chunk: &ChunkInfo) -> Result<(), UploadError> {
        if self.cancel_flag.load(Ordering::SeqCst) {
            return Err(UploadError::Cancelled(format!("chunk {} cancelled before dispatch", chunk.index)));
        }
        if *self.status.lock() != UploadStatus::Uploading {
            return Ok(()); // paused; abandoned until resume() redispatches
        }
        if self.counted.lock().contains(&chunk.index) {
            return Ok(());
        }

        let token = self
            .upload_token
            .lock()
            .clone()
            .ok_or_else(|| UploadError::invalid_state("missing upload token"))?;

        let mut attempt: u32 = 0;
        loop {
            if self.cancel_flag.load(Ordering::SeqCst) {
                return Err(UploadError::Cancelled(format!("chunk {} cancelled mid-retry", chunk.index)));
            }
            if *self.status.lock() != UploadStatus::Uploading {
                return Ok(()); // paused between retries; abandoned until resume()
            }

            let started = std::time::Instant::now();
            // The permit gates byte slicing and hashing too, not just the
            // network call, so at most `concurrency` chunk buffers exist in
            // memory at once rather than one per pending chunk.
            let outcome = self
                .limiter
                .run(|| async {
                    let bytes = self.file.slice(chunk.start, chunk.end).await?;
                    let chunk_hash = self
                        .hasher
                        .compute_chunk_hash(self.file.as_ref(), chunk.start, chunk.end)
                        .await
                        .unwrap_or_default();
                    self.adapter.upload_chunk(&token, chunk.index, &chunk_hash, &bytes).await.map(|_| chunk_hash)
                })
                .await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(chunk_hash) => {
                    self.record_chunk_success(chunk, &chunk_hash, elapsed_ms).await;
                    return Ok(());
                }
                Err(e) if e.is_recoverable() && attempt < self.config.retry_count => {
                    self.bus.emit(
                        Topic::ChunkError,
                        Payload::ChunkError { task_id: self.task_id.clone(), chunk_index: chunk.index, error: e.to_string() },
                    );
                    attempt += 1;
                    let backoff_ms = self.config.retry_delay_ms.saturating_mul(2u64.saturating_pow(attempt - 1));
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
                Err(e) => {
                    self.bus.emit(
                        Topic::ChunkError,
                        Payload::ChunkError { task_id: self.task_id.clone(), chunk_index: chunk.index, error: e.to_string() },
                    );
                    return Err(e);
                }
            }
        }
    }

    async fn record_chunk_success(&self, chunk: &ChunkInfo, chunk_hash: &str, elapsed_ms: u64) {
        if self.short_circuit.load(Ordering::SeqCst) {
            // The whole file was already reported present; progress was
            // forced to 100% there. A chunk upload that was in flight at
            // that moment must not add its bytes on top of that total.
            return;
        }
        let newly_counted = self.counted.lock().insert(chunk.index);
        if !newly_counted {
            return; // Phase H's skip already counted this index
        }
        if let Some(c) = self.chunks.lock().get_mut(chunk.index) {
            c.hash = chunk_hash.to_string();
        }
        self.progress.lock().record_chunk(chunk.size(), elapsed_ms as f64 / 1000.0);
        self.adjuster.lock().adjust(elapsed_ms);

        let (pct, speed) = {
            let p = self.progress.lock();
            (p.percentage(), p.speed)
        };
        self.bus.emit(Topic::Progress, Payload::Progress { task_id: self.task_id.clone(), percentage: pct, speed });
        self.bus
            .emit(Topic::ChunkSuccess, Payload::ChunkSuccess { task_id: self.task_id.clone(), chunk_index: chunk.index });
        self.persist_progress().await;
    }

    async fn persist_progress(&self) {
        if !self.store.is_available() {
            return;
        }
        let uploaded: BTreeSet<usize> = self.counted.lock().iter().copied().collect();
        if let Err(e) = self
            .store
            .update_record(&self.task_id, RecordPatch { uploaded_chunks: Some(uploaded), ..Default::default() })
            .await
        {
            tracing::warn!(task_id = %self.task_id, error = %e, "failed to persist chunk progress; resume unavailable for this task");
        }
    }

    /// Calls `mergeFile` once all chunks are confirmed and surfaces the
    /// returned URL. If hash computation never
    /// succeeded, the task still completes (all chunks uploaded) but skips
    /// the merge confirmation — there is no file hash to send.
    async fn finalize_success(&self) -> Result<(), UploadError> {
        let token = self
            .upload_token
            .lock()
            .clone()
            .ok_or_else(|| UploadError::invalid_state("missing upload token"))?;
        let chunk_hashes: Vec<String> = self.chunks.lock().iter().map(|c| c.hash.clone()).collect();
        let file_hash = self.file_hash.lock().clone();

        let file_url = if let Some(file_hash) = file_hash {
            match self.adapter.merge_file(&token, &file_hash, &chunk_hashes).await {
                Ok(resp) => resp.file_url,
                Err(e) => {
                    *self.status.lock() = UploadStatus::Error;
                    self.bus.emit(Topic::Error, Payload::Error { task_id: self.task_id.clone(), error: e.to_string() });
                    self.ended_at.lock().replace(Utc::now());
                    return Err(e);
                }
            }
        } else {
            tracing::warn!(task_id = %self.task_id, "file hash unavailable; completing without merge confirmation");
            String::new()
        };

        *self.status.lock() = UploadStatus::Success;
        {
            let mut p = self.progress.lock();
            p.uploaded_bytes = p.total_bytes;
        }
        self.bus.emit(Topic::Success, Payload::Success { task_id: self.task_id.clone(), file_url });
        self.ended_at.lock().replace(Utc::now());
        if self.store.is_available() {
            let _ = self.store.delete_record(&self.task_id).await;
        }
        Ok(())
    }
}
