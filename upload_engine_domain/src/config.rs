//! Engine-wide configuration defaults, expressed as an explicit struct
//! rather than scattered module-level constants.

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_concurrent_tasks: usize,
    pub default_chunk_size: u64,
    pub default_concurrency: usize,
    pub auto_resume_unfinished: bool,
    pub retry_count: u32,
    pub retry_delay_ms: u64,
    pub min_chunk_size: u64,
    pub max_chunk_size: u64,
    pub target_chunk_time_ms: u64,
    pub ssthresh: u64,
    pub priority_chunk_count: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 3,
            default_chunk_size: 1024 * 1024,
            default_concurrency: 3,
            auto_resume_unfinished: true,
            retry_count: 3,
            retry_delay_ms: 1_000,
            min_chunk_size: crate::services::chunk_size_adjuster::DEFAULT_MIN_SIZE,
            max_chunk_size: crate::services::chunk_size_adjuster::DEFAULT_MAX_SIZE,
            target_chunk_time_ms: crate::services::chunk_size_adjuster::DEFAULT_TARGET_MS,
            ssthresh: crate::services::chunk_size_adjuster::DEFAULT_SSTHRESH,
            priority_chunk_count: 3,
        }
    }
}
