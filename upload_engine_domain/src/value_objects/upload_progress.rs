//! `UploadProgress` — a defensive-copy snapshot of a task's progress.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UploadProgress {
    pub uploaded_bytes: u64,
    pub total_bytes: u64,
    pub uploaded_chunks: usize,
    pub total_chunks: usize,
    /// Exponential moving average, bytes/sec.
    pub speed: f64,
    pub remaining_time_secs: f64,
}

impl UploadProgress {
    pub fn new(total_bytes: u64, total_chunks: usize) -> Self {
        Self {
            uploaded_bytes: 0,
            total_bytes,
            uploaded_chunks: 0,
            total_chunks,
            speed: 0.0,
            remaining_time_secs: 0.0,
        }
    }

    /// `percentage = 100 * uploadedBytes / totalBytes`, 100 for an empty
    /// file (zero chunks is vacuously complete).
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            100.0
        } else {
            100.0 * (self.uploaded_bytes as f64) / (self.total_bytes as f64)
        }
    }

    /// Rolls a newly completed chunk of `bytes` into the snapshot, updating
    /// the EMA speed estimate. `elapsed_secs` is the wall-clock time the
    /// chunk took to transfer.
    pub fn record_chunk(&mut self, bytes: u64, elapsed_secs: f64) {
        self.uploaded_bytes += bytes;
        self.uploaded_chunks += 1;
        if elapsed_secs > 0.0 {
            let instantaneous = bytes as f64 / elapsed_secs;
            const ALPHA: f64 = 0.3;
            self.speed = if self.speed == 0.0 {
                instantaneous
            } else {
                ALPHA * instantaneous + (1.0 - ALPHA) * self.speed
            };
        }
        let remaining_bytes = self.total_bytes.saturating_sub(self.uploaded_bytes) as f64;
        self.remaining_time_secs = if self.speed > 0.0 { remaining_bytes / self.speed } else { 0.0 };
    }
}
