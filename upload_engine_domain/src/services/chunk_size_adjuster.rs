//! # Chunk-Size Adjuster
//!
//! A closed-loop controller mapping observed per-chunk upload time to the
//! next chunk size. Two variants behind one trait. `ChunkSize`-style
//! bounds-checked clamping is familiar; the closed-loop TCP-like state
//! machine that drives it is this module's own addition.

pub const DEFAULT_MIN_SIZE: u64 = 256 * 1024;
pub const DEFAULT_MAX_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_TARGET_MS: u64 = 3_000;
pub const DEFAULT_SSTHRESH: u64 = 5 * 1024 * 1024;

/// Capability shared by both adjuster strategies.
pub trait ChunkSizeAdjuster: Send + Sync {
    fn current_size(&self) -> u64;
    /// Feeds the elapsed time (ms) of the most recently completed chunk
    /// upload and returns the size to use for the next chunk.
    fn adjust(&mut self, last_upload_time_ms: u64) -> u64;
    fn reset(&mut self);
}

fn clamp(size: u64, min: u64, max: u64) -> u64 {
    size.clamp(min, max)
}

/// Simple threshold-doubling/halving adjuster.
pub struct SimpleAdjuster {
    size: u64,
    min: u64,
    max: u64,
    target_ms: u64,
    initial: u64,
}

impl SimpleAdjuster {
    pub fn new(initial_size: u64, min: u64, max: u64, target_ms: u64) -> Self {
        let size = clamp(initial_size, min, max);
        Self { size, min, max, target_ms, initial: size }
    }
}

impl ChunkSizeAdjuster for SimpleAdjuster {
    fn current_size(&self) -> u64 {
        self.size
    }

    fn adjust(&mut self, last_upload_time_ms: u64) -> u64 {
        let fast = (self.target_ms as f64) * 0.5;
        let slow = (self.target_ms as f64) * 1.5;
        let t = last_upload_time_ms as f64;
        self.size = if t < fast {
            clamp(self.size.saturating_mul(2), self.min, self.max)
        } else if t > slow {
            clamp((self.size / 2).max(1), self.min, self.max)
        } else {
            self.size
        };
        self.size
    }

    fn reset(&mut self) {
        self.size = self.initial;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TcpState {
    SlowStart,
    CongestionAvoidance,
    FastRecovery,
}

/// Three-state controller {SlowStart, CongestionAvoidance, FastRecovery}
/// with a slow-start threshold (the default variant).
pub struct TcpLikeAdjuster {
    size: u64,
    ssthresh: u64,
    state: TcpState,
    min: u64,
    max: u64,
    target_ms: u64,
    initial_size: u64,
    initial_ssthresh: u64,
}

impl TcpLikeAdjuster {
    pub fn new(initial_size: u64, ssthresh: u64, min: u64, max: u64, target_ms: u64) -> Self {
        let size = clamp(initial_size, min, max);
        Self {
            size,
            ssthresh,
            state: TcpState::SlowStart,
            min,
            max,
            target_ms,
            initial_size: size,
            initial_ssthresh: ssthresh,
        }
    }

    pub fn state_name(&self) -> &'static str {
        match self.state {
            TcpState::SlowStart => "slow_start",
            TcpState::CongestionAvoidance => "congestion_avoidance",
            TcpState::FastRecovery => "fast_recovery",
        }
    }
}

impl ChunkSizeAdjuster for TcpLikeAdjuster {
    fn current_size(&self) -> u64 {
        self.size
    }

    fn adjust(&mut self, last_upload_time_ms: u64) -> u64 {
        let fast = (self.target_ms as f64) * 0.5;
        let slow = (self.target_ms as f64) * 1.5;
        let t = last_upload_time_ms as f64;

        if t < fast {
            match self.state {
                TcpState::SlowStart => {
                    self.size = self.size.saturating_mul(2);
                    if self.size >= self.ssthresh {
                        self.size = self.ssthresh;
                        self.state = TcpState::CongestionAvoidance;
                    }
                }
                TcpState::CongestionAvoidance => {
                    // Fixed step sized off ssthresh, not the current size,
                    // so growth stays additive instead of exponential.
                    self.size += self.ssthresh / 10;
                }
                TcpState::FastRecovery => {
                    self.state = TcpState::CongestionAvoidance;
                }
            }
        } else if t > slow {
            self.ssthresh = self.size / 2;
            self.size = self.ssthresh;
            self.state = TcpState::FastRecovery;
        }
        // Normal observation: no change.

        self.size = clamp(self.size, self.min, self.max);
        self.size
    }

    fn reset(&mut self) {
        self.size = self.initial_size;
        self.ssthresh = self.initial_ssthresh;
        self.state = TcpState::SlowStart;
    }
}
