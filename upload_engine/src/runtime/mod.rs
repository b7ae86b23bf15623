pub mod concurrency_limiter;

pub use concurrency_limiter::ConcurrencyLimiter;
