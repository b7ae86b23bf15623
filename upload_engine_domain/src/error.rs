//! # Upload Engine Error Taxonomy
//!
//! Domain-specific errors for the upload engine. Each variant carries a
//! descriptive message;
//! `category()` and `is_recoverable()` drive systematic handling by
//! `UploadTask`'s retry and failure-propagation logic.

use thiserror::Error;

/// Errors produced by the upload engine's domain and application logic.
#[derive(Error, Debug, Clone)]
pub enum UploadError {
    /// Network / adapter failure on a single request. Retried per chunk
    /// with exponential backoff.
    #[error("transport error: {0}")]
    TransportError(String),

    /// File rejected before start (size/type). Surfaced by host-side
    /// pre-checks; not raised by the engine core itself.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Upload token invalid or expired. Handled identically to
    /// `TransportError` for retry purposes.
    #[error("token error: {0}")]
    TokenError(String),

    /// Hash compute/verify failed. Logged; upload continues without the
    /// instant-upload optimization. Never task-fatal.
    #[error("hash error: {0}")]
    HashError(String),

    /// Durable store unavailable or failed write. Logged; resume becomes
    /// unavailable for the affected task. Never task-fatal.
    #[error("storage error: {0}")]
    StorageError(String),

    /// A control operation (`start`/`pause`/`resume`/`cancel`) was called
    /// while the task was in a state that doesn't permit it.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Observed at a yield point after `cancel()`. Causes the in-flight
    /// phase to exit cleanly; never surfaced as an `error` event.
    #[error("cancelled: {0}")]
    Cancelled(String),
}

impl UploadError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::TransportError(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn token(msg: impl Into<String>) -> Self {
        Self::TokenError(msg.into())
    }

    pub fn hash(msg: impl Into<String>) -> Self {
        Self::HashError(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::StorageError(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Errors that a per-chunk retry loop should retry rather than give up
    /// on immediately. `TokenError` collapses into `TransportError`
    /// handling.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, UploadError::TransportError(_) | UploadError::TokenError(_))
    }

    pub fn category(&self) -> &'static str {
        match self {
            UploadError::TransportError(_) => "transport",
            UploadError::ValidationError(_) => "validation",
            UploadError::TokenError(_) => "token",
            UploadError::HashError(_) => "hash",
            UploadError::StorageError(_) => "storage",
            UploadError::InvalidState(_) => "invalid_state",
            UploadError::Cancelled(_) => "cancelled",
        }
    }
}

impl From<std::io::Error> for UploadError {
    fn from(err: std::io::Error) -> Self {
        UploadError::TransportError(err.to_string())
    }
}

impl From<serde_json::Error> for UploadError {
    fn from(err: serde_json::Error) -> Self {
        UploadError::StorageError(err.to_string())
    }
}
