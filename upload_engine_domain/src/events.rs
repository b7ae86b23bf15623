//! # Event Bus
//!
//! A typed topic→handler registry firing synchronously on the caller's
//! execution context. Topics are a fixed, known-in-advance set, but
//! handlers are registered dynamically rather than wired at compile time —
//! each topic still gets its own typed payload, and a handler's panic can
//! never block delivery to the handlers after it.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

/// One of the recognized lifecycle topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Start,
    Progress,
    ChunkSuccess,
    ChunkError,
    HashProgress,
    HashComplete,
    Success,
    Error,
    Pause,
    Resume,
    Cancel,
}

/// The payload delivered for a given topic.
#[derive(Debug, Clone)]
pub enum Payload {
    Start { task_id: String, file_name: String, file_size: u64 },
    Progress { task_id: String, percentage: f64, speed: f64 },
    ChunkSuccess { task_id: String, chunk_index: usize },
    ChunkError { task_id: String, chunk_index: usize, error: String },
    HashProgress { task_id: String, percentage: f64 },
    HashComplete { task_id: String, hash: String },
    Success { task_id: String, file_url: String },
    Error { task_id: String, error: String },
    StateOnly { task_id: String },
}

pub type Handler = Arc<dyn Fn(&Payload) + Send + Sync>;

/// Typed publish/subscribe for task lifecycle signals.
///
/// Not shared across tasks: each `UploadTask` owns exactly one.
#[derive(Default, Clone)]
pub struct EventBus {
    handlers: Arc<Mutex<HashMap<Topic, Vec<(u64, Handler)>>>>,
    next_id: Arc<Mutex<u64>>,
}

/// Opaque handle returned by `on`, used to unsubscribe via `off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription(Topic, u64);

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, topic: Topic, handler: Handler) -> Subscription {
        let mut next_id = self.next_id.lock();
        let id = *next_id;
        *next_id += 1;
        self.handlers.lock().entry(topic).or_default().push((id, handler));
        Subscription(topic, id)
    }

    pub fn off(&self, subscription: Subscription) {
        if let Some(list) = self.handlers.lock().get_mut(&subscription.0) {
            list.retain(|(id, _)| *id != subscription.1);
        }
    }

    pub fn clear(&self) {
        self.handlers.lock().clear();
    }

    /// Fires synchronously on the caller's execution context. A handler
    /// that panics is caught and logged; it never prevents the remaining
    /// handlers for this topic from running.
    pub fn emit(&self, topic: Topic, payload: Payload) {
        let handlers = self.handlers.lock().get(&topic).cloned().unwrap_or_default();
        for (_, handler) in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(&payload))).is_err() {
                tracing::warn!(?topic, "event handler panicked; continuing delivery to remaining handlers");
            }
        }
    }
}
