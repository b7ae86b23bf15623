//! Task orchestration and infrastructure adapters for the resumable,
//! deduplicating chunked upload engine. Pairs with `upload-engine-domain`,
//! which hosts the value objects, event bus, chunk-size adjuster, error
//! taxonomy, and port traits this crate implements and drives.

pub mod infrastructure;
pub mod manager;
pub mod runtime;
pub mod task;

pub use manager::{TaskStatistics, UploadManager};
pub use task::{UploadTask, UploadTaskConfig};

pub use upload_engine_domain::config::EngineConfig;
pub use upload_engine_domain::error::UploadError;
pub use upload_engine_domain::events::{Handler, Payload, Subscription, Topic};
pub use upload_engine_domain::value_objects::{ChunkInfo, FileDescriptor, FileInfo, UploadProgress, UploadStatus, UploadToken};
