//! Domain layer for the resumable, deduplicating chunked upload engine:
//! value objects, the event bus, the chunk-size adjuster, engine
//! configuration defaults, and the port traits (durable store, hasher,
//! request adapter) that `upload_engine`'s infrastructure implements.

pub mod config;
pub mod error;
pub mod events;
pub mod services;
pub mod value_objects;

pub use config::EngineConfig;
pub use error::UploadError;
