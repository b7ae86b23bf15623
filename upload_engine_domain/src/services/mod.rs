pub mod chunk_hasher;
pub mod chunk_size_adjuster;
pub mod progress_store;
pub mod request_adapter;

pub use chunk_hasher::{ChunkHasher, HashStrategy, ProgressCallback};
pub use chunk_size_adjuster::{ChunkSizeAdjuster, SimpleAdjuster, TcpLikeAdjuster};
pub use progress_store::{DurableProgressStore, DurableRecord, RecordPatch};
pub use request_adapter::{
    CreateFileResponse, MergeFileResponse, RequestAdapter, UploadChunkResponse, VerifyHashResponse,
};
