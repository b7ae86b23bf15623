pub mod chunk_info;
pub mod file_descriptor;
pub mod upload_progress;
pub mod upload_status;
pub mod upload_token;

pub use chunk_info::{chunks_for_file, ChunkInfo};
pub use file_descriptor::{FileDescriptor, FileInfo};
pub use upload_progress::UploadProgress;
pub use upload_status::UploadStatus;
pub use upload_token::UploadToken;
