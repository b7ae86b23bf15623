//! `FileDescriptor` over a real filesystem path. A stand-in for the
//! browser `File` object in host environments (CLI, server-side upload
//! relays, tests) where the source is a path on disk rather than a
//! user-selected blob.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};

use upload_engine_domain::error::UploadError;
use upload_engine_domain::value_objects::{FileDescriptor, FileInfo};

pub struct LocalFile {
    path: PathBuf,
    info: FileInfo,
}

impl LocalFile {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, UploadError> {
        let path = path.as_ref().to_path_buf();
        let metadata = tokio::fs::metadata(&path).await?;
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let file_type = mime_guess_from_extension(&path);
        let last_modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        Ok(Self { path, info: FileInfo { name, size: metadata.len(), file_type, last_modified } })
    }
}

/// No full MIME database here — a handful of extensions covers what the
/// engine's own tests exercise; anything else falls back to the generic
/// binary type, same as a browser would report for an unrecognized file.
fn mime_guess_from_extension(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some("txt") => "text/plain",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
    .to_string()
}

#[async_trait]
impl FileDescriptor for LocalFile {
    fn info(&self) -> FileInfo {
        self.info.clone()
    }

    async fn slice(&self, start: u64, end: u64) -> Result<Vec<u8>, UploadError> {
        let mut file = File::open(&self.path).await?;
        file.seek(SeekFrom::Start(start)).await?;
        let mut buf = vec![0u8; (end - start) as usize];
        file.read_exact(&mut buf).await?;
        Ok(buf)
    }
}
