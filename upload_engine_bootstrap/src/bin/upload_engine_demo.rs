//! Composition root: wires the engine's domain ports to concrete
//! infrastructure adapters and drives a single CLI-requested operation.
//!
//! Uses `MockRequestAdapter` in place of a real server — there is no
//! network transport in this workspace, only the contract a real one would
//! satisfy. Swapping in an HTTP-backed `RequestAdapter` is the only change
//! needed to point this at an actual upload endpoint.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use upload_engine::infrastructure::adapter::MockRequestAdapter;
use upload_engine::infrastructure::file::LocalFile;
use upload_engine::infrastructure::hashing::Md5ChunkHasher;
use upload_engine::infrastructure::storage::{InMemoryProgressStore, SqliteProgressStore};
use upload_engine::{EngineConfig, FileDescriptor, Payload, Topic, UploadManager};
use upload_engine_domain::services::DurableProgressStore;

use upload_engine_bootstrap::logger::init_tracing;
use upload_engine_bootstrap::{load_engine_config, Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let store: Arc<dyn DurableProgressStore> = match &cli.db_path {
        Some(path) => Arc::new(SqliteProgressStore::connect(path).await?),
        None => Arc::new(InMemoryProgressStore::new()),
    };
    store.init().await?;

    let mut config: EngineConfig = load_engine_config(cli.config.as_deref())?;
    if let Some(max_concurrent_tasks) = cli.max_concurrent_tasks {
        config.max_concurrent_tasks = max_concurrent_tasks;
    }
    let manager = UploadManager::new(Arc::new(MockRequestAdapter::new()), Arc::new(Md5ChunkHasher::new()), store, config);

    match cli.command {
        Command::Upload { file, concurrency } => upload(&manager, file, concurrency).await,
        Command::ListUnfinished => list_unfinished(&manager).await,
    }
}

async fn upload(manager: &UploadManager, file: std::path::PathBuf, concurrency: usize) -> anyhow::Result<()> {
    let local_file = LocalFile::open(&file).await?;
    let descriptor: Arc<dyn FileDescriptor> = Arc::new(local_file);
    let task = manager.create_task(descriptor);

    task.on(Topic::Progress, Arc::new(|payload: &Payload| {
        if let Payload::Progress { percentage, speed, .. } = payload {
            tracing::info!("progress: {:.1}% ({:.0} bytes/sec)", percentage, speed);
        }
    }));
    task.on(Topic::ChunkError, Arc::new(|payload: &Payload| {
        if let Payload::ChunkError { chunk_index, error, .. } = payload {
            tracing::warn!("chunk {chunk_index} failed: {error}");
        }
    }));
    task.on(Topic::Success, Arc::new(|payload: &Payload| {
        if let Payload::Success { file_url, .. } = payload {
            tracing::info!("upload complete: {file_url}");
        }
    }));

    let _ = concurrency; // negotiated per-task chunk size/concurrency come from EngineConfig; exposed here for future per-call overrides.
    manager.start_task(task.task_id()).await?;

    println!("status: {:?}", task.status());
    Ok(())
}

async fn list_unfinished(manager: &UploadManager) -> anyhow::Result<()> {
    let records = manager.list_unfinished().await?;
    if records.is_empty() {
        println!("no unfinished uploads");
        return Ok(());
    }
    for record in records {
        println!("{}  {} ({} chunks uploaded)", record.task_id, record.file_info.name, record.uploaded_chunks.len());
    }
    Ok(())
}
