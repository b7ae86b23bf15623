//! Command-line surface for the demo host binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "upload-engine-demo", version, about = "Drives the upload engine against a mock or local server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to a SQLite database for durable progress tracking. When
    /// omitted, progress is kept in memory only and does not survive a
    /// restart.
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    /// Maximum number of tasks the manager runs concurrently. Overrides
    /// both the built-in default and anything set via `--config` or
    /// `UPLOAD_ENGINE_MAX_CONCURRENT_TASKS`.
    #[arg(long, global = true)]
    pub max_concurrent_tasks: Option<usize>,

    /// Optional config file (TOML/YAML/JSON, inferred from extension)
    /// layered under environment-variable and built-in defaults.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload a single file end to end and print the resulting status.
    Upload {
        /// Path to the file to upload.
        file: PathBuf,

        /// Per-task concurrent chunk uploads.
        #[arg(long, default_value_t = 3)]
        concurrency: usize,
    },

    /// List durable records left behind by unfinished tasks.
    ListUnfinished,
}
