//! Layered configuration loading: built-in defaults, optionally overridden
//! by a config file and then by `UPLOAD_ENGINE_*` environment variables.
//! `EngineConfig` itself stays a plain domain struct with no knowledge of
//! `config`/`serde` — this module is the only place that format lives,
//! keeping the domain config type and the loader that populates it apart.

use serde::Deserialize;
use upload_engine_domain::EngineConfig;

/// Serde mirror of `EngineConfig`. Every field is optional so a partial
/// config file only overrides what it names; anything absent falls back to
/// `EngineConfig::default()`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EngineConfigOverrides {
    max_concurrent_tasks: Option<usize>,
    default_chunk_size: Option<u64>,
    default_concurrency: Option<usize>,
    auto_resume_unfinished: Option<bool>,
    retry_count: Option<u32>,
    retry_delay_ms: Option<u64>,
    min_chunk_size: Option<u64>,
    max_chunk_size: Option<u64>,
    target_chunk_time_ms: Option<u64>,
    ssthresh: Option<u64>,
    priority_chunk_count: Option<usize>,
}

impl EngineConfigOverrides {
    fn apply(self, mut base: EngineConfig) -> EngineConfig {
        if let Some(v) = self.max_concurrent_tasks {
            base.max_concurrent_tasks = v;
        }
        if let Some(v) = self.default_chunk_size {
            base.default_chunk_size = v;
        }
        if let Some(v) = self.default_concurrency {
            base.default_concurrency = v;
        }
        if let Some(v) = self.auto_resume_unfinished {
            base.auto_resume_unfinished = v;
        }
        if let Some(v) = self.retry_count {
            base.retry_count = v;
        }
        if let Some(v) = self.retry_delay_ms {
            base.retry_delay_ms = v;
        }
        if let Some(v) = self.min_chunk_size {
            base.min_chunk_size = v;
        }
        if let Some(v) = self.max_chunk_size {
            base.max_chunk_size = v;
        }
        if let Some(v) = self.target_chunk_time_ms {
            base.target_chunk_time_ms = v;
        }
        if let Some(v) = self.ssthresh {
            base.ssthresh = v;
        }
        if let Some(v) = self.priority_chunk_count {
            base.priority_chunk_count = v;
        }
        base
    }
}

/// Loads `EngineConfig` from defaults, an optional config file (TOML/YAML/JSON,
/// format inferred from extension), and `UPLOAD_ENGINE_*` environment
/// variables, in that increasing order of precedence.
pub fn load_engine_config(config_file: Option<&std::path::Path>) -> anyhow::Result<EngineConfig> {
    let mut builder = config::Config::builder();
    if let Some(path) = config_file {
        builder = builder.add_source(config::File::from(path));
    }
    builder = builder.add_source(config::Environment::with_prefix("UPLOAD_ENGINE").try_parsing(true));

    let settings = builder.build()?;
    let overrides: EngineConfigOverrides = settings.try_deserialize().unwrap_or_default();
    Ok(overrides.apply(EngineConfig::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_file_and_env_yields_defaults() {
        let config = load_engine_config(None).unwrap();
        assert_eq!(config.max_concurrent_tasks, EngineConfig::default().max_concurrent_tasks);
    }

    #[test]
    fn env_override_takes_precedence_over_defaults() {
        std::env::set_var("UPLOAD_ENGINE_MAX_CONCURRENT_TASKS", "7");
        let config = load_engine_config(None).unwrap();
        std::env::remove_var("UPLOAD_ENGINE_MAX_CONCURRENT_TASKS");
        assert_eq!(config.max_concurrent_tasks, 7);
    }
}
