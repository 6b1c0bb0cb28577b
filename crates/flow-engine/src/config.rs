//! Process configuration, loaded from the environment (`.env` via
//! `dotenvy`, then overridden by CLI flags at the binary's call site).
//! Grounded on `chem-persistence`'s `dotenvy::dotenv().ok()` +
//! `std::env::var` convention.
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct FlowForgeConfig {
    /// Root directory under which `logs/<flow>/<subflow>/task-NNNN-<id>/`
    /// artifact directories are allocated.
    pub logs_dir: PathBuf,
    /// `RUST_LOG`-style filter directive for `tracing-subscriber`.
    pub log_filter: String,
    /// Upper bound on concurrently running PARALLEL subtasks.
    pub max_parallel: usize,
}

impl Default for FlowForgeConfig {
    fn default() -> Self {
        Self { logs_dir: PathBuf::from("logs"), log_filter: "info".to_string(), max_parallel: 16 }
    }
}

impl FlowForgeConfig {
    /// Load `.env` (if present) then read overrides from the environment.
    /// Never fails: every field falls back to its default.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("FLOWFORGE_LOGS_DIR") {
            config.logs_dir = PathBuf::from(dir);
        }
        if let Ok(filter) = std::env::var("RUST_LOG") {
            config.log_filter = filter;
        }
        if let Ok(max) = std::env::var("FLOWFORGE_MAX_PARALLEL") {
            if let Ok(parsed) = max.parse() {
                config.max_parallel = parsed;
            }
        }

        config
    }
}
