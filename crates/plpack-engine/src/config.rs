//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root directory for per-job artifact directories
    pub download_root: PathBuf,
    /// Maximum concurrent item fetches within one job
    pub per_job_items: usize,
    /// Maximum concurrent item fetches across all jobs
    pub global_items: usize,
    /// Wall-clock ceiling for a single item fetch
    pub item_timeout: Duration,
    /// Idle threshold after which a job is swept
    pub idle_ttl: Duration,
    /// Interval between idle sweeps
    pub sweep_interval: Duration,
    /// How long eviction waits for a running job's workers to settle
    /// before deleting its files
    pub settle_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            download_root: PathBuf::from("downloads"),
            per_job_items: 3,
            global_items: 12,
            item_timeout: Duration::from_secs(900), // 15 minutes
            idle_ttl: Duration::from_secs(3 * 60 * 60), // 3 hours
            sweep_interval: Duration::from_secs(300), // 5 minutes
            settle_timeout: Duration::from_secs(30),
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            download_root: std::env::var("PLPACK_DOWNLOAD_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.download_root),
            per_job_items: env_parse("PLPACK_PER_JOB_ITEMS", defaults.per_job_items),
            global_items: env_parse("PLPACK_GLOBAL_ITEMS", defaults.global_items),
            item_timeout: Duration::from_secs(env_parse(
                "PLPACK_ITEM_TIMEOUT_SECS",
                defaults.item_timeout.as_secs(),
            )),
            idle_ttl: Duration::from_secs(env_parse(
                "PLPACK_IDLE_TTL_SECS",
                defaults.idle_ttl.as_secs(),
            )),
            sweep_interval: Duration::from_secs(env_parse(
                "PLPACK_SWEEP_INTERVAL_SECS",
                defaults.sweep_interval.as_secs(),
            )),
            settle_timeout: Duration::from_secs(env_parse(
                "PLPACK_SETTLE_TIMEOUT_SECS",
                defaults.settle_timeout.as_secs(),
            )),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
