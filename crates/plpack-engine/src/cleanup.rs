//! Eviction paths and the background cleanup scheduler.
//!
//! Both eviction paths (idle sweep and explicit owner teardown) converge
//! here: request cancellation, give in-flight workers a bounded window to
//! settle, drop the store record, then delete the job's directory. The
//! ordering guarantees no file is deleted mid-write.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{info, warn};

use plpack_media::fs::remove_dir_best_effort;
use plpack_models::{JobId, OwnerKey};

use crate::config::EngineConfig;
use crate::store::ProgressStore;

/// Evict one job: cancel, wait for settlement, remove record and files.
///
/// Idempotent; returns `false` when the job was already gone.
pub(crate) async fn evict_job(
    store: &ProgressStore,
    id: &JobId,
    settle_timeout: Duration,
) -> bool {
    // `evict` removes the record (pollers see NotFound from here on) and
    // flips the job's cancellation flag.
    let Some(evicted) = store.evict(id).await else {
        return false;
    };

    if evicted.was_running {
        let mut settled = evicted.settled;
        let waited = tokio::time::timeout(settle_timeout, async {
            while !*settled.borrow() {
                if settled.changed().await.is_err() {
                    break;
                }
            }
        })
        .await;

        if waited.is_err() {
            warn!(
                job_id = %id,
                timeout_secs = settle_timeout.as_secs(),
                "Workers did not settle before timeout; removing files anyway"
            );
        }
    }

    remove_dir_best_effort(&evicted.job_dir).await;
    info!(job_id = %id, "Evicted job and its artifacts");
    true
}

/// Evict every job belonging to one owner. Returns how many were evicted.
pub(crate) async fn evict_owner(
    store: &ProgressStore,
    owner: &OwnerKey,
    settle_timeout: Duration,
) -> usize {
    let ids = store.owned_by(owner).await;
    let mut evicted = 0;
    for id in &ids {
        if evict_job(store, id, settle_timeout).await {
            evicted += 1;
        }
    }
    if evicted > 0 {
        info!(owner = %owner, evicted, "Evicted owner's jobs");
    }
    evicted
}

/// Background service sweeping idle jobs out of the store.
pub struct CleanupScheduler {
    store: Arc<ProgressStore>,
    idle_ttl: Duration,
    sweep_interval: Duration,
    settle_timeout: Duration,
    enabled: bool,
}

impl CleanupScheduler {
    /// Create a scheduler over the given store.
    pub fn new(store: Arc<ProgressStore>, config: &EngineConfig) -> Self {
        let enabled = std::env::var("PLPACK_IDLE_SWEEP")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        Self {
            store,
            idle_ttl: config.idle_ttl,
            sweep_interval: config.sweep_interval,
            settle_timeout: config.settle_timeout,
            enabled,
        }
    }

    /// Run the sweep loop indefinitely. Spawn as a background task.
    pub async fn run(&self) {
        if !self.enabled {
            info!("Idle sweep is disabled");
            return;
        }

        info!(
            interval_secs = self.sweep_interval.as_secs(),
            idle_ttl_secs = self.idle_ttl.as_secs(),
            "Starting cleanup scheduler"
        );

        let mut ticker = interval(self.sweep_interval);
        // The first tick fires immediately; skip it so a restart does not
        // race jobs created moments before.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            self.sweep_once().await;
        }
    }

    /// Run a single sweep cycle. Returns the number of evicted jobs.
    pub async fn sweep_once(&self) -> usize {
        let idle = self.store.idle_jobs(self.idle_ttl).await;
        if idle.is_empty() {
            return 0;
        }

        let mut evicted = 0;
        for id in &idle {
            if evict_job(&self.store, id, self.settle_timeout).await {
                evicted += 1;
            }
        }

        info!(evicted, "Idle sweep complete");
        evicted
    }
}
