//! The job façade: the only surface external callers touch.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::info;

use plpack_media::{fs::ensure_job_dir, MediaFetcher};
use plpack_models::{
    sanitize_title, DownloadOptions, JobId, JobSnapshot, JobStatus, OwnerKey, PlaylistEntry,
};

use crate::cleanup::{evict_job, evict_owner, CleanupScheduler};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::runner::{run_job, RunnerShared};
use crate::store::{NewJob, ProgressStore};

/// A ready-to-stream archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveDownload {
    /// Location of the assembled ZIP on disk
    pub path: PathBuf,
    /// Suggested download file name, derived from the playlist title
    pub file_name: String,
}

/// Job orchestration façade.
///
/// Owns the progress store and the global concurrency ceiling; spawns one
/// runner task per created job. Cheap to share behind an `Arc`.
pub struct JobEngine {
    config: EngineConfig,
    store: Arc<ProgressStore>,
    shared: Arc<RunnerShared>,
}

impl JobEngine {
    /// Create an engine over the given fetch collaborator.
    pub fn new(config: EngineConfig, fetcher: Arc<dyn MediaFetcher>) -> Self {
        let store = Arc::new(ProgressStore::new());
        let shared = Arc::new(RunnerShared {
            store: Arc::clone(&store),
            fetcher,
            global_slots: Arc::new(Semaphore::new(config.global_items)),
            per_job_items: config.per_job_items,
            item_timeout: config.item_timeout,
        });

        Self {
            config,
            store,
            shared,
        }
    }

    /// The engine's configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Build the cleanup scheduler for this engine's store.
    pub fn cleanup_scheduler(&self) -> CleanupScheduler {
        CleanupScheduler::new(Arc::clone(&self.store), &self.config)
    }

    /// Create a job and start processing its items.
    ///
    /// `selection` carries the previously loaded metadata of the selected
    /// playlist entries; resolving client-supplied indices against that
    /// metadata is the boundary layer's responsibility.
    pub async fn create_job(
        &self,
        owner: OwnerKey,
        source_url: String,
        playlist_title: String,
        selection: Vec<PlaylistEntry>,
        options: DownloadOptions,
    ) -> EngineResult<JobId> {
        if selection.is_empty() {
            return Err(EngineError::validation("no items selected"));
        }

        let mut seen = HashSet::new();
        for entry in &selection {
            if !seen.insert(entry.index) {
                return Err(EngineError::validation(format!(
                    "duplicate item index {}",
                    entry.index
                )));
            }
        }

        let job_id = JobId::new();
        let job_dir = ensure_job_dir(
            &self.config.download_root,
            owner.as_str(),
            job_id.as_str(),
        )
        .await?;

        let handle = self
            .store
            .create(NewJob {
                id: job_id,
                owner: owner.clone(),
                source_url,
                playlist_title,
                options,
                entries: selection,
                job_dir,
            })
            .await;

        let job_id = handle.id.clone();
        info!(
            job_id = %job_id,
            owner = %owner,
            items = handle.items.len(),
            format = %options.format,
            quality = %options.quality,
            "Created job"
        );

        tokio::spawn(run_job(Arc::clone(&self.shared), handle));
        Ok(job_id)
    }

    /// Snapshot a job's progress. Refreshes the idle clock.
    pub async fn progress(&self, id: &JobId) -> EngineResult<JobSnapshot> {
        self.store.touch(id).await;
        self.store.snapshot(id).await.ok_or(EngineError::NotFound)
    }

    /// Resolve the deliverable archive of a finished job.
    ///
    /// `NotReady` covers both a job still running and a job that ended in
    /// `Error`: neither has a deliverable, and an errored job never will.
    pub async fn archive(&self, id: &JobId) -> EngineResult<ArchiveDownload> {
        let snapshot = self
            .store
            .snapshot(id)
            .await
            .ok_or(EngineError::NotFound)?;
        self.store.touch(id).await;

        if snapshot.status != JobStatus::Finished {
            return Err(EngineError::NotReady);
        }
        let path = self
            .store
            .archive_path(id)
            .await
            .ok_or(EngineError::NotReady)?;

        Ok(ArchiveDownload {
            path,
            file_name: format!("{}.zip", sanitize_title(&snapshot.playlist_title)),
        })
    }

    /// Evict one job immediately. Returns `false` if it was already gone.
    pub async fn evict_job(&self, id: &JobId) -> bool {
        evict_job(&self.store, id, self.config.settle_timeout).await
    }

    /// Evict every job of one owner. Returns how many were evicted.
    pub async fn evict_owner(&self, owner: &OwnerKey) -> usize {
        evict_owner(&self.store, owner, self.config.settle_timeout).await
    }

    /// Number of live jobs; used by health reporting and tests.
    pub async fn job_count(&self) -> usize {
        self.store.job_count().await
    }
}
