//! Job runner: fan-out, settlement and the terminal decision.
//!
//! One runner task exists per job. It owns the job's status transition
//! exclusively: no other component ever moves a job out of `Running`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

use plpack_media::MediaFetcher;
use plpack_models::JobStatus;

use crate::archive;
use crate::store::{ItemUpdate, JobHandle, ProgressStore};
use crate::worker::{run_item, ItemContext};

/// State shared by every runner spawned from one engine.
pub(crate) struct RunnerShared {
    pub store: Arc<ProgressStore>,
    pub fetcher: Arc<dyn MediaFetcher>,
    /// Counting resource shared by all jobs; a worker holds a permit for
    /// the whole duration of its I/O
    pub global_slots: Arc<Semaphore>,
    pub per_job_items: usize,
    pub item_timeout: Duration,
}

/// Run a job to its terminal state.
///
/// All items are attempted to completion or failure; there is no
/// "give up after N failures". The job finishes successfully when at
/// least one item produced a file and the archive could be assembled.
pub(crate) async fn run_job(shared: Arc<RunnerShared>, handle: JobHandle) {
    let store = Arc::clone(&shared.store);
    let job_id = handle.id.clone();
    let total_items = handle.items.len();

    for item in &handle.items {
        store.update_item(&job_id, item.index, ItemUpdate::Queued).await;
    }

    let job_slots = Arc::new(Semaphore::new(shared.per_job_items));
    let mut workers = JoinSet::new();

    for item in handle.items {
        let ctx = ItemContext {
            store: Arc::clone(&store),
            fetcher: Arc::clone(&shared.fetcher),
            job_id: job_id.clone(),
            options: handle.options,
            job_dir: handle.job_dir.clone(),
            cancel: handle.cancel.clone(),
            global_slots: Arc::clone(&shared.global_slots),
            job_slots: Arc::clone(&job_slots),
            item_timeout: shared.item_timeout,
        };
        workers.spawn(run_item(ctx, item));
    }

    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            // A panicking worker has already lost its item; the job keeps
            // going for the siblings.
            error!(job_id = %job_id, "Item worker task failed: {}", e);
        }
    }

    if handle.cancel.is_cancelled() {
        info!(job_id = %job_id, "Job cancelled before settlement");
        let _ = handle.settled.send(true);
        return;
    }

    let outputs = store.successful_outputs(&job_id).await;
    let succeeded = outputs.len();

    if outputs.is_empty() {
        store
            .set_job_status(
                &job_id,
                JobStatus::Error,
                Some(format!("all {} items failed", total_items)),
            )
            .await;
        info!(job_id = %job_id, "Job failed: no item succeeded");
    } else {
        match archive::assemble(&handle.job_dir, &outputs).await {
            Ok(archive_path) => {
                store.set_archive_path(&job_id, archive_path).await;
                store.set_job_status(&job_id, JobStatus::Finished, None).await;
                info!(
                    job_id = %job_id,
                    succeeded,
                    failed = total_items - succeeded,
                    "Job finished"
                );
            }
            Err(e) => {
                // Items succeeded but the deliverable cannot be produced
                store
                    .set_job_status(&job_id, JobStatus::Error, Some(e.to_string()))
                    .await;
                error!(job_id = %job_id, "Archive assembly failed: {}", e);
            }
        }
    }

    let _ = handle.settled.send(true);
}
