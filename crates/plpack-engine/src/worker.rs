//! Item worker: drives one item's fetch/convert step.
//!
//! A worker acquires a global I/O slot and a per-job slot before touching
//! the network, forwards coalesced progress into the store, and performs
//! exactly one terminal transition for its item. A failure stays inside
//! the worker; sibling items never see it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, warn};

use plpack_media::{
    channel, CancelFlag, FetchProgress, FetchRequest, MediaError, MediaFetcher,
};
use plpack_models::{DownloadOptions, JobId};

use crate::store::{ItemDescriptor, ItemUpdate, ProgressStore};

/// Everything one worker invocation needs.
pub(crate) struct ItemContext {
    pub store: Arc<ProgressStore>,
    pub fetcher: Arc<dyn MediaFetcher>,
    pub job_id: JobId,
    pub options: DownloadOptions,
    pub job_dir: PathBuf,
    /// Job-level cancellation flag; item-local aborts use a child flag
    pub cancel: CancelFlag,
    pub global_slots: Arc<Semaphore>,
    pub job_slots: Arc<Semaphore>,
    pub item_timeout: Duration,
}

/// Run one item to its terminal state.
pub(crate) async fn run_item(ctx: ItemContext, item: ItemDescriptor) {
    let ItemContext {
        store,
        fetcher,
        job_id,
        options,
        job_dir,
        cancel,
        global_slots,
        job_slots,
        item_timeout,
    } = ctx;

    // Wait for a global slot, then a per-job slot. Both are released on
    // every exit path when the permits drop.
    let _global = tokio::select! {
        permit = global_slots.acquire_owned() => match permit {
            Ok(p) => p,
            Err(_) => return,
        },
        _ = cancel.cancelled() => {
            fail(&store, &job_id, item.index, "cancelled").await;
            return;
        }
    };
    let _job = tokio::select! {
        permit = job_slots.acquire_owned() => match permit {
            Ok(p) => p,
            Err(_) => return,
        },
        _ = cancel.cancelled() => {
            fail(&store, &job_id, item.index, "cancelled").await;
            return;
        }
    };

    store
        .update_item(&job_id, item.index, ItemUpdate::Downloading { percent: 0 })
        .await;

    let (progress_tx, mut progress_rx) = channel();

    // Drain progress into the store, writing only when something moved.
    // The bounded channel plus this filter keeps store traffic decoupled
    // from however often the fetch engine reports.
    let drain = {
        let store = Arc::clone(&store);
        let job_id = job_id.clone();
        let index = item.index;
        tokio::spawn(async move {
            let mut last_percent = 0u8;
            while let Some(event) = progress_rx.recv().await {
                match event {
                    FetchProgress::Downloading { percent } => {
                        if percent > last_percent {
                            last_percent = percent;
                            store
                                .update_item(&job_id, index, ItemUpdate::Downloading { percent })
                                .await;
                        }
                    }
                    FetchProgress::Converting => {
                        store.update_item(&job_id, index, ItemUpdate::Converting).await;
                    }
                }
            }
        })
    };

    let request = FetchRequest {
        source_ref: item.source_ref.clone(),
        options,
        dest_dir: job_dir,
        file_stem: format!("{:03}", item.index),
    };

    // Item-local flag: a timeout aborts this fetch without touching
    // siblings; job-level cancellation propagates through the parent.
    let item_cancel = cancel.child();
    let mut fetch = Box::pin(fetcher.fetch(&request, progress_tx, item_cancel.clone()));

    let result = tokio::select! {
        result = &mut fetch => result,
        _ = tokio::time::sleep(item_timeout) => {
            item_cancel.cancel();
            Err(MediaError::Timeout(item_timeout.as_secs()))
        }
    };

    // Dropping the fetch future closes its progress sender, so the drain
    // task always terminates; flush it before the terminal transition.
    drop(fetch);
    let _ = drain.await;

    match result {
        Ok(output) => {
            debug!(job_id = %job_id, index = item.index, "Item fetched");
            store
                .update_item(&job_id, item.index, ItemUpdate::Done { output })
                .await;
        }
        Err(e) => {
            warn!(
                job_id = %job_id,
                index = item.index,
                "Item failed: {}", e
            );
            fail(&store, &job_id, item.index, classify(&e)).await;
        }
    }
}

async fn fail(store: &ProgressStore, job_id: &JobId, index: u32, error: &str) {
    store
        .update_item(
            job_id,
            index,
            ItemUpdate::Failed {
                error: error.to_string(),
            },
        )
        .await;
}

/// Short, user-facing classification of a fetch failure.
fn classify(error: &MediaError) -> &'static str {
    match error {
        MediaError::Cancelled => "cancelled",
        MediaError::Timeout(_) => "timed out",
        MediaError::YtDlpNotFound => "fetch engine unavailable",
        MediaError::DownloadFailed { .. } => "download failed",
        MediaError::OutputMissing(_) => "no output produced",
        MediaError::InvalidUrl(_) => "invalid source",
        MediaError::MetadataFailed { .. } => "source unavailable",
        MediaError::Io(_) => "io error",
        MediaError::JsonParse(_) => "source unavailable",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_is_short_and_stable() {
        assert_eq!(classify(&MediaError::Cancelled), "cancelled");
        assert_eq!(classify(&MediaError::Timeout(900)), "timed out");
        assert_eq!(
            classify(&MediaError::download_failed("yt-dlp exited with 1")),
            "download failed"
        );
        assert_eq!(
            classify(&MediaError::OutputMissing(PathBuf::from("/tmp"))),
            "no output produced"
        );
    }
}
