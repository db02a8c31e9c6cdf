//! In-memory progress store.
//!
//! Single source of truth for job state, read by pollers and written by
//! item workers. The table is a map of independently locked records: the
//! outer `RwLock` guards membership only, so updates to different jobs
//! (and snapshot reads of other jobs) never contend on one global lock.
//! No I/O ever happens under either lock.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex, RwLock};
use tracing::debug;

use plpack_media::CancelFlag;
use plpack_models::{
    DownloadOptions, ItemSnapshot, ItemStatus, JobId, JobSnapshot, JobStatus, OwnerKey,
    PlaylistEntry,
};

use std::sync::Arc;

/// Inputs for creating a job record.
#[derive(Debug)]
pub struct NewJob {
    /// Pre-generated id; also names the job directory
    pub id: JobId,
    pub owner: OwnerKey,
    pub source_url: String,
    pub playlist_title: String,
    pub options: DownloadOptions,
    /// Selected playlist entries; order does not matter, items are kept
    /// sorted by playlist index
    pub entries: Vec<PlaylistEntry>,
    /// Job-owned artifact directory
    pub job_dir: PathBuf,
}

/// One item's mutable state inside a record.
#[derive(Debug)]
struct ItemRecord {
    index: u32,
    title: String,
    thumbnail_url: Option<String>,
    status: ItemStatus,
    progress_percent: u8,
    error: Option<String>,
    /// Result slot filled on success, consumed by archive assembly
    output: Option<PathBuf>,
}

/// A job's full mutable state. Owned exclusively by the store.
#[derive(Debug)]
struct JobRecord {
    id: JobId,
    owner: OwnerKey,
    playlist_title: String,
    options: DownloadOptions,
    status: JobStatus,
    error: Option<String>,
    items: Vec<ItemRecord>,
    archive_path: Option<PathBuf>,
    job_dir: PathBuf,
    created_at: DateTime<Utc>,
    last_accessed: Instant,
    cancel: CancelFlag,
    settled_rx: watch::Receiver<bool>,
}

/// Mutation applied to one item.
///
/// Terminal items ignore every further update, and download percent only
/// ever moves forward, so pollers observe non-decreasing progress no
/// matter how updates interleave.
#[derive(Debug, Clone)]
pub enum ItemUpdate {
    Queued,
    Downloading { percent: u8 },
    Converting,
    Done { output: PathBuf },
    Failed { error: String },
}

/// Everything eviction needs after a record has been removed.
#[derive(Debug)]
pub struct EvictedJob {
    pub id: JobId,
    pub job_dir: PathBuf,
    /// Whether workers may still be in flight
    pub was_running: bool,
    /// Resolves to `true` once the job runner has fully settled
    pub settled: watch::Receiver<bool>,
}

/// Context handed to the job runner at creation time.
#[derive(Debug)]
pub(crate) struct JobHandle {
    pub id: JobId,
    pub job_dir: PathBuf,
    pub options: DownloadOptions,
    pub cancel: CancelFlag,
    pub settled: watch::Sender<bool>,
    pub items: Vec<ItemDescriptor>,
}

/// Immutable item facts the worker needs.
#[derive(Debug, Clone)]
pub(crate) struct ItemDescriptor {
    pub index: u32,
    pub source_ref: String,
}

/// Successful item output handed to the archive assembler.
#[derive(Debug, Clone)]
pub struct ItemOutput {
    pub index: u32,
    pub title: String,
    pub path: PathBuf,
}

/// Thread-safe mapping from job id to job state.
#[derive(Debug, Default)]
pub struct ProgressStore {
    jobs: RwLock<HashMap<JobId, Arc<Mutex<JobRecord>>>>,
}

impl ProgressStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new job in `Running` state and return the runner's handle.
    pub(crate) async fn create(&self, new_job: NewJob) -> JobHandle {
        let id = new_job.id.clone();
        let cancel = CancelFlag::new();
        let (settled_tx, settled_rx) = watch::channel(false);

        let mut entries = new_job.entries;
        entries.sort_by_key(|e| e.index);

        let items: Vec<ItemRecord> = entries
            .iter()
            .map(|e| ItemRecord {
                index: e.index,
                title: e.title.clone(),
                thumbnail_url: e.thumbnail_url.clone(),
                status: ItemStatus::Idle,
                progress_percent: 0,
                error: None,
                output: None,
            })
            .collect();

        let descriptors: Vec<ItemDescriptor> = entries
            .iter()
            .map(|e| ItemDescriptor {
                index: e.index,
                source_ref: e.source_ref.clone(),
            })
            .collect();

        let record = JobRecord {
            id: id.clone(),
            owner: new_job.owner,
            playlist_title: new_job.playlist_title,
            options: new_job.options,
            status: JobStatus::Running,
            error: None,
            items,
            archive_path: None,
            job_dir: new_job.job_dir.clone(),
            created_at: Utc::now(),
            last_accessed: Instant::now(),
            cancel: cancel.clone(),
            settled_rx,
        };

        let record_count = record.items.len();
        self.jobs
            .write()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(record)));

        debug!(
            job_id = %id,
            source_url = new_job.source_url.as_str(),
            items = record_count,
            "Created job record"
        );

        JobHandle {
            id,
            job_dir: new_job.job_dir,
            options: new_job.options,
            cancel,
            settled: settled_tx,
            items: descriptors,
        }
    }

    /// Take an owned, self-consistent snapshot of a job.
    pub async fn snapshot(&self, id: &JobId) -> Option<JobSnapshot> {
        let record = self.record(id).await?;
        let record = record.lock().await;

        Some(JobSnapshot {
            job_id: record.id.clone(),
            status: record.status,
            options: record.options,
            playlist_title: record.playlist_title.clone(),
            items: record
                .items
                .iter()
                .map(|i| ItemSnapshot {
                    index: i.index,
                    title: i.title.clone(),
                    thumbnail_url: i.thumbnail_url.clone(),
                    status: i.status,
                    progress_percent: i.progress_percent,
                    error: i.error.clone(),
                })
                .collect(),
            error: record.error.clone(),
            archive_ready: record.archive_path.is_some(),
            created_at: record.created_at,
        })
    }

    /// Refresh a job's last-access time.
    pub async fn touch(&self, id: &JobId) {
        if let Some(record) = self.record(id).await {
            record.lock().await.last_accessed = Instant::now();
        }
    }

    /// Apply an update to one item.
    ///
    /// Returns `false` when the update was dropped: unknown job or index,
    /// item already terminal, or a stale percent.
    pub async fn update_item(&self, id: &JobId, index: u32, update: ItemUpdate) -> bool {
        let Some(record) = self.record(id).await else {
            return false;
        };
        let mut record = record.lock().await;
        let Some(item) = record.items.iter_mut().find(|i| i.index == index) else {
            return false;
        };

        if item.status.is_terminal() {
            return false;
        }

        match update {
            ItemUpdate::Queued => {
                item.status = ItemStatus::Queued;
            }
            ItemUpdate::Downloading { percent } => {
                if percent < item.progress_percent {
                    return false;
                }
                item.progress_percent = percent.min(100);
                // A late download event never demotes a converting item
                if item.status != ItemStatus::Converting {
                    item.status = ItemStatus::Downloading;
                }
            }
            ItemUpdate::Converting => {
                item.status = ItemStatus::Converting;
            }
            ItemUpdate::Done { output } => {
                item.status = ItemStatus::Done;
                item.progress_percent = 100;
                item.output = Some(output);
            }
            ItemUpdate::Failed { error } => {
                item.status = ItemStatus::Failed;
                item.error = Some(error);
            }
        }
        true
    }

    /// Transition the job's terminal status. Job Runner only.
    ///
    /// A job that already reached a terminal state keeps it; the
    /// transition is monotonic.
    pub async fn set_job_status(
        &self,
        id: &JobId,
        status: JobStatus,
        error: Option<String>,
    ) -> bool {
        let Some(record) = self.record(id).await else {
            return false;
        };
        let mut record = record.lock().await;
        if record.status.is_terminal() {
            return false;
        }
        record.status = status;
        record.error = error;
        true
    }

    /// Record the assembled archive's location.
    pub async fn set_archive_path(&self, id: &JobId, path: PathBuf) {
        if let Some(record) = self.record(id).await {
            record.lock().await.archive_path = Some(path);
        }
    }

    /// Location of the assembled archive, if any.
    pub async fn archive_path(&self, id: &JobId) -> Option<PathBuf> {
        let record = self.record(id).await?;
        let record = record.lock().await;
        record.archive_path.clone()
    }

    /// Outputs of all items that reached `Done`, ordered by index.
    pub async fn successful_outputs(&self, id: &JobId) -> Vec<ItemOutput> {
        let Some(record) = self.record(id).await else {
            return Vec::new();
        };
        let record = record.lock().await;
        record
            .items
            .iter()
            .filter(|i| i.status == ItemStatus::Done)
            .filter_map(|i| {
                i.output.as_ref().map(|path| ItemOutput {
                    index: i.index,
                    title: i.title.clone(),
                    path: path.clone(),
                })
            })
            .collect()
    }

    /// Remove a job record, requesting cancellation of in-flight workers.
    ///
    /// Idempotent: evicting an unknown id returns `None`. The caller is
    /// responsible for waiting on `settled` (bounded) before deleting the
    /// job directory, so no file is removed mid-write.
    pub async fn evict(&self, id: &JobId) -> Option<EvictedJob> {
        let record = self.jobs.write().await.remove(id)?;
        let record = record.lock().await;
        record.cancel.cancel();

        debug!(job_id = %id, "Evicted job record");

        Some(EvictedJob {
            id: record.id.clone(),
            job_dir: record.job_dir.clone(),
            was_running: record.status == JobStatus::Running,
            settled: record.settled_rx.clone(),
        })
    }

    /// Ids of all jobs belonging to one owner.
    pub async fn owned_by(&self, owner: &OwnerKey) -> Vec<JobId> {
        let jobs = self.jobs.read().await;
        let mut out = Vec::new();
        for (id, record) in jobs.iter() {
            if record.lock().await.owner == *owner {
                out.push(id.clone());
            }
        }
        out
    }

    /// Ids of all jobs idle for longer than `ttl`.
    pub async fn idle_jobs(&self, ttl: Duration) -> Vec<JobId> {
        let jobs = self.jobs.read().await;
        let mut out = Vec::new();
        for (id, record) in jobs.iter() {
            if record.lock().await.last_accessed.elapsed() > ttl {
                out.push(id.clone());
            }
        }
        out
    }

    /// Number of live job records.
    pub async fn job_count(&self) -> usize {
        self.jobs.read().await.len()
    }

    async fn record(&self, id: &JobId) -> Option<Arc<Mutex<JobRecord>>> {
        self.jobs.read().await.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plpack_models::{MediaFormat, Quality};

    fn entry(index: u32, title: &str) -> PlaylistEntry {
        PlaylistEntry {
            index,
            source_ref: format!("https://www.youtube.com/watch?v=vid{:08}", index),
            title: title.to_string(),
            thumbnail_url: None,
        }
    }

    async fn seed(store: &ProgressStore) -> JobHandle {
        store
            .create(NewJob {
                id: JobId::new(),
                owner: OwnerKey::from_string("client1"),
                source_url: "https://www.youtube.com/playlist?list=PLx".to_string(),
                playlist_title: "Mix".to_string(),
                options: DownloadOptions {
                    format: MediaFormat::Mp4,
                    quality: Quality::High,
                },
                entries: vec![entry(2, "Second"), entry(5, "Fifth")],
                job_dir: PathBuf::from("/tmp/plpack-test/job"),
            })
            .await
    }

    #[tokio::test]
    async fn test_items_sorted_by_index() {
        let store = ProgressStore::new();
        let handle = seed(&store).await;
        let snap = store.snapshot(&handle.id).await.unwrap();
        assert_eq!(
            snap.items.iter().map(|i| i.index).collect::<Vec<_>>(),
            vec![2, 5]
        );
        assert!(snap.items.iter().all(|i| i.status == ItemStatus::Idle));
    }

    #[tokio::test]
    async fn test_progress_is_monotonic() {
        let store = ProgressStore::new();
        let handle = seed(&store).await;

        assert!(
            store
                .update_item(&handle.id, 2, ItemUpdate::Downloading { percent: 40 })
                .await
        );
        // A stale, lower percent is dropped
        assert!(
            !store
                .update_item(&handle.id, 2, ItemUpdate::Downloading { percent: 10 })
                .await
        );

        let snap = store.snapshot(&handle.id).await.unwrap();
        assert_eq!(snap.items[0].progress_percent, 40);
    }

    #[tokio::test]
    async fn test_terminal_item_is_frozen() {
        let store = ProgressStore::new();
        let handle = seed(&store).await;

        store
            .update_item(
                &handle.id,
                2,
                ItemUpdate::Failed {
                    error: "download failed".to_string(),
                },
            )
            .await;

        assert!(
            !store
                .update_item(&handle.id, 2, ItemUpdate::Downloading { percent: 99 })
                .await
        );
        assert!(
            !store
                .update_item(
                    &handle.id,
                    2,
                    ItemUpdate::Done {
                        output: PathBuf::from("/tmp/x.mp4")
                    }
                )
                .await
        );

        let snap = store.snapshot(&handle.id).await.unwrap();
        assert_eq!(snap.items[0].status, ItemStatus::Failed);
        assert_eq!(snap.items[0].error.as_deref(), Some("download failed"));
    }

    #[tokio::test]
    async fn test_late_download_event_keeps_converting() {
        let store = ProgressStore::new();
        let handle = seed(&store).await;

        store
            .update_item(&handle.id, 2, ItemUpdate::Downloading { percent: 100 })
            .await;
        store.update_item(&handle.id, 2, ItemUpdate::Converting).await;
        store
            .update_item(&handle.id, 2, ItemUpdate::Downloading { percent: 100 })
            .await;

        let snap = store.snapshot(&handle.id).await.unwrap();
        assert_eq!(snap.items[0].status, ItemStatus::Converting);
    }

    #[tokio::test]
    async fn test_job_status_is_monotonic() {
        let store = ProgressStore::new();
        let handle = seed(&store).await;

        assert!(
            store
                .set_job_status(&handle.id, JobStatus::Finished, None)
                .await
        );
        // Terminal status never reverses
        assert!(
            !store
                .set_job_status(&handle.id, JobStatus::Error, Some("late".into()))
                .await
        );

        let snap = store.snapshot(&handle.id).await.unwrap();
        assert_eq!(snap.status, JobStatus::Finished);
        assert!(snap.error.is_none());
    }

    #[tokio::test]
    async fn test_successful_outputs_skips_failures() {
        let store = ProgressStore::new();
        let handle = seed(&store).await;

        store
            .update_item(
                &handle.id,
                2,
                ItemUpdate::Done {
                    output: PathBuf::from("/tmp/002.mp4"),
                },
            )
            .await;
        store
            .update_item(
                &handle.id,
                5,
                ItemUpdate::Failed {
                    error: "unavailable".to_string(),
                },
            )
            .await;

        let outputs = store.successful_outputs(&handle.id).await;
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].index, 2);
        assert_eq!(outputs[0].title, "Second");
    }

    #[tokio::test]
    async fn test_evict_is_idempotent_and_cancels() {
        let store = ProgressStore::new();
        let handle = seed(&store).await;

        let evicted = store.evict(&handle.id).await.unwrap();
        assert!(evicted.was_running);
        assert!(handle.cancel.is_cancelled());

        // Second eviction is a no-op, and the record is gone
        assert!(store.evict(&handle.id).await.is_none());
        assert!(store.snapshot(&handle.id).await.is_none());
        assert_eq!(store.job_count().await, 0);

        // Updates after eviction are dropped
        assert!(
            !store
                .update_item(&handle.id, 2, ItemUpdate::Downloading { percent: 10 })
                .await
        );
    }

    #[tokio::test]
    async fn test_owned_by_scopes_to_owner() {
        let store = ProgressStore::new();
        let mine = seed(&store).await;
        let theirs = store
            .create(NewJob {
                id: JobId::new(),
                owner: OwnerKey::from_string("client2"),
                source_url: "https://www.youtube.com/playlist?list=PLy".to_string(),
                playlist_title: "Other".to_string(),
                options: DownloadOptions::default(),
                entries: vec![entry(1, "One")],
                job_dir: PathBuf::from("/tmp/plpack-test/job2"),
            })
            .await;

        let owned = store.owned_by(&OwnerKey::from_string("client1")).await;
        assert_eq!(owned, vec![mine.id.clone()]);
        assert_ne!(owned[0], theirs.id);
    }

    #[tokio::test]
    async fn test_idle_jobs_respect_touch() {
        let store = ProgressStore::new();
        let handle = seed(&store).await;

        // Fresh job is not idle at any reasonable threshold
        assert!(store.idle_jobs(Duration::from_secs(1)).await.is_empty());

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(
            store.idle_jobs(Duration::from_millis(10)).await,
            vec![handle.id.clone()]
        );

        // Touch resets the clock
        store.touch(&handle.id).await;
        assert!(store.idle_jobs(Duration::from_millis(10)).await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_item_updates_do_not_tear() {
        let store = Arc::new(ProgressStore::new());
        let handle = store
            .create(NewJob {
                id: JobId::new(),
                owner: OwnerKey::from_string("client1"),
                source_url: "u".to_string(),
                playlist_title: "Mix".to_string(),
                options: DownloadOptions::default(),
                entries: (1..=4).map(|i| entry(i, "t")).collect(),
                job_dir: PathBuf::from("/tmp/plpack-test/job3"),
            })
            .await;

        let mut tasks = Vec::new();
        for index in 1..=4u32 {
            let store = Arc::clone(&store);
            let id = handle.id.clone();
            tasks.push(tokio::spawn(async move {
                for percent in 0..=100u8 {
                    store
                        .update_item(&id, index, ItemUpdate::Downloading { percent })
                        .await;
                }
                store
                    .update_item(
                        &id,
                        index,
                        ItemUpdate::Done {
                            output: PathBuf::from(format!("/tmp/{:03}.mp4", index)),
                        },
                    )
                    .await;
            }));
        }

        // Poll while writers run; every observed snapshot must be coherent
        for _ in 0..50 {
            let snap = store.snapshot(&handle.id).await.unwrap();
            for item in &snap.items {
                if item.status == ItemStatus::Done {
                    assert_eq!(item.progress_percent, 100);
                }
                assert!(item.progress_percent <= 100);
            }
        }

        for task in tasks {
            task.await.unwrap();
        }

        let snap = store.snapshot(&handle.id).await.unwrap();
        assert!(snap.all_items_settled());
        assert_eq!(snap.succeeded(), 4);
    }
}
