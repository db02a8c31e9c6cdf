//! Immutable snapshots returned to polling clients.
//!
//! A snapshot is an owned copy of a job's state taken under the job's
//! record lock, so a poller never observes a record mid-mutation.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::{DownloadOptions, ItemStatus, JobId, JobStatus};

/// Point-in-time view of one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ItemSnapshot {
    /// Stable playlist index of the item
    pub index: u32,
    /// Display title
    pub title: String,
    /// Thumbnail URL, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Current lifecycle state
    pub status: ItemStatus,
    /// 0-100, non-decreasing until the item is terminal
    pub progress_percent: u8,
    /// Short failure classification, only when `status` is `Failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Point-in-time view of a whole job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JobSnapshot {
    /// Job ID
    pub job_id: JobId,
    /// Current job state
    pub status: JobStatus,
    /// Options the job was created with
    pub options: DownloadOptions,
    /// Title of the source playlist
    pub playlist_title: String,
    /// Per-item progress, ordered by playlist index
    pub items: Vec<ItemSnapshot>,
    /// Aggregate error, only when `status` is `Error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether the deliverable archive is ready to download
    pub archive_ready: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl JobSnapshot {
    /// Number of items that reached `Done`.
    pub fn succeeded(&self) -> usize {
        self.items
            .iter()
            .filter(|i| i.status == ItemStatus::Done)
            .count()
    }

    /// Whether every item has reached a terminal state.
    pub fn all_items_settled(&self) -> bool {
        self.items.iter().all(|i| i.status.is_terminal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{MediaFormat, Quality};

    fn snapshot() -> JobSnapshot {
        JobSnapshot {
            job_id: JobId::from_string("j1"),
            status: JobStatus::Running,
            options: DownloadOptions {
                format: MediaFormat::Mp4,
                quality: Quality::High,
            },
            playlist_title: "Mix".to_string(),
            items: vec![
                ItemSnapshot {
                    index: 1,
                    title: "First".to_string(),
                    thumbnail_url: None,
                    status: ItemStatus::Done,
                    progress_percent: 100,
                    error: None,
                },
                ItemSnapshot {
                    index: 2,
                    title: "Second".to_string(),
                    thumbnail_url: None,
                    status: ItemStatus::Downloading,
                    progress_percent: 40,
                    error: None,
                },
            ],
            error: None,
            archive_ready: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_succeeded_count() {
        assert_eq!(snapshot().succeeded(), 1);
    }

    #[test]
    fn test_all_items_settled() {
        let mut snap = snapshot();
        assert!(!snap.all_items_settled());
        snap.items[1].status = ItemStatus::Failed;
        assert!(snap.all_items_settled());
    }

    #[test]
    fn test_error_field_omitted_when_none() {
        let json = serde_json::to_string(&snapshot()).unwrap();
        assert!(!json.contains("\"error\""));
    }
}
