//! Job identifiers, options and lifecycle statuses.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the client session that owns a set of jobs.
///
/// Used for scoped eviction on session teardown. The boundary layer is
/// responsible for handing every client a stable key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct OwnerKey(pub String);

impl OwnerKey {
    /// Generate a new random owner key.
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Target container format for converted media.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum MediaFormat {
    /// Video container
    #[default]
    Mp4,
    /// Audio-only, extracted and re-encoded
    Mp3,
}

impl MediaFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaFormat::Mp4 => "mp4",
            MediaFormat::Mp3 => "mp3",
        }
    }

    /// File extension produced for this format.
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quality tier requested by the client.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    #[default]
    High,
    Medium,
    Low,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::High => "high",
            Quality::Medium => "medium",
            Quality::Low => "low",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conversion options fixed at job creation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default,
)]
pub struct DownloadOptions {
    pub format: MediaFormat,
    pub quality: Quality,
}

/// Job lifecycle state.
///
/// `Running` is the sole initial state; `Finished` and `Error` are terminal
/// and never revert.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Items are being fetched and converted
    #[default]
    Running,
    /// At least one item succeeded and the archive was assembled
    Finished,
    /// No item succeeded, or packaging failed
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Finished => "finished",
            JobStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Error)
    }
}

/// Per-item lifecycle state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Created, not yet handed to a worker
    #[default]
    Idle,
    /// Waiting for a concurrency slot
    Queued,
    /// Media bytes are being fetched
    Downloading,
    /// Post-processing (audio extraction / remux) in progress
    Converting,
    /// File produced and recorded
    Done,
    /// Fetch or conversion failed; the failure does not touch siblings
    Failed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Idle => "idle",
            ItemStatus::Queued => "queued",
            ItemStatus::Downloading => "downloading",
            ItemStatus::Converting => "converting",
            ItemStatus::Done => "done",
            ItemStatus::Failed => "failed",
        }
    }

    /// Once terminal, no further mutation of the item is allowed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Done | ItemStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_roundtrip() {
        let id = JobId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: JobId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
        // Transparent serialization: just the string
        assert_eq!(json, format!("\"{}\"", id.as_str()));
    }

    #[test]
    fn test_status_terminality() {
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Finished.is_terminal());
        assert!(JobStatus::Error.is_terminal());

        assert!(!ItemStatus::Idle.is_terminal());
        assert!(!ItemStatus::Queued.is_terminal());
        assert!(!ItemStatus::Downloading.is_terminal());
        assert!(!ItemStatus::Converting.is_terminal());
        assert!(ItemStatus::Done.is_terminal());
        assert!(ItemStatus::Failed.is_terminal());
    }

    #[test]
    fn test_options_serialization() {
        let opts = DownloadOptions {
            format: MediaFormat::Mp3,
            quality: Quality::Medium,
        };
        let json = serde_json::to_string(&opts).unwrap();
        assert_eq!(json, r#"{"format":"mp3","quality":"medium"}"#);
    }

    #[test]
    fn test_owner_keys_are_distinct() {
        assert_ne!(OwnerKey::new(), OwnerKey::new());
    }
}
