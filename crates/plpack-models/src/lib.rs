//! Shared data models for the PlaylistPack backend.
//!
//! This crate provides Serde-serializable types for:
//! - Job and owner identifiers
//! - Download options (container format and quality tier)
//! - Job and per-item lifecycle statuses
//! - Playlist metadata returned by the extraction collaborator
//! - Snapshots returned to polling clients
//! - Filename sanitization for archive entries

pub mod job;
pub mod playlist;
pub mod snapshot;
pub mod utils;

// Re-export common types
pub use job::{DownloadOptions, ItemStatus, JobId, JobStatus, MediaFormat, OwnerKey, Quality};
pub use playlist::{PlaylistEntry, PlaylistInfo};
pub use snapshot::{ItemSnapshot, JobSnapshot};
pub use utils::{archive_entry_name, sanitize_title};
