//! Playlist metadata as returned by the extraction collaborator.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One entry of a loaded playlist.
///
/// `index` is the 1-based position within the full playlist and stays
/// stable when the client selects a subset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PlaylistEntry {
    /// 1-based position in the original playlist
    pub index: u32,

    /// Opaque reference handed back to the fetch collaborator
    /// (for YouTube this is the watch URL of the entry)
    pub source_ref: String,

    /// Display title
    pub title: String,

    /// Thumbnail URL, if one could be derived
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

/// A loaded playlist: title plus ordered entries.
///
/// A bare single video is represented as a playlist with one entry so the
/// rest of the pipeline never needs a special case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PlaylistInfo {
    /// Playlist (or single video) title
    pub title: String,

    /// Ordered entries
    pub entries: Vec<PlaylistEntry>,
}

impl PlaylistInfo {
    /// Look up an entry by its playlist index.
    pub fn entry(&self, index: u32) -> Option<&PlaylistEntry> {
        self.entries.iter().find(|e| e.index == index)
    }
}
