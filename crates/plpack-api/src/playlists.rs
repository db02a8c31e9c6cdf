//! Per-owner cache of the last loaded playlist.
//!
//! Job creation validates the client's selected indices against the
//! playlist the same session loaded earlier; the engine never re-fetches
//! metadata. One playlist per owner is enough: the UI works on a single
//! playlist at a time, and session teardown drops the entry.

use std::collections::HashMap;

use tokio::sync::Mutex;

use plpack_models::{OwnerKey, PlaylistEntry, PlaylistInfo};

use crate::error::ApiError;

/// A cached playlist together with the URL it was loaded from.
#[derive(Debug, Clone)]
pub struct CachedPlaylist {
    pub source_url: String,
    pub info: PlaylistInfo,
}

/// Owner-keyed playlist cache.
#[derive(Debug, Default)]
pub struct PlaylistCache {
    inner: Mutex<HashMap<OwnerKey, CachedPlaylist>>,
}

impl PlaylistCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the playlist an owner just loaded, replacing any previous one.
    pub async fn store(&self, owner: OwnerKey, source_url: String, info: PlaylistInfo) {
        self.inner
            .lock()
            .await
            .insert(owner, CachedPlaylist { source_url, info });
    }

    /// Resolve selected indices against the owner's cached playlist.
    ///
    /// Fails when no playlist was loaded, the URL does not match the loaded
    /// one, or any index is unknown.
    pub async fn resolve(
        &self,
        owner: &OwnerKey,
        source_url: &str,
        indices: &[u32],
    ) -> Result<(String, Vec<PlaylistEntry>), ApiError> {
        let inner = self.inner.lock().await;
        let cached = inner
            .get(owner)
            .ok_or_else(|| ApiError::bad_request("Load the playlist before starting a job"))?;

        if cached.source_url != source_url {
            return Err(ApiError::bad_request(
                "Playlist URL does not match the loaded playlist",
            ));
        }

        let mut selection = Vec::with_capacity(indices.len());
        for &index in indices {
            let entry = cached.info.entry(index).ok_or_else(|| {
                ApiError::bad_request(format!("Unknown playlist index {}", index))
            })?;
            selection.push(entry.clone());
        }

        Ok((cached.info.title.clone(), selection))
    }

    /// Drop an owner's cached playlist.
    pub async fn forget(&self, owner: &OwnerKey) {
        self.inner.lock().await.remove(owner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> PlaylistInfo {
        PlaylistInfo {
            title: "Mix".to_string(),
            entries: vec![
                PlaylistEntry {
                    index: 1,
                    source_ref: "https://www.youtube.com/watch?v=aaaaaaaaaaa".to_string(),
                    title: "One".to_string(),
                    thumbnail_url: None,
                },
                PlaylistEntry {
                    index: 2,
                    source_ref: "https://www.youtube.com/watch?v=bbbbbbbbbbb".to_string(),
                    title: "Two".to_string(),
                    thumbnail_url: None,
                },
            ],
        }
    }

    const URL: &str = "https://www.youtube.com/playlist?list=PLx";

    #[tokio::test]
    async fn test_resolve_returns_selected_entries() {
        let cache = PlaylistCache::new();
        let owner = OwnerKey::from_string("c1");
        cache.store(owner.clone(), URL.to_string(), info()).await;

        let (title, selection) = cache.resolve(&owner, URL, &[2]).await.unwrap();
        assert_eq!(title, "Mix");
        assert_eq!(selection.len(), 1);
        assert_eq!(selection[0].index, 2);
    }

    #[tokio::test]
    async fn test_resolve_rejects_unknown_index() {
        let cache = PlaylistCache::new();
        let owner = OwnerKey::from_string("c1");
        cache.store(owner.clone(), URL.to_string(), info()).await;

        assert!(cache.resolve(&owner, URL, &[1, 9]).await.is_err());
    }

    #[tokio::test]
    async fn test_resolve_requires_loaded_playlist() {
        let cache = PlaylistCache::new();
        let owner = OwnerKey::from_string("c1");

        assert!(cache.resolve(&owner, URL, &[1]).await.is_err());
    }

    #[tokio::test]
    async fn test_resolve_rejects_mismatched_url() {
        let cache = PlaylistCache::new();
        let owner = OwnerKey::from_string("c1");
        cache.store(owner.clone(), URL.to_string(), info()).await;

        assert!(cache
            .resolve(&owner, "https://example.com/other", &[1])
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_forget_drops_entry() {
        let cache = PlaylistCache::new();
        let owner = OwnerKey::from_string("c1");
        cache.store(owner.clone(), URL.to_string(), info()).await;
        cache.forget(&owner).await;

        assert!(cache.resolve(&owner, URL, &[1]).await.is_err());
    }
}
