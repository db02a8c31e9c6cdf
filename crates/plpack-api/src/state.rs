//! Application state.

use std::sync::Arc;

use plpack_engine::JobEngine;

use crate::config::ApiConfig;
use crate::playlists::PlaylistCache;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub engine: Arc<JobEngine>,
    pub playlists: Arc<PlaylistCache>,
}

impl AppState {
    /// Create new application state over a running engine.
    pub fn new(config: ApiConfig, engine: Arc<JobEngine>) -> Self {
        Self {
            config,
            engine,
            playlists: Arc::new(PlaylistCache::new()),
        }
    }
}
