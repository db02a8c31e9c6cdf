//! Axum HTTP API for the PlaylistPack backend.
//!
//! Thin boundary layer over [`plpack_engine::JobEngine`]: request parsing,
//! client-session identity, the per-owner playlist cache, and response
//! shaping. All orchestration lives in the engine crate.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod playlists;
pub mod routes;
pub mod session;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
