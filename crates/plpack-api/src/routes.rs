//! API routes.

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    create_job, download_archive, end_session, get_job_progress, health, load_playlist,
};
use crate::middleware::cors_layer;
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Playlist metadata load (cached per session)
        .route("/playlist", post(load_playlist))
        // Job lifecycle
        .route("/jobs", post(create_job))
        .route("/jobs/:job_id/progress", get(get_job_progress))
        .route("/jobs/:job_id/archive", get(download_archive))
        // Session teardown (owner-scoped eviction)
        .route("/session", delete(end_session));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.cors_origins))
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .with_state(state)
}
