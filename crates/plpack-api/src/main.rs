//! Axum API server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use plpack_api::{create_router, ApiConfig, AppState};
use plpack_engine::{EngineConfig, JobEngine};
use plpack_media::YtDlpFetcher;

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("plpack=info".parse().expect("valid directive"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting plpack-api");

    // Load configuration
    let config = ApiConfig::from_env();
    let engine_config = EngineConfig::from_env();
    info!("API config: host={}, port={}", config.host, config.port);

    // yt-dlp is resolved per fetch; surface a missing binary at startup
    if which::which("yt-dlp").is_err() {
        warn!("yt-dlp not found in PATH; all fetches will fail until it is installed");
    }

    // Wire up the engine over the production fetcher
    let fetcher = Arc::new(YtDlpFetcher::new().with_timeout(engine_config.item_timeout));
    let engine = Arc::new(JobEngine::new(engine_config, fetcher));

    // Start the idle-sweep background task
    let scheduler = engine.cleanup_scheduler();
    tokio::spawn(async move {
        scheduler.run().await;
    });

    // Create router
    let state = AppState::new(config.clone(), engine);
    let app = create_router(state);

    // Bind and serve
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Invalid bind address");

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    info!("Server shutdown complete");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    info!("Received shutdown signal");
}
