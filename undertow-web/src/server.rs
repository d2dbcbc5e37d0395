//! Router construction and server bootstrap for Undertow.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use undertow_core::config::UndertowConfig;
use undertow_core::source::ContentSource;
use undertow_core::storage::{BundleLeases, StorageReaper};
use undertow_core::streaming::StreamCoordinator;
use undertow_core::UndertowError;

use crate::handlers::stream_content;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Per-request streaming pipeline
    pub coordinator: Arc<StreamCoordinator>,
}

impl AppState {
    /// Wraps `coordinator` for sharing across requests.
    pub fn new(coordinator: StreamCoordinator) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
        }
    }
}

/// Builds the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/stream", get(stream_content))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves the streaming endpoint until Ctrl-C.
///
/// The storage reaper runs for the lifetime of the server and shares its
/// lease registry with the stream coordinator.
///
/// # Errors
///
/// - `UndertowError::Server` - If the listen address cannot be bound
/// - `UndertowError::Io` - If serving fails
pub async fn run_server(
    config: UndertowConfig,
    source: Arc<dyn ContentSource>,
) -> Result<(), UndertowError> {
    let leases = BundleLeases::new();
    let coordinator = StreamCoordinator::new(source, leases.clone(), config.streaming.clone());
    let app = build_router(AppState::new(coordinator));

    let address = config.server.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|e| UndertowError::Server {
            reason: format!("failed to bind {address}: {e}"),
        })?;
    info!("Undertow media server running on http://{}", listener.local_addr()?);

    let reaper = StorageReaper::new(
        config.storage.root.clone(),
        config.storage.reap_interval,
        leases,
    )
    .spawn();

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    reaper.shutdown().await;
    info!("Undertow stopped");
    Ok(served?)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Ctrl-C received, shutting down"),
        Err(e) => {
            error!("Could not listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
