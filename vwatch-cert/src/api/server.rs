//! HTTP server setup and routing
//!
//! Sets up the Axum router for player reports, presentation reads and SSE.

use crate::aggregator::ViewAggregator;
use crate::certification::EngineHandle;
use crate::error::{Error, Result};
use crate::rewatch::RewatchGate;
use crate::state::SharedState;
use crate::watch_records::WatchRecordStore;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub state: Arc<SharedState>,
    pub engine: EngineHandle,
    pub store: WatchRecordStore,
    pub gate: RewatchGate,
    pub aggregator: ViewAggregator,
    /// User whose watch info the read endpoints report
    pub user_id: String,
}

/// Build the router with all routes attached
pub fn build_router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(super::handlers::health))

        // Player reports
        .route("/player/ready", post(super::handlers::player_ready))
        .route("/player/tick", post(super::handlers::player_tick))
        .route("/player/state", post(super::handlers::player_state))
        .route("/player/end", post(super::handlers::player_end))

        // Playback control
        .route("/playback/next", post(super::handlers::skip_next))
        .route("/playback/previous", post(super::handlers::skip_previous))
        .route("/playback/close", post(super::handlers::close_player))

        // Presentation reads
        .route("/session", get(super::handlers::get_session))
        .route("/watch/:video_id", get(super::handlers::get_watch_info))
        .route("/rewatch/:video_id", get(super::handlers::get_rewatch))
        .route("/playlist", get(super::handlers::get_playlist))
        .route("/stats", get(super::handlers::get_stats))

        // SSE event stream
        .route("/events", get(super::sse::event_stream))

        .with_state(ctx)

        // Enable CORS for local access
        .layer(CorsLayer::permissive())
}

/// Run HTTP API server until `shutdown` resolves
pub async fn run<F>(port: u16, ctx: AppContext, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    info!("HTTP server stopped");
    Ok(())
}
