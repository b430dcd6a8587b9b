//! HTTP request handlers
//!
//! Player reports are queued on the engine and acknowledged with
//! `202 Accepted`; reads come from the shared snapshots and the stores.

use crate::api::server::AppContext;
use crate::catalog::VideoRef;
use crate::certification::SessionSnapshot;
use crate::error::Error;
use crate::rewatch::LockedVideo;
use crate::watch_records::WatchInfo;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use vwatch_common::db::VideoStats;
use vwatch_common::events::PlayerState;
use vwatch_common::time::now_millis;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct ReadyRequest {
    /// Omitted means the playlist's current video
    #[serde(default)]
    video_id: Option<String>,
    #[serde(default)]
    duration_seconds: f64,
}

#[derive(Debug, Deserialize)]
pub struct TickRequest {
    video_id: String,
    elapsed_seconds: f64,
}

#[derive(Debug, Deserialize)]
pub struct StateRequest {
    state: PlayerState,
}

#[derive(Debug, Deserialize)]
pub struct EndRequest {
    video_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NavigationResponse {
    pub video: VideoRef,
    pub current_index: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RewatchResponse {
    pub video_id: String,
    pub can_rewatch: bool,
    pub minutes_remaining: i64,
    pub refresh_after_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct PlaylistResponse {
    current_index: usize,
    videos: Vec<VideoRef>,
    available: Vec<VideoRef>,
    locked: Vec<LockedVideo>,
    refresh_after_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    /// Comma-separated video ids
    ids: String,
}

type ApiError = (StatusCode, Json<StatusResponse>);

fn error_response(e: Error) -> ApiError {
    let status = match &e {
        Error::Locked(_) => StatusCode::CONFLICT,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::BadRequest(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("Request failed: {}", e);
    }
    (
        status,
        Json(StatusResponse {
            status: format!("error: {}", e),
        }),
    )
}

// ============================================================================
// Health
// ============================================================================

/// GET /health - Health check
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "vwatch_cert".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Player Reports
// ============================================================================

/// POST /player/ready - Player loaded a video
pub async fn player_ready(
    State(ctx): State<AppContext>,
    Json(req): Json<ReadyRequest>,
) -> Result<StatusCode, ApiError> {
    debug!("Player ready: {:?} ({}s)", req.video_id, req.duration_seconds);
    ctx.engine
        .ready(req.video_id, req.duration_seconds)
        .map_err(error_response)?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /player/tick - Playback position report
pub async fn player_tick(
    State(ctx): State<AppContext>,
    Json(req): Json<TickRequest>,
) -> Result<StatusCode, ApiError> {
    ctx.engine
        .tick(req.video_id, req.elapsed_seconds)
        .map_err(error_response)?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /player/state - Player state transition
pub async fn player_state(
    State(ctx): State<AppContext>,
    Json(req): Json<StateRequest>,
) -> Result<StatusCode, ApiError> {
    debug!("Player state: {}", req.state);
    ctx.engine.set_player_state(req.state).map_err(error_response)?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /player/end - Playback reached the end
pub async fn player_end(
    State(ctx): State<AppContext>,
    Json(req): Json<EndRequest>,
) -> Result<StatusCode, ApiError> {
    debug!("Player ended: {}", req.video_id);
    ctx.engine.end(req.video_id).map_err(error_response)?;
    Ok(StatusCode::ACCEPTED)
}

// ============================================================================
// Playback Control
// ============================================================================

/// POST /playback/next - Skip to next video (409 while certifying)
pub async fn skip_next(State(ctx): State<AppContext>) -> Result<Json<NavigationResponse>, ApiError> {
    info!("Skip next request");
    let video = ctx.engine.next().await.map_err(|e| {
        warn!("Skip next refused: {}", e);
        error_response(e)
    })?;
    let current_index = ctx.state.get_playlist().await.current_index;
    Ok(Json(NavigationResponse { video, current_index }))
}

/// POST /playback/previous - Skip to previous video (409 while certifying)
pub async fn skip_previous(State(ctx): State<AppContext>) -> Result<Json<NavigationResponse>, ApiError> {
    info!("Skip previous request");
    let video = ctx.engine.previous().await.map_err(|e| {
        warn!("Skip previous refused: {}", e);
        error_response(e)
    })?;
    let current_index = ctx.state.get_playlist().await.current_index;
    Ok(Json(NavigationResponse { video, current_index }))
}

/// POST /playback/close - Player closed
pub async fn close_player(State(ctx): State<AppContext>) -> Result<StatusCode, ApiError> {
    info!("Player close request");
    ctx.engine.close().map_err(error_response)?;
    Ok(StatusCode::ACCEPTED)
}

// ============================================================================
// Presentation Reads
// ============================================================================

/// GET /session - Current session snapshot
pub async fn get_session(State(ctx): State<AppContext>) -> Json<SessionSnapshot> {
    Json(ctx.state.get_session().await)
}

/// GET /watch/:video_id - Watch info including in-flight certifications
pub async fn get_watch_info(
    State(ctx): State<AppContext>,
    Path(video_id): Path<String>,
) -> Result<Json<WatchInfo>, ApiError> {
    ctx.state
        .get_watch_info(&ctx.store, &ctx.user_id, &video_id)
        .await
        .map(Json)
        .map_err(error_response)
}

/// GET /rewatch/:video_id - Cooldown state of one video
pub async fn get_rewatch(
    State(ctx): State<AppContext>,
    Path(video_id): Path<String>,
) -> Result<Json<RewatchResponse>, ApiError> {
    let now_ms = now_millis();
    let can_rewatch = ctx
        .gate
        .can_rewatch_at(&video_id, now_ms)
        .await
        .map_err(error_response)?;
    let minutes_remaining = ctx
        .gate
        .time_until_rewatch_at(&video_id, now_ms)
        .await
        .map_err(error_response)?;

    Ok(Json(RewatchResponse {
        video_id,
        can_rewatch,
        minutes_remaining,
        refresh_after_secs: ctx.gate.refresh_after_secs(),
    }))
}

/// GET /playlist - Playlist with availability partition
pub async fn get_playlist(State(ctx): State<AppContext>) -> Result<Json<PlaylistResponse>, ApiError> {
    let playlist = ctx.state.get_playlist().await;
    let availability = ctx
        .gate
        .partition(&playlist.videos, now_millis())
        .await
        .map_err(error_response)?;

    Ok(Json(PlaylistResponse {
        current_index: playlist.current_index,
        videos: playlist.videos,
        available: availability.available,
        locked: availability.locked,
        refresh_after_secs: availability.refresh_after_secs,
    }))
}

/// GET /stats?ids=a,b,c - View aggregates in request order
pub async fn get_stats(
    State(ctx): State<AppContext>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<Vec<VideoStats>>, ApiError> {
    let ids: Vec<String> = query
        .ids
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .collect();
    if ids.is_empty() {
        return Err(error_response(Error::BadRequest("ids must name at least one video".to_string())));
    }

    ctx.aggregator.get_many(&ids).await.map(Json).map_err(error_response)
}
