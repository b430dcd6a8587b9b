//! HTTP API tests
//!
//! Drive the router with `oneshot` against a running engine.

mod helpers;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use helpers::{default_videos, is_type, Harness, USER};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use vwatch_cert::api::build_router;
use vwatch_common::events::WatchedFrom;
use vwatch_common::time::now_millis;

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let h = Harness::start(default_videos()).await;
    let app = build_router(h.ctx.clone());

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["module"], "vwatch_cert");
    h.finish().await;
}

#[tokio::test]
async fn test_player_reports_drive_session() {
    let h = Harness::start(default_videos()).await;
    let app = build_router(h.ctx.clone());

    let (status, _) = send(&app, post("/player/ready", json!({"video_id": "long", "duration_seconds": 300.0}))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let (status, _) = send(&app, post("/player/state", json!({"state": "playing"}))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let (status, _) = send(&app, post("/player/tick", json!({"video_id": "long", "elapsed_seconds": 42.0}))).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    // Round-trip through the engine so the published snapshot is current
    h.engine.snapshot().await.unwrap();

    let (status, body) = send(&app, get("/session")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["video_id"], "long");
    assert_eq!(body["stage"], "watching");
    assert_eq!(body["elapsed_seconds"], 42.0);
    assert_eq!(body["player_state"], "playing");
    assert_eq!(body["is_locked"], false);
    h.finish().await;
}

#[tokio::test]
async fn test_unknown_player_state_rejected() {
    let h = Harness::start(default_videos()).await;
    let app = build_router(h.ctx.clone());

    let (status, _) = send(&app, post("/player/state", json!({"state": "rewinding"}))).await;
    assert!(status.is_client_error());
    h.finish().await;
}

#[tokio::test]
async fn test_next_returns_conflict_while_locked() {
    let mut h = Harness::start(default_videos()).await;
    let app = build_router(h.ctx.clone());

    send(&app, post("/player/tick", json!({"video_id": "long", "elapsed_seconds": 180.0}))).await;
    let (status, body) = send(&app, post("/playback/next", json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["status"].as_str().unwrap().starts_with("error:"));

    h.wait_for(|e| is_type(e, "PlaylistAdvanced")).await;
    let (status, body) = send(&app, post("/playback/next", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["video"]["video_id"], "ten-minutes");
    assert_eq!(body["current_index"], 2);
    h.finish().await;
}

#[tokio::test]
async fn test_previous_wraps_to_last() {
    let h = Harness::start(default_videos()).await;
    let app = build_router(h.ctx.clone());

    let (status, body) = send(&app, post("/playback/previous", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["video"]["video_id"], "ten-minutes");
    assert_eq!(body["current_index"], 2);
    h.finish().await;
}

#[tokio::test]
async fn test_close_clears_session() {
    let h = Harness::start(default_videos()).await;
    let app = build_router(h.ctx.clone());

    let (status, _) = send(&app, post("/playback/close", json!({}))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    h.engine.snapshot().await.unwrap();

    let (_, body) = send(&app, get("/session")).await;
    assert!(body["video_id"].is_null());
    h.finish().await;
}

#[tokio::test]
async fn test_watch_and_rewatch_after_certification() {
    let mut h = Harness::start(default_videos()).await;
    let app = build_router(h.ctx.clone());

    let (_, body) = send(&app, get("/watch/short")).await;
    assert_eq!(body["watch_count"], 0);
    assert_eq!(body["certified"], false);
    let (_, body) = send(&app, get("/rewatch/short")).await;
    assert_eq!(body["can_rewatch"], true);
    assert_eq!(body["minutes_remaining"], 0);

    send(&app, post("/player/ready", json!({"video_id": "short", "duration_seconds": 30.0}))).await;
    send(&app, post("/player/end", json!({"video_id": "short"}))).await;
    h.wait_for(|e| is_type(e, "CertificationTriggered")).await;

    let (status, body) = send(&app, get("/watch/short")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["watch_count"], 1);
    assert_eq!(body["certified"], true);

    // Wait for the durable record before asking the gate
    h.wait_for(|e| is_type(e, "PlaylistAdvanced")).await;
    let (pool, _) = h.finish().await;

    let h = Harness::start_with_pool(pool, default_videos()).await;
    let app = build_router(h.ctx.clone());
    let (_, body) = send(&app, get("/rewatch/short")).await;
    assert_eq!(body["can_rewatch"], false);
    assert_eq!(body["minutes_remaining"], 60);
    assert_eq!(body["refresh_after_secs"], 30);
    h.finish().await;
}

#[tokio::test]
async fn test_playlist_partitions_locked_videos() {
    let pool = helpers::test_pool().await;
    vwatch_cert::db::watch_records::upsert_certified(&pool, USER, "short", WatchedFrom::Room, now_millis() - 30 * 60_000)
        .await
        .unwrap();

    let h = Harness::start_with_pool(pool, default_videos()).await;
    let app = build_router(h.ctx.clone());
    h.engine.snapshot().await.unwrap();

    let (status, body) = send(&app, get("/playlist")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current_index"], 0);
    assert_eq!(body["videos"].as_array().unwrap().len(), 3);

    let available: Vec<&str> = body["available"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["video_id"].as_str().unwrap())
        .collect();
    assert_eq!(available, vec!["long", "ten-minutes"]);

    let locked = body["locked"].as_array().unwrap();
    assert_eq!(locked.len(), 1);
    assert_eq!(locked[0]["video"]["video_id"], "short");
    assert_eq!(locked[0]["minutes_remaining"], 30);
    h.finish().await;
}

#[tokio::test]
async fn test_stats_in_request_order() {
    let h = Harness::start(default_videos()).await;
    let app = build_router(h.ctx.clone());
    h.ctx.aggregator.increment("b", USER).await.unwrap();
    h.ctx.aggregator.increment("b", "viewer-2").await.unwrap();

    let (status, body) = send(&app, get("/stats?ids=a,b,%20c")).await;
    assert_eq!(status, StatusCode::OK);
    let stats = body.as_array().unwrap();
    assert_eq!(stats.len(), 3);
    assert_eq!(stats[0]["video_id"], "a");
    assert_eq!(stats[0]["total_views"], 0);
    assert_eq!(stats[1]["video_id"], "b");
    assert_eq!(stats[1]["total_views"], 2);
    assert_eq!(stats[1]["unique_viewers_count"], 2);
    assert_eq!(stats[2]["video_id"], "c");

    let (status, _) = send(&app, get("/stats?ids=,,")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    h.finish().await;
}
