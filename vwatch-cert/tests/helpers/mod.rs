//! Shared test harness
//!
//! Builds an in-memory database, a static playlist, the outbox writers and
//! a running engine with a fast countdown.

#![allow(dead_code)]

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use vwatch_cert::aggregator::ViewAggregator;
use vwatch_cert::api::AppContext;
use vwatch_cert::catalog::{StaticCatalog, VideoRef};
use vwatch_cert::certification::{CertificationEngine, EngineConfig, EngineHandle};
use vwatch_cert::config::EngineSettings;
use vwatch_cert::ledger::{LinearCost, TokenLedger};
use vwatch_cert::outbox::{self, OutboxWorkers};
use vwatch_cert::playlist::PlaylistController;
use vwatch_cert::rewatch::RewatchGate;
use vwatch_cert::state::SharedState;
use vwatch_cert::watch_records::WatchRecordStore;
use vwatch_common::events::{WatchEvent, WatchedFrom};

pub const USER: &str = "viewer-1";
pub const OWNER: &str = "owner-1";
pub const COUNTDOWN_PERIOD: Duration = Duration::from_millis(20);
pub const WAIT: Duration = Duration::from_secs(5);

pub async fn test_pool() -> Pool<Sqlite> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    vwatch_common::db::create_schema(&pool).await.unwrap();
    vwatch_common::db::init_default_settings(&pool).await.unwrap();
    pool
}

/// Playlist: a 300 s long-form video, a 30 s short-form video, a 600 s video
pub fn default_videos() -> Vec<VideoRef> {
    vec![
        VideoRef::new("long", 300, OWNER, "Long video"),
        VideoRef::new("short", 30, OWNER, "Short video"),
        VideoRef::new("ten-minutes", 600, OWNER, "Ten minutes"),
    ]
}

pub struct Harness {
    pub pool: Pool<Sqlite>,
    pub state: Arc<SharedState>,
    pub engine: EngineHandle,
    pub events: broadcast::Receiver<WatchEvent>,
    pub ctx: AppContext,
    engine_task: JoinHandle<()>,
    workers: OutboxWorkers,
}

impl Harness {
    pub async fn start(videos: Vec<VideoRef>) -> Self {
        Self::start_with_pool(test_pool().await, videos).await
    }

    pub async fn start_with_pool(pool: Pool<Sqlite>, videos: Vec<VideoRef>) -> Self {
        let settings = EngineSettings::default();
        let state = Arc::new(SharedState::new(1024, settings.countdown_seconds));
        let events = state.subscribe_events();

        let store = WatchRecordStore::new(pool.clone());
        let aggregator = ViewAggregator::new(pool.clone(), settings.stats_batch_size);
        let ledger = TokenLedger::new(pool.clone(), Arc::new(LinearCost::new(settings.seconds_per_token)));
        let gate = RewatchGate::new(
            store.clone(),
            USER,
            settings.rewatch_cooldown_ms,
            settings.rewatch_refresh_interval_secs,
        );

        let playlist = PlaylistController::load(&StaticCatalog::new(videos)).await.unwrap();
        let (outbox, workers) = outbox::spawn_workers(store.clone(), aggregator.clone(), ledger, Arc::clone(&state));
        let config = EngineConfig::new(USER, WatchedFrom::Main, &settings).with_countdown_period(COUNTDOWN_PERIOD);
        let (engine, engine_task) =
            CertificationEngine::spawn(config, playlist, gate.clone(), outbox, Arc::clone(&state));

        let ctx = AppContext {
            state: Arc::clone(&state),
            engine: engine.clone(),
            store,
            gate,
            aggregator,
            user_id: USER.to_string(),
        };

        Self {
            pool,
            state,
            engine,
            events,
            ctx,
            engine_task,
            workers,
        }
    }

    /// Next event matching `pred`, skipping others; panics after `WAIT`
    pub async fn wait_for<F>(&mut self, mut pred: F) -> WatchEvent
    where
        F: FnMut(&WatchEvent) -> bool,
    {
        let deadline = tokio::time::Instant::now() + WAIT;
        loop {
            let event = tokio::time::timeout_at(deadline, self.events.recv())
                .await
                .expect("timed out waiting for event")
                .expect("event bus closed");
            if pred(&event) {
                return event;
            }
        }
    }

    /// Every event received so far without blocking
    pub fn drain_events(&mut self) -> Vec<WatchEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    /// Stop the engine and wait until every side effect has been written
    pub async fn finish(self) -> (Pool<Sqlite>, Vec<WatchEvent>) {
        let Harness {
            pool,
            engine,
            mut events,
            ctx,
            engine_task,
            workers,
            ..
        } = self;

        engine.shutdown().await.unwrap();
        drop(engine);
        drop(ctx);
        engine_task.await.unwrap();
        workers.join().await;

        let mut remaining = Vec::new();
        while let Ok(event) = events.try_recv() {
            remaining.push(event);
        }
        (pool, remaining)
    }
}

pub fn is_type(event: &WatchEvent, name: &str) -> bool {
    event.event_type() == name
}
