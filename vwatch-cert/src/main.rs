//! Certification service (vwatch-cert) - Main entry point
//!
//! Loads the playlist, starts the certification engine and its outbox
//! writers, and serves the HTTP API until Ctrl+C / SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vwatch_cert::aggregator::ViewAggregator;
use vwatch_cert::api::{self, AppContext};
use vwatch_cert::catalog::SqliteCatalog;
use vwatch_cert::certification::{CertificationEngine, EngineConfig};
use vwatch_cert::config::Config;
use vwatch_cert::ledger::{LinearCost, TokenLedger};
use vwatch_cert::outbox;
use vwatch_cert::playlist::PlaylistController;
use vwatch_cert::rewatch::RewatchGate;
use vwatch_cert::state::SharedState;
use vwatch_cert::watch_records::WatchRecordStore;
use vwatch_common::events::WatchedFrom;

/// Command-line arguments for vwatch-cert
#[derive(Parser, Debug)]
#[command(name = "vwatch-cert")]
#[command(about = "View certification service for vwatch")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5780", env = "VWATCH_PORT")]
    port: u16,

    /// Root folder holding the database
    #[arg(short, long, env = "VWATCH_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// User whose views are certified
    #[arg(short, long, env = "VWATCH_USER_ID")]
    user_id: String,

    /// Hosting context recorded on watch records (main, room, manual)
    #[arg(short, long, default_value = "main", env = "VWATCH_CONTEXT")]
    context: WatchedFrom,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vwatch_cert=debug,vwatch_common=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config::new(args.root_folder.as_deref(), args.port, args.user_id, args.context);

    info!("Starting vwatch certification service on port {}", config.port);
    info!("Root folder: {}", config.root_folder.display());
    info!("User: {} (context {})", config.user_id, config.context);

    let db_pool = vwatch_common::db::init_database(&config.db_path)
        .await
        .context("Failed to initialize database")?;

    let settings = vwatch_cert::db::settings::load_engine_settings(&db_pool)
        .await
        .context("Failed to load engine settings")?;
    info!("Engine settings: {:?}", settings);

    let catalog = SqliteCatalog::new(db_pool.clone(), settings.policy);
    let playlist = PlaylistController::load(&catalog)
        .await
        .context("Failed to build playlist from catalog")?;

    let state = Arc::new(SharedState::new(settings.event_bus_capacity, settings.countdown_seconds));
    let store = WatchRecordStore::new(db_pool.clone());
    let aggregator = ViewAggregator::new(db_pool.clone(), settings.stats_batch_size);
    let ledger = TokenLedger::new(db_pool.clone(), Arc::new(LinearCost::new(settings.seconds_per_token)));
    let gate = RewatchGate::new(
        store.clone(),
        config.user_id.clone(),
        settings.rewatch_cooldown_ms,
        settings.rewatch_refresh_interval_secs,
    );

    let (outbox, workers) = outbox::spawn_workers(store.clone(), aggregator.clone(), ledger, Arc::clone(&state));
    let (engine, engine_task) = CertificationEngine::spawn(
        EngineConfig::new(config.user_id.clone(), config.context, &settings),
        playlist,
        gate.clone(),
        outbox,
        Arc::clone(&state),
    );

    let ctx = AppContext {
        state,
        engine: engine.clone(),
        store,
        gate,
        aggregator,
        user_id: config.user_id.clone(),
    };

    api::run(config.port, ctx, shutdown_signal())
        .await
        .context("HTTP server failed")?;

    // Cancels any pending countdown; dispatched side effects still drain
    engine.shutdown().await.context("Failed to stop certification engine")?;
    drop(engine);
    engine_task.await.context("Certification engine task panicked")?;
    workers.join().await;

    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
