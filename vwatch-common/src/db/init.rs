//! Database initialization
//!
//! Creates the SQLite file on first run, applies pragmas, creates every
//! table idempotently and seeds default settings.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Default values for the `settings` table
///
/// Seeded on every startup; existing values are never overwritten, NULL
/// values are reset to the default.
pub const DEFAULT_SETTINGS: &[(&str, &str)] = &[
    ("long_form_threshold_seconds", "181"),
    ("long_form_ratio", "0.9"),
    ("long_form_absolute_seconds", "180"),
    ("countdown_seconds", "5"),
    ("rewatch_cooldown_ms", "3600000"),
    ("rewatch_refresh_interval_secs", "30"),
    ("seconds_per_token", "600"),
    ("stats_batch_size", "10"),
    ("event_bus_capacity", "100"),
];

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .min_connections(1)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets the outbox writers proceed while the API reads
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_schema(&pool).await?;
    init_default_settings(&pool).await?;

    Ok(pool)
}

/// Create every table (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_videos_table(pool).await?;
    create_video_replicas_table(pool).await?;
    create_watch_records_table(pool).await?;
    create_video_stats_tables(pool).await?;
    create_token_tables(pool).await?;
    Ok(())
}

/// Create the settings table
///
/// Stores runtime policy parameters as key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the video catalog table
///
/// `is_long_form` is an optional precomputed classification; NULL means
/// the catalog did not classify the video.
async fn create_videos_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS videos (
            video_id TEXT PRIMARY KEY,
            title TEXT NOT NULL DEFAULT '',
            duration_seconds INTEGER NOT NULL DEFAULT 0,
            owner_id TEXT NOT NULL,
            position INTEGER NOT NULL DEFAULT 0,
            is_long_form INTEGER,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_videos_position ON videos(position)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the replica mirror table
///
/// One row per hosting context that carries a denormalized copy of a
/// video's metadata and a local view counter.
async fn create_video_replicas_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS video_replicas (
            video_id TEXT NOT NULL,
            context TEXT NOT NULL,
            view_count INTEGER NOT NULL DEFAULT 0,
            last_viewed_at INTEGER,
            PRIMARY KEY (video_id, context)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_watch_records_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS watch_records (
            user_id TEXT NOT NULL,
            video_id TEXT NOT NULL,
            watch_count INTEGER NOT NULL DEFAULT 0 CHECK (watch_count >= 0),
            certified INTEGER NOT NULL DEFAULT 0,
            watched_at INTEGER NOT NULL,
            last_watched_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            watched_from TEXT NOT NULL DEFAULT 'main',
            PRIMARY KEY (user_id, video_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the canonical aggregate and its unique-viewer set
async fn create_video_stats_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS video_stats (
            video_id TEXT PRIMARY KEY,
            total_views INTEGER NOT NULL DEFAULT 0,
            total_likes INTEGER NOT NULL DEFAULT 0,
            unique_viewers_count INTEGER NOT NULL DEFAULT 0,
            last_updated INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS video_unique_viewers (
            video_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            first_viewed_at INTEGER NOT NULL,
            PRIMARY KEY (video_id, user_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_token_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS token_balances (
            owner_id TEXT PRIMARY KEY,
            balance REAL NOT NULL DEFAULT 0 CHECK (balance >= 0),
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS token_ledger_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id TEXT NOT NULL,
            video_id TEXT NOT NULL,
            tokens REAL NOT NULL,
            remaining_balance REAL NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Initialize or repair default settings
pub async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    for (key, default_value) in DEFAULT_SETTINGS {
        ensure_setting(pool, key, default_value).await?;
    }
    Ok(())
}

async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    match value {
        None => {
            // INSERT OR IGNORE: two services may initialize concurrently
            sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(default_value)
                .execute(pool)
                .await?;
            info!("Initialized setting '{}' with default value: {}", key, default_value);
        }
        Some(None) => {
            sqlx::query("UPDATE settings SET value = ? WHERE key = ?")
                .bind(default_value)
                .bind(key)
                .execute(pool)
                .await?;
            info!("Reset NULL setting '{}' to default value: {}", key, default_value);
        }
        Some(Some(_)) => {}
    }

    Ok(())
}
