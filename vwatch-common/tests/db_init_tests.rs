//! Database initialization tests

use sqlx::Row;
use vwatch_common::db::{create_schema, init_database, init_default_settings, DEFAULT_SETTINGS};

#[tokio::test]
async fn test_init_creates_database_file_and_tables() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("vwatch.db");

    let pool = init_database(&db_path).await.unwrap();
    assert!(db_path.exists());

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    for expected in [
        "settings",
        "token_balances",
        "token_ledger_entries",
        "video_replicas",
        "video_stats",
        "video_unique_viewers",
        "videos",
        "watch_records",
    ] {
        assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
    }
}

#[tokio::test]
async fn test_default_settings_seeded() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("vwatch.db")).await.unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM settings")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count as usize, DEFAULT_SETTINGS.len());

    let row = sqlx::query("SELECT value FROM settings WHERE key = 'rewatch_cooldown_ms'")
        .fetch_one(&pool)
        .await
        .unwrap();
    let value: String = row.get("value");
    assert_eq!(value, "3600000");
}

#[tokio::test]
async fn test_existing_settings_preserved_and_nulls_repaired() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("vwatch.db")).await.unwrap();

    sqlx::query("UPDATE settings SET value = '7' WHERE key = 'countdown_seconds'")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("UPDATE settings SET value = NULL WHERE key = 'seconds_per_token'")
        .execute(&pool)
        .await
        .unwrap();

    create_schema(&pool).await.unwrap();
    init_default_settings(&pool).await.unwrap();

    let countdown: String =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = 'countdown_seconds'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(countdown, "7");

    let per_token: String =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = 'seconds_per_token'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(per_token, "600");
}

#[tokio::test]
async fn test_reopen_existing_database() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("vwatch.db");

    let pool = init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO token_balances (owner_id, balance) VALUES ('o1', 3.5)")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let pool = init_database(&db_path).await.unwrap();
    let balance: f64 = sqlx::query_scalar("SELECT balance FROM token_balances WHERE owner_id = 'o1'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(balance, 3.5);
}
