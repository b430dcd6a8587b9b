//! Watch record queries
//!
//! Records are keyed by (user_id, video_id), created lazily on first
//! certification and never deleted. `watch_count` only grows.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite};
use vwatch_common::db::WatchRecord;
use vwatch_common::events::WatchedFrom;

type WatchRecordTuple = (String, String, i64, i64, i64, DateTime<Utc>, String);

const SELECT_COLUMNS: &str = "SELECT user_id, video_id, watch_count, certified, watched_at, \
     last_watched_at, watched_from FROM watch_records";

fn from_tuple(row: WatchRecordTuple) -> Result<WatchRecord> {
    let watched_from = row
        .6
        .parse::<WatchedFrom>()
        .map_err(|e| Error::Internal(format!("Corrupt watch record: {}", e)))?;

    Ok(WatchRecord {
        user_id: row.0,
        video_id: row.1,
        watch_count: row.2.max(0) as u32,
        certified: row.3 != 0,
        watched_at: row.4,
        last_watched_at: row.5,
        watched_from,
    })
}

/// Record one certified view
///
/// Inserts the record with `watch_count = 1` or increments the existing one,
/// stamping `watched_at` with the certification time.
pub async fn upsert_certified(
    db: &Pool<Sqlite>,
    user_id: &str,
    video_id: &str,
    watched_from: WatchedFrom,
    watched_at_ms: i64,
) -> Result<WatchRecord> {
    sqlx::query(
        r#"
        INSERT INTO watch_records (user_id, video_id, watch_count, certified, watched_at, last_watched_at, watched_from)
        VALUES (?, ?, 1, 1, ?, ?, ?)
        ON CONFLICT(user_id, video_id) DO UPDATE SET
            watch_count = watch_count + 1,
            certified = 1,
            watched_at = excluded.watched_at,
            last_watched_at = excluded.last_watched_at,
            watched_from = excluded.watched_from
        "#,
    )
    .bind(user_id)
    .bind(video_id)
    .bind(watched_at_ms)
    .bind(Utc::now())
    .bind(watched_from.as_str())
    .execute(db)
    .await?;

    get(db, user_id, video_id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Watch record for {} vanished after upsert", video_id)))
}

/// Fetch one record
pub async fn get(db: &Pool<Sqlite>, user_id: &str, video_id: &str) -> Result<Option<WatchRecord>> {
    let sql = format!("{} WHERE user_id = ? AND video_id = ?", SELECT_COLUMNS);
    let row: Option<WatchRecordTuple> = sqlx::query_as(&sql)
        .bind(user_id)
        .bind(video_id)
        .fetch_optional(db)
        .await?;

    row.map(from_tuple).transpose()
}

/// Fetch every record for a user
pub async fn list_for_user(db: &Pool<Sqlite>, user_id: &str) -> Result<Vec<WatchRecord>> {
    let sql = format!("{} WHERE user_id = ? ORDER BY watched_at DESC", SELECT_COLUMNS);
    let rows: Vec<WatchRecordTuple> = sqlx::query_as(&sql).bind(user_id).fetch_all(db).await?;

    rows.into_iter().map(from_tuple).collect()
}
