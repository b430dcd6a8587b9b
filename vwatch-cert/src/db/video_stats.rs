//! View counter queries
//!
//! Covers the canonical `video_stats` aggregate, its unique-viewer set and
//! the per-context `video_replicas` mirror counters.

use crate::error::{Error, Result};
use sqlx::{Pool, Sqlite};
use vwatch_common::db::{ReplicaLocator, VideoStats};

/// List every replica carrying a copy of a video's metadata
pub async fn list_replicas(db: &Pool<Sqlite>, video_id: &str) -> Result<Vec<ReplicaLocator>> {
    let contexts: Vec<String> =
        sqlx::query_scalar("SELECT context FROM video_replicas WHERE video_id = ? ORDER BY context")
            .bind(video_id)
            .fetch_all(db)
            .await?;

    Ok(contexts
        .into_iter()
        .map(|context| ReplicaLocator {
            video_id: video_id.to_string(),
            context,
        })
        .collect())
}

/// Register a replica (idempotent)
pub async fn register_replica(db: &Pool<Sqlite>, video_id: &str, context: &str) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO video_replicas (video_id, context) VALUES (?, ?)")
        .bind(video_id)
        .bind(context)
        .execute(db)
        .await?;
    Ok(())
}

/// Increment one replica's local counter and last-viewed timestamp
///
/// A locator with no backing row is reported as `NotFound`.
pub async fn increment_replica(db: &Pool<Sqlite>, locator: &ReplicaLocator, now_ms: i64) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE video_replicas
        SET view_count = view_count + 1, last_viewed_at = ?
        WHERE video_id = ? AND context = ?
        "#,
    )
    .bind(now_ms)
    .bind(&locator.video_id)
    .bind(&locator.context)
    .execute(db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!(
            "Replica {}@{}",
            locator.video_id, locator.context
        )));
    }
    Ok(())
}

/// Read one replica's counter
pub async fn replica_view_count(db: &Pool<Sqlite>, locator: &ReplicaLocator) -> Result<Option<i64>> {
    let count: Option<i64> = sqlx::query_scalar(
        "SELECT view_count FROM video_replicas WHERE video_id = ? AND context = ?",
    )
    .bind(&locator.video_id)
    .bind(&locator.context)
    .fetch_optional(db)
    .await?;
    Ok(count)
}

/// Update the canonical aggregate for one view
///
/// Returns true when `user_id` joined the unique-viewer set. Set membership
/// makes the unique count idempotent per user.
pub async fn increment_canonical(
    db: &Pool<Sqlite>,
    video_id: &str,
    user_id: &str,
    now_ms: i64,
) -> Result<bool> {
    let mut tx = db.begin().await?;

    let inserted = sqlx::query(
        "INSERT OR IGNORE INTO video_unique_viewers (video_id, user_id, first_viewed_at) VALUES (?, ?, ?)",
    )
    .bind(video_id)
    .bind(user_id)
    .bind(now_ms)
    .execute(&mut *tx)
    .await?;
    let new_viewer = inserted.rows_affected() == 1;

    sqlx::query(
        r#"
        INSERT INTO video_stats (video_id, total_views, total_likes, unique_viewers_count, last_updated)
        VALUES (?, 1, 0, ?, ?)
        ON CONFLICT(video_id) DO UPDATE SET
            total_views = total_views + 1,
            unique_viewers_count = unique_viewers_count + excluded.unique_viewers_count,
            last_updated = excluded.last_updated
        "#,
    )
    .bind(video_id)
    .bind(new_viewer as i64)
    .bind(now_ms)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(new_viewer)
}

/// Fetch aggregates for one batch of ids
///
/// Returns only ids that have a row; callers fill defaults.
pub async fn fetch_batch(db: &Pool<Sqlite>, video_ids: &[String]) -> Result<Vec<VideoStats>> {
    if video_ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; video_ids.len()].join(", ");
    let sql = format!(
        "SELECT video_id, total_views, total_likes, unique_viewers_count, last_updated \
         FROM video_stats WHERE video_id IN ({})",
        placeholders
    );

    let mut query = sqlx::query_as::<_, (String, i64, i64, i64, Option<i64>)>(&sql);
    for id in video_ids {
        query = query.bind(id);
    }

    let rows = query.fetch_all(db).await?;
    Ok(rows
        .into_iter()
        .map(|r| VideoStats {
            video_id: r.0,
            total_views: r.1,
            total_likes: r.2,
            unique_viewers_count: r.3,
            last_updated: r.4,
        })
        .collect())
}

/// Members of a video's unique-viewer set
pub async fn unique_viewers(db: &Pool<Sqlite>, video_id: &str) -> Result<Vec<String>> {
    let viewers: Vec<String> = sqlx::query_scalar(
        "SELECT user_id FROM video_unique_viewers WHERE video_id = ? ORDER BY user_id",
    )
    .bind(video_id)
    .fetch_all(db)
    .await?;
    Ok(viewers)
}
