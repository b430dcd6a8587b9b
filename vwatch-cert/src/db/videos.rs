//! Video catalog queries

use crate::error::Result;
use sqlx::{Pool, Sqlite};
use vwatch_common::db::VideoRow;

/// All catalog rows in playlist order
pub async fn list_videos(db: &Pool<Sqlite>) -> Result<Vec<VideoRow>> {
    let rows: Vec<(String, String, i64, String, i64, Option<i64>)> = sqlx::query_as(
        r#"
        SELECT video_id, title, duration_seconds, owner_id, position, is_long_form
        FROM videos
        ORDER BY position, created_at, video_id
        "#,
    )
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| VideoRow {
            video_id: r.0,
            title: r.1,
            duration_seconds: r.2,
            owner_id: r.3,
            position: r.4,
            is_long_form: r.5.map(|v| v != 0),
        })
        .collect())
}

/// Insert or replace a catalog row
pub async fn upsert_video(db: &Pool<Sqlite>, video: &VideoRow) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO videos (video_id, title, duration_seconds, owner_id, position, is_long_form)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(video_id) DO UPDATE SET
            title = excluded.title,
            duration_seconds = excluded.duration_seconds,
            owner_id = excluded.owner_id,
            position = excluded.position,
            is_long_form = excluded.is_long_form
        "#,
    )
    .bind(&video.video_id)
    .bind(&video.title)
    .bind(video.duration_seconds)
    .bind(&video.owner_id)
    .bind(video.position)
    .bind(video.is_long_form.map(|v| v as i64))
    .execute(db)
    .await?;
    Ok(())
}
