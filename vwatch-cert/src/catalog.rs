//! Video catalog
//!
//! Supplies the ordered, deduplicated list of videos a playlist is built
//! from. Classification is always derived locally from the duration; a
//! precomputed catalog flag is only cross-checked.

use crate::certification::{CertificationPolicy, VideoClass};
use crate::db;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use std::collections::HashSet;
use tracing::warn;

/// One playable video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRef {
    pub video_id: String,
    /// Zero while unresolved
    pub duration_seconds: u32,
    pub owner_id: String,
    pub title: String,
}

impl VideoRef {
    pub fn new(
        video_id: impl Into<String>,
        duration_seconds: u32,
        owner_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            duration_seconds,
            owner_id: owner_id.into(),
            title: title.into(),
        }
    }
}

/// Source of playlist contents
#[async_trait]
pub trait VideoCatalog: Send + Sync {
    /// Ordered videos, duplicates removed (first occurrence wins)
    async fn load(&self) -> Result<Vec<VideoRef>>;
}

/// Drop repeated video ids, keeping the first occurrence and the order
pub fn dedupe(videos: Vec<VideoRef>) -> Vec<VideoRef> {
    let mut seen = HashSet::new();
    videos
        .into_iter()
        .filter(|v| seen.insert(v.video_id.clone()))
        .collect()
}

/// Catalog backed by the `videos` table
pub struct SqliteCatalog {
    pool: Pool<Sqlite>,
    policy: CertificationPolicy,
}

impl SqliteCatalog {
    pub fn new(pool: Pool<Sqlite>, policy: CertificationPolicy) -> Self {
        Self { pool, policy }
    }
}

#[async_trait]
impl VideoCatalog for SqliteCatalog {
    async fn load(&self) -> Result<Vec<VideoRef>> {
        let rows = db::videos::list_videos(&self.pool).await?;

        let videos = rows
            .into_iter()
            .map(|row| {
                let duration = row.duration_seconds.clamp(0, u32::MAX as i64) as u32;
                if let Some(precomputed) = row.is_long_form {
                    let derived = self.policy.classify(duration) == VideoClass::LongForm;
                    if precomputed != derived {
                        warn!(
                            "Catalog classification for {} disagrees with duration {}s; using derived {:?}",
                            row.video_id,
                            duration,
                            self.policy.classify(duration)
                        );
                    }
                }
                VideoRef {
                    video_id: row.video_id,
                    duration_seconds: duration,
                    owner_id: row.owner_id,
                    title: row.title,
                }
            })
            .collect();

        Ok(dedupe(videos))
    }
}

/// Fixed in-memory catalog
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    videos: Vec<VideoRef>,
}

impl StaticCatalog {
    pub fn new(videos: Vec<VideoRef>) -> Self {
        Self { videos }
    }
}

#[async_trait]
impl VideoCatalog for StaticCatalog {
    async fn load(&self) -> Result<Vec<VideoRef>> {
        Ok(dedupe(self.videos.clone()))
    }
}
