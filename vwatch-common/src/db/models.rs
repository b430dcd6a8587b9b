//! Database models
//!
//! Row-shaped structs matching the persisted layout.

use crate::events::WatchedFrom;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
}

/// Durable per-(user, video) watch record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchRecord {
    pub user_id: String,
    pub video_id: String,
    pub watch_count: u32,
    pub certified: bool,
    /// Epoch milliseconds of the latest certification
    pub watched_at: i64,
    /// Server clock at the latest write
    pub last_watched_at: DateTime<Utc>,
    pub watched_from: WatchedFrom,
}

/// Canonical view counters for one video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoStats {
    pub video_id: String,
    pub total_views: i64,
    pub total_likes: i64,
    pub unique_viewers_count: i64,
    /// Epoch milliseconds; `None` until the first view
    pub last_updated: Option<i64>,
}

impl VideoStats {
    /// Zero-valued aggregate for a video with no record yet
    pub fn empty(video_id: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            total_views: 0,
            total_likes: 0,
            unique_viewers_count: 0,
            last_updated: None,
        }
    }
}

/// Address of one denormalized copy of a video's metadata
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplicaLocator {
    pub video_id: String,
    pub context: String,
}

/// Catalog row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRow {
    pub video_id: String,
    pub title: String,
    pub duration_seconds: i64,
    pub owner_id: String,
    pub position: i64,
    pub is_long_form: Option<bool>,
}
