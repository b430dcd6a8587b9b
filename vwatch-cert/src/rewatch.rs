//! Rewatch gate
//!
//! Cooldown policy over the watch record store: after a certification the
//! same user cannot re-certify the same video until `watched_at + cooldown`.
//! The gate is advisory; locked videos stay listed with a countdown the
//! client recomputes on its own.

use crate::catalog::VideoRef;
use crate::error::Result;
use crate::watch_records::WatchRecordStore;
use serde::Serialize;
use std::collections::HashMap;
use vwatch_common::db::WatchRecord;
use vwatch_common::time::{minutes_until, now_millis};

/// Whether a record allows rewatching at `now_ms`
pub fn can_rewatch_at(record: Option<&WatchRecord>, cooldown_ms: i64, now_ms: i64) -> bool {
    match record {
        Some(record) if record.certified => now_ms >= record.watched_at + cooldown_ms,
        _ => true,
    }
}

/// Whole minutes (rounded up) until the record allows rewatching
pub fn minutes_until_rewatch_at(record: Option<&WatchRecord>, cooldown_ms: i64, now_ms: i64) -> i64 {
    match record {
        Some(record) if record.certified => minutes_until(record.watched_at + cooldown_ms, now_ms),
        _ => 0,
    }
}

/// A video held back by the cooldown
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockedVideo {
    pub video: VideoRef,
    pub minutes_remaining: i64,
    /// Epoch milliseconds at which the video unlocks
    pub available_at: i64,
}

/// Videos split by cooldown state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub available: Vec<VideoRef>,
    pub locked: Vec<LockedVideo>,
    /// How often a client should recompute the locked countdowns
    pub refresh_after_secs: u64,
}

#[derive(Clone)]
pub struct RewatchGate {
    store: WatchRecordStore,
    user_id: String,
    cooldown_ms: i64,
    refresh_after_secs: u64,
}

impl RewatchGate {
    pub fn new(store: WatchRecordStore, user_id: impl Into<String>, cooldown_ms: i64, refresh_after_secs: u64) -> Self {
        Self {
            store,
            user_id: user_id.into(),
            cooldown_ms,
            refresh_after_secs,
        }
    }

    pub fn cooldown_ms(&self) -> i64 {
        self.cooldown_ms
    }

    pub fn refresh_after_secs(&self) -> u64 {
        self.refresh_after_secs
    }

    pub async fn can_rewatch(&self, video_id: &str) -> Result<bool> {
        self.can_rewatch_at(video_id, now_millis()).await
    }

    pub async fn can_rewatch_at(&self, video_id: &str, now_ms: i64) -> Result<bool> {
        let record = self.store.get(&self.user_id, video_id).await?;
        Ok(can_rewatch_at(record.as_ref(), self.cooldown_ms, now_ms))
    }

    /// Minutes until rewatch, `ceil(max(0, deadline - now) / 60000)`
    pub async fn time_until_rewatch(&self, video_id: &str) -> Result<i64> {
        self.time_until_rewatch_at(video_id, now_millis()).await
    }

    pub async fn time_until_rewatch_at(&self, video_id: &str, now_ms: i64) -> Result<i64> {
        let record = self.store.get(&self.user_id, video_id).await?;
        Ok(minutes_until_rewatch_at(record.as_ref(), self.cooldown_ms, now_ms))
    }

    /// Split videos into available-now and locked, keeping order
    pub async fn partition(&self, videos: &[VideoRef], now_ms: i64) -> Result<Availability> {
        let records: HashMap<String, WatchRecord> = self
            .store
            .list_for_user(&self.user_id)
            .await?
            .into_iter()
            .map(|r| (r.video_id.clone(), r))
            .collect();

        let mut available = Vec::new();
        let mut locked = Vec::new();
        for video in videos {
            let record = records.get(&video.video_id);
            if can_rewatch_at(record, self.cooldown_ms, now_ms) {
                available.push(video.clone());
            } else if let Some(record) = record {
                locked.push(LockedVideo {
                    video: video.clone(),
                    minutes_remaining: minutes_until_rewatch_at(Some(record), self.cooldown_ms, now_ms),
                    available_at: record.watched_at + self.cooldown_ms,
                });
            }
        }

        Ok(Availability {
            available,
            locked,
            refresh_after_secs: self.refresh_after_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use vwatch_common::events::WatchedFrom;

    const HOUR: i64 = 3_600_000;
    const T: i64 = 1_700_000_000_000;

    async fn gate() -> (RewatchGate, WatchRecordStore) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        vwatch_common::db::create_schema(&pool).await.unwrap();
        let store = WatchRecordStore::new(pool);
        (RewatchGate::new(store.clone(), "u1", HOUR, 30), store)
    }

    #[tokio::test]
    async fn test_never_certified_can_rewatch() {
        let (gate, _) = gate().await;
        assert!(gate.can_rewatch_at("v1", T).await.unwrap());
        assert_eq!(gate.time_until_rewatch_at("v1", T).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_locked_for_full_cooldown_window() {
        let (gate, store) = gate().await;
        store.record_certified("u1", "v1", WatchedFrom::Main, T).await.unwrap();

        for now in [T, T + 1, T + HOUR / 2, T + HOUR - 1] {
            assert!(!gate.can_rewatch_at("v1", now).await.unwrap(), "locked at {}", now - T);
        }
        assert!(gate.can_rewatch_at("v1", T + HOUR).await.unwrap());
        assert!(gate.can_rewatch_at("v1", T + HOUR + 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_minutes_remaining() {
        let (gate, store) = gate().await;
        store.record_certified("u1", "v1", WatchedFrom::Main, T).await.unwrap();

        assert_eq!(gate.time_until_rewatch_at("v1", T).await.unwrap(), 60);
        assert_eq!(gate.time_until_rewatch_at("v1", T + 59 * 60_000).await.unwrap(), 1);
        assert_eq!(gate.time_until_rewatch_at("v1", T + HOUR).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_partition_keeps_locked_visible() {
        let (gate, store) = gate().await;
        store.record_certified("u1", "b", WatchedFrom::Main, T).await.unwrap();
        let videos = vec![
            VideoRef::new("a", 60, "o", "A"),
            VideoRef::new("b", 60, "o", "B"),
            VideoRef::new("c", 60, "o", "C"),
        ];

        let availability = gate.partition(&videos, T + 10 * 60_000).await.unwrap();
        let available: Vec<_> = availability.available.iter().map(|v| v.video_id.as_str()).collect();
        assert_eq!(available, vec!["a", "c"]);
        assert_eq!(availability.locked.len(), 1);
        assert_eq!(availability.locked[0].video.video_id, "b");
        assert_eq!(availability.locked[0].minutes_remaining, 50);
        assert_eq!(availability.locked[0].available_at, T + HOUR);
        assert_eq!(availability.refresh_after_secs, 30);

        let later = gate.partition(&videos, T + HOUR).await.unwrap();
        assert_eq!(later.available.len(), 3);
        assert!(later.locked.is_empty());
    }
}
