//! Watch record store
//!
//! Durable per-(user, video) certification history. The store is an
//! explicit instance over a pool so each test can own an isolated one.

use crate::db;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use vwatch_common::db::WatchRecord;
use vwatch_common::events::WatchedFrom;

/// Presentation view of a watch record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WatchInfo {
    pub watch_count: u32,
    pub certified: bool,
    /// Epoch milliseconds of the latest certification
    pub watched_at: Option<i64>,
}

impl From<&WatchRecord> for WatchInfo {
    fn from(record: &WatchRecord) -> Self {
        Self {
            watch_count: record.watch_count,
            certified: record.certified,
            watched_at: Some(record.watched_at),
        }
    }
}

#[derive(Clone)]
pub struct WatchRecordStore {
    pool: Pool<Sqlite>,
}

impl WatchRecordStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Upsert with `watch_count + 1`, `certified = true`, `watched_at = now`
    pub async fn record_certified(
        &self,
        user_id: &str,
        video_id: &str,
        watched_from: WatchedFrom,
        watched_at_ms: i64,
    ) -> Result<WatchRecord> {
        db::watch_records::upsert_certified(&self.pool, user_id, video_id, watched_from, watched_at_ms).await
    }

    pub async fn get(&self, user_id: &str, video_id: &str) -> Result<Option<WatchRecord>> {
        db::watch_records::get(&self.pool, user_id, video_id).await
    }

    /// Watch info, zero-valued when the video was never certified
    pub async fn watch_info(&self, user_id: &str, video_id: &str) -> Result<WatchInfo> {
        Ok(self
            .get(user_id, video_id)
            .await?
            .map(|record| WatchInfo::from(&record))
            .unwrap_or_default())
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<WatchRecord>> {
        db::watch_records::list_for_user(&self.pool, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> WatchRecordStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        vwatch_common::db::create_schema(&pool).await.unwrap();
        WatchRecordStore::new(pool)
    }

    #[tokio::test]
    async fn test_first_certification_creates_record() {
        let store = store().await;
        let record = store
            .record_certified("u1", "v1", WatchedFrom::Room, 1_000)
            .await
            .unwrap();
        assert_eq!(record.watch_count, 1);
        assert!(record.certified);
        assert_eq!(record.watched_at, 1_000);
        assert_eq!(record.watched_from, WatchedFrom::Room);
    }

    #[tokio::test]
    async fn test_repeat_certification_increments() {
        let store = store().await;
        store.record_certified("u1", "v1", WatchedFrom::Main, 1_000).await.unwrap();
        let record = store
            .record_certified("u1", "v1", WatchedFrom::Manual, 5_000)
            .await
            .unwrap();
        assert_eq!(record.watch_count, 2);
        assert_eq!(record.watched_at, 5_000);
        assert_eq!(record.watched_from, WatchedFrom::Manual);
    }

    #[tokio::test]
    async fn test_records_isolated_per_user() {
        let store = store().await;
        store.record_certified("u1", "v1", WatchedFrom::Main, 1_000).await.unwrap();
        assert_eq!(store.watch_info("u2", "v1").await.unwrap(), WatchInfo::default());
        assert_eq!(store.watch_info("u1", "v1").await.unwrap().watch_count, 1);
        assert_eq!(store.list_for_user("u1").await.unwrap().len(), 1);
    }
}
