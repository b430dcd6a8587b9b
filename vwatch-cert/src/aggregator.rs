//! View aggregator
//!
//! Fans a credited view out to every replica mirror counter and to the
//! canonical aggregate. Replica writes are isolated from each other: one
//! failing locator is logged and skipped, never rolling back the rest.

use crate::db;
use crate::error::Result;
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;
use tracing::{debug, warn};
use vwatch_common::db::{ReplicaLocator, VideoStats};
use vwatch_common::time::now_millis;

/// Upper bound of ids per "fetch by id-list" query
pub const MAX_BATCH_SIZE: usize = 10;

/// Outcome of one fan-out increment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncrementReport {
    pub replicas_updated: usize,
    /// Undercounted until a later view touches them again
    pub replicas_failed: Vec<ReplicaLocator>,
    /// True when the user joined the unique-viewer set
    pub new_unique_viewer: bool,
}

#[derive(Clone)]
pub struct ViewAggregator {
    pool: Pool<Sqlite>,
    batch_size: usize,
}

impl ViewAggregator {
    pub fn new(pool: Pool<Sqlite>, batch_size: usize) -> Self {
        Self {
            pool,
            batch_size: batch_size.clamp(1, MAX_BATCH_SIZE),
        }
    }

    /// Count one view of `video_id` by `user_id`
    ///
    /// Errors only when the canonical aggregate cannot be written.
    pub async fn increment(&self, video_id: &str, user_id: &str) -> Result<IncrementReport> {
        let now_ms = now_millis();

        let replicas = match db::video_stats::list_replicas(&self.pool, video_id).await {
            Ok(replicas) => replicas,
            Err(e) => {
                warn!("Could not list replicas for {}: {}", video_id, e);
                Vec::new()
            }
        };

        let mut replicas_updated = 0;
        let mut replicas_failed = Vec::new();
        for locator in replicas {
            match db::video_stats::increment_replica(&self.pool, &locator, now_ms).await {
                Ok(()) => replicas_updated += 1,
                Err(e) => {
                    warn!(
                        "Replica increment failed for {}@{}: {}",
                        locator.video_id, locator.context, e
                    );
                    replicas_failed.push(locator);
                }
            }
        }

        let new_unique_viewer =
            db::video_stats::increment_canonical(&self.pool, video_id, user_id, now_ms).await?;

        debug!(
            "View counted for {}: {} replicas updated, {} failed, new viewer: {}",
            video_id,
            replicas_updated,
            replicas_failed.len(),
            new_unique_viewer
        );

        Ok(IncrementReport {
            replicas_updated,
            replicas_failed,
            new_unique_viewer,
        })
    }

    /// Aggregates for many ids, in request order
    ///
    /// Ids with no record get a zero-valued default.
    pub async fn get_many(&self, video_ids: &[String]) -> Result<Vec<VideoStats>> {
        let mut found: HashMap<String, VideoStats> = HashMap::new();
        for batch in video_ids.chunks(self.batch_size) {
            for stats in db::video_stats::fetch_batch(&self.pool, batch).await? {
                found.insert(stats.video_id.clone(), stats);
            }
        }

        Ok(video_ids
            .iter()
            .map(|id| found.get(id).cloned().unwrap_or_else(|| VideoStats::empty(id.as_str())))
            .collect())
    }

    pub async fn unique_viewers(&self, video_id: &str) -> Result<Vec<String>> {
        db::video_stats::unique_viewers(&self.pool, video_id).await
    }

    pub async fn register_replica(&self, video_id: &str, context: &str) -> Result<()> {
        db::video_stats::register_replica(&self.pool, video_id, context).await
    }
}
