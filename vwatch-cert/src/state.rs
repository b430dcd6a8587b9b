//! Shared engine state
//!
//! Read-mostly view of the certification engine for the HTTP layer, plus
//! the optimistic watch-info overlay. The engine task is the only writer
//! of the session and playlist snapshots.

use crate::catalog::VideoRef;
use crate::certification::SessionSnapshot;
use crate::error::Result;
use crate::watch_records::{WatchInfo, WatchRecordStore};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;
use vwatch_common::events::{EventBus, WatchEvent};

/// Playlist contents and cursor as last published by the engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaylistSnapshot {
    pub videos: Vec<VideoRef>,
    pub current_index: usize,
}

/// Certification dispatched but not yet confirmed by the record writer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingCertification {
    job_id: Uuid,
    watched_at: i64,
}

/// Shared state accessible by the engine, the outbox workers and the API
pub struct SharedState {
    /// Event broadcaster for SSE events
    events: EventBus,

    /// Latest session snapshot
    session: RwLock<SessionSnapshot>,

    /// Latest playlist snapshot
    playlist: RwLock<PlaylistSnapshot>,

    /// Optimistic overlay keyed by video id
    pending: RwLock<HashMap<String, Vec<PendingCertification>>>,
}

impl SharedState {
    pub fn new(event_bus_capacity: usize, countdown_seconds: u32) -> Self {
        Self {
            events: EventBus::new(event_bus_capacity),
            session: RwLock::new(SessionSnapshot::idle(countdown_seconds)),
            playlist: RwLock::new(PlaylistSnapshot::default()),
            pending: RwLock::new(HashMap::new()),
        }
    }

    /// Broadcast an event to all SSE listeners
    pub fn broadcast_event(&self, event: WatchEvent) {
        self.events.emit_lossy(event);
    }

    /// Subscribe to event stream for SSE
    pub fn subscribe_events(&self) -> broadcast::Receiver<WatchEvent> {
        self.events.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    pub async fn get_session(&self) -> SessionSnapshot {
        self.session.read().await.clone()
    }

    pub async fn set_session(&self, snapshot: SessionSnapshot) {
        *self.session.write().await = snapshot;
    }

    pub async fn get_playlist(&self) -> PlaylistSnapshot {
        self.playlist.read().await.clone()
    }

    pub async fn set_playlist(&self, snapshot: PlaylistSnapshot) {
        *self.playlist.write().await = snapshot;
    }

    /// Mark a certification as in flight so reads reflect it immediately
    pub async fn add_pending(&self, video_id: &str, job_id: Uuid, watched_at: i64) {
        self.pending
            .write()
            .await
            .entry(video_id.to_string())
            .or_default()
            .push(PendingCertification { job_id, watched_at });
    }

    /// Drop an in-flight marker once the record writer finished (either way)
    pub async fn resolve_pending(&self, video_id: &str, job_id: Uuid) {
        let mut pending = self.pending.write().await;
        if let Some(entries) = pending.get_mut(video_id) {
            entries.retain(|p| p.job_id != job_id);
            if entries.is_empty() {
                pending.remove(video_id);
            }
        }
    }

    pub async fn pending_count(&self, video_id: &str) -> usize {
        self.pending.read().await.get(video_id).map(Vec::len).unwrap_or(0)
    }

    /// Apply the overlay to a stored watch info
    ///
    /// A pending certification counts only while it is newer than the
    /// stored `watched_at`; once the write lands the stored row already
    /// includes it.
    pub async fn overlay(&self, video_id: &str, stored: WatchInfo) -> WatchInfo {
        let pending = self.pending.read().await;
        let Some(entries) = pending.get(video_id) else {
            return stored;
        };

        let stored_at = stored.watched_at.unwrap_or(i64::MIN);
        let unconfirmed: Vec<i64> = entries
            .iter()
            .map(|p| p.watched_at)
            .filter(|&at| at > stored_at)
            .collect();

        match unconfirmed.iter().max() {
            Some(&latest) => WatchInfo {
                watch_count: stored.watch_count + unconfirmed.len() as u32,
                certified: true,
                watched_at: Some(latest),
            },
            None => stored,
        }
    }

    /// Stored watch info reconciled with the optimistic overlay
    pub async fn get_watch_info(&self, store: &WatchRecordStore, user_id: &str, video_id: &str) -> Result<WatchInfo> {
        let stored = store.watch_info(user_id, video_id).await?;
        Ok(self.overlay(video_id, stored).await)
    }
}
