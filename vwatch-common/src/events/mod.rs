//! Event types for the vwatch event system
//!
//! Provides the shared `WatchEvent` enum and the `EventBus` that carries it.

mod session_types;

pub use session_types::{
    NavigationDirection, PlayerState, ResetReason, SideEffectKind, WatchStage, WatchedFrom,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// vwatch event types
///
/// Events are broadcast via `EventBus` and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WatchEvent {
    /// A new watch session began for a video
    SessionStarted {
        video_id: String,
        generation: u64,
        duration_seconds: u32,
        /// False when the rewatch cooldown blocks crediting this play
        eligible: bool,
        timestamp: DateTime<Utc>,
    },

    /// Certification threshold met, side effects dispatched
    CertificationTriggered {
        video_id: String,
        generation: u64,
        elapsed_seconds: f64,
        timestamp: DateTime<Utc>,
    },

    /// One second of the post-certification countdown elapsed
    CountdownTick {
        video_id: String,
        generation: u64,
        remaining: u32,
        timestamp: DateTime<Utc>,
    },

    /// Countdown reached zero
    SessionCertified {
        video_id: String,
        generation: u64,
        timestamp: DateTime<Utc>,
    },

    /// Playlist cursor moved
    PlaylistAdvanced {
        from_video_id: String,
        to_video_id: String,
        current_index: usize,
        timestamp: DateTime<Utc>,
    },

    /// Session returned to `Watching` with zero elapsed time
    SessionReset {
        video_id: Option<String>,
        generation: u64,
        reason: ResetReason,
        timestamp: DateTime<Utc>,
    },

    /// Next/previous refused while certification is in flight
    NavigationRejected {
        direction: NavigationDirection,
        stage: WatchStage,
        timestamp: DateTime<Utc>,
    },

    /// A post-certification write failed and was dropped
    SideEffectFailed {
        job_id: Uuid,
        effect: SideEffectKind,
        video_id: String,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// Owner balance debited for a credited view
    TokensDebited {
        owner_id: String,
        video_id: String,
        tokens_deducted: f64,
        remaining_balance: f64,
        timestamp: DateTime<Utc>,
    },
}

impl WatchEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            WatchEvent::SessionStarted { .. } => "SessionStarted",
            WatchEvent::CertificationTriggered { .. } => "CertificationTriggered",
            WatchEvent::CountdownTick { .. } => "CountdownTick",
            WatchEvent::SessionCertified { .. } => "SessionCertified",
            WatchEvent::PlaylistAdvanced { .. } => "PlaylistAdvanced",
            WatchEvent::SessionReset { .. } => "SessionReset",
            WatchEvent::NavigationRejected { .. } => "NavigationRejected",
            WatchEvent::SideEffectFailed { .. } => "SideEffectFailed",
            WatchEvent::TokensDebited { .. } => "TokensDebited",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// Uses `tokio::sync::broadcast` internally: publishing never blocks,
/// slow subscribers observe `Lagged` instead of stalling producers.
///
/// # Examples
///
/// ```
/// use vwatch_common::events::{EventBus, WatchEvent, WatchStage, NavigationDirection};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(WatchEvent::NavigationRejected {
///     direction: NavigationDirection::Next,
///     stage: WatchStage::Countdown,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<WatchEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: WatchEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = WatchEvent::CountdownTick {
            video_id: "abc".to_string(),
            generation: 3,
            remaining: 4,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "CountdownTick");
        assert_eq!(json["remaining"], 4);
        assert_eq!(event.event_type(), "CountdownTick");
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        bus.emit_lossy(WatchEvent::SessionCertified {
            video_id: "v".to_string(),
            generation: 1,
            timestamp: Utc::now(),
        });
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit_lossy(WatchEvent::SessionReset {
            video_id: Some("v".to_string()),
            generation: 2,
            reason: ResetReason::Closed,
            timestamp: Utc::now(),
        });

        match rx.recv().await.unwrap() {
            WatchEvent::SessionReset { generation, reason, .. } => {
                assert_eq!(generation, 2);
                assert_eq!(reason, ResetReason::Closed);
            }
            other => panic!("Unexpected event: {:?}", other),
        }
    }
}
