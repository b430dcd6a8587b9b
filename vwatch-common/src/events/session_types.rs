//! Watch-session type definitions
//!
//! Supporting types shared by the certification engine, the HTTP layer and
//! the event stream.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Certification stage of a watch session
///
/// Stages only move forward within one video's lifetime; the session is
/// returned to `Watching` solely by a reset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WatchStage {
    /// Accumulating playback time
    Watching,
    /// Side effects dispatched, countdown about to start
    Certifying,
    /// Counting down to playlist advance
    Countdown,
    /// Countdown finished, advance pending
    Certified,
}

impl WatchStage {
    /// Navigation is refused while certification is in flight
    pub fn is_locked(self) -> bool {
        matches!(self, WatchStage::Certifying | WatchStage::Countdown)
    }
}

impl fmt::Display for WatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchStage::Watching => write!(f, "watching"),
            WatchStage::Certifying => write!(f, "certifying"),
            WatchStage::Countdown => write!(f, "countdown"),
            WatchStage::Certified => write!(f, "certified"),
        }
    }
}

/// Hosting context a view was credited from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum WatchedFrom {
    #[default]
    Main,
    Room,
    Manual,
}

impl WatchedFrom {
    pub fn as_str(self) -> &'static str {
        match self {
            WatchedFrom::Main => "main",
            WatchedFrom::Room => "room",
            WatchedFrom::Manual => "manual",
        }
    }
}

impl fmt::Display for WatchedFrom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WatchedFrom {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "main" => Ok(WatchedFrom::Main),
            "room" => Ok(WatchedFrom::Room),
            "manual" => Ok(WatchedFrom::Manual),
            other => Err(format!("unknown watch context '{}'", other)),
        }
    }
}

/// Player state reported by the playback source
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    #[default]
    Unstarted,
    Playing,
    Paused,
    Buffering,
    Ended,
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerState::Unstarted => write!(f, "unstarted"),
            PlayerState::Playing => write!(f, "playing"),
            PlayerState::Paused => write!(f, "paused"),
            PlayerState::Buffering => write!(f, "buffering"),
            PlayerState::Ended => write!(f, "ended"),
        }
    }
}

/// Why a session was reset
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResetReason {
    /// Countdown finished and the playlist advanced
    Advanced,
    /// User navigated to another video
    Navigated,
    /// Player reported a different video
    VideoChanged,
    /// Player closed
    Closed,
}

/// External navigation request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NavigationDirection {
    Next,
    Previous,
}

/// One of the three independent post-certification writes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SideEffectKind {
    WatchRecord,
    ViewCount,
    TokenDebit,
}

impl fmt::Display for SideEffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SideEffectKind::WatchRecord => write!(f, "watch_record"),
            SideEffectKind::ViewCount => write!(f, "view_count"),
            SideEffectKind::TokenDebit => write!(f, "token_debit"),
        }
    }
}
