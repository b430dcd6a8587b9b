//! Database access layer
//!
//! Query functions for settings, the video catalog, watch records, view
//! counters and token balances. Policy lives in the component modules.

pub mod settings;
pub mod token_balances;
pub mod video_stats;
pub mod videos;
pub mod watch_records;
