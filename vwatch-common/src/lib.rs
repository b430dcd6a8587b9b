//! # vwatch Common Library
//!
//! Shared code for the vwatch services including:
//! - Error type shared by all crates
//! - Root folder / configuration file resolution
//! - Event types (`WatchEvent`) and the `EventBus`
//! - SQLite initialization and schema
//! - Timestamp helpers

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
