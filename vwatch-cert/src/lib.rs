//! # vwatch Certification Service Library (vwatch-cert)
//!
//! Decides when a video play counts as a view, then records the view,
//! bumps the aggregates and debits the owner's tokens.
//!
//! **Architecture:** one engine task owns the watch session and playlist;
//! certification fans out through an outbox to three independent writers;
//! an Axum API exposes player reports, presentation reads and SSE.

pub mod aggregator;
pub mod api;
pub mod catalog;
pub mod certification;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod outbox;
pub mod playlist;
pub mod rewatch;
pub mod state;
pub mod watch_records;

pub use error::{Error, Result};
pub use state::SharedState;
