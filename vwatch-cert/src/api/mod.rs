//! HTTP presentation API
//!
//! Player reports in, session/watch/availability views out, plus an SSE
//! stream of `WatchEvent`s.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{build_router, run, AppContext};
