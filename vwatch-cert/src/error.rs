//! Error types for vwatch-cert
//!
//! Errors never cross the certification boundary: side-effect workers log
//! and swallow them. They surface only through the HTTP layer and startup.

use thiserror::Error;

/// Main error type for vwatch-cert
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Errors from the shared library
    #[error(transparent)]
    Common(#[from] vwatch_common::Error),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Playlist construction or navigation errors
    #[error("Playlist error: {0}")]
    Playlist(String),

    /// Navigation refused while certification is in flight
    #[error("Session locked: {0}")]
    Locked(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using vwatch-cert Error
pub type Result<T> = std::result::Result<T, Error>;
