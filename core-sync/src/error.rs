use core_auth::AuthError;
use std::time::Duration;
use thiserror::Error;

/// Failures of a single request, write or whole traversal.
///
/// Per-branch failures are collected into a
/// [`SyncReport`](crate::tree::SyncReport); only [`SyncError::Timeout`] ends a
/// traversal early.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request for {href} returned HTTP {status}")]
    HttpStatus { href: String, status: u16 },

    #[error("Malformed response from {href}: {reason}")]
    MalformedResponse { href: String, reason: String },

    #[error("Failed to write {path}: {reason}")]
    WriteFailed { path: String, reason: String },

    #[error("No request slot became available within {0:?}")]
    RateLimitTimeout(Duration),

    #[error("Sync timeout after {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, SyncError>;
