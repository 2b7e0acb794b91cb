use thiserror::Error;

/// Failures of the credential lifecycle.
///
/// Errors are `Clone` so a single failed login can be handed to every caller
/// that was waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Authentication failed with status {status}: {reason}")]
    AuthenticationFailed { status: u16, reason: String },

    #[error("Malformed auth response: {0}")]
    MalformedResponse(String),

    #[error("Credential storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;
