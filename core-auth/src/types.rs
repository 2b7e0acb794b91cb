//! Credential type shared by the store, the login flow and the manager.

use chrono::{DateTime, SubsecRound, Utc};
use std::fmt;

/// A short-lived authorization token, the time it was issued and the API
/// endpoint it is valid for.
///
/// Immutable once issued; a refresh replaces it wholesale. `issued_at` is kept
/// at millisecond precision so a persisted credential reads back equal.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    issued_at: DateTime<Utc>,
    endpoint: String,
}

impl Credential {
    /// Returns `None` when `token` is empty.
    pub fn new(
        token: impl Into<String>,
        issued_at: DateTime<Utc>,
        endpoint: impl Into<String>,
    ) -> Option<Self> {
        let token = token.into();
        if token.is_empty() {
            return None;
        }

        Some(Self {
            token,
            issued_at: issued_at.trunc_subsecs(3),
            endpoint: endpoint.into(),
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Base URL that authorized request paths are appended to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Whole hours elapsed since issue must be strictly below `expiry_hours`.
    pub fn is_valid_at(&self, now: DateTime<Utc>, expiry_hours: u32) -> bool {
        (now - self.issued_at).num_hours() < i64::from(expiry_hours)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"[REDACTED]")
            .field("issued_at", &self.issued_at)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
