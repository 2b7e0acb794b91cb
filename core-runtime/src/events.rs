//! # Event Bus System
//!
//! Typed side channel for observing authentication, request and sync activity,
//! built on `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! Emitting never affects the emitter: with no subscribers the event is simply
//! dropped. Subscribers that fall behind receive `RecvError::Lagged` and can
//! keep going.
//!
//! ```text
//! ┌──────────────┐   emit   ┌──────────┐  subscribe  ┌────────────┐
//! │ TokenManager ├─────────>│          ├────────────>│ Subscriber │
//! └──────────────┘          │ EventBus │             └────────────┘
//! ┌──────────────┐   emit   │          │
//! │ TreeSync     ├─────────>│          │
//! └──────────────┘          └──────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBus, CoreEvent, SyncEvent};
//!
//! let event_bus = EventBus::new(100);
//! let mut rx = event_bus.subscribe();
//!
//! event_bus.emit(CoreEvent::Sync(SyncEvent::Started {
//!     root: "/rest/api/v1.3/clFolders".to_string(),
//! })).ok();
//!
//! assert!(matches!(rx.try_recv(), Ok(CoreEvent::Sync(SyncEvent::Started { .. }))));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Credential lifecycle events
    Auth(AuthEvent),
    /// Outcome of each authorized request
    Request(RequestEvent),
    /// Tree synchronization progress
    Sync(SyncEvent),
}

impl CoreEvent {
    /// Short human-readable description, used for log lines.
    pub fn description(&self) -> String {
        match self {
            CoreEvent::Auth(e) => e.to_string(),
            CoreEvent::Request(e) => e.to_string(),
            CoreEvent::Sync(e) => e.to_string(),
        }
    }
}

/// Credential lifecycle events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind")]
pub enum AuthEvent {
    /// A login request is in flight
    Authenticating,
    /// A fresh credential was issued and persisted
    Authenticated { endpoint: String },
    /// Login failed; the previous credential (if any) is untouched
    AuthFailed { message: String },
    /// Persisted and cached credentials were removed
    CredentialCleared,
}

impl fmt::Display for AuthEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthEvent::Authenticating => write!(f, "authenticating"),
            AuthEvent::Authenticated { endpoint } => write!(f, "authenticated for {}", endpoint),
            AuthEvent::AuthFailed { message } => write!(f, "authentication failed: {}", message),
            AuthEvent::CredentialCleared => write!(f, "credential cleared"),
        }
    }
}

/// `{method, path, outcome}` record for an authorized request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind")]
pub enum RequestEvent {
    Completed {
        method: String,
        path: String,
        status: u16,
        duration_ms: u64,
    },
    Failed {
        method: String,
        path: String,
        error: String,
    },
}

impl fmt::Display for RequestEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestEvent::Completed {
                method,
                path,
                status,
                ..
            } => write!(f, "{} {} -> {}", method, path, status),
            RequestEvent::Failed {
                method,
                path,
                error,
            } => write!(f, "{} {} failed: {}", method, path, error),
        }
    }
}

/// Tree synchronization events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind")]
pub enum SyncEvent {
    Started {
        root: String,
    },
    FileWritten {
        path: String,
        bytes: u64,
    },
    WriteFailed {
        path: String,
        error: String,
    },
    BranchFailed {
        href: String,
        error: String,
    },
    Completed {
        requests: u64,
        files_written: u64,
        failures: u64,
    },
    TimedOut {
        elapsed_ms: u64,
    },
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncEvent::Started { root } => write!(f, "sync started at {}", root),
            SyncEvent::FileWritten { path, bytes } => write!(f, "wrote {} ({} bytes)", path, bytes),
            SyncEvent::WriteFailed { path, error } => write!(f, "write {} failed: {}", path, error),
            SyncEvent::BranchFailed { href, error } => {
                write!(f, "branch {} failed: {}", href, error)
            }
            SyncEvent::Completed {
                requests,
                files_written,
                failures,
            } => write!(
                f,
                "sync completed: {} requests, {} files, {} failures",
                requests, files_written, failures
            ),
            SyncEvent::TimedOut { elapsed_ms } => write!(f, "sync timed out after {}ms", elapsed_ms),
        }
    }
}

/// Central broadcast channel for [`CoreEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// When a subscriber falls behind by more than `capacity` events it
    /// receives `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns an error if there are no active subscribers; callers that only
    /// emit for observability ignore it.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let event_bus = EventBus::new(10);
        let result = event_bus.emit(CoreEvent::Auth(AuthEvent::Authenticating));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_event_emission_with_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let event = CoreEvent::Request(RequestEvent::Completed {
            method: "GET".to_string(),
            path: "/clFolders".to_string(),
            status: 200,
            duration_ms: 12,
        });
        assert_eq!(event_bus.emit(event.clone()).unwrap(), 1);

        let received = receiver.recv().await.unwrap();
        assert_eq!(received, event);
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let event_bus = EventBus::new(10);
        let mut first = event_bus.subscribe();
        let mut second = event_bus.subscribe();
        assert_eq!(event_bus.subscriber_count(), 2);

        let event = CoreEvent::Sync(SyncEvent::Started {
            root: "/root".to_string(),
        });
        event_bus.emit(event.clone()).unwrap();

        assert_eq!(first.recv().await.unwrap(), event);
        assert_eq!(second.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let event_bus = EventBus::new(2);
        let mut receiver = event_bus.subscribe();

        for i in 0..5 {
            event_bus
                .emit(CoreEvent::Sync(SyncEvent::FileWritten {
                    path: format!("/f{}", i),
                    bytes: i,
                }))
                .unwrap();
        }

        assert!(matches!(receiver.try_recv(), Err(TryRecvError::Lagged(_))));
        assert!(receiver.try_recv().is_ok());
    }

    #[test]
    fn test_event_description() {
        let event = CoreEvent::Request(RequestEvent::Failed {
            method: "GET".to_string(),
            path: "/a".to_string(),
            error: "connection refused".to_string(),
        });
        assert_eq!(event.description(), "GET /a failed: connection refused");

        let event = CoreEvent::Sync(SyncEvent::Completed {
            requests: 4,
            files_written: 3,
            failures: 0,
        });
        assert_eq!(
            event.description(),
            "sync completed: 4 requests, 3 files, 0 failures"
        );
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = CoreEvent::Auth(AuthEvent::Authenticated {
            endpoint: "https://api.example.com".to_string(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Auth");
        assert_eq!(json["payload"]["kind"], "Authenticated");
    }
}
