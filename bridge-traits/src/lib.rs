//! # Host Bridge Traits
//!
//! Capability contracts the mirror core depends on but does not implement.
//!
//! ## Overview
//!
//! The core treats the network transport, the destination file system and the
//! wall clock as black boxes. Each is expressed as a trait here so the core can
//! be driven by the desktop adapters in `bridge-desktop` in production and by
//! in-memory fakes in tests.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Method + URL + headers + body in, error or
//!   (status, headers, body) out
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Directory creation and file writes
//!   for the local mirror
//! - [`Clock`](time::Clock) - Time source for deterministic expiry tests
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations should
//! convert platform errors into it and keep the message actionable (include the
//! URL or path involved).
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single adapter can be shared by
//! every concurrent traversal step.
//!
//! ## Examples
//!
//! ```ignore
//! use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//!
//! pub struct MyHttpClient {
//!     client: reqwest::Client,
//! }
//!
//! #[async_trait]
//! impl HttpClient for MyHttpClient {
//!     async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
//!         todo!()
//!     }
//! }
//! ```

pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use storage::FileSystemAccess;
pub use time::{Clock, LogLevel, SystemClock};
