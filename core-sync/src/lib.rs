//! # Sync Module
//!
//! Mirrors a remote content library onto local storage.
//!
//! ## Overview
//!
//! This module walks the content tree through authorized, rate-limited
//! requests and writes every document and item it finds under the file
//! directory:
//! - Bounding the outbound request rate with a token bucket
//! - Attaching a valid credential to every request
//! - Parsing each response into a typed node
//! - Fanning out over child links and draining all work before completion
//!
//! ## Components
//!
//! - **Rate Limiter** (`throttle`): FIFO token bucket refilled once per interval
//! - **Authorized Client** (`client`): Credential + throttle + transport, with an optional concurrency cap
//! - **Remote Nodes** (`node`): Folder/document/item parsing and traversal relations
//! - **Tree Sync** (`tree`): Concurrent traversal with a single completion point

pub mod client;
pub mod error;
pub mod node;
pub mod throttle;
pub mod tree;

pub use client::AuthorizedClient;
pub use error::{Result, SyncError};
pub use node::{Link, Payload, PayloadKind, RemoteNode};
pub use throttle::RateLimiter;
pub use tree::{SyncFailure, SyncReport, TreeSync};
