//! # Tree Synchronization
//!
//! Mirrors a remote content tree onto the local file system.
//!
//! ## Overview
//!
//! [`TreeSync::fetch_all`] starts at a root href and fetches every node
//! reachable through traversal links, writing document and item payloads under
//! the configured file directory.
//!
//! ## Completion
//!
//! All outstanding work lives in one `FuturesUnordered` set owned by the
//! driver loop. A visit resolves to the parsed node; the driver pushes that
//! node's child visits and its payload write into the set *before* polling for
//! the next outcome. The set can therefore only become empty once every
//! transitively spawned request and write has finished, and `fetch_all`
//! returns exactly then.
//!
//! ## Failures
//!
//! A failed request, a non-200 status, an unparsable body or a failed write is
//! logged, emitted as an event and recorded in the [`SyncReport`]. It never
//! stops sibling branches. Only the optional deadline ends a traversal early,
//! in which case in-flight requests and writes are dropped.

use crate::client::AuthorizedClient;
use crate::error::{Result, SyncError};
use crate::node::{Payload, PayloadKind, RemoteNode};
use bridge_traits::storage::FileSystemAccess;
use bytes::Bytes;
use core_runtime::config::MirrorConfig;
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use core_runtime::logging::strip_path;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// One request or write that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    /// The href that was requested, or the local path that was written.
    pub target: String,
    pub error: SyncError,
}

/// Summary of a finished traversal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Requests that completed, successfully or not.
    pub requests: u64,
    pub documents_written: u64,
    pub items_written: u64,
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    pub fn files_written(&self) -> u64 {
        self.documents_written + self.items_written
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

enum Outcome {
    Visited {
        href: String,
        result: Result<RemoteNode>,
    },
    Written {
        path: String,
        kind: PayloadKind,
        result: Result<u64>,
    },
}

pub struct TreeSync {
    client: Arc<AuthorizedClient>,
    fs: Arc<dyn FileSystemAccess>,
    file_dir: PathBuf,
    timeout: Option<Duration>,
    event_bus: EventBus,
}

impl TreeSync {
    pub fn new(
        client: Arc<AuthorizedClient>,
        fs: Arc<dyn FileSystemAccess>,
        file_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            fs,
            file_dir: file_dir.into(),
            timeout: None,
            event_bus: EventBus::default(),
        }
    }

    pub fn from_config(
        config: &MirrorConfig,
        client: Arc<AuthorizedClient>,
        fs: Arc<dyn FileSystemAccess>,
    ) -> Self {
        let sync = Self::new(client, fs, config.file_dir.clone());
        match config.sync_timeout {
            Some(timeout) => sync.with_timeout(timeout),
            None => sync,
        }
    }

    /// Abort the traversal with [`SyncError::Timeout`] once `timeout` elapses.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = event_bus;
        self
    }

    /// Mirror everything reachable from `root_href`.
    ///
    /// Returns once every spawned request and write has finished. Branch
    /// failures are listed in the report; the only error is
    /// [`SyncError::Timeout`].
    #[instrument(skip(self))]
    pub async fn fetch_all(&self, root_href: &str) -> Result<SyncReport> {
        let started = Instant::now();
        info!(root = %root_href, file_dir = ?self.file_dir, "Starting sync");
        self.emit(SyncEvent::Started {
            root: root_href.to_string(),
        });

        let mut report = SyncReport::default();
        let drained = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.drain(root_href, &mut report))
                .await
                .map_err(|_| limit),
            None => {
                self.drain(root_href, &mut report).await;
                Ok(())
            }
        };

        if let Err(limit) = drained {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            warn!(
                elapsed_ms,
                requests = report.requests,
                files_written = report.files_written(),
                "Sync timed out, abandoning in-flight work"
            );
            self.emit(SyncEvent::TimedOut { elapsed_ms });
            return Err(SyncError::Timeout(limit));
        }

        info!(
            requests = report.requests,
            documents = report.documents_written,
            items = report.items_written,
            failures = report.failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Sync completed"
        );
        self.emit(SyncEvent::Completed {
            requests: report.requests,
            files_written: report.files_written(),
            failures: report.failures.len() as u64,
        });

        Ok(report)
    }

    async fn drain(&self, root_href: &str, report: &mut SyncReport) {
        let mut pending: FuturesUnordered<BoxFuture<'_, Outcome>> = FuturesUnordered::new();
        let mut seen: HashSet<String> = HashSet::new();

        seen.insert(root_href.to_string());
        pending.push(self.visit(root_href.to_string()));

        while let Some(outcome) = pending.next().await {
            match outcome {
                Outcome::Visited { href, result } => {
                    report.requests += 1;
                    match result {
                        Ok(node) => {
                            for link in node.children() {
                                if seen.insert(link.href.clone()) {
                                    pending.push(self.visit(link.href.clone()));
                                } else {
                                    debug!(href = %link.href, "Skipping already visited href");
                                }
                            }
                            if let Some(payload) = node.payload() {
                                pending.push(self.write(payload));
                            }
                        }
                        Err(error) => {
                            warn!(href = %href, error = %error, "Branch failed");
                            self.emit(SyncEvent::BranchFailed {
                                href: href.clone(),
                                error: error.to_string(),
                            });
                            report.failures.push(SyncFailure {
                                target: href,
                                error,
                            });
                        }
                    }
                }
                Outcome::Written { path, kind, result } => match result {
                    Ok(bytes) => {
                        info!(path = %path, bytes, "Wrote file");
                        self.emit(SyncEvent::FileWritten { path, bytes });
                        match kind {
                            PayloadKind::Document => report.documents_written += 1,
                            PayloadKind::Item => report.items_written += 1,
                        }
                    }
                    Err(error) => {
                        warn!(path = %path, error = %error, "Write failed");
                        self.emit(SyncEvent::WriteFailed {
                            path: path.clone(),
                            error: error.to_string(),
                        });
                        report.failures.push(SyncFailure {
                            target: path,
                            error,
                        });
                    }
                },
            }
        }
    }

    fn visit(&self, href: String) -> BoxFuture<'_, Outcome> {
        async move {
            let result = self.fetch_node(&href).await;
            Outcome::Visited { href, result }
        }
        .boxed()
    }

    async fn fetch_node(&self, href: &str) -> Result<RemoteNode> {
        let response = self.client.get(href).await?;

        if response.status != 200 {
            return Err(SyncError::HttpStatus {
                href: href.to_string(),
                status: response.status,
            });
        }

        RemoteNode::parse(href, &response.body)
    }

    fn write(&self, payload: Payload) -> BoxFuture<'_, Outcome> {
        async move {
            let kind = payload.kind;
            let (path, result) = match self.destination(&payload.path) {
                Ok(destination) => {
                    let result = self.write_file(&destination, payload.data).await;
                    (destination.display().to_string(), result)
                }
                Err(error) => (payload.path, Err(error)),
            };
            Outcome::Written { path, kind, result }
        }
        .boxed()
    }

    /// The file directory with the remote path appended verbatim.
    fn destination(&self, remote_path: &str) -> Result<PathBuf> {
        let escapes_root = Path::new(remote_path)
            .components()
            .any(|c| matches!(c, Component::ParentDir));

        if escapes_root || remote_path.is_empty() {
            return Err(SyncError::WriteFailed {
                path: remote_path.to_string(),
                reason: "remote path is empty or leaves the file directory".to_string(),
            });
        }

        let mut destination = self.file_dir.clone().into_os_string();
        destination.push(remote_path);
        Ok(PathBuf::from(destination))
    }

    async fn write_file(&self, destination: &Path, data: Bytes) -> Result<u64> {
        let write_failed = |reason: String| SyncError::WriteFailed {
            path: destination.display().to_string(),
            reason,
        };

        if let Some(parent) = destination.parent() {
            self.fs
                .create_dir_all(parent)
                .await
                .map_err(|e| write_failed(e.to_string()))?;
        }

        let bytes = data.len() as u64;
        self.fs
            .write_file(destination, data)
            .await
            .map_err(|e| write_failed(e.to_string()))?;

        debug!(file = %strip_path(&destination.display().to_string()), bytes, "Payload stored");
        Ok(bytes)
    }

    fn emit(&self, event: SyncEvent) {
        let _ = self.event_bus.emit(CoreEvent::Sync(event));
    }
}
