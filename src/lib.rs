//! Content mirror façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP transport and
//! file system) into the auth and sync crates. The `content-mirror` binary uses
//! [`bootstrap_desktop`], which picks the `bridge-desktop` adapters; embedders
//! and tests build [`MirrorDependencies`] themselves.

pub mod error;

pub use error::{MirrorError, Result};

pub use core_auth::{Credential, TokenManager};
pub use core_runtime::{EventBus, MirrorConfig};
pub use core_sync::{SyncFailure, SyncReport, TreeSync};

use std::sync::Arc;

use bridge_desktop::{ReqwestHttpClient, TokioFileSystem};
use bridge_traits::{http::HttpClient, storage::FileSystemAccess};
use core_auth::FileCredentialStore;
use core_sync::AuthorizedClient;
use tracing::info;

/// Aggregated handle to the bridge dependencies the mirror requires.
pub struct MirrorDependencies {
    pub http_client: Arc<dyn HttpClient>,
    pub filesystem: Arc<dyn FileSystemAccess>,
}

impl MirrorDependencies {
    pub fn new(http_client: Arc<dyn HttpClient>, filesystem: Arc<dyn FileSystemAccess>) -> Self {
        Self {
            http_client,
            filesystem,
        }
    }
}

/// One configured mirror: credential lifecycle, throttled client and tree
/// sync sharing a single event bus.
pub struct ContentMirror {
    config: MirrorConfig,
    token_manager: Arc<TokenManager>,
    tree_sync: TreeSync,
    event_bus: EventBus,
}

impl ContentMirror {
    pub fn new(config: MirrorConfig, deps: MirrorDependencies, event_bus: EventBus) -> Self {
        let store = Arc::new(FileCredentialStore::new(
            deps.filesystem.clone(),
            config.storage_path.clone(),
        ));

        let token_manager = Arc::new(
            TokenManager::from_config(&config, deps.http_client.clone(), store)
                .with_event_bus(event_bus.clone()),
        );

        let client = Arc::new(
            AuthorizedClient::from_config(&config, deps.http_client, token_manager.clone())
                .with_event_bus(event_bus.clone()),
        );

        let tree_sync =
            TreeSync::from_config(&config, client, deps.filesystem).with_event_bus(event_bus.clone());

        Self {
            config,
            token_manager,
            tree_sync,
            event_bus,
        }
    }

    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn token_manager(&self) -> &Arc<TokenManager> {
        &self.token_manager
    }

    /// Mirror the configured content library root into the file directory.
    pub async fn run(&self) -> Result<SyncReport> {
        let report = self
            .tree_sync
            .fetch_all(&self.config.content_library_href)
            .await?;
        Ok(report)
    }

    /// Forget the persisted credential so the next run logs in again.
    pub async fn clear_credential(&self) -> Result<()> {
        self.token_manager.clear().await?;
        Ok(())
    }
}

/// Build a mirror backed by reqwest and `tokio::fs`.
pub fn bootstrap_desktop(config: MirrorConfig, event_bus: EventBus) -> Result<ContentMirror> {
    let http_client = ReqwestHttpClient::new()
        .map_err(|e| MirrorError::InitializationFailed(e.to_string()))?;

    info!(
        auth_endpoint = %config.auth_endpoint,
        file_dir = ?config.file_dir,
        "Bootstrapping desktop mirror"
    );

    let deps = MirrorDependencies::new(Arc::new(http_client), Arc::new(TokioFileSystem::new()));
    Ok(ContentMirror::new(config, deps, event_bus))
}
