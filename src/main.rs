//! `content-mirror` command line entry point.
//!
//! Reads `CONTENT_MIRROR_*` settings from the environment, mirrors the content
//! library once and prints a summary.
//!
//! ```bash
//! CONTENT_MIRROR_USERNAME=api_user \
//! CONTENT_MIRROR_PASSWORD=... \
//! CONTENT_MIRROR_AUTH_ENDPOINT=https://login.example.com/rest/api/v1.3/auth/token \
//! CONTENT_MIRROR_CONTENT_LIBRARY_HREF=/rest/api/v1.3/clFolders \
//! CONTENT_MIRROR_FILE_DIR=./mirror \
//! content-mirror
//!
//! # Forget the stored credential first
//! content-mirror --logout
//! ```
//!
//! Logging is controlled by `CONTENT_MIRROR_LOG_FORMAT` (`pretty`, `json`,
//! `compact`), `CONTENT_MIRROR_LOG_LEVEL` and, for full control,
//! `CONTENT_MIRROR_LOG_FILTER`.

use anyhow::Context;
use bridge_traits::time::LogLevel;
use content_mirror::{bootstrap_desktop, EventBus, MirrorConfig};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use std::env;
use tracing::{info, warn};

fn logging_from_env() -> LoggingConfig {
    let mut config = LoggingConfig::default();

    if let Some(format) = env::var("CONTENT_MIRROR_LOG_FORMAT")
        .ok()
        .and_then(|v| LogFormat::parse(&v))
    {
        config = config.with_format(format);
    }
    if let Some(level) = env::var("CONTENT_MIRROR_LOG_LEVEL")
        .ok()
        .and_then(|v| LogLevel::parse(&v))
    {
        config = config.with_level(level);
    }
    if let Ok(filter) = env::var("CONTENT_MIRROR_LOG_FILTER") {
        config = config.with_filter(filter);
    }

    config
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(logging_from_env()).context("Failed to initialize logging")?;

    let logout = env::args().skip(1).any(|arg| arg == "--logout");

    let config = MirrorConfig::from_env().context("Invalid configuration")?;
    info!(config = ?config, "Loaded configuration");

    let mirror = bootstrap_desktop(config, EventBus::default())?;

    if logout {
        mirror.clear_credential().await?;
    }

    let report = mirror.run().await.context("Mirror run failed")?;

    for failure in &report.failures {
        warn!(failed = %failure.target, error = %failure.error, "Not mirrored");
    }

    println!(
        "Mirrored {} documents and {} items from {} requests ({} failures) into {}",
        report.documents_written,
        report.items_written,
        report.requests,
        report.failures.len(),
        mirror.config().file_dir.display()
    );

    Ok(())
}
