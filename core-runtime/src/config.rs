//! # Mirror Configuration
//!
//! Provides configuration management for the content mirror.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `MirrorConfig`
//! that holds every setting the auth and sync layers need. Validation is
//! fail-fast: a config that would make the mirror misbehave (zero throttle,
//! relative auth endpoint, empty root href) is rejected at build time.
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::MirrorConfig;
//!
//! let config = MirrorConfig::builder()
//!     .username("api_user")
//!     .password("secret")
//!     .auth_endpoint("https://login.example.com/rest/api/v1.3/auth/token")
//!     .content_library_href("/rest/api/v1.3/clFolders")
//!     .file_dir("/tmp/mirror")
//!     .throttle(5, 1000)
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.throttle_num_requests, 5);
//! ```
//!
//! ## Environment
//!
//! [`MirrorConfig::from_env`] reads `CONTENT_MIRROR_*` variables; see
//! [`env_keys`] for the full list.

use crate::error::{Error, Result};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default credential lifetime in hours.
pub const DEFAULT_TOKEN_EXPIRY_HOURS: u32 = 2;

/// Default throttle: requests per interval.
pub const DEFAULT_THROTTLE_NUM_REQUESTS: u32 = 10;

/// Default throttle interval in milliseconds.
pub const DEFAULT_THROTTLE_RATE_MS: u64 = 1000;

/// Environment variable names recognized by [`MirrorConfig::from_env`].
pub mod env_keys {
    pub const USERNAME: &str = "CONTENT_MIRROR_USERNAME";
    pub const PASSWORD: &str = "CONTENT_MIRROR_PASSWORD";
    pub const AUTH_ENDPOINT: &str = "CONTENT_MIRROR_AUTH_ENDPOINT";
    pub const TOKEN_EXPIRY_HOURS: &str = "CONTENT_MIRROR_TOKEN_EXPIRY_HOURS";
    pub const STORAGE_FILE: &str = "CONTENT_MIRROR_STORAGE_FILE";
    pub const THROTTLE_NUM_REQUESTS: &str = "CONTENT_MIRROR_THROTTLE_NUM_REQUESTS";
    pub const THROTTLE_RATE_MS: &str = "CONTENT_MIRROR_THROTTLE_RATE_MS";
    pub const CONTENT_LIBRARY_HREF: &str = "CONTENT_MIRROR_CONTENT_LIBRARY_HREF";
    pub const FILE_DIR: &str = "CONTENT_MIRROR_FILE_DIR";
    pub const MAX_CONCURRENT_REQUESTS: &str = "CONTENT_MIRROR_MAX_CONCURRENT_REQUESTS";
    pub const SYNC_TIMEOUT_SECS: &str = "CONTENT_MIRROR_SYNC_TIMEOUT_SECS";
    pub const REAUTH_ON_UNAUTHORIZED: &str = "CONTENT_MIRROR_REAUTH_ON_UNAUTHORIZED";
}

/// Settings for one mirror client. Read-only once built.
#[derive(Clone)]
pub struct MirrorConfig {
    /// Login user name for the password grant
    pub username: String,

    /// Login password for the password grant
    pub password: String,

    /// Absolute URL of the login endpoint
    pub auth_endpoint: String,

    /// Credential lifetime in whole hours
    pub token_expiry_hours: u32,

    /// Location of the persisted credential file
    pub storage_path: PathBuf,

    /// Requests allowed per throttle interval
    pub throttle_num_requests: u32,

    /// Throttle interval in milliseconds
    pub throttle_rate_ms: u64,

    /// Endpoint-relative href where traversal starts
    pub content_library_href: String,

    /// Local directory the remote tree is mirrored into
    pub file_dir: PathBuf,

    /// Upper bound on simultaneous in-flight requests (unbounded if `None`)
    pub max_concurrent_requests: Option<usize>,

    /// Deadline for a whole traversal (none if `None`)
    pub sync_timeout: Option<Duration>,

    /// Re-authenticate once and retry when a request returns HTTP 401
    pub reauth_on_unauthorized: bool,
}

impl fmt::Debug for MirrorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MirrorConfig")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("auth_endpoint", &self.auth_endpoint)
            .field("token_expiry_hours", &self.token_expiry_hours)
            .field("storage_path", &self.storage_path)
            .field("throttle_num_requests", &self.throttle_num_requests)
            .field("throttle_rate_ms", &self.throttle_rate_ms)
            .field("content_library_href", &self.content_library_href)
            .field("file_dir", &self.file_dir)
            .field("max_concurrent_requests", &self.max_concurrent_requests)
            .field("sync_timeout", &self.sync_timeout)
            .field("reauth_on_unauthorized", &self.reauth_on_unauthorized)
            .finish()
    }
}

impl MirrorConfig {
    pub fn builder() -> MirrorConfigBuilder {
        MirrorConfigBuilder::default()
    }

    /// Throttle interval as a `Duration`.
    pub fn throttle_interval(&self) -> Duration {
        Duration::from_millis(self.throttle_rate_ms)
    }

    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Required keys: user name, password, auth endpoint, content library href
    /// and file dir. Everything else falls back to its default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| Error::Config(format!("Missing required variable {}", key)))
        };

        let mut builder = MirrorConfig::builder()
            .username(required(env_keys::USERNAME)?)
            .password(required(env_keys::PASSWORD)?)
            .auth_endpoint(required(env_keys::AUTH_ENDPOINT)?)
            .content_library_href(required(env_keys::CONTENT_LIBRARY_HREF)?)
            .file_dir(required(env_keys::FILE_DIR)?);

        if let Some(hours) = parse_optional::<u32, _>(&lookup, env_keys::TOKEN_EXPIRY_HOURS)? {
            builder = builder.token_expiry_hours(hours);
        }
        if let Some(path) = lookup(env_keys::STORAGE_FILE).filter(|v| !v.is_empty()) {
            builder = builder.storage_path(path);
        }
        if let Some(n) = parse_optional::<u32, _>(&lookup, env_keys::THROTTLE_NUM_REQUESTS)? {
            builder = builder.throttle_num_requests(n);
        }
        if let Some(ms) = parse_optional::<u64, _>(&lookup, env_keys::THROTTLE_RATE_MS)? {
            builder = builder.throttle_rate_ms(ms);
        }
        if let Some(n) = parse_optional::<usize, _>(&lookup, env_keys::MAX_CONCURRENT_REQUESTS)? {
            builder = builder.max_concurrent_requests(n);
        }
        if let Some(secs) = parse_optional::<u64, _>(&lookup, env_keys::SYNC_TIMEOUT_SECS)? {
            builder = builder.sync_timeout(Duration::from_secs(secs));
        }
        if let Some(flag) = parse_optional::<bool, _>(&lookup, env_keys::REAUTH_ON_UNAUTHORIZED)? {
            builder = builder.reauth_on_unauthorized(flag);
        }

        builder.build()
    }

    pub fn validate(&self) -> Result<()> {
        if self.username.is_empty() {
            return Err(Error::Config("Username cannot be empty".to_string()));
        }

        if self.password.is_empty() {
            return Err(Error::Config("Password cannot be empty".to_string()));
        }

        let endpoint = url::Url::parse(&self.auth_endpoint).map_err(|e| {
            Error::Config(format!(
                "Auth endpoint '{}' is not an absolute URL: {}",
                self.auth_endpoint, e
            ))
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "Auth endpoint must use http or https, got '{}'",
                endpoint.scheme()
            )));
        }

        if self.token_expiry_hours == 0 {
            return Err(Error::Config(
                "Token expiry must be at least 1 hour".to_string(),
            ));
        }

        if self.storage_path.as_os_str().is_empty() {
            return Err(Error::Config("Storage path cannot be empty".to_string()));
        }

        if self.throttle_num_requests == 0 {
            return Err(Error::Config(
                "Throttle must allow at least 1 request per interval".to_string(),
            ));
        }

        if self.throttle_rate_ms == 0 {
            return Err(Error::Config(
                "Throttle interval must be greater than 0ms".to_string(),
            ));
        }

        if self.content_library_href.is_empty() {
            return Err(Error::Config(
                "Content library href cannot be empty".to_string(),
            ));
        }

        if self.file_dir.as_os_str().is_empty() {
            return Err(Error::Config("File directory cannot be empty".to_string()));
        }

        if self.max_concurrent_requests == Some(0) {
            return Err(Error::Config(
                "Max concurrent requests must be greater than 0".to_string(),
            ));
        }

        if self.sync_timeout == Some(Duration::ZERO) {
            return Err(Error::Config(
                "Sync timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_optional<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("Invalid value '{}' for {}: {}", raw, key, e))),
    }
}

/// `<data dir>/content-mirror/credential.json`, or a relative fallback when
/// the platform has no data directory.
pub fn default_storage_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("content-mirror"))
        .unwrap_or_else(|| PathBuf::from(".content-mirror"))
        .join("credential.json")
}

#[derive(Default)]
pub struct MirrorConfigBuilder {
    username: Option<String>,
    password: Option<String>,
    auth_endpoint: Option<String>,
    token_expiry_hours: Option<u32>,
    storage_path: Option<PathBuf>,
    throttle_num_requests: Option<u32>,
    throttle_rate_ms: Option<u64>,
    content_library_href: Option<String>,
    file_dir: Option<PathBuf>,
    max_concurrent_requests: Option<usize>,
    sync_timeout: Option<Duration>,
    reauth_on_unauthorized: bool,
}

impl MirrorConfigBuilder {
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn auth_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.auth_endpoint = Some(endpoint.into());
        self
    }

    pub fn token_expiry_hours(mut self, hours: u32) -> Self {
        self.token_expiry_hours = Some(hours);
        self
    }

    pub fn storage_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    pub fn throttle_num_requests(mut self, n: u32) -> Self {
        self.throttle_num_requests = Some(n);
        self
    }

    pub fn throttle_rate_ms(mut self, ms: u64) -> Self {
        self.throttle_rate_ms = Some(ms);
        self
    }

    /// Set both throttle parameters: `n` requests per `interval_ms`.
    pub fn throttle(self, n: u32, interval_ms: u64) -> Self {
        self.throttle_num_requests(n).throttle_rate_ms(interval_ms)
    }

    pub fn content_library_href(mut self, href: impl Into<String>) -> Self {
        self.content_library_href = Some(href.into());
        self
    }

    pub fn file_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.file_dir = Some(path.into());
        self
    }

    pub fn max_concurrent_requests(mut self, n: usize) -> Self {
        self.max_concurrent_requests = Some(n);
        self
    }

    pub fn sync_timeout(mut self, timeout: Duration) -> Self {
        self.sync_timeout = Some(timeout);
        self
    }

    pub fn reauth_on_unauthorized(mut self, enabled: bool) -> Self {
        self.reauth_on_unauthorized = enabled;
        self
    }

    pub fn build(self) -> Result<MirrorConfig> {
        let missing = |name: &str| Error::Config(format!("{} is required", name));

        let config = MirrorConfig {
            username: self.username.ok_or_else(|| missing("username"))?,
            password: self.password.ok_or_else(|| missing("password"))?,
            auth_endpoint: self.auth_endpoint.ok_or_else(|| missing("auth_endpoint"))?,
            token_expiry_hours: self
                .token_expiry_hours
                .unwrap_or(DEFAULT_TOKEN_EXPIRY_HOURS),
            storage_path: self.storage_path.unwrap_or_else(default_storage_path),
            throttle_num_requests: self
                .throttle_num_requests
                .unwrap_or(DEFAULT_THROTTLE_NUM_REQUESTS),
            throttle_rate_ms: self.throttle_rate_ms.unwrap_or(DEFAULT_THROTTLE_RATE_MS),
            content_library_href: self
                .content_library_href
                .ok_or_else(|| missing("content_library_href"))?,
            file_dir: self.file_dir.ok_or_else(|| missing("file_dir"))?,
            max_concurrent_requests: self.max_concurrent_requests,
            sync_timeout: self.sync_timeout,
            reauth_on_unauthorized: self.reauth_on_unauthorized,
        };

        config.validate()?;
        Ok(config)
    }
}
