//! # Token Manager
//!
//! Owns the credential lifecycle:
//!
//! ```text
//! NoCredential -> Authenticating -> Valid -> (time passes) -> Expired -> Authenticating -> ...
//! ```
//!
//! ## Single-flight refresh
//!
//! [`TokenManager::ensure_credential`] is called by every in-flight traversal
//! step. A valid cached credential is returned from a read lock with no
//! serialization. Otherwise callers queue on one refresh mutex: the first
//! performs the login, and everyone that was waiting behind it takes the
//! outcome of that attempt (success or failure) instead of logging in again.
//!
//! ## Failure semantics
//!
//! A failed login leaves the previously cached credential untouched, and the
//! store is only written after a response has parsed successfully.

use crate::credential_store::CredentialStore;
use crate::error::{AuthError, Result};
use crate::password::PasswordGrant;
use crate::types::Credential;
use bridge_traits::http::HttpClient;
use bridge_traits::time::{Clock, SystemClock};
use core_runtime::config::MirrorConfig;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

/// Outcome of the most recent login attempt, guarded by the refresh mutex.
#[derive(Default)]
struct RefreshState {
    generation: u64,
    last_failure: Option<AuthError>,
}

pub struct TokenManager {
    grant: PasswordGrant,
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    expiry_hours: u32,
    cached: RwLock<Option<Credential>>,
    refresh: Mutex<RefreshState>,
    /// Mirror of `RefreshState::generation` readable without the mutex.
    attempts: AtomicU64,
}

impl TokenManager {
    pub fn new(grant: PasswordGrant, store: Arc<dyn CredentialStore>, expiry_hours: u32) -> Self {
        Self {
            grant,
            store,
            clock: Arc::new(SystemClock),
            event_bus: EventBus::default(),
            expiry_hours,
            cached: RwLock::new(None),
            refresh: Mutex::new(RefreshState::default()),
            attempts: AtomicU64::new(0),
        }
    }

    /// Build from the mirror configuration's credentials and expiry.
    pub fn from_config(
        config: &MirrorConfig,
        http_client: Arc<dyn HttpClient>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        let grant = PasswordGrant::new(
            http_client,
            config.auth_endpoint.clone(),
            config.username.clone(),
            config.password.clone(),
        );
        Self::new(grant, store, config.token_expiry_hours)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn expiry_hours(&self) -> u32 {
        self.expiry_hours
    }

    /// `false` for `None`; otherwise whole hours since issue must be below the
    /// configured expiry.
    pub fn is_valid(&self, credential: Option<&Credential>) -> bool {
        credential
            .map(|c| c.is_valid_at(self.clock.now(), self.expiry_hours))
            .unwrap_or(false)
    }

    /// The in-memory credential, valid or not.
    pub async fn cached(&self) -> Option<Credential> {
        self.cached.read().await.clone()
    }

    async fn valid_cached(&self) -> Option<Credential> {
        let cached = self.cached.read().await;
        cached.as_ref().filter(|c| self.is_valid(Some(c))).cloned()
    }

    /// Return a valid credential, logging in at most once across concurrent
    /// callers.
    #[instrument(skip(self))]
    pub async fn ensure_credential(&self) -> Result<Credential> {
        if let Some(credential) = self.valid_cached().await {
            return Ok(credential);
        }

        let observed = self.attempts.load(Ordering::Acquire);
        let mut state = self.refresh.lock().await;

        if let Some(credential) = self.valid_cached().await {
            debug!("Credential refreshed by a concurrent caller");
            return Ok(credential);
        }

        if state.generation != observed {
            if let Some(failure) = &state.last_failure {
                debug!(error = %failure, "Sharing failed login from a concurrent caller");
                return Err(failure.clone());
            }
        }

        if self.cached.read().await.is_none() {
            if let Some(stored) = self.store.load().await? {
                let valid = self.is_valid(Some(&stored));
                *self.cached.write().await = Some(stored.clone());
                if valid {
                    debug!(issued_at = %stored.issued_at(), "Using stored credential");
                    return Ok(stored);
                }
                debug!(issued_at = %stored.issued_at(), "Stored credential has expired");
            }
        }

        self.authenticate_locked(&mut state).await
    }

    /// Log in unconditionally and replace the cached and stored credential.
    #[instrument(skip(self))]
    pub async fn authenticate(&self) -> Result<Credential> {
        let mut state = self.refresh.lock().await;
        self.authenticate_locked(&mut state).await
    }

    async fn authenticate_locked(&self, state: &mut RefreshState) -> Result<Credential> {
        let result = self.login_and_store().await;

        state.generation += 1;
        state.last_failure = result.as_ref().err().cloned();
        self.attempts.store(state.generation, Ordering::Release);

        result
    }

    async fn login_and_store(&self) -> Result<Credential> {
        self.emit(AuthEvent::Authenticating);
        info!(endpoint = %self.grant.auth_endpoint(), "Authenticating");

        let credential = match self.login().await {
            Ok(credential) => credential,
            Err(e) => {
                warn!(error = %e, "Authentication failed");
                self.emit(AuthEvent::AuthFailed {
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        if let Err(e) = self.store.save(&credential).await {
            // The credential is still usable for this process.
            warn!(error = %e, "Failed to persist credential");
        }

        *self.cached.write().await = Some(credential.clone());

        info!(endpoint = %credential.endpoint(), "Authenticated");
        self.emit(AuthEvent::Authenticated {
            endpoint: credential.endpoint().to_string(),
        });

        Ok(credential)
    }

    /// One login request, stamped with the current time.
    async fn login(&self) -> Result<Credential> {
        let granted = self.grant.login().await?;
        Credential::new(granted.token, self.clock.now(), granted.endpoint)
            .ok_or_else(|| AuthError::MalformedResponse("authToken is empty".to_string()))
    }

    /// Drop `stale` if it is still the current credential, so the next
    /// [`ensure_credential`](Self::ensure_credential) logs in again.
    ///
    /// A credential that has already been replaced is left alone.
    pub async fn invalidate(&self, stale: &Credential) -> Result<()> {
        let _state = self.refresh.lock().await;

        let mut cached = self.cached.write().await;
        if cached.as_ref() != Some(stale) {
            debug!("Credential already replaced, nothing to invalidate");
            return Ok(());
        }
        *cached = None;
        drop(cached);

        if self.store.load().await?.as_ref() == Some(stale) {
            self.store.clear().await?;
        }

        info!("Invalidated rejected credential");
        Ok(())
    }

    /// Delete the persisted credential and the in-memory cache.
    pub async fn clear(&self) -> Result<()> {
        let _state = self.refresh.lock().await;

        self.store.clear().await?;
        self.cached.write().await.take();

        info!("Cleared credential");
        self.emit(AuthEvent::CredentialCleared);
        Ok(())
    }

    fn emit(&self, event: AuthEvent) {
        let _ = self.event_bus.emit(CoreEvent::Auth(event));
    }
}
