//! Credentialed, throttled requests against the content API.
//!
//! Every request goes through the same steps:
//!
//! 1. [`TokenManager::ensure_credential`] (may log in)
//! 2. a concurrency permit, when a cap is configured
//! 3. one [`RateLimiter`] token
//! 4. `<method> <credential endpoint><path>` with the raw token in
//!    `Authorization`
//!
//! Status codes are returned untouched. With `reauth_on_unauthorized` enabled
//! an HTTP 401 invalidates the credential that was rejected and the request is
//! sent once more with a fresh one.

use crate::error::{Result, SyncError};
use crate::throttle::RateLimiter;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use core_auth::{Credential, TokenManager};
use core_runtime::config::MirrorConfig;
use core_runtime::events::{CoreEvent, EventBus, RequestEvent};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{info, warn};

pub struct AuthorizedClient {
    http_client: Arc<dyn HttpClient>,
    token_manager: Arc<TokenManager>,
    rate_limiter: Arc<RateLimiter>,
    concurrency: Option<Arc<Semaphore>>,
    throttle_timeout: Option<Duration>,
    reauth_on_unauthorized: bool,
    event_bus: EventBus,
}

impl AuthorizedClient {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        token_manager: Arc<TokenManager>,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            http_client,
            token_manager,
            rate_limiter,
            concurrency: None,
            throttle_timeout: None,
            reauth_on_unauthorized: false,
            event_bus: EventBus::default(),
        }
    }

    /// Apply the throttle, concurrency cap and 401 policy from `config`.
    pub fn from_config(
        config: &MirrorConfig,
        http_client: Arc<dyn HttpClient>,
        token_manager: Arc<TokenManager>,
    ) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(
            config.throttle_num_requests,
            config.throttle_interval(),
        ));

        let mut client = Self::new(http_client, token_manager, rate_limiter)
            .with_reauth_on_unauthorized(config.reauth_on_unauthorized);
        if let Some(limit) = config.max_concurrent_requests {
            client = client.with_max_concurrent_requests(limit);
        }
        client
    }

    pub fn with_max_concurrent_requests(mut self, limit: usize) -> Self {
        self.concurrency = Some(Arc::new(Semaphore::new(limit.max(1))));
        self
    }

    /// Fail with [`SyncError::RateLimitTimeout`] instead of waiting longer
    /// than `timeout` for a throttle token.
    pub fn with_throttle_timeout(mut self, timeout: Duration) -> Self {
        self.throttle_timeout = Some(timeout);
        self
    }

    pub fn with_reauth_on_unauthorized(mut self, enabled: bool) -> Self {
        self.reauth_on_unauthorized = enabled;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn token_manager(&self) -> &Arc<TokenManager> {
        &self.token_manager
    }

    pub async fn get(&self, path: &str) -> Result<HttpResponse> {
        self.request(HttpMethod::Get, path).await
    }

    pub async fn request(&self, method: HttpMethod, path: &str) -> Result<HttpResponse> {
        let credential = self.token_manager.ensure_credential().await?;
        let response = self.send(method, path, &credential).await?;

        if response.status == 401 && self.reauth_on_unauthorized {
            warn!(method = %method, path = %path, "Credential rejected, re-authenticating");
            self.token_manager.invalidate(&credential).await?;
            let credential = self.token_manager.ensure_credential().await?;
            return self.send(method, path, &credential).await;
        }

        Ok(response)
    }

    async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        credential: &Credential,
    ) -> Result<HttpResponse> {
        let _permit = match &self.concurrency {
            Some(semaphore) => Some(
                semaphore
                    .acquire()
                    .await
                    .map_err(|e| SyncError::Transport(e.to_string()))?,
            ),
            None => None,
        };

        match self.throttle_timeout {
            Some(timeout) => self.rate_limiter.acquire_with_timeout(timeout).await?,
            None => self.rate_limiter.acquire().await,
        }

        let request = HttpRequest::new(method, format!("{}{}", credential.endpoint(), path))
            .header("Authorization", credential.token())
            .header("Content-Type", "application/json");

        let started = Instant::now();
        match self.http_client.execute(request).await {
            Ok(response) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                info!(
                    method = %method,
                    path = %path,
                    status = response.status,
                    duration_ms,
                    "Request completed"
                );
                self.emit(RequestEvent::Completed {
                    method: method.to_string(),
                    path: path.to_string(),
                    status: response.status,
                    duration_ms,
                });
                Ok(response)
            }
            Err(e) => {
                warn!(method = %method, path = %path, error = %e, "Request failed");
                self.emit(RequestEvent::Failed {
                    method: method.to_string(),
                    path: path.to_string(),
                    error: e.to_string(),
                });
                Err(SyncError::Transport(e.to_string()))
            }
        }
    }

    fn emit(&self, event: RequestEvent) {
        let _ = self.event_bus.emit(CoreEvent::Request(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use core_auth::{CredentialStore, InMemoryCredentialStore, PasswordGrant};
    use mockall::mock;
    use mockall::Sequence;

    mock! {
        HttpClient {}

        #[async_trait::async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    const AUTH_URL: &str = "https://login.example.com/auth";

    fn login_ok(token: &'static str) -> BridgeResult<HttpResponse> {
        Ok(HttpResponse::new(
            200,
            format!(
                r#"{{"authToken":"{}","endPoint":"https://api.example.com"}}"#,
                token
            ),
        ))
    }

    fn client_with(mock: MockHttpClient) -> AuthorizedClient {
        let http: Arc<dyn HttpClient> = Arc::new(mock);
        let store: Arc<dyn CredentialStore> = Arc::new(InMemoryCredentialStore::new());
        let grant = PasswordGrant::new(http.clone(), AUTH_URL, "u", "p");
        let manager = Arc::new(TokenManager::new(grant, store, 2));
        let limiter = Arc::new(RateLimiter::new(100, Duration::from_secs(1)));
        AuthorizedClient::new(http, manager, limiter)
    }

    #[tokio::test]
    async fn test_request_uses_credential_endpoint_and_raw_token() {
        let mut mock = MockHttpClient::new();
        let mut seq = Sequence::new();
        mock.expect_execute()
            .withf(|req: &HttpRequest| req.url == AUTH_URL)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| login_ok("tok-1"));
        mock.expect_execute()
            .withf(|req: &HttpRequest| {
                req.method == HttpMethod::Get
                    && req.url == "https://api.example.com/rest/api/v1.3/clFolders"
                    && req.headers.get("Authorization").map(String::as_str) == Some("tok-1")
                    && req.headers.get("Content-Type").map(String::as_str)
                        == Some("application/json")
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(HttpResponse::new(200, "{}")));

        let response = client_with(mock).get("/rest/api/v1.3/clFolders").await.unwrap();
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_status_codes_are_not_interpreted() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .withf(|req: &HttpRequest| req.url == AUTH_URL)
            .times(1)
            .returning(|_| login_ok("tok-1"));
        mock.expect_execute()
            .withf(|req: &HttpRequest| req.url != AUTH_URL)
            .times(2)
            .returning(|_| Ok(HttpResponse::new(401, "expired")));

        let client = client_with(mock);
        assert_eq!(client.get("/a").await.unwrap().status, 401);
        assert_eq!(client.get("/b").await.unwrap().status, 401);
    }

    #[tokio::test]
    async fn test_reauth_on_unauthorized_retries_once() {
        let mut mock = MockHttpClient::new();
        let mut seq = Sequence::new();
        mock.expect_execute()
            .withf(|req: &HttpRequest| req.url == AUTH_URL)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| login_ok("revoked"));
        mock.expect_execute()
            .withf(|req: &HttpRequest| {
                req.headers.get("Authorization").map(String::as_str) == Some("revoked")
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(HttpResponse::new(401, "revoked")));
        mock.expect_execute()
            .withf(|req: &HttpRequest| req.url == AUTH_URL)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| login_ok("fresh"));
        mock.expect_execute()
            .withf(|req: &HttpRequest| {
                req.headers.get("Authorization").map(String::as_str) == Some("fresh")
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(HttpResponse::new(200, "{}")));

        let client = client_with(mock).with_reauth_on_unauthorized(true);
        assert_eq!(client.get("/a").await.unwrap().status, 200);
    }

    #[tokio::test]
    async fn test_transport_error_keeps_credential() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .withf(|req: &HttpRequest| req.url == AUTH_URL)
            .times(1)
            .returning(|_| login_ok("tok-1"));
        mock.expect_execute()
            .withf(|req: &HttpRequest| req.url != AUTH_URL)
            .times(1)
            .returning(|_| Err(BridgeError::OperationFailed("connection reset".to_string())));

        let client = client_with(mock);
        let err = client.get("/a").await.unwrap_err();

        assert!(matches!(err, SyncError::Transport(msg) if msg.contains("connection reset")));
        let cached = client.token_manager().cached().await.unwrap();
        assert_eq!(cached.token(), "tok-1");
    }

    #[tokio::test]
    async fn test_auth_failure_surfaces_as_auth_error() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(403, "locked")));

        let err = client_with(mock).get("/a").await.unwrap_err();
        assert!(matches!(err, SyncError::Auth(_)));
    }

    #[tokio::test]
    async fn test_request_events_are_emitted() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .withf(|req: &HttpRequest| req.url == AUTH_URL)
            .returning(|_| login_ok("tok-1"));
        mock.expect_execute()
            .withf(|req: &HttpRequest| req.url != AUTH_URL)
            .returning(|_| Ok(HttpResponse::new(404, "missing")));

        let event_bus = EventBus::new(8);
        let mut events = event_bus.subscribe();
        let client = client_with(mock).with_event_bus(event_bus);
        client.get("/missing").await.unwrap();

        match events.try_recv().unwrap() {
            CoreEvent::Request(RequestEvent::Completed {
                method,
                path,
                status,
                ..
            }) => {
                assert_eq!(method, "GET");
                assert_eq!(path, "/missing");
                assert_eq!(status, 404);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_timeout() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .withf(|req: &HttpRequest| req.url == AUTH_URL)
            .returning(|_| login_ok("tok-1"));
        mock.expect_execute()
            .withf(|req: &HttpRequest| req.url != AUTH_URL)
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, "{}")));

        let http: Arc<dyn HttpClient> = Arc::new(mock);
        let grant = PasswordGrant::new(http.clone(), AUTH_URL, "u", "p");
        let manager = Arc::new(TokenManager::new(
            grant,
            Arc::new(InMemoryCredentialStore::new()),
            2,
        ));
        let limiter = Arc::new(RateLimiter::new(1, Duration::from_secs(60)));
        let client = AuthorizedClient::new(http, manager, limiter)
            .with_throttle_timeout(Duration::from_millis(100));

        client.get("/first").await.unwrap();
        let err = client.get("/second").await.unwrap_err();
        assert_eq!(err, SyncError::RateLimitTimeout(Duration::from_millis(100)));
    }
}
