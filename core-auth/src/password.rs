//! Password Grant Login
//!
//! Exchanges a user name and password for an auth token:
//!
//! ```text
//! POST <auth endpoint>
//! Content-Type: application/x-www-form-urlencoded
//!
//! auth_type=password&user_name=<user>&password=<password>
//! ```
//!
//! A `200` response carries `{ "authToken", "issuedAt", "endPoint" }`. The
//! server's `issuedAt` is ignored; the caller stamps its own clock reading so
//! expiry is measured against local time.
//!
//! No retries happen here. A failed login is reported once and the caller
//! decides what to do.

use crate::error::{AuthError, Result};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use bytes::Bytes;
use core_runtime::logging::redact_if_sensitive;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Token and endpoint returned by a successful login, before it is stamped
/// with an issue time.
#[derive(Clone, PartialEq, Eq)]
pub struct GrantedToken {
    pub token: String,
    pub endpoint: String,
}

impl fmt::Debug for GrantedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrantedToken")
            .field("token", &"[REDACTED]")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    auth_token: String,
    end_point: String,
}

/// Password-grant login against a fixed auth endpoint.
#[derive(Clone)]
pub struct PasswordGrant {
    http_client: Arc<dyn HttpClient>,
    auth_endpoint: String,
    username: String,
    password: String,
}

impl PasswordGrant {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        auth_endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            auth_endpoint: auth_endpoint.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn auth_endpoint(&self) -> &str {
        &self.auth_endpoint
    }

    fn form_body(&self) -> Result<Bytes> {
        let params = [
            ("auth_type", "password"),
            ("user_name", self.username.as_str()),
            ("password", self.password.as_str()),
        ];

        serde_urlencoded::to_string(params)
            .map(Bytes::from)
            .map_err(|e| AuthError::Serialization(format!("Failed to encode login form: {}", e)))
    }

    /// Perform one login request.
    pub async fn login(&self) -> Result<GrantedToken> {
        let request = HttpRequest::new(HttpMethod::Post, self.auth_endpoint.clone())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(self.form_body()?);

        debug!(
            endpoint = %self.auth_endpoint,
            user = %redact_if_sensitive("user_name", &self.username),
            "Requesting auth token"
        );

        let response = self.http_client.execute(request).await.map_err(|e| {
            warn!(endpoint = %self.auth_endpoint, error = %e, "Login request failed");
            AuthError::Transport(e.to_string())
        })?;

        if response.status != 200 {
            let reason = response
                .text()
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            warn!(
                endpoint = %self.auth_endpoint,
                status = response.status,
                "Login rejected"
            );

            return Err(AuthError::AuthenticationFailed {
                status: response.status,
                reason,
            });
        }

        let parsed: LoginResponse = serde_json::from_slice(&response.body)
            .map_err(|e| AuthError::MalformedResponse(e.to_string()))?;

        if parsed.auth_token.is_empty() {
            return Err(AuthError::MalformedResponse(
                "authToken is empty".to_string(),
            ));
        }

        if parsed.end_point.is_empty() {
            return Err(AuthError::MalformedResponse("endPoint is empty".to_string()));
        }

        Ok(GrantedToken {
            token: parsed.auth_token,
            endpoint: parsed.end_point,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::http::HttpResponse;
    use mockall::mock;

    mock! {
        HttpClient {}

        #[async_trait::async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    fn grant_with(mock: MockHttpClient) -> PasswordGrant {
        PasswordGrant::new(
            Arc::new(mock),
            "https://login.example.com/rest/api/v1.3/auth/token",
            "api_user",
            "p@ss word",
        )
    }

    #[tokio::test]
    async fn test_login_sends_password_form() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .withf(|req: &HttpRequest| {
                let body = req
                    .body
                    .as_ref()
                    .map(|b| String::from_utf8_lossy(b).to_string())
                    .unwrap_or_default();

                req.method == HttpMethod::Post
                    && req.url == "https://login.example.com/rest/api/v1.3/auth/token"
                    && req.headers.get("Content-Type").map(String::as_str)
                        == Some("application/x-www-form-urlencoded")
                    && body == "auth_type=password&user_name=api_user&password=p%40ss+word"
            })
            .times(1)
            .returning(|_| {
                Ok(HttpResponse::new(
                    200,
                    r#"{"authToken":"tok-1","issuedAt":"1709294400000","endPoint":"https://api.example.com"}"#,
                ))
            });

        let granted = grant_with(mock).login().await.unwrap();
        assert_eq!(granted.token, "tok-1");
        assert_eq!(granted.endpoint, "https://api.example.com");
    }

    #[tokio::test]
    async fn test_non_200_is_authentication_failure() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(401, "invalid credentials")));

        let err = grant_with(mock).login().await.unwrap_err();
        assert_eq!(
            err,
            AuthError::AuthenticationFailed {
                status: 401,
                reason: "invalid credentials".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_transport_error_is_surfaced() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .times(1)
            .returning(|_| Err(BridgeError::OperationFailed("connection refused".to_string())));

        let err = grant_with(mock).login().await.unwrap_err();
        assert!(matches!(err, AuthError::Transport(msg) if msg.contains("connection refused")));
    }

    #[tokio::test]
    async fn test_unparsable_body_is_malformed() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, "<html>maintenance</html>")));

        let err = grant_with(mock).login().await.unwrap_err();
        assert!(matches!(err, AuthError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_empty_token_is_malformed() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute().times(1).returning(|_| {
            Ok(HttpResponse::new(
                200,
                r#"{"authToken":"","endPoint":"https://api.example.com"}"#,
            ))
        });

        let err = grant_with(mock).login().await.unwrap_err();
        assert!(matches!(err, AuthError::MalformedResponse(_)));
    }

    #[test]
    fn test_granted_token_debug_redacts() {
        let granted = GrantedToken {
            token: "secret".to_string(),
            endpoint: "e".to_string(),
        };
        assert!(!format!("{:?}", granted).contains("secret"));
    }
}
