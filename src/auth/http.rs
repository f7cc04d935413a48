// Hosted auth backend over HTTP
// Speaks the GoTrue REST dialect used by Supabase projects.

use super::provider::{AuthError, AuthProvider};
use crate::models::{AuthUser, BackendConfig};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Auth provider backed by a GoTrue-compatible `/auth/v1` API.
///
/// A rejected access token is exchanged once through the refresh token, when
/// one is held, before the lookup is reported as `NoSession`.
pub struct HttpAuthProvider {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    access_token: RwLock<Option<String>>,
    refresh_token: RwLock<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl HttpAuthProvider {
    pub fn new(
        config: &BackendConfig,
        access_token: Option<String>,
        refresh_token: Option<String>,
    ) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("session-guardian/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            access_token: RwLock::new(access_token.filter(|t| !t.is_empty())),
            refresh_token: RwLock::new(refresh_token.filter(|t| !t.is_empty())),
        })
    }

    pub async fn has_access_token(&self) -> bool {
        self.access_token.read().await.is_some()
    }

    pub async fn has_refresh_token(&self) -> bool {
        self.refresh_token.read().await.is_some()
    }

    /// Exchange the refresh token for a new access token
    pub async fn refresh_session(&self) -> Result<String, AuthError> {
        let refresh_token = self
            .refresh_token
            .read()
            .await
            .clone()
            .ok_or(AuthError::NoSession)?;

        let response = self
            .client
            .post(self.endpoint("token"))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
                // Refresh tokens are single use; a rejected one will not work again.
                warn!("Auth backend rejected refresh token ({})", status);
                *self.access_token.write().await = None;
                *self.refresh_token.write().await = None;
                return Err(AuthError::NoSession);
            }
            return Err(status_error(status));
        }

        let tokens = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;

        *self.access_token.write().await = Some(tokens.access_token.clone());
        if let Some(refresh_token) = tokens.refresh_token.filter(|t| !t.is_empty()) {
            *self.refresh_token.write().await = Some(refresh_token);
        }

        info!("Access token refreshed with auth backend");
        Ok(tokens.access_token)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    async fn bearer(&self) -> Result<String, AuthError> {
        self.access_token
            .read()
            .await
            .clone()
            .ok_or(AuthError::NoSession)
    }

    async fn fetch_user(&self, token: &str) -> Result<AuthUser, AuthError> {
        let response = self
            .client
            .get(self.endpoint("user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(status_error(response.status()));
        }

        let user = response
            .json::<AuthUser>()
            .await
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;

        debug!("Fetched user {} from auth backend", user.id);
        Ok(user)
    }
}

fn status_error(status: StatusCode) -> AuthError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AuthError::NoSession,
        other => AuthError::Status(other.as_u16()),
    }
}

#[async_trait]
impl AuthProvider for HttpAuthProvider {
    async fn sign_out(&self) -> Result<(), AuthError> {
        let token = self.bearer().await?;

        // Local scope: revoking globally would also end the login that superseded us.
        let result = self
            .client
            .post(self.endpoint("logout"))
            .query(&[("scope", "local")])
            .header("apikey", &self.anon_key)
            .bearer_auth(&token)
            .send()
            .await;

        // Both tokens are unusable from here on whatever the backend answered.
        *self.access_token.write().await = None;
        *self.refresh_token.write().await = None;

        let response = result.map_err(|e| AuthError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(status_error(response.status()));
        }

        info!("Session revoked with auth backend");
        Ok(())
    }

    async fn get_user(&self) -> Result<AuthUser, AuthError> {
        let token = self.bearer().await?;

        match self.fetch_user(&token).await {
            Err(AuthError::NoSession) => {
                if !self.has_refresh_token().await {
                    return Err(AuthError::NoSession);
                }
                debug!("Access token rejected, refreshing");
                let token = self.refresh_session().await?;
                self.fetch_user(&token).await
            }
            result => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::Query,
        http::{HeaderMap, StatusCode as AxumStatus},
        routing::{get, post},
    };
    use serde_json::{Value, json};
    use std::collections::HashMap;

    const ANON_KEY: &str = "anon-key";

    fn authorized(headers: &HeaderMap) -> Option<&str> {
        if headers.get("apikey").and_then(|h| h.to_str().ok()) != Some(ANON_KEY) {
            return None;
        }
        headers
            .get("authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
    }

    async fn user_endpoint(headers: HeaderMap) -> (AxumStatus, Json<Value>) {
        match authorized(&headers) {
            Some("good-token") => (
                AxumStatus::OK,
                Json(json!({
                    "id": "user-1",
                    "email": "staff@liceo.example",
                    "user_metadata": { "current_session_token": "abc" }
                })),
            ),
            Some("flaky-token") => (
                AxumStatus::SERVICE_UNAVAILABLE,
                Json(json!({ "msg": "upstream unavailable" })),
            ),
            _ => (
                AxumStatus::UNAUTHORIZED,
                Json(json!({ "msg": "invalid JWT" })),
            ),
        }
    }

    async fn logout_endpoint(
        headers: HeaderMap,
        Query(query): Query<HashMap<String, String>>,
    ) -> AxumStatus {
        if query.get("scope").map(String::as_str) != Some("local") {
            return AxumStatus::BAD_REQUEST;
        }
        match authorized(&headers) {
            Some("good-token") => AxumStatus::NO_CONTENT,
            _ => AxumStatus::UNAUTHORIZED,
        }
    }

    async fn token_endpoint(
        headers: HeaderMap,
        Query(query): Query<HashMap<String, String>>,
        Json(body): Json<Value>,
    ) -> (AxumStatus, Json<Value>) {
        if query.get("grant_type").map(String::as_str) != Some("refresh_token")
            || headers.get("apikey").and_then(|h| h.to_str().ok()) != Some(ANON_KEY)
        {
            return (AxumStatus::BAD_REQUEST, Json(json!({ "error": "invalid_request" })));
        }
        match body.get("refresh_token").and_then(Value::as_str) {
            Some("refresh-1") => (
                AxumStatus::OK,
                Json(json!({
                    "access_token": "good-token",
                    "refresh_token": "refresh-2",
                    "token_type": "bearer",
                    "expires_in": 3600
                })),
            ),
            _ => (
                AxumStatus::BAD_REQUEST,
                Json(json!({ "error": "invalid_grant" })),
            ),
        }
    }

    async fn slow_user_endpoint() -> (AxumStatus, Json<Value>) {
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        (AxumStatus::OK, Json(json!({ "id": "user-1" })))
    }

    async fn spawn_backend() -> String {
        let app = Router::new()
            .route("/auth/v1/user", get(user_endpoint))
            .route("/auth/v1/logout", post(logout_endpoint))
            .route("/auth/v1/token", post(token_endpoint))
            .route("/slow/auth/v1/user", get(slow_user_endpoint));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}/", addr)
    }

    fn provider(url: &str, token: Option<&str>) -> HttpAuthProvider {
        let config = BackendConfig::new(url, ANON_KEY);
        HttpAuthProvider::new(&config, token.map(str::to_string), None).unwrap()
    }

    fn refreshing_provider(url: &str, token: &str, refresh: &str) -> HttpAuthProvider {
        let config = BackendConfig::new(url, ANON_KEY);
        HttpAuthProvider::new(
            &config,
            Some(token.to_string()),
            Some(refresh.to_string()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_get_user_reads_metadata() {
        let url = spawn_backend().await;
        let provider = provider(&url, Some("good-token"));

        let user = provider.get_user().await.unwrap();
        assert_eq!(user.id, "user-1");
        assert_eq!(user.current_session_token(), Some("abc"));
    }

    #[tokio::test]
    async fn test_rejected_token_is_no_session() {
        let url = spawn_backend().await;
        let provider = provider(&url, Some("expired-token"));

        assert_eq!(provider.get_user().await.unwrap_err(), AuthError::NoSession);
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let url = spawn_backend().await;
        let provider = provider(&url, Some("flaky-token"));

        let err = provider.get_user().await.unwrap_err();
        assert_eq!(err, AuthError::Status(503));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_missing_token_skips_request() {
        let provider = provider("http://127.0.0.1:9", None);
        assert_eq!(provider.get_user().await.unwrap_err(), AuthError::NoSession);
        assert_eq!(provider.sign_out().await.unwrap_err(), AuthError::NoSession);
    }

    #[tokio::test]
    async fn test_sign_out_drops_token() {
        let url = spawn_backend().await;
        let provider = provider(&url, Some("good-token"));

        provider.sign_out().await.unwrap();
        assert!(!provider.has_access_token().await);
        assert_eq!(provider.get_user().await.unwrap_err(), AuthError::NoSession);
    }

    #[tokio::test]
    async fn test_sign_out_failure_still_drops_token() {
        let url = spawn_backend().await;
        let provider = provider(&url, Some("revoked-token"));

        assert_eq!(provider.sign_out().await.unwrap_err(), AuthError::NoSession);
        assert!(!provider.has_access_token().await);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let provider = provider(&format!("http://{}", addr), Some("good-token"));
        assert!(matches!(
            provider.get_user().await.unwrap_err(),
            AuthError::Transport(_)
        ));
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_once() {
        let url = spawn_backend().await;
        let provider = refreshing_provider(&url, "expired-token", "refresh-1");

        let user = provider.get_user().await.unwrap();
        assert_eq!(user.current_session_token(), Some("abc"));
        assert_eq!(provider.bearer().await.unwrap(), "good-token");
        assert_eq!(
            provider.refresh_token.read().await.as_deref(),
            Some("refresh-2")
        );
    }

    #[tokio::test]
    async fn test_rejected_refresh_token_is_no_session() {
        let url = spawn_backend().await;
        let provider = refreshing_provider(&url, "expired-token", "stale-refresh");

        assert_eq!(provider.get_user().await.unwrap_err(), AuthError::NoSession);
        assert!(!provider.has_access_token().await);
        assert!(!provider.has_refresh_token().await);
    }

    #[tokio::test]
    async fn test_sign_out_drops_refresh_token() {
        let url = spawn_backend().await;
        let provider = refreshing_provider(&url, "good-token", "refresh-1");

        provider.sign_out().await.unwrap();
        assert!(!provider.has_refresh_token().await);
        assert_eq!(provider.get_user().await.unwrap_err(), AuthError::NoSession);
    }

    #[tokio::test]
    async fn test_slow_backend_hits_client_timeout() {
        let url = spawn_backend().await;
        let mut config = BackendConfig::new(format!("{}slow", url), ANON_KEY);
        config.request_timeout_secs = 1;
        let provider =
            HttpAuthProvider::new(&config, Some("good-token".to_string()), None).unwrap();

        let started = std::time::Instant::now();
        assert!(matches!(
            provider.get_user().await.unwrap_err(),
            AuthError::Transport(_)
        ));
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }
}
