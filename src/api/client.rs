//! Authenticated HTTP client with token caching and a single 401 retry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Response, StatusCode};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::error::{ApiError, ApiResult};
use super::token_cache::{NoopTokenCache, TokenCache};

/// Path of the login endpoint, relative to the base URL.
pub const LOGIN_PATH: &str = "/api/v2/login";

/// Refresh a little before the remote one-hour expiry.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3300);

/// Timeout applied to every request, login included.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Login response fields probed for the bearer token, in order.
pub const DEFAULT_TOKEN_FIELDS: &[&str] = &["token", "accessToken", "jwt", "idToken", "bearer", "key_0"];

/// Key under which the token is written to the [`TokenCache`].
pub const TOKEN_CACHE_KEY: &str = "SYM_API_JWT";

/// Base URL and login credentials.
#[derive(Clone)]
pub struct Credentials {
    pub base_url: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Tunables for [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// How long a token is reused before logging in again
    pub token_ttl: Duration,

    /// Candidate token fields in the login response
    pub token_fields: Vec<String>,

    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            token_ttl: DEFAULT_TOKEN_TTL,
            token_fields: DEFAULT_TOKEN_FIELDS.iter().map(|f| f.to_string()).collect(),
            timeout: REQUEST_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
struct SessionToken {
    value: String,
    acquired_at: Instant,
}

impl SessionToken {
    fn new(value: String) -> Self {
        Self {
            value,
            acquired_at: Instant::now(),
        }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.acquired_at.elapsed() <= ttl
    }
}

/// Client for the property management API.
///
/// Every request carries `Authorization: Bearer <token>`. The token is
/// acquired lazily, reused while younger than the configured TTL, and
/// refreshed once when the remote answers 401.
pub struct ApiClient {
    http: reqwest::Client,
    credentials: Credentials,
    options: ClientOptions,
    token: Mutex<Option<SessionToken>>,
    cache: Arc<dyn TokenCache>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("credentials", &self.credentials)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client. Trailing slashes on the base URL are dropped.
    pub fn new(mut credentials: Credentials, options: ClientOptions) -> ApiResult<Self> {
        credentials.base_url = credentials.base_url.trim_end_matches('/').to_string();
        let http = reqwest::Client::builder().timeout(options.timeout).build()?;

        Ok(Self {
            http,
            credentials,
            options,
            token: Mutex::new(None),
            cache: Arc::new(NoopTokenCache),
        })
    }

    /// Attach a token cache, adopting any token it already holds.
    pub fn with_token_cache(mut self, cache: Arc<dyn TokenCache>) -> Self {
        if let Some(cached) = cache.get(TOKEN_CACHE_KEY) {
            let cached = cached.trim();
            if !cached.is_empty() {
                debug!("Adopting bearer token from cache");
                *self.token.get_mut() = Some(SessionToken::new(cached.to_string()));
            }
        }
        self.cache = cache;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.credentials.base_url
    }

    /// POST the credentials to the login endpoint and extract the token.
    pub async fn login(&self) -> ApiResult<String> {
        let url = format!("{}{}", self.credentials.base_url, LOGIN_PATH);
        let payload = json!({
            "user": self.credentials.username,
            "password": self.credentials.password,
        });

        let response = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Authentication(format!(
                "Login failed with {}: {}",
                status.as_u16(),
                body
            )));
        }

        let data = parse_json(&Method::POST, &url, response).await?;
        let token = extract_token(&data, &self.options.token_fields).ok_or_else(|| {
            ApiError::Authentication("Login response did not contain a token".to_string())
        })?;

        info!("Logged in to {}", self.credentials.base_url);
        Ok(token)
    }

    /// Return a valid bearer token, logging in when the cached one is
    /// missing, expired, or `force` is set.
    pub async fn ensure_token(&self, force: bool) -> ApiResult<String> {
        let mut guard = self.token.lock().await;

        if force {
            *guard = None;
        } else if let Some(token) = guard.as_ref() {
            if token.is_fresh(self.options.token_ttl) {
                return Ok(token.value.clone());
            }
            debug!("Bearer token expired, logging in again");
        }

        let value = self.login().await?;
        *guard = Some(SessionToken::new(value.clone()));
        drop(guard);

        let cache = self.cache.clone();
        let cached = value.clone();
        match tokio::task::spawn_blocking(move || cache.set(TOKEN_CACHE_KEY, &cached)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to write token cache: {:#}", e),
            Err(e) => warn!("Token cache write task failed: {}", e),
        }

        Ok(value)
    }

    /// Issue an authenticated request and decode the JSON response.
    ///
    /// A first 401 triggers one forced token refresh and one retry; the
    /// outcome of the retry is final.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> ApiResult<Value> {
        let url = format!("{}{}", self.credentials.base_url, path);

        let token = self.ensure_token(false).await?;
        let mut response = self.send(&method, &url, query, body, &token).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            debug!("{} {} returned 401, refreshing token and retrying once", method, path);
            let token = self.ensure_token(true).await?;
            response = self.send(&method, &url, query, body, &token).await?;
        }

        let status = response.status();
        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                method: method.to_string(),
                path: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        parse_json(&method, &url, response).await
    }

    async fn send(
        &self,
        method: &Method,
        url: &str,
        query: &[(String, String)],
        body: Option<&Value>,
        token: &str,
    ) -> ApiResult<Response> {
        let mut request = self
            .http
            .request(method.clone(), url)
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", token));

        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        Ok(request.send().await?)
    }
}

async fn parse_json(method: &Method, url: &str, response: Response) -> ApiResult<Value> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|source| ApiError::InvalidJson {
        method: method.to_string(),
        url: url.to_string(),
        source,
    })
}

/// Find the bearer token in a login response.
///
/// Top-level candidates are tried in order; only non-empty strings count.
/// Failing that, a nested `model` object is searched the same way.
pub fn extract_token(payload: &Value, fields: &[String]) -> Option<String> {
    let object = payload.as_object()?;

    for field in fields {
        if let Some(Value::String(value)) = object.get(field) {
            if !value.is_empty() {
                return Some(value.clone());
            }
        }
    }

    match object.get("model") {
        Some(nested @ Value::Object(_)) => extract_token(nested, fields),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{spawn, MockState};
    use crate::api::MemoryTokenCache;
    use std::sync::atomic::Ordering;

    fn fields() -> Vec<String> {
        ClientOptions::default().token_fields
    }

    fn client(base_url: &str, options: ClientOptions) -> ApiClient {
        ApiClient::new(
            Credentials {
                base_url: format!("{}/", base_url),
                username: "ops@example.com".to_string(),
                password: "hunter2".to_string(),
            },
            options,
        )
        .unwrap()
    }

    #[test]
    fn extracts_nested_model_token() {
        assert_eq!(
            extract_token(&json!({"model": {"jwt": "X"}}), &fields()).as_deref(),
            Some("X")
        );
    }

    #[test]
    fn extracts_top_level_token() {
        assert_eq!(
            extract_token(&json!({"token": "Y"}), &fields()).as_deref(),
            Some("Y")
        );
    }

    #[test]
    fn extraction_skips_empty_and_non_string_candidates() {
        let payload = json!({"token": "", "accessToken": 42, "idToken": "Z"});
        assert_eq!(extract_token(&payload, &fields()).as_deref(), Some("Z"));
    }

    #[test]
    fn extraction_prefers_top_level_over_model() {
        let payload = json!({"bearer": "top", "model": {"token": "nested"}});
        assert_eq!(extract_token(&payload, &fields()).as_deref(), Some("top"));
    }

    #[test]
    fn extraction_finds_nothing_in_unrelated_shapes() {
        assert_eq!(extract_token(&json!({"user": "a", "model": "b"}), &fields()), None);
        assert_eq!(extract_token(&json!(["token"]), &fields()), None);
    }

    #[test]
    fn extraction_honours_custom_field_list() {
        let custom = vec!["sessionKey".to_string()];
        let payload = json!({"token": "ignored", "sessionKey": "S"});
        assert_eq!(extract_token(&payload, &custom).as_deref(), Some("S"));
    }

    #[tokio::test]
    async fn reuses_token_within_ttl() {
        let state = MockState::default();
        let base = spawn(state.clone()).await;
        let client = client(&base, ClientOptions::default());

        let first = client.ensure_token(false).await.unwrap();
        let second = client.ensure_token(false).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(state.logins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn logs_in_again_after_ttl() {
        let state = MockState::default();
        let base = spawn(state.clone()).await;
        let client = client(
            &base,
            ClientOptions {
                token_ttl: Duration::from_millis(50),
                ..ClientOptions::default()
            },
        );

        let first = client.ensure_token(false).await.unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        let second = client.ensure_token(false).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(state.logins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn forced_refresh_always_logs_in() {
        let state = MockState::default();
        let base = spawn(state.clone()).await;
        let client = client(&base, ClientOptions::default());

        client.ensure_token(false).await.unwrap();
        client.ensure_token(true).await.unwrap();

        assert_eq!(state.logins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn login_without_token_is_authentication_error() {
        let state = MockState::default();
        state.set_login_response(json!({"model": {"user": "ops"}}));
        let base = spawn(state.clone()).await;
        let client = client(&base, ClientOptions::default());

        let err = client.ensure_token(false).await.unwrap_err();
        assert!(matches!(err, ApiError::Authentication(_)), "{err:?}");
    }

    #[tokio::test]
    async fn non_json_login_is_invalid_json() {
        let state = MockState::default();
        state.html_logins();
        let base = spawn(state.clone()).await;
        let client = client(&base, ClientOptions::default());

        let err = client.ensure_token(false).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidJson { .. }), "{err:?}");
        assert_eq!(state.requests.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rejected_login_is_authentication_error() {
        let state = MockState::default();
        state.reject_logins();
        let base = spawn(state.clone()).await;
        let client = client(&base, ClientOptions::default());

        let err = client.login().await.unwrap_err();
        match err {
            ApiError::Authentication(message) => assert!(message.contains("403"), "{message}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn request_sends_bearer_token() {
        let state = MockState::default();
        let base = spawn(state.clone()).await;
        let client = client(&base, ClientOptions::default());

        let value = client
            .request(Method::GET, "/api/v2/property/7", &[], None)
            .await
            .unwrap();

        assert_eq!(value["path"], "/api/v2/property/7");
        assert_eq!(value["auth"], "Bearer token-1");
    }

    #[tokio::test]
    async fn single_401_is_retried_with_fresh_token() {
        let state = MockState::default();
        state.unauthorized_remaining.store(1, Ordering::SeqCst);
        let base = spawn(state.clone()).await;
        let client = client(&base, ClientOptions::default());

        let value = client
            .request(Method::GET, "/api/v2/property/7", &[], None)
            .await
            .unwrap();

        assert_eq!(value["auth"], "Bearer token-2");
        assert_eq!(state.logins.load(Ordering::SeqCst), 2);
        assert_eq!(state.requests.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn second_401_is_not_retried() {
        let state = MockState::default();
        state.unauthorized_remaining.store(5, Ordering::SeqCst);
        let base = spawn(state.clone()).await;
        let client = client(&base, ClientOptions::default());

        let err = client
            .request(Method::GET, "/api/v2/property/7", &[], None)
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(401));
        assert_eq!(state.logins.load(Ordering::SeqCst), 2);
        assert_eq!(state.requests.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn error_status_carries_method_path_and_body() {
        let state = MockState::default();
        let base = spawn(state.clone()).await;
        let client = client(&base, ClientOptions::default());

        let err = client
            .request(Method::GET, "/api/v2/missing", &[], None)
            .await
            .unwrap_err();

        match err {
            ApiError::Status {
                method,
                path,
                status,
                body,
            } => {
                assert_eq!(method, "GET");
                assert_eq!(path, "/api/v2/missing");
                assert_eq!(status, 404);
                assert_eq!(body, "no such resource");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(state.requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_json_body_is_distinct_from_status_errors() {
        let state = MockState::default();
        let base = spawn(state.clone()).await;
        let client = client(&base, ClientOptions::default());

        let err = client
            .request(Method::GET, "/api/v2/not-json", &[], None)
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::InvalidJson { .. }), "{err:?}");
        assert_eq!(err.status(), None);
    }

    #[tokio::test]
    async fn token_is_persisted_to_file_cache() {
        let state = MockState::default();
        let base = spawn(state.clone()).await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");

        let first = client(&base, ClientOptions::default())
            .with_token_cache(Arc::new(crate::api::FileTokenCache::new(&path)));
        first.ensure_token(false).await.unwrap();

        let second = client(&base, ClientOptions::default())
            .with_token_cache(Arc::new(crate::api::FileTokenCache::new(&path)));
        assert_eq!(second.ensure_token(false).await.unwrap(), "token-1");
        assert_eq!(state.logins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn token_is_shared_through_cache() {
        let state = MockState::default();
        let base = spawn(state.clone()).await;
        let cache = Arc::new(MemoryTokenCache::new());

        let first = client(&base, ClientOptions::default()).with_token_cache(cache.clone());
        first.ensure_token(false).await.unwrap();
        assert_eq!(cache.get(TOKEN_CACHE_KEY).as_deref(), Some("token-1"));

        let second = client(&base, ClientOptions::default()).with_token_cache(cache);
        let value = second
            .request(Method::GET, "/api/v2/property/1", &[], None)
            .await
            .unwrap();

        assert_eq!(value["auth"], "Bearer token-1");
        assert_eq!(state.logins.load(Ordering::SeqCst), 1);
    }
}
