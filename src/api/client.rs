use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::cache::ResponseCache;
use super::models::{AccountTypeResponse, AdministerRequest, AuthResponse, LoginRequest, UserProfile};
use super::retry::{with_retry, with_retry_if, RetryPolicy};
use super::token::TokenSource;
use crate::config::GateConfig;
use crate::error::{AppError, AppResult};

/// Raw backend answer relayed by the `/api/backend` proxy.
#[derive(Debug, Clone)]
pub struct ForwardedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl IntoResponse for ForwardedResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::BAD_GATEWAY);
        let mut resp = (status, self.body).into_response();
        if let Some(ct) = self.content_type.as_deref().and_then(|c| HeaderValue::from_str(c).ok()) {
            resp.headers_mut().insert(header::CONTENT_TYPE, ct);
        }
        resp
    }
}

/// Stateless backend client. The bearer is read from a `TokenSource` on every call.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: Arc<str>,
    retry: RetryPolicy,
    cache: Arc<ResponseCache>,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration, retry: RetryPolicy) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::internal("http_client", e.to_string().as_str()))?;
        Ok(Self {
            http,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            retry,
            cache: Arc::new(ResponseCache::default()),
        })
    }

    pub fn from_config(cfg: &GateConfig) -> AppResult<Self> {
        let retry = RetryPolicy { max_retries: cfg.max_retries, base_delay: cfg.retry_base_delay };
        Self::new(&cfg.backend_url, cfg.request_timeout, retry)
    }

    pub fn base_url(&self) -> &str { &self.base_url }

    pub fn cache(&self) -> &ResponseCache { &self.cache }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    async fn send(&self, method: Method, url: &str, bearer: Option<&str>, body: Option<&serde_json::Value>) -> AppResult<serde_json::Value> {
        debug!(target: "vaxgate::api", "{} {} auth={}", method, url, bearer.is_some());
        let mut req = self.http.request(method, url);
        if let Some(t) = bearer { req = req.bearer_auth(t); }
        if let Some(b) = body { req = req.json(b); }
        let resp = req.send().await?;
        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }
        let bytes = resp.bytes().await?;
        if bytes.is_empty() { return Ok(serde_json::Value::Null); }
        serde_json::from_slice(&bytes).map_err(|e| AppError::internal("decode_error", e.to_string().as_str()))
    }

    /// Cached, retried GET.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str, token: &dyn TokenSource) -> AppResult<T> {
        let url = self.url(path);
        let bearer = token.bearer();
        let key = ResponseCache::key("GET", &url, bearer.as_deref());
        let value = match self.cache.get(&key) {
            Some(v) => {
                debug!(target: "vaxgate::api", "cache hit {}", url);
                v
            }
            None => {
                let (u, b) = (url.as_str(), bearer.as_deref());
                let v = with_retry(&self.retry, move || self.send(Method::GET, u, b, None)).await?;
                self.cache.put(key, v.clone());
                v
            }
        };
        decode(value)
    }

    /// POST. Only attempts that never reached the backend are retried, so a
    /// mutation is applied at most once. Success invalidates every cached GET.
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, token: &dyn TokenSource, body: &B) -> AppResult<T> {
        let url = self.url(path);
        let bearer = token.bearer();
        let payload = serde_json::to_value(body).map_err(|e| AppError::internal("encode_error", e.to_string().as_str()))?;
        let (u, b, p) = (url.as_str(), bearer.as_deref(), &payload);
        let value = with_retry_if(&self.retry, AppError::is_connect_failure, move || self.send(Method::POST, u, b, Some(p))).await?;
        self.cache.clear();
        decode(value)
    }

    /// Credentials are never replayed, so login is a single attempt.
    pub async fn login(&self, req: &LoginRequest) -> AppResult<AuthResponse> {
        let payload = serde_json::to_value(req).map_err(|e| AppError::internal("encode_error", e.to_string().as_str()))?;
        let value = self.send(Method::POST, &self.url("/auth/login"), None, Some(&payload)).await?;
        decode(value)
    }

    pub async fn logout(&self, token: &dyn TokenSource) -> AppResult<()> {
        let bearer = token.bearer();
        self.send(Method::POST, &self.url("/auth/logout"), bearer.as_deref(), None).await?;
        self.cache.clear();
        Ok(())
    }

    pub async fn current_user(&self, token: &dyn TokenSource) -> AppResult<UserProfile> {
        self.get_json("/users/me", token).await
    }

    pub async fn account_type(&self, token: &dyn TokenSource) -> AppResult<AccountTypeResponse> {
        self.get_json("/auth/account-type", token).await
    }

    /// Participant record behind a worker drive QR.
    pub async fn user_by_qr(&self, token: &dyn TokenSource, user_id: &str, drive_id: &str) -> AppResult<serde_json::Value> {
        let path = format!("/workers/user-by-qr/{}/{}", urlencoding::encode(user_id), urlencoding::encode(drive_id));
        self.get_json(&path, token).await
    }

    pub async fn administer_drive_vaccine(
        &self,
        token: &dyn TokenSource,
        drive_id: &str,
        req: &AdministerRequest,
    ) -> AppResult<serde_json::Value> {
        let path = format!("/workers/administer-drive-vaccine/{}", urlencoding::encode(drive_id));
        self.post_json(&path, token, req).await
    }

    /// Relay a request verbatim. No retry, no cache; backend errors come back as-is.
    pub async fn forward(
        &self,
        method: Method,
        path_and_query: &str,
        token: &dyn TokenSource,
        content_type: Option<&str>,
        body: Bytes,
    ) -> AppResult<ForwardedResponse> {
        let url = self.url(path_and_query);
        let mutating = !matches!(method, Method::GET | Method::HEAD | Method::OPTIONS);
        let mut req = self.http.request(method, &url);
        if let Some(t) = token.bearer() { req = req.bearer_auth(t); }
        if let Some(ct) = content_type { req = req.header(reqwest::header::CONTENT_TYPE, ct); }
        if !body.is_empty() { req = req.body(body); }
        let resp = req.send().await.inspect_err(|e| warn!(target: "vaxgate::api", "forward {} failed: {}", url, e))?;
        let status = resp.status().as_u16();
        if mutating && resp.status().is_success() { self.cache.clear(); }
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = resp.bytes().await?;
        Ok(ForwardedResponse { status, content_type, body })
    }
}

fn decode<T: DeserializeOwned>(value: serde_json::Value) -> AppResult<T> {
    serde_json::from_value(value).map_err(|e| AppError::internal("decode_error", e.to_string().as_str()))
}

async fn error_from_response(resp: reqwest::Response) -> AppError {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    let detail = detail_message(&text);
    let code = status.as_u16();
    warn!(target: "vaxgate::api", "backend answered {}: {}", code, detail.as_deref().unwrap_or("<no detail>"));
    match code {
        401 => AppError::unauthenticated(
            "session_expired".to_string(),
            detail.unwrap_or_else(|| "Your session has expired, please log in again".to_string()),
        ),
        403 => AppError::unauthorized(
            "forbidden".to_string(),
            detail.unwrap_or_else(|| "You do not have permission to perform this action".to_string()),
        ),
        404 => AppError::not_found("not_found".to_string(), detail.unwrap_or_else(|| "Resource not found".to_string())),
        _ => AppError::upstream(
            code,
            detail.unwrap_or_else(|| format!("HTTP {}: {}", code, status.canonical_reason().unwrap_or("Unknown"))),
        ),
    }
}

/// FastAPI error bodies: `{"detail": "..."}` or `{"detail": [{"msg": "..."}, ...]}`.
pub(crate) fn detail_message(body: &str) -> Option<String> {
    let v: serde_json::Value = serde_json::from_str(body).ok()?;
    match v.get("detail") {
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        Some(serde_json::Value::Array(items)) => {
            let msgs: Vec<&str> = items.iter().filter_map(|i| i.get("msg").and_then(|m| m.as_str())).collect();
            (!msgs.is_empty()).then(|| msgs.join("; "))
        }
        _ => v.get("message").and_then(|m| m.as_str()).map(|s| s.to_string()),
    }
}
