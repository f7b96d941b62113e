//!
//! vaxgate HTTP server
//! -------------------
//! Axum router for the portal edge. Every request that is not a static asset
//! passes the route guard first; handlers then talk to the backend with the
//! bearer taken from the session cookie.
//!
//! Responsibilities:
//! - Login/logout endpoints that own the session cookie pair.
//! - A non-authoritative session hint for client shells.
//! - Doctor and worker QR workflows.
//! - `/api/backend/*` proxy that attaches the cookie bearer.
//! - Portal page descriptors for everything else the guard lets through.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{any, get, post};
use axum::{middleware, Extension, Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::api::{AdministerRequest, BackendClient, CookieToken, LoginRequest};
use crate::config::{GateConfig, LOGIN_ROUTE};
use crate::error::{AppError, AppResult};
use crate::guard::{route_guard, RouteGuard};
use crate::identity::{clear_session_cookies, RequestContext, Role, Session, SessionCookies};
use crate::policy::normalize_path;
use crate::qr::{parse_doctor_qr, parse_worker_qr};

const PROXY_PREFIX: &str = "/api/backend";

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GateConfig>,
    pub guard: RouteGuard,
    pub backend: BackendClient,
}

impl AppState {
    pub fn new(config: GateConfig) -> AppResult<Self> {
        let guard = RouteGuard::from_config(&config);
        let backend = BackendClient::from_config(&config)?;
        Ok(Self { config: Arc::new(config), guard, backend })
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/auth/login", get(login_page).post(login))
        .route("/auth/logout", get(logout).post(logout))
        .route("/api/auth/session", get(session_hint))
        .route("/doctor/qr/resolve", post(resolve_doctor_qr))
        .route("/worker/qr/resolve", post(resolve_worker_qr))
        .route("/worker/qr/administer", post(administer_vaccine))
        .route("/api/backend/{*path}", any(proxy))
        .fallback(portal_page)
        .layer(middleware::from_fn_with_state(state.guard.clone(), route_guard))
        .with_state(state)
}

fn log_startup(cfg: &GateConfig) {
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "startup",
        "vaxgate starting: RUST_LOG='{}', http_port={}, backend={}, production={}, cookie_max_age={}s, unknown_role={:?}",
        rust_log, cfg.http_port, cfg.backend_url, cfg.production, cfg.cookies.max_age.as_secs(), cfg.unknown_role
    );
    for role in Role::ALL {
        info!(target: "startup", "role {} -> {:?}", role, cfg.role_table.prefixes(role));
    }
    info!(target: "startup", "public paths: {:?}", cfg.public_paths.prefixes());
}

pub async fn run_with_config(cfg: GateConfig) -> anyhow::Result<()> {
    log_startup(&cfg);
    let addr: SocketAddr = format!("0.0.0.0:{}", cfg.http_port).parse()?;
    let state = AppState::new(cfg).context("while building backend client")?;
    let app = build_router(state);
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub async fn run() -> anyhow::Result<()> {
    let cfg = GateConfig::from_env().context("invalid gateway configuration")?;
    run_with_config(cfg).await
}

#[derive(Debug, Default, Deserialize)]
struct LoginQuery {
    redirect: Option<String>,
}

async fn login_page(Query(q): Query<LoginQuery>) -> impl IntoResponse {
    Json(json!({ "page": LOGIN_ROUTE, "redirect": q.redirect }))
}

/// Local, slash-rooted target the role may reach; anything else falls back to the landing route.
fn post_login_target(guard: &RouteGuard, role: Role, requested: Option<&str>) -> String {
    requested
        .filter(|r| r.starts_with('/') && !r.starts_with("//") && !r.contains('\\'))
        .filter(|r| guard.table().allows(role, &normalize_path(r)))
        .map(|r| r.to_string())
        .unwrap_or_else(|| guard.table().default_route(role).to_string())
}

async fn resolve_role(state: &AppState, raw: Option<&str>, token: &str) -> AppResult<Role> {
    if let Some(role) = raw.and_then(|r| r.parse::<Role>().ok()) {
        return Ok(role);
    }
    let fetched = state.backend.account_type(&CookieToken(Some(token.to_string()))).await?;
    fetched.account_type.parse::<Role>().map_err(|e| {
        warn!(target: "vaxgate::auth", "login returned unusable account type: {}", e);
        AppError::unauthorized("unknown_role", "this account type has no access to the portal")
    })
}

async fn login(State(state): State<AppState>, Query(q): Query<LoginQuery>, Json(payload): Json<LoginRequest>) -> Response {
    let auth = match state.backend.login(&payload).await {
        Ok(a) => a,
        Err(e) => {
            debug!(target: "vaxgate::auth", "login rejected: {}", e);
            return e.into_response();
        }
    };
    let role = match resolve_role(&state, auth.user.account_type.as_deref(), &auth.access_token).await {
        Ok(r) => r,
        Err(e) => return e.into_response(),
    };
    let session = Session::new(auth.access_token.clone(), role);
    let policy = state.guard.cookie_policy();
    let mut headers = HeaderMap::new();
    if let Err(e) = session.write_cookies(policy, &mut headers) {
        return e.into_response();
    }
    let redirect = post_login_target(&state.guard, role, q.redirect.as_deref());
    info!(target: "vaxgate::auth", "login ok user={} role={} redirect={}", auth.user.user_id, role, redirect);
    let body = json!({
        "status": "ok",
        "role": role,
        "redirect": redirect,
        "expires_at": session.expires_at(policy, Utc::now()),
        "user": auth.user,
        "message": auth.message,
    });
    (StatusCode::OK, headers, Json(body)).into_response()
}

/// Logout is one server-confirmed step: backend notified (best effort), both
/// cookies deleted, client storage purged via `Clear-Site-Data`.
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let cookies = SessionCookies::from_headers(&headers);
    if cookies.has_token() {
        if let Err(e) = state.backend.logout(&CookieToken(cookies.token.clone())).await {
            warn!(target: "vaxgate::auth", "backend logout failed, clearing local session anyway: {}", e);
        }
    }
    let mut resp = Redirect::to(LOGIN_ROUTE).into_response();
    if let Err(e) = clear_session_cookies(state.guard.cookie_policy(), resp.headers_mut()) {
        return e.into_response();
    }
    resp.headers_mut().insert("clear-site-data", HeaderValue::from_static("\"storage\""));
    resp
}

/// Presence hint only; the guard decides access.
async fn session_hint(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let cookies = SessionCookies::from_headers(&headers);
    let role = cookies.role.as_deref().and_then(|r| r.parse::<Role>().ok());
    Json(json!({
        "authenticated": cookies.has_token() && role.is_some(),
        "role": role,
        "landing": role.map(|r| state.guard.table().default_route(r).to_string()),
    }))
}

#[derive(Debug, Deserialize)]
struct QrPayload {
    content: String,
}

async fn resolve_doctor_qr(Json(payload): Json<QrPayload>) -> AppResult<impl IntoResponse> {
    let scan = parse_doctor_qr(&payload.content)?;
    let route = scan.route();
    Ok(Json(json!({ "scan": scan, "route": route })))
}

async fn resolve_worker_qr(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(payload): Json<QrPayload>,
) -> AppResult<impl IntoResponse> {
    let scan = parse_worker_qr(&payload.content)?;
    let participant = state.backend.user_by_qr(&CookieToken::from_context(&ctx), &scan.user_id, &scan.drive_id).await?;
    Ok(Json(json!({ "scan": scan, "participant": participant })))
}

#[derive(Debug, Deserialize)]
struct AdministerPayload {
    drive_id: String,
    user_id: String,
    #[serde(default)]
    vaccination_date: Option<DateTime<Utc>>,
    #[serde(default)]
    notes: Option<String>,
}

async fn administer_vaccine(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(payload): Json<AdministerPayload>,
) -> AppResult<impl IntoResponse> {
    if payload.drive_id.trim().is_empty() || payload.user_id.trim().is_empty() {
        return Err(AppError::user("missing_field", "drive_id and user_id are required"));
    }
    let req = AdministerRequest {
        user_id: payload.user_id,
        vaccination_date: payload.vaccination_date.unwrap_or_else(Utc::now),
        notes: payload.notes.filter(|n| !n.trim().is_empty()),
    };
    let record = state.backend.administer_drive_vaccine(&CookieToken::from_context(&ctx), &payload.drive_id, &req).await?;
    info!(target: "vaxgate::worker", "request={} administered drive={} user={}", ctx.request_id, payload.drive_id, req.user_id);
    Ok(Json(json!({ "status": "ok", "record": record })))
}

/// Forward the guarded (normalized) path with the cookie bearer attached.
async fn proxy(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Response> {
    let rest = ctx
        .path
        .strip_prefix(PROXY_PREFIX)
        .filter(|r| r.starts_with('/'))
        .ok_or_else(|| AppError::not_found("not_found", "no backend resource at this path"))?;
    let target = match uri.query() {
        Some(q) => format!("{}?{}", rest, q),
        None => rest.to_string(),
    };
    let content_type = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let resp = state.backend.forward(method, &target, &CookieToken::from_context(&ctx), content_type, body).await?;
    Ok(resp.into_response())
}

#[derive(Debug, Default, Deserialize)]
struct PortalQuery {
    #[serde(default)]
    unauthorized: Option<String>,
}

/// Page descriptor for any portal route the guard allowed.
async fn portal_page(ctx: Option<Extension<RequestContext>>, Query(q): Query<PortalQuery>) -> Response {
    let Some(Extension(ctx)) = ctx else {
        return AppError::not_found("not_found", "no such resource").into_response();
    };
    let notice = q
        .unauthorized
        .filter(|v| v == "true")
        .map(|_| AppError::unauthorized("unauthorized", "You are not authorized to access that page").notification());
    Json(json!({
        "page": ctx.path,
        "authenticated": ctx.is_authenticated(),
        "role": ctx.role,
        "request_id": ctx.request_id,
        "notice": notice,
    }))
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UnknownRolePolicy;
    use crate::identity::CookiePolicy;
    use crate::policy::{PublicPaths, RoleAccessTable};

    fn guard() -> RouteGuard {
        RouteGuard::new(RoleAccessTable::default(), PublicPaths::default(), UnknownRolePolicy::Relogin, CookiePolicy::default())
    }

    #[test]
    fn post_login_target_honours_allowed_local_paths() {
        let g = guard();
        assert_eq!(post_login_target(&g, Role::Doctor, Some("/doctor/u1/v1?dose=2")), "/doctor/u1/v1?dose=2");
        assert_eq!(post_login_target(&g, Role::Doctor, None), "/doctor");
    }

    #[test]
    fn post_login_target_rejects_foreign_and_external() {
        let g = guard();
        assert_eq!(post_login_target(&g, Role::Worker, Some("/admin/dashboard")), "/worker");
        assert_eq!(post_login_target(&g, Role::Admin, Some("//evil.example/admin")), "/admin");
        assert_eq!(post_login_target(&g, Role::Admin, Some("https://evil.example/admin")), "/admin");
        assert_eq!(post_login_target(&g, Role::User, Some("/dashboard/../admin")), "/user");
    }
}
