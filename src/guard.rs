//!
//! Route guard
//! -----------
//! Server-side enforcement point for every portal request. A request path is
//! classified once as public or role-scoped, then allowed or redirected based
//! on the session cookies it carries. This is the only authorization decision
//! point; the client gate never overrides it.
//!
//! Outcomes:
//! - public path: allowed regardless of session.
//! - no token: redirect to login, remembering the original path.
//! - token without role: corrupted session, token cookie cleared, redirect to login.
//! - role that may not reach the path: redirect to the role's landing route with `unauthorized=true`.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use tracing::{debug, info, warn};

use crate::config::{GateConfig, UnknownRolePolicy, LOGIN_ROUTE};
use crate::error::AppError;
use crate::identity::{clear_session_cookies, clear_token_cookie, CookiePolicy, RequestContext, Role, SessionCookies};
use crate::policy::{has_encoded_separator, matches_prefix, normalize_path, PathClass, PublicPaths, RoleAccessTable};

/// Cookies a redirect must delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearCookies {
    Nothing,
    Token,
    Session,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    RedirectToLogin { return_to: Option<String>, clear: ClearCookies },
    RedirectToRoleDefault { target: String },
    /// Only produced under `UnknownRolePolicy::DenyEverywhere`.
    Forbidden,
}

impl Decision {
    pub fn is_allow(&self) -> bool { matches!(self, Decision::Allow) }

    /// `Location` for redirect outcomes.
    pub fn location(&self) -> Option<String> {
        match self {
            Decision::RedirectToLogin { return_to: Some(p), .. } => Some(login_url(Some(p.as_str()))),
            Decision::RedirectToLogin { return_to: None, .. } => Some(login_url(None)),
            Decision::RedirectToRoleDefault { target } => Some(format!("{}?unauthorized=true", target)),
            Decision::Allow | Decision::Forbidden => None,
        }
    }
}

/// `/auth/login`, optionally carrying the page to return to. Separators stay literal.
pub fn login_url(return_to: Option<&str>) -> String {
    match return_to {
        Some(p) => format!("{}?redirect={}", LOGIN_ROUTE, urlencoding::encode(p).replace("%2F", "/")),
        None => LOGIN_ROUTE.to_string(),
    }
}

/// Immutable guard configuration shared by every request.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    table: Arc<RoleAccessTable>,
    public: Arc<PublicPaths>,
    excluded: Arc<Vec<String>>,
    unknown_role: UnknownRolePolicy,
    cookies: CookiePolicy,
}

impl RouteGuard {
    pub fn new(table: RoleAccessTable, public: PublicPaths, unknown_role: UnknownRolePolicy, cookies: CookiePolicy) -> Self {
        Self {
            table: Arc::new(table),
            public: Arc::new(public),
            excluded: Arc::new(Vec::new()),
            unknown_role,
            cookies,
        }
    }

    pub fn from_config(cfg: &GateConfig) -> Self {
        let mut g = Self::new(cfg.role_table.clone(), cfg.public_paths.clone(), cfg.unknown_role, cfg.cookies);
        g.excluded = Arc::new(cfg.excluded_prefixes.clone());
        g
    }

    pub fn table(&self) -> &RoleAccessTable { &self.table }

    pub fn cookie_policy(&self) -> &CookiePolicy { &self.cookies }

    /// Route matcher: static assets, image optimizer and favicon bypass the guard.
    pub fn is_excluded(&self, normalized_path: &str) -> bool {
        self.excluded.iter().any(|p| matches_prefix(normalized_path, p))
    }

    /// Pure decision over a path and the cookie-derived identity.
    pub fn evaluate(&self, path: &str, token_present: bool, role: Option<&str>) -> Decision {
        let path = normalize_path(path);
        if self.public.classify(&path) == PathClass::Public {
            return Decision::Allow;
        }
        if !token_present {
            return Decision::RedirectToLogin { return_to: Some(path), clear: ClearCookies::Nothing };
        }
        let Some(raw_role) = role.filter(|r| !r.trim().is_empty()) else {
            return Decision::RedirectToLogin { return_to: None, clear: ClearCookies::Token };
        };
        let role = match raw_role.parse::<Role>() {
            Ok(r) => r,
            Err(_) => {
                return match self.unknown_role {
                    UnknownRolePolicy::Relogin => Decision::RedirectToLogin { return_to: None, clear: ClearCookies::Session },
                    UnknownRolePolicy::DenyEverywhere => Decision::Forbidden,
                };
            }
        };
        if !self.table.allows(role, &path) {
            return Decision::RedirectToRoleDefault { target: self.table.default_route(role).to_string() };
        }
        Decision::Allow
    }

    /// Turn a non-allow decision into the HTTP response. `Allow` yields `None`.
    pub fn render(&self, decision: &Decision) -> Option<Response> {
        match decision {
            Decision::Allow => None,
            Decision::Forbidden => {
                Some(AppError::unauthorized("unknown_role", "this account type has no access to the portal").into_response())
            }
            Decision::RedirectToLogin { clear, .. } => {
                let mut resp = Redirect::temporary(&decision.location().unwrap_or_else(|| login_url(None))).into_response();
                let res = match clear {
                    ClearCookies::Nothing => Ok(()),
                    ClearCookies::Token => clear_token_cookie(&self.cookies, resp.headers_mut()),
                    ClearCookies::Session => clear_session_cookies(&self.cookies, resp.headers_mut()),
                };
                if let Err(e) = res { warn!(target: "vaxgate::guard", "failed to emit cookie deletion: {}", e); }
                Some(resp)
            }
            Decision::RedirectToRoleDefault { .. } => {
                decision.location().map(|loc| Redirect::temporary(&loc).into_response())
            }
        }
    }

    fn context_for(&self, path: &str, headers: &HeaderMap) -> RequestContext {
        let cookies = SessionCookies::from_headers(headers);
        RequestContext {
            request_id: uuid::Uuid::new_v4().to_string(),
            role: cookies.role.as_deref().and_then(|r| r.parse::<Role>().ok()),
            token: cookies.token,
            path: path.to_string(),
        }
    }
}

/// Axum middleware: `middleware::from_fn_with_state(guard, route_guard)`.
pub async fn route_guard(State(guard): State<RouteGuard>, mut req: Request, next: Next) -> Response {
    if has_encoded_separator(req.uri().path()) {
        info!(target: "vaxgate::guard", "reject encoded separator in path={}", req.uri().path());
        return AppError::user("invalid_path", "request path contains an encoded separator").into_response();
    }
    let path = normalize_path(req.uri().path());
    if guard.is_excluded(&path) {
        return next.run(req).await;
    }
    let cookies = SessionCookies::from_headers(req.headers());
    let decision = guard.evaluate(&path, cookies.has_token(), cookies.role.as_deref());
    match guard.render(&decision) {
        None => {
            debug!(target: "vaxgate::guard", "allow path={} role={:?}", path, cookies.role);
            let ctx = guard.context_for(&path, req.headers());
            req.extensions_mut().insert(ctx);
            next.run(req).await
        }
        Some(resp) => {
            info!(target: "vaxgate::guard", "deny path={} token={} role={:?} decision={:?}", path, cookies.has_token(), cookies.role, decision);
            resp
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> RouteGuard {
        RouteGuard::new(RoleAccessTable::default(), PublicPaths::default(), UnknownRolePolicy::Relogin, CookiePolicy::default())
    }

    #[test]
    fn public_paths_allow_regardless_of_session() {
        let g = guard();
        for (tok, role) in [(false, None), (true, None), (true, Some("ADMIN")), (true, Some("bogus"))] {
            assert_eq!(g.evaluate("/auth/login", tok, role), Decision::Allow);
            assert_eq!(g.evaluate("/register", tok, role), Decision::Allow);
            assert_eq!(g.evaluate("/api/auth/session", tok, role), Decision::Allow);
        }
    }

    #[test]
    fn no_token_redirects_with_return_path() {
        let g = guard();
        let d = g.evaluate("/admin/dashboard", false, Some("ADMIN"));
        assert_eq!(d, Decision::RedirectToLogin { return_to: Some("/admin/dashboard".into()), clear: ClearCookies::Nothing });
        assert_eq!(d.location().unwrap(), "/auth/login?redirect=/admin/dashboard");
    }

    #[test]
    fn token_without_role_clears_token() {
        let g = guard();
        let d = g.evaluate("/worker", true, None);
        assert_eq!(d, Decision::RedirectToLogin { return_to: None, clear: ClearCookies::Token });
        assert_eq!(d.location().unwrap(), "/auth/login");
        assert_eq!(g.evaluate("/worker", true, Some("  ")), d);
    }

    #[test]
    fn wrong_role_goes_to_its_landing_route() {
        let g = guard();
        let d = g.evaluate("/admin/dashboard", true, Some("WORKER"));
        assert_eq!(d, Decision::RedirectToRoleDefault { target: "/worker".into() });
        assert_eq!(d.location().unwrap(), "/worker?unauthorized=true");
        assert_eq!(g.evaluate("/worker/settings", true, Some("WORKER")), Decision::Allow);
    }

    #[test]
    fn separator_is_strict() {
        let g = guard();
        assert_eq!(g.evaluate("/admin/dashboard", true, Some("ADMIN")), Decision::Allow);
        assert!(!g.evaluate("/administrator", true, Some("ADMIN")).is_allow());
        assert!(!g.evaluate("/admin2", true, Some("ADMIN")).is_allow());
    }

    #[test]
    fn dot_segments_cannot_escape_a_public_prefix() {
        let g = guard();
        let d = g.evaluate("/auth/../admin", false, None);
        assert_eq!(d, Decision::RedirectToLogin { return_to: Some("/admin".into()), clear: ClearCookies::Nothing });
    }

    #[test]
    fn encoded_dot_segments_cannot_escape_a_public_prefix() {
        let g = guard();
        let d = g.evaluate("/auth/%2e%2e/admin", false, None);
        assert_eq!(d, Decision::RedirectToLogin { return_to: Some("/admin".into()), clear: ClearCookies::Nothing });
        assert!(!g.evaluate("/api/backend/%2e%2e/%2e%2e/internal", true, Some("USER")).is_allow());
    }

    #[test]
    fn unknown_role_follows_policy() {
        let g = guard();
        assert_eq!(
            g.evaluate("/admin", true, Some("SUPERUSER")),
            Decision::RedirectToLogin { return_to: None, clear: ClearCookies::Session }
        );
        let deny = RouteGuard::new(RoleAccessTable::default(), PublicPaths::default(), UnknownRolePolicy::DenyEverywhere, CookiePolicy::default());
        assert_eq!(deny.evaluate("/admin", true, Some("SUPERUSER")), Decision::Forbidden);
        assert_eq!(deny.evaluate("/auth/login", true, Some("SUPERUSER")), Decision::Allow);
    }

    #[test]
    fn allow_iff_prefix_matches_for_every_role() {
        let g = guard();
        let paths = ["/", "/user", "/user/profile", "/dashboard", "/admin", "/admin/drives/7", "/worker", "/worker/drive/3",
            "/doctor", "/doctor/u1/v1", "/doctors", "/api/backend/users/me", "/api/other"];
        for role in Role::ALL {
            for p in paths {
                let expected = g.table().prefixes(role).iter().any(|pre| matches_prefix(p, pre));
                assert_eq!(g.evaluate(p, true, Some(role.as_str())).is_allow(), expected, "role={} path={}", role, p);
            }
        }
    }

    #[test]
    fn login_url_encodes_query_but_keeps_separators() {
        assert_eq!(login_url(Some("/doctor/a b")), "/auth/login?redirect=/doctor/a%20b");
        assert_eq!(login_url(Some("/x&y=1")), "/auth/login?redirect=/x%26y%3D1");
    }

    #[test]
    fn render_emits_cookie_deletions() {
        let g = guard();
        let resp = g.render(&g.evaluate("/admin", true, None)).unwrap();
        assert_eq!(resp.status(), axum::http::StatusCode::TEMPORARY_REDIRECT);
        let cookies: Vec<_> = resp.headers().get_all(axum::http::header::SET_COOKIE).iter().collect();
        assert_eq!(cookies.len(), 1);
        assert!(cookies[0].to_str().unwrap().starts_with("accessToken=;"));

        let resp = g.render(&g.evaluate("/admin", false, None)).unwrap();
        assert!(resp.headers().get(axum::http::header::SET_COOKIE).is_none());
        assert!(g.render(&Decision::Allow).is_none());
    }
}
