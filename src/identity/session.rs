use std::time::Duration;

use axum::http::{header, HeaderMap, HeaderValue};
use chrono::{DateTime, Utc};

use super::role::Role;
use crate::error::{AppError, AppResult};

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const ROLE_COOKIE: &str = "role";

const EPOCH_EXPIRES: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

/// Attributes shared by both session cookies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookiePolicy {
    pub secure: bool,
    pub max_age: Duration,
}

impl Default for CookiePolicy {
    fn default() -> Self { Self { secure: false, max_age: Duration::from_secs(60 * 60) } }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub role: Role,
}

impl Session {
    pub fn new<S: Into<String>>(access_token: S, role: Role) -> Self {
        Self { access_token: access_token.into(), role }
    }

    pub fn expires_at(&self, policy: &CookiePolicy, now: DateTime<Utc>) -> DateTime<Utc> {
        now + chrono::Duration::seconds(policy.max_age.as_secs() as i64)
    }

    /// Append both `Set-Cookie` headers. Writing the same session twice yields identical headers.
    pub fn write_cookies(&self, policy: &CookiePolicy, headers: &mut HeaderMap) -> AppResult<()> {
        if !is_cookie_safe(&self.access_token) {
            return Err(AppError::user("invalid_token", "access token contains characters not allowed in a cookie"));
        }
        append_set_cookie(headers, &token_cookie(&self.access_token, policy))?;
        append_set_cookie(headers, &role_cookie(self.role, policy))?;
        Ok(())
    }
}

/// Emit deletions for both session cookies.
pub fn clear_session_cookies(policy: &CookiePolicy, headers: &mut HeaderMap) -> AppResult<()> {
    append_set_cookie(headers, &clear_cookie(ACCESS_TOKEN_COOKIE, true, policy))?;
    append_set_cookie(headers, &clear_cookie(ROLE_COOKIE, false, policy))?;
    Ok(())
}

/// Emit a deletion for the token cookie only.
pub fn clear_token_cookie(policy: &CookiePolicy, headers: &mut HeaderMap) -> AppResult<()> {
    append_set_cookie(headers, &clear_cookie(ACCESS_TOKEN_COOKIE, true, policy))
}

fn attrs(http_only: bool, policy: &CookiePolicy) -> String {
    let mut s = String::new();
    if http_only { s.push_str("; HttpOnly"); }
    if policy.secure { s.push_str("; Secure"); }
    s.push_str("; SameSite=Strict; Path=/");
    s
}

pub fn token_cookie(token: &str, policy: &CookiePolicy) -> String {
    format!("{}={}; Max-Age={}{}", ACCESS_TOKEN_COOKIE, token, policy.max_age.as_secs(), attrs(true, policy))
}

// Role stays readable by client code for UI branching.
pub fn role_cookie(role: Role, policy: &CookiePolicy) -> String {
    format!("{}={}; Max-Age={}{}", ROLE_COOKIE, role.as_str(), policy.max_age.as_secs(), attrs(false, policy))
}

pub fn clear_cookie(name: &str, http_only: bool, policy: &CookiePolicy) -> String {
    format!("{}=; Max-Age=0; Expires={}{}", name, EPOCH_EXPIRES, attrs(http_only, policy))
}

fn append_set_cookie(headers: &mut HeaderMap, cookie: &str) -> AppResult<()> {
    let v = HeaderValue::from_str(cookie)
        .map_err(|e| AppError::internal("cookie_header", e.to_string().as_str()))?;
    headers.append(header::SET_COOKIE, v);
    Ok(())
}

fn is_cookie_safe(v: &str) -> bool {
    !v.is_empty() && v.bytes().all(|b| b.is_ascii_graphic() && b != b';' && b != b',' && b != b'"' && b != b'\\')
}

/// Look up a cookie by name in a raw `Cookie` header string (also the shape of `document.cookie`).
pub fn parse_cookie_str(s: &str, name: &str) -> Option<String> {
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name { return Some(v[1..].to_string()); }
        }
    }
    None
}

pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    // Clients may split cookies across several headers
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|s| parse_cookie_str(s, name))
}

/// Cookie-derived identity exactly as the request carried it. Empty values count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCookies {
    pub token: Option<String>,
    pub role: Option<String>,
}

impl SessionCookies {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Self {
            token: non_empty(parse_cookie(headers, ACCESS_TOKEN_COOKIE)),
            role: non_empty(parse_cookie(headers, ROLE_COOKIE)),
        }
    }

    pub fn has_token(&self) -> bool { self.token.is_some() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_cookies(h: &HeaderMap) -> Vec<String> {
        h.get_all(header::SET_COOKIE).iter().map(|v| v.to_str().unwrap().to_string()).collect()
    }

    #[test]
    fn token_cookie_is_http_only_and_role_is_not() {
        let policy = CookiePolicy { secure: true, max_age: Duration::from_secs(3600) };
        let mut h = HeaderMap::new();
        Session::new("abc.def.ghi", Role::Worker).write_cookies(&policy, &mut h).unwrap();
        let c = set_cookies(&h);
        assert_eq!(c[0], "accessToken=abc.def.ghi; Max-Age=3600; HttpOnly; Secure; SameSite=Strict; Path=/");
        assert_eq!(c[1], "role=WORKER; Max-Age=3600; Secure; SameSite=Strict; Path=/");
    }

    #[test]
    fn secure_flag_only_in_production() {
        let policy = CookiePolicy::default();
        assert!(!token_cookie("t", &policy).contains("Secure"));
    }

    #[test]
    fn writes_are_idempotent() {
        let policy = CookiePolicy::default();
        let s = Session::new("tok", Role::Admin);
        let (mut a, mut b) = (HeaderMap::new(), HeaderMap::new());
        s.write_cookies(&policy, &mut a).unwrap();
        s.write_cookies(&policy, &mut b).unwrap();
        assert_eq!(set_cookies(&a), set_cookies(&b));
    }

    #[test]
    fn rejects_tokens_that_would_break_the_header() {
        let mut h = HeaderMap::new();
        let err = Session::new("a; Path=/evil", Role::User).write_cookies(&CookiePolicy::default(), &mut h).unwrap_err();
        assert_eq!(err.http_status(), 400);
        assert!(h.is_empty());
    }

    #[test]
    fn clear_emits_both_deletions() {
        let mut h = HeaderMap::new();
        clear_session_cookies(&CookiePolicy::default(), &mut h).unwrap();
        let c = set_cookies(&h);
        assert_eq!(c.len(), 2);
        assert!(c[0].starts_with("accessToken=; Max-Age=0;"));
        assert!(c[1].starts_with("role=; Max-Age=0;"));
    }

    #[test]
    fn reads_cookies_and_treats_empty_as_absent() {
        let mut h = HeaderMap::new();
        h.insert(header::COOKIE, HeaderValue::from_static("theme=dark; accessToken=xyz; role="));
        let sc = SessionCookies::from_headers(&h);
        assert_eq!(sc.token.as_deref(), Some("xyz"));
        assert_eq!(sc.role, None);
    }

    #[test]
    fn expiry_follows_max_age() {
        let now = Utc::now();
        let s = Session::new("t", Role::User);
        let exp = s.expires_at(&CookiePolicy::default(), now);
        assert_eq!((exp - now).num_seconds(), 3600);
    }
}
