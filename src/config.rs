//! Gateway configuration loaded from the environment at startup.
//!
//! Everything here is immutable once the server starts; handlers receive it
//! through `AppState` behind an `Arc`.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::identity::{CookiePolicy, Role};
use crate::policy::{PublicPaths, RoleAccessTable};

pub const DEFAULT_HTTP_PORT: u16 = 3000;
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const LOGIN_ROUTE: &str = "/auth/login";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("role {0} has no permitted path prefixes")]
    EmptyRole(Role),
    #[error("invalid path prefix '{0}': must be an absolute path")]
    InvalidPrefix(String),
    #[error("unknown role '{0}' in role table")]
    UnknownRole(String),
    #[error("invalid value for {name}: '{value}'")]
    InvalidValue { name: &'static str, value: String },
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed role table: {0}")]
    Json(#[from] serde_json::Error),
}

/// What to do with a role cookie that names no known role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownRolePolicy {
    /// Treat as a corrupted session: clear both cookies and force a fresh login.
    #[default]
    Relogin,
    /// Authenticated but denied everywhere (403).
    DenyEverywhere,
}

impl FromStr for UnknownRolePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relogin" | "login" => Ok(UnknownRolePolicy::Relogin),
            "deny" | "forbid" => Ok(UnknownRolePolicy::DenyEverywhere),
            _ => Err(ConfigError::InvalidValue { name: "VAXGATE_UNKNOWN_ROLE", value: s.to_string() }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GateConfig {
    pub http_port: u16,
    pub backend_url: String,
    pub production: bool,
    pub cookies: CookiePolicy,
    pub unknown_role: UnknownRolePolicy,
    pub role_table: RoleAccessTable,
    pub public_paths: PublicPaths,
    /// Paths the route guard never sees (static assets, image optimizer, favicon).
    pub excluded_prefixes: Vec<String>,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            production: false,
            cookies: CookiePolicy::default(),
            unknown_role: UnknownRolePolicy::default(),
            role_table: RoleAccessTable::default(),
            public_paths: PublicPaths::default(),
            excluded_prefixes: ["/_next/static", "/_next/image", "/static", "/favicon.ico"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            request_timeout: Duration::from_millis(30_000),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(1000),
        }
    }
}

impl GateConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = GateConfig::default();
        if let Some(v) = get("VAXGATE_HTTP_PORT") { cfg.http_port = parse_num("VAXGATE_HTTP_PORT", &v)?; }
        if let Some(v) = get("VAXGATE_BACKEND_URL") {
            let v = v.trim().trim_end_matches('/').to_string();
            if !(v.starts_with("http://") || v.starts_with("https://")) {
                return Err(ConfigError::InvalidValue { name: "VAXGATE_BACKEND_URL", value: v });
            }
            cfg.backend_url = v;
        }
        if let Some(v) = get("VAXGATE_ENV") { cfg.production = v.trim().eq_ignore_ascii_case("production"); }
        if let Some(v) = get("VAXGATE_COOKIE_MAX_AGE") {
            cfg.cookies.max_age = Duration::from_secs(parse_num("VAXGATE_COOKIE_MAX_AGE", &v)?);
        }
        if let Some(v) = get("VAXGATE_UNKNOWN_ROLE") { cfg.unknown_role = v.parse()?; }
        if let Some(v) = get("VAXGATE_ROLE_TABLE") {
            cfg.role_table = RoleAccessTable::from_file(&PathBuf::from(v))?;
        }
        if let Some(v) = get("VAXGATE_PUBLIC_PATHS") {
            cfg.public_paths = PublicPaths::new(v.split(',').map(str::trim).filter(|s| !s.is_empty()))?;
        }
        if let Some(v) = get("VAXGATE_REQUEST_TIMEOUT_MS") {
            cfg.request_timeout = Duration::from_millis(parse_num("VAXGATE_REQUEST_TIMEOUT_MS", &v)?);
        }
        if let Some(v) = get("VAXGATE_RETRIES") { cfg.max_retries = parse_num("VAXGATE_RETRIES", &v)?; }
        cfg.cookies.secure = cfg.production;
        Ok(cfg)
    }
}

fn parse_num<T: FromStr>(name: &'static str, v: &str) -> Result<T, ConfigError> {
    v.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue { name, value: v.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let m: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| m.get(k).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let cfg = GateConfig::from_lookup(|_| None).unwrap();
        assert_eq!(cfg.http_port, 3000);
        assert_eq!(cfg.backend_url, "http://localhost:8000");
        assert_eq!(cfg.cookies.max_age, Duration::from_secs(3600));
        assert!(!cfg.cookies.secure);
        assert_eq!(cfg.unknown_role, UnknownRolePolicy::Relogin);
        assert!(cfg.excluded_prefixes.iter().any(|p| p == "/favicon.ico"));
    }

    #[test]
    fn production_turns_on_secure_cookies() {
        let cfg = GateConfig::from_lookup(lookup(&[("VAXGATE_ENV", "production"), ("VAXGATE_COOKIE_MAX_AGE", "900")])).unwrap();
        assert!(cfg.cookies.secure);
        assert_eq!(cfg.cookies.max_age, Duration::from_secs(900));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(GateConfig::from_lookup(lookup(&[("VAXGATE_HTTP_PORT", "eighty")])).is_err());
        assert!(GateConfig::from_lookup(lookup(&[("VAXGATE_BACKEND_URL", "localhost:8000")])).is_err());
        assert!(GateConfig::from_lookup(lookup(&[("VAXGATE_UNKNOWN_ROLE", "maybe")])).is_err());
    }

    #[test]
    fn unknown_role_policy_parses() {
        let cfg = GateConfig::from_lookup(lookup(&[("VAXGATE_UNKNOWN_ROLE", "deny")])).unwrap();
        assert_eq!(cfg.unknown_role, UnknownRolePolicy::DenyEverywhere);
    }

    #[test]
    fn role_table_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"USER":["/user"],"ADMIN":["/admin","/ops"],"WORKER":["/worker"],"DOCTOR":["/doctor"]}}"#).unwrap();
        let path = f.path().display().to_string();
        let cfg = GateConfig::from_lookup(lookup(&[("VAXGATE_ROLE_TABLE", path.as_str())])).unwrap();
        assert!(cfg.role_table.allows(Role::Admin, "/ops/audit"));

        let missing = GateConfig::from_lookup(lookup(&[("VAXGATE_ROLE_TABLE", "/nonexistent/roles.json")]));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn backend_url_trailing_slash_trimmed() {
        let cfg = GateConfig::from_lookup(lookup(&[("VAXGATE_BACKEND_URL", "https://api.example.org/")])).unwrap();
        assert_eq!(cfg.backend_url, "https://api.example.org");
    }
}
