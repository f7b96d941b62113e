use std::collections::BTreeMap;
use std::path::Path;

use super::path::{matches_prefix, normalize_path};
use crate::config::ConfigError;
use crate::identity::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    Public,
    RoleScoped,
}

/// Paths reachable without a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicPaths {
    prefixes: Vec<String>,
}

impl Default for PublicPaths {
    fn default() -> Self {
        Self { prefixes: ["/auth", "/login", "/register", "/api/auth"].iter().map(|s| s.to_string()).collect() }
    }
}

impl PublicPaths {
    pub fn new<I, S>(prefixes: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let prefixes = prefixes.into_iter().map(|p| checked_prefix(p.as_ref())).collect::<Result<Vec<_>, _>>()?;
        Ok(Self { prefixes })
    }

    pub fn prefixes(&self) -> &[String] { &self.prefixes }

    /// Total and pure: anything that is not public is role-scoped.
    pub fn classify(&self, normalized_path: &str) -> PathClass {
        if self.prefixes.iter().any(|p| matches_prefix(normalized_path, p)) {
            PathClass::Public
        } else {
            PathClass::RoleScoped
        }
    }
}

/// Immutable role → ordered path prefixes. The first prefix is the role's landing route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAccessTable {
    entries: BTreeMap<Role, Vec<String>>,
}

impl Default for RoleAccessTable {
    fn default() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(Role::User, vec!["/user".to_string(), "/dashboard".to_string(), "/api/backend".to_string()]);
        entries.insert(Role::Admin, vec!["/admin".to_string(), "/api/backend".to_string()]);
        entries.insert(Role::Worker, vec!["/worker".to_string(), "/api/backend".to_string()]);
        entries.insert(Role::Doctor, vec!["/doctor".to_string(), "/api/backend".to_string()]);
        Self { entries }
    }
}

impl RoleAccessTable {
    /// Every role must map to at least one absolute prefix.
    pub fn new<I>(entries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (Role, Vec<String>)>,
    {
        let mut map = BTreeMap::new();
        for (role, prefixes) in entries {
            let checked = prefixes.iter().map(|p| checked_prefix(p)).collect::<Result<Vec<_>, _>>()?;
            map.insert(role, checked);
        }
        for role in Role::ALL {
            if map.get(&role).map(|v: &Vec<String>| v.is_empty()).unwrap_or(true) {
                return Err(ConfigError::EmptyRole(role));
            }
        }
        Ok(Self { entries: map })
    }

    /// Parse `{"ADMIN": ["/admin"], ...}`.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let raw: BTreeMap<String, Vec<String>> = serde_json::from_str(s)?;
        let mut entries = Vec::with_capacity(raw.len());
        for (k, v) in raw {
            let role = k.parse::<Role>().map_err(|_| ConfigError::UnknownRole(k.clone()))?;
            entries.push((role, v));
        }
        Self::new(entries)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.display().to_string(), source })?;
        Self::from_json_str(&text)
    }

    pub fn prefixes(&self, role: Role) -> &[String] {
        self.entries.get(&role).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn default_route(&self, role: Role) -> &str {
        self.prefixes(role).first().map(|s| s.as_str()).unwrap_or("/dashboard")
    }

    pub fn allows(&self, role: Role, normalized_path: &str) -> bool {
        self.prefixes(role).iter().any(|p| matches_prefix(normalized_path, p))
    }
}

fn checked_prefix(p: &str) -> Result<String, ConfigError> {
    if !p.starts_with('/') { return Err(ConfigError::InvalidPrefix(p.to_string())); }
    Ok(normalize_path(p))
}
