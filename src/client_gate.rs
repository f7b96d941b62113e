//! Client-side session gate.
//!
//! A loading-state toggle for portal shells: it waits for a local session hint
//! and either shows content or navigates to login. It is not an authorization
//! boundary; the route guard already decided before the page was served, and
//! nothing here validates the token, its expiry or the role.

use crate::config::LOGIN_ROUTE;
use crate::identity::{
    migrate_legacy_token, parse_cookie_str, purge_session_keys, stored_token, ClientStorage, Role, ROLE_COOKIE,
};

/// Presence of a session as visible from client code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionHint {
    /// The readable role cookie is set.
    RoleCookie(String),
    /// Only a token left in device storage by an older portal build.
    LegacyStorage,
    Absent,
}

impl SessionHint {
    /// Read the hint from a `document.cookie` style string, falling back to legacy storage keys.
    pub fn detect(cookie_str: &str, storage: Option<&dyn ClientStorage>) -> Self {
        if let Some(role) = parse_cookie_str(cookie_str, ROLE_COOKIE).filter(|r| !r.is_empty()) {
            return SessionHint::RoleCookie(role);
        }
        if let Some(s) = storage {
            migrate_legacy_token(s);
            if stored_token(s).is_some() { return SessionHint::LegacyStorage; }
        }
        SessionHint::Absent
    }

    pub fn is_present(&self) -> bool { !matches!(self, SessionHint::Absent) }

    /// Role for UI branching only.
    pub fn role(&self) -> Option<Role> {
        match self {
            SessionHint::RoleCookie(r) => r.parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    Pending,
    Authenticated,
    Redirecting(String),
}

/// What the shell should draw for the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateView {
    Skeleton,
    Content,
    Nothing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthGate {
    state: GateState,
    mounted: bool,
}

impl Default for AuthGate {
    fn default() -> Self { Self { state: GateState::Pending, mounted: true } }
}

impl AuthGate {
    pub fn new() -> Self { Self::default() }

    pub fn state(&self) -> &GateState { &self.state }

    pub fn is_mounted(&self) -> bool { self.mounted }

    /// Resolve the one-shot mount check. Returns the navigation to perform, if any.
    ///
    /// The navigation is returned even after `unmount`; a check that outlives its
    /// component still fires its redirect.
    pub fn mount(&mut self, hint: &SessionHint) -> Option<String> {
        if self.state != GateState::Pending {
            return match &self.state {
                GateState::Redirecting(t) => Some(t.clone()),
                _ => None,
            };
        }
        if hint.is_present() {
            self.state = GateState::Authenticated;
            None
        } else {
            self.state = GateState::Redirecting(LOGIN_ROUTE.to_string());
            Some(LOGIN_ROUTE.to_string())
        }
    }

    pub fn unmount(&mut self) { self.mounted = false; }

    pub fn view(&self) -> GateView {
        if !self.mounted { return GateView::Nothing; }
        match self.state {
            GateState::Pending => GateView::Skeleton,
            GateState::Authenticated => GateView::Content,
            GateState::Redirecting(_) => GateView::Nothing,
        }
    }
}

/// Client half of logout: purge every session key and return the landing route.
///
/// Runs whether or not the server acknowledged the logout; returns the keys removed.
pub fn complete_logout(storage: &dyn ClientStorage, acknowledged: bool) -> (String, Vec<&'static str>) {
    let removed = purge_session_keys(storage);
    if !acknowledged {
        tracing::warn!(target: "vaxgate::client_gate", "logout not acknowledged by server; local session keys purged anyway");
    }
    (LOGIN_ROUTE.to_string(), removed)
}
