//! Session identity for the portals: roles, the cookie-resident session and
//! the client storage it may have left behind.
//! Keep the public surface thin and split implementation across sub-modules.

mod role;
mod session;
mod storage;
mod request_context;

pub use role::{Role, UnknownRole};
pub use session::{
    clear_session_cookies, clear_token_cookie, parse_cookie, parse_cookie_str, CookiePolicy, Session,
    SessionCookies, ACCESS_TOKEN_COOKIE, ROLE_COOKIE,
};
pub use storage::{
    migrate_legacy_token, purge_session_keys, stored_token, ClientStorage, MemoryStorage, SESSION_KEYS,
    STORAGE_ACCESS_TOKEN, STORAGE_LEGACY_ROLE, STORAGE_LEGACY_TOKEN, STORAGE_ROLE,
};
pub use request_context::RequestContext;
