use std::sync::Arc;

use crate::identity::{stored_token, ClientStorage, RequestContext};

/// Where a call finds its bearer token. Read at call time, never cached.
pub trait TokenSource: Send + Sync {
    fn bearer(&self) -> Option<String>;
}

/// Token taken from the request's httpOnly cookie.
#[derive(Debug, Clone, Default)]
pub struct CookieToken(pub Option<String>);

impl CookieToken {
    pub fn from_context(ctx: &RequestContext) -> Self { Self(ctx.token.clone()) }
}

impl TokenSource for CookieToken {
    fn bearer(&self) -> Option<String> { self.0.clone() }
}

/// Token left in device storage by older portal builds.
pub struct StorageToken(pub Arc<dyn ClientStorage>);

impl TokenSource for StorageToken {
    fn bearer(&self) -> Option<String> { stored_token(self.0.as_ref()) }
}

/// Unauthenticated calls (login).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoToken;

impl TokenSource for NoToken {
    fn bearer(&self) -> Option<String> { None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{MemoryStorage, STORAGE_ACCESS_TOKEN};

    #[test]
    fn storage_token_is_read_fresh_each_call() {
        let storage = Arc::new(MemoryStorage::new());
        let src = StorageToken(storage.clone());
        assert_eq!(src.bearer(), None);
        storage.set(STORAGE_ACCESS_TOKEN, "t1");
        assert_eq!(src.bearer().as_deref(), Some("t1"));
        storage.set(STORAGE_ACCESS_TOKEN, "t2");
        assert_eq!(src.bearer().as_deref(), Some("t2"));
    }
}
