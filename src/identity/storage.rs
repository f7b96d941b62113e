//! Client-side device storage as seen by portal code.
//!
//! The cookie pair is the single source of truth for a session. Storage keys
//! written by older portal builds are only read for migration and are purged on
//! logout.

use std::collections::HashMap;

use parking_lot::RwLock;

pub const STORAGE_ACCESS_TOKEN: &str = "accessToken";
pub const STORAGE_LEGACY_TOKEN: &str = "token";
pub const STORAGE_ROLE: &str = "role";
pub const STORAGE_LEGACY_ROLE: &str = "userRole";

/// Every key a session may have left behind on the device.
pub const SESSION_KEYS: [&str; 4] = [STORAGE_ACCESS_TOKEN, STORAGE_LEGACY_TOKEN, STORAGE_ROLE, STORAGE_LEGACY_ROLE];

pub trait ClientStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str) -> bool;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.entries.read().len() }

    pub fn is_empty(&self) -> bool { self.entries.read().is_empty() }
}

impl ClientStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> { self.entries.read().get(key).cloned() }

    fn set(&self, key: &str, value: &str) {
        self.entries.write().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) -> bool { self.entries.write().remove(key).is_some() }
}

/// Read the stored token, preferring the canonical key over the legacy one.
pub fn stored_token(storage: &dyn ClientStorage) -> Option<String> {
    storage
        .get(STORAGE_ACCESS_TOKEN)
        .or_else(|| storage.get(STORAGE_LEGACY_TOKEN))
        .filter(|t| !t.is_empty())
}

/// Move a token found only under the legacy key to the canonical key. Returns true when it moved.
pub fn migrate_legacy_token(storage: &dyn ClientStorage) -> bool {
    if storage.get(STORAGE_ACCESS_TOKEN).is_some() { return false; }
    let Some(legacy) = storage.get(STORAGE_LEGACY_TOKEN) else { return false; };
    storage.set(STORAGE_ACCESS_TOKEN, &legacy);
    storage.remove(STORAGE_LEGACY_TOKEN);
    true
}

/// Remove every session key. Each removal is attempted regardless of the others.
pub fn purge_session_keys(storage: &dyn ClientStorage) -> Vec<&'static str> {
    SESSION_KEYS.iter().copied().filter(|k| storage.remove(k)).collect()
}
