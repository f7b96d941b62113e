use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_CAPACITY: usize = 100;

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, (Instant, serde_json::Value)>,
    order: VecDeque<String>,
}

/// Bounded TTL cache for successful GET bodies. Oldest insertion is evicted first.
#[derive(Debug)]
pub struct ResponseCache {
    inner: Mutex<Inner>,
    ttl: Duration,
    capacity: usize,
}

impl Default for ResponseCache {
    fn default() -> Self { Self::new(DEFAULT_TTL, DEFAULT_CAPACITY) }
}

impl ResponseCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self { inner: Mutex::new(Inner::default()), ttl, capacity: capacity.max(1) }
    }

    /// Entries are scoped to the caller's token so one session never sees another's data.
    pub fn key(method: &str, url: &str, token: Option<&str>) -> String {
        let mut h = DefaultHasher::new();
        token.hash(&mut h);
        format!("{}:{}:{:016x}", method, url, h.finish())
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let mut g = self.inner.lock();
        let fresh = match g.entries.get(key) {
            Some((at, v)) if at.elapsed() < self.ttl => return Some(v.clone()),
            Some(_) => false,
            None => return None,
        };
        if !fresh {
            g.entries.remove(key);
            g.order.retain(|k| k != key);
        }
        None
    }

    pub fn put(&self, key: String, value: serde_json::Value) {
        let mut g = self.inner.lock();
        if !g.entries.contains_key(&key) {
            while g.entries.len() >= self.capacity {
                let Some(oldest) = g.order.pop_front() else { break; };
                g.entries.remove(&oldest);
            }
            g.order.push_back(key.clone());
        }
        g.entries.insert(key, (Instant::now(), value));
    }

    pub fn clear(&self) {
        let mut g = self.inner.lock();
        g.entries.clear();
        g.order.clear();
    }

    pub fn len(&self) -> usize { self.inner.lock().entries.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hit_then_expire() {
        let c = ResponseCache::default();
        c.put("k".into(), json!({"a": 1}));
        assert_eq!(c.get("k"), Some(json!({"a": 1})));

        let stale = ResponseCache::new(Duration::ZERO, 10);
        stale.put("k".into(), json!(1));
        assert_eq!(stale.get("k"), None);
        assert!(stale.is_empty());
    }

    #[test]
    fn evicts_oldest_at_capacity() {
        let c = ResponseCache::new(DEFAULT_TTL, 2);
        c.put("a".into(), json!(1));
        c.put("b".into(), json!(2));
        c.put("a".into(), json!(10));
        c.put("c".into(), json!(3));
        assert_eq!(c.len(), 2);
        assert_eq!(c.get("a"), None);
        assert_eq!(c.get("b"), Some(json!(2)));
        assert_eq!(c.get("c"), Some(json!(3)));
    }

    #[test]
    fn keys_differ_per_token() {
        let a = ResponseCache::key("GET", "http://x/users/me", Some("t1"));
        let b = ResponseCache::key("GET", "http://x/users/me", Some("t2"));
        let anon = ResponseCache::key("GET", "http://x/users/me", None);
        assert_ne!(a, b);
        assert_ne!(a, anon);
        assert!(!a.contains("t1"));
    }
}
