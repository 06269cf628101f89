//! Bounded string-keyed cache with insertion-order eviction.
//!
//! Reads never refresh an entry; only `put` does. The entry written longest
//! ago is evicted first. Used for the latest-session-id lookup keyed by
//! `provider:project_path`.

use std::num::NonZeroUsize;

use lru::LruCache;

/// Bounded map with explicit prefix invalidation
#[derive(Debug)]
pub struct BoundedCache<V> {
    entries: LruCache<String, V>,
}

impl<V: Clone> BoundedCache<V> {
    /// Create a cache holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Look up `key` without refreshing it
    pub fn get(&self, key: &str) -> Option<V> {
        self.entries.peek(key).cloned()
    }

    /// Insert or refresh `key`, evicting the oldest entry when full
    pub fn put(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        if let Some((evicted, _)) = self.entries.push(key.clone(), value)
            && evicted != key
        {
            log::trace!("Evicted cache entry {}", evicted);
        }
    }

    /// Drop every entry whose key starts with `prefix`; returns how many
    pub fn invalidate_prefix(&mut self, prefix: &str) -> usize {
        let doomed: Vec<String> = self
            .entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            self.entries.pop(key);
        }
        doomed.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Key of the latest-session-id cache
pub fn session_cache_key(provider_id: &str, project_path: &str) -> String {
    format!("{provider_id}:{project_path}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_does_not_refresh() {
        let mut cache = BoundedCache::new(2);
        cache.put("a", 1);
        cache.put("b", 2);
        assert_eq!(cache.get("a"), Some(1));
        cache.put("c", 3);
        // "a" was written first and reads do not count
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn test_put_refreshes() {
        let mut cache = BoundedCache::new(2);
        cache.put("a", 1);
        cache.put("b", 2);
        cache.put("a", 10);
        cache.put("c", 3);
        assert_eq!(cache.get("a"), Some(10));
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_invalidate_prefix() {
        let mut cache = BoundedCache::new(8);
        cache.put(session_cache_key("claude", "/a"), "s1".to_string());
        cache.put(session_cache_key("claude", "/b"), "s2".to_string());
        cache.put(session_cache_key("codex", "/a"), "s3".to_string());
        assert_eq!(cache.invalidate_prefix("claude:"), 2);
        assert_eq!(cache.get("codex:/a").as_deref(), Some("s3"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let mut cache = BoundedCache::new(0);
        cache.put("a", 1);
        cache.put("b", 2);
        assert_eq!(cache.len(), 1);
        assert!(!cache.is_empty());
    }
}
