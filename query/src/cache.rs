use crate::SearchResponse;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// Full normalized parameter tuple of one paginated query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub query: String,
    pub page: usize,
    pub files_only: bool,
    pub is_phrase: bool,
    pub user: Option<String>,
}

/// Bounded memo of paginated query results. LRU eviction, no TTL; values are
/// pure functions of their key, so a stale concurrent write for the same key
/// is harmless and the last writer wins.
pub struct QueryCache {
    inner: Mutex<LruCache<CacheKey, SearchResponse>>,
}

impl QueryCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("nonzero capacity");
        Self { inner: Mutex::new(LruCache::new(capacity)) }
    }

    pub fn get(&self, key: &CacheKey) -> Option<SearchResponse> {
        self.inner.lock().get(key).cloned()
    }

    pub fn put(&self, key: CacheKey, value: SearchResponse) {
        self.inner.lock().put(key, value);
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(q: &str) -> CacheKey {
        CacheKey {
            query: q.to_string(),
            page: 1,
            files_only: false,
            is_phrase: false,
            user: None,
        }
    }

    fn response(total: usize) -> SearchResponse {
        SearchResponse { hits: Vec::new(), elapsed_secs: 0.0, total_pages: 0, total_results: total }
    }

    #[test]
    fn bounded_lru_evicts_the_coldest_key() {
        let cache = QueryCache::new(2);
        cache.put(key("a"), response(1));
        cache.put(key("b"), response(2));
        // Touch "a" so "b" is the eviction candidate.
        assert!(cache.get(&key("a")).is_some());
        cache.put(key("c"), response(3));
        assert!(cache.get(&key("a")).is_some());
        assert!(cache.get(&key("b")).is_none());
        assert!(cache.get(&key("c")).is_some());
    }

    #[test]
    fn user_is_part_of_the_key() {
        let cache = QueryCache::default();
        cache.put(key("a"), response(1));
        let mut for_user = key("a");
        for_user.user = Some("alice".to_string());
        assert!(cache.get(&for_user).is_none());
    }
}
