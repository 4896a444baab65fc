/// Process-wide search-result cache.
///
/// Keys are opaque search ids, written once and read many times. The
/// cache is capacity-bounded with oldest-first eviction so long-lived
/// processes don't accumulate result sets without limit.
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use tracing::debug;

use super::SearchResponse;

struct CacheInner {
    map: HashMap<String, SearchResponse>,
    order: VecDeque<String>,
}

pub struct SearchCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

impl SearchCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(CacheInner {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Store a response under its search id, evicting the oldest entry
    /// when the cache is full.
    pub fn insert(&self, response: SearchResponse) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        while inner.order.len() >= self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.map.remove(&oldest);
                debug!("evicted cached search {oldest}");
            }
        }

        inner.order.push_back(response.search_id.clone());
        inner.map.insert(response.search_id.clone(), response);
    }

    /// Fetch a cached response by id.
    #[must_use]
    pub fn get(&self, search_id: &str) -> Option<SearchResponse> {
        let inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.map.get(search_id).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .map
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(id: &str) -> SearchResponse {
        SearchResponse {
            search_id: id.to_string(),
            query: "q".to_string(),
            results: vec![],
            total_results: 0,
            unique_documents: vec![],
            chunk_ids: vec![],
            processing_time: 0.0,
            collections_searched: vec![],
        }
    }

    #[test]
    fn test_insert_and_get() {
        let cache = SearchCache::new(4);
        cache.insert(response("a"));
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_capacity_evicts_oldest_first() {
        let cache = SearchCache::new(2);
        cache.insert(response("a"));
        cache.insert(response("b"));
        cache.insert(response("c"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none(), "oldest entry should be evicted");
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_zero_capacity_clamped_to_one() {
        let cache = SearchCache::new(0);
        cache.insert(response("a"));
        assert_eq!(cache.len(), 1);
        cache.insert(response("b"));
        assert_eq!(cache.len(), 1);
        assert!(cache.get("b").is_some());
    }
}
