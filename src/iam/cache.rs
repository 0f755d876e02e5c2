//! LRU cache for IAM policy evaluation results

use super::condition::ConditionValue;
use super::decision::Decision;
use super::request::AuthorizationRequest;
use lru::LruCache;
use std::num::NonZeroUsize;

/// Hashable form of a context value. Numbers are keyed by their bits so
/// that every distinct `f64` (including infinities and NaN) gets its own key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ValueKey {
    String(String),
    Number(u64),
    Bool(bool),
}

impl From<&ConditionValue> for ValueKey {
    fn from(value: &ConditionValue) -> Self {
        match value {
            ConditionValue::String(s) => ValueKey::String(s.clone()),
            ConditionValue::Number(n) => ValueKey::Number(n.to_bits()),
            ConditionValue::Bool(b) => ValueKey::Bool(*b),
        }
    }
}

/// Cache key for policy evaluation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    principal: String,
    action: String,
    resource: String,
    context: Vec<(String, Vec<ValueKey>)>,
}

impl CacheKey {
    fn for_request(request: &AuthorizationRequest) -> Self {
        CacheKey {
            principal: request.principal.clone(),
            action: request.action.clone(),
            resource: request.resource.clone(),
            context: request
                .context
                .iter()
                .map(|(key, values)| {
                    (key.to_string(), values.iter().map(ValueKey::from).collect())
                })
                .collect(),
        }
    }
}

/// LRU cache for policy evaluation results
///
/// A capacity of zero disables caching: lookups always miss and inserts
/// are dropped.
pub struct PolicyCache {
    cache: Option<LruCache<CacheKey, Decision>>,
}

impl PolicyCache {
    /// Create a new policy cache with given capacity
    pub fn new(capacity: usize) -> Self {
        PolicyCache {
            cache: NonZeroUsize::new(capacity).map(LruCache::new),
        }
    }

    /// Get cached evaluation result
    pub fn get(&mut self, request: &AuthorizationRequest) -> Option<Decision> {
        let cache = self.cache.as_mut()?;
        cache.get(&CacheKey::for_request(request)).cloned()
    }

    /// Put evaluation result in cache
    pub fn put(&mut self, request: &AuthorizationRequest, decision: Decision) {
        if let Some(cache) = self.cache.as_mut() {
            cache.put(CacheKey::for_request(request), decision);
        }
    }

    /// Clear the cache
    pub fn clear(&mut self) {
        if let Some(cache) = self.cache.as_mut() {
            cache.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.cache.as_ref().map_or(0, LruCache::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
