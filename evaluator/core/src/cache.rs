//! Evaluation Result Cache
//!
//! Content-addressed cache of complete evaluation results with:
//! - SHA-256 keys over (normalized content, sorted dimensions, tier)
//! - Per-entry TTL checked at lookup time
//! - Oldest-accessed eviction once the entry count exceeds its limit
//! - A rolling hit-rate estimate
//!
//! # Design
//!
//! Entries live in a `DashMap`, so concurrent evaluations only contend on the
//! shard that holds their key. The hit-rate EMA is the single piece of global
//! state and sits behind a `parking_lot::Mutex`.
//!
//! Only results worth keeping are stored: a positive score, a real spend and
//! confidence above 50. Cheap or shaky results are cheaper to recompute than
//! to trust.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::CacheConfig;
use crate::registry::ema;
use crate::request::EvaluationRequest;
use crate::result::EvaluationResult;

/// EMA rate for the rolling hit rate
pub const HIT_RATE_ALPHA: f64 = 0.1;

/// Minimum spend for a result to be cached
pub const MIN_CACHEABLE_COST: f64 = 0.01;

/// Minimum confidence for a result to be cached
pub const MIN_CACHEABLE_CONFIDENCE: f64 = 50.0;

/// Errors that can occur during cache operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The request could not be turned into a cache key
    #[error("Failed to derive cache key: {0}")]
    KeyDerivation(String),
}

/// A cached result and its bookkeeping
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The cached result
    pub result: EvaluationResult,
    /// When this entry was created
    pub created_at: Instant,
    /// When this entry was last served
    pub last_accessed: Instant,
    /// Number of times this entry has been served
    pub access_count: u64,
    /// How long the entry stays valid
    pub ttl: Duration,
}

impl CacheEntry {
    fn new(result: EvaluationResult, ttl: Duration, now: Instant) -> Self {
        Self {
            result,
            created_at: now,
            last_accessed: now,
            access_count: 0,
            ttl,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= self.ttl
    }

    fn touch(&mut self, now: Instant) {
        self.last_accessed = now;
        self.access_count = self.access_count.saturating_add(1);
    }
}

/// Whether a result is worth caching
#[must_use]
pub fn is_cache_worthy(result: &EvaluationResult) -> bool {
    result.overall_score > 0.0
        && result.actual_cost > MIN_CACHEABLE_COST
        && result.confidence > MIN_CACHEABLE_CONFIDENCE
}

/// Derive the cache key for a request
///
/// Object keys are sorted and strings trimmed before hashing, so payloads that
/// differ only in key order or surrounding whitespace share an entry.
///
/// # Errors
///
/// Returns `CacheError::KeyDerivation` if the key material cannot be serialized.
pub fn content_hash(request: &EvaluationRequest) -> Result<String, CacheError> {
    let mut dimensions: Vec<&str> = request.dimensions.iter().map(String::as_str).collect();
    dimensions.sort_unstable();

    let material = serde_json::json!({
        "content": normalize(&request.content),
        "dimensions": dimensions,
        "tier": request.tier.as_str(),
    });
    let bytes =
        serde_json::to_vec(&material).map_err(|e| CacheError::KeyDerivation(e.to_string()))?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

fn normalize(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.trim().to_string()),
        Value::Array(items) => Value::Array(items.iter().map(normalize).collect()),
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = serde_json::Map::with_capacity(map.len());
            for key in keys {
                sorted.insert(key.clone(), normalize(&map[key]));
            }
            Value::Object(sorted)
        }
        other => other.clone(),
    }
}

/// Process-lifetime cache of evaluation results
#[derive(Debug)]
pub struct EvaluationCache {
    entries: DashMap<String, CacheEntry>,
    default_ttl: Duration,
    max_entries: usize,
    hit_rate: Mutex<f64>,
}

impl Default for EvaluationCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

impl EvaluationCache {
    /// Create a cache from configuration
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl: config.ttl(),
            max_entries: config.max_entries.max(1),
            hit_rate: Mutex::new(0.0),
        }
    }

    /// Default TTL applied when `store` is given none
    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Maximum entry count before eviction runs
    #[must_use]
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Look up a cached result for the request
    ///
    /// # Errors
    ///
    /// Returns `CacheError::KeyDerivation` if no key could be derived.
    pub fn lookup(&self, request: &EvaluationRequest) -> Result<Option<EvaluationResult>, CacheError> {
        let key = content_hash(request)?;
        Ok(self.lookup_at(&key, Instant::now()))
    }

    /// Look up a key at a given instant
    ///
    /// An expired entry is removed and reported as a miss.
    pub fn lookup_at(&self, key: &str, now: Instant) -> Option<EvaluationResult> {
        let found = match self.entries.get_mut(key) {
            Some(mut entry) if !entry.is_expired(now) => {
                entry.touch(now);
                Some(entry.result.clone())
            }
            _ => None,
        };

        if found.is_none() && self.entries.remove_if(key, |_, e| e.is_expired(now)).is_some() {
            tracing::debug!(key, "Removed expired cache entry");
        }

        self.observe(found.is_some());
        tracing::debug!(key, hit = found.is_some(), "Cache lookup");
        found
    }

    /// Store a result for the request if it is cache-worthy
    ///
    /// Returns `true` if the result was stored.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::KeyDerivation` if no key could be derived.
    pub fn store(
        &self,
        request: &EvaluationRequest,
        result: &EvaluationResult,
        ttl: Option<Duration>,
    ) -> Result<bool, CacheError> {
        let key = content_hash(request)?;
        Ok(self.store_at(key, result, ttl, Instant::now()))
    }

    /// Store a result under a key at a given instant
    pub fn store_at(
        &self,
        key: String,
        result: &EvaluationResult,
        ttl: Option<Duration>,
        now: Instant,
    ) -> bool {
        if !is_cache_worthy(result) {
            tracing::debug!(
                request_id = %result.request_id,
                score = result.overall_score,
                cost = result.actual_cost,
                confidence = result.confidence,
                "Result not cache-worthy"
            );
            return false;
        }

        let ttl = ttl.unwrap_or(self.default_ttl);
        self.entries
            .insert(key, CacheEntry::new(result.clone(), ttl, now));

        if self.entries.len() > self.max_entries {
            self.evict();
        }
        true
    }

    /// Drop the least recently accessed entries
    ///
    /// Leaves at most 80% of `max_entries` behind. Returns the number removed.
    pub fn evict(&self) -> usize {
        let target = self.max_entries - self.max_entries / 5;
        let len = self.entries.len();
        if len <= target {
            return 0;
        }

        let mut by_age: Vec<(String, Instant)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().last_accessed))
            .collect();
        by_age.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        let excess = len - target;
        let mut removed = 0;
        for (key, _) in by_age.into_iter().take(excess) {
            if self.entries.remove(&key).is_some() {
                removed += 1;
            }
        }

        tracing::debug!(removed, remaining = self.entries.len(), "Evicted cache entries");
        removed
    }

    /// Remove every expired entry
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    /// Remove every entry expired at a given instant
    pub fn purge_expired_at(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of stored entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a key is currently stored (expired or not)
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Rolling hit rate as a percentage
    #[must_use]
    pub fn hit_rate_pct(&self) -> f64 {
        *self.hit_rate.lock() * 100.0
    }

    fn observe(&self, hit: bool) {
        let mut rate = self.hit_rate.lock();
        *rate = ema(*rate, if hit { 1.0 } else { 0.0 }, HIT_RATE_ALPHA);
    }
}
