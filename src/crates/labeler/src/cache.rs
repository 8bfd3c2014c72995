//! Response cache for classifier calls
//!
//! Memoizes labels for identical `(normalized text, category)` pairs within a
//! process. Bounded by entry count with least-recently-used eviction; a
//! capacity of zero disables caching entirely.

use llm::Label;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Cache key: whitespace-normalized text plus category name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    text: String,
    category: String,
}

impl CacheKey {
    pub fn new(text: &str, category: &str) -> Self {
        Self {
            text: normalize_text(text),
            category: category.to_string(),
        }
    }
}

/// Trim and collapse internal whitespace runs to a single space
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone)]
struct CacheEntry {
    label: Label,
    last_used: u64,
}

/// Cache metrics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetrics {
    /// Total number of cache hits
    pub hits: usize,

    /// Total number of cache misses
    pub misses: usize,

    /// Total number of evictions
    pub evictions: usize,

    /// Current number of entries
    pub entries: usize,
}

impl CacheMetrics {
    /// Calculate hit ratio
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Bounded LRU map from [`CacheKey`] to [`Label`]
#[derive(Debug)]
pub struct ResponseCache {
    capacity: usize,
    entries: HashMap<CacheKey, CacheEntry>,
    // Logical clock, bumped on every access
    tick: u64,
    metrics: CacheMetrics,
}

impl ResponseCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity.min(4096)),
            tick: 0,
            metrics: CacheMetrics::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    /// Look up a label, refreshing its recency on hit
    pub fn get(&mut self, key: &CacheKey) -> Option<Label> {
        if !self.is_enabled() {
            return None;
        }

        self.tick += 1;
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.last_used = self.tick;
                self.metrics.hits += 1;
                Some(entry.label)
            }
            None => {
                self.metrics.misses += 1;
                None
            }
        }
    }

    /// Insert a label, evicting the least recently used entry when full
    pub fn put(&mut self, key: CacheKey, label: Label) {
        if !self.is_enabled() {
            return;
        }

        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            self.evict();
        }

        self.tick += 1;
        self.entries.insert(
            key,
            CacheEntry {
                label,
                last_used: self.tick,
            },
        );
        self.metrics.entries = self.entries.len();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.metrics
    }

    fn evict(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone());

        if let Some(key) = oldest {
            self.entries.remove(&key);
            self.metrics.evictions += 1;
        }
    }
}
