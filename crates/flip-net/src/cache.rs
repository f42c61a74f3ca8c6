//! Response Cache
//!
//! URL-keyed cache with TTL. Entries serve pages flagged cacheable;
//! refresh fetches bypass it entirely.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Cached response entry
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Response body
    pub body: String,
    /// Time when cached
    cached_at: Instant,
    /// Max age (time to live)
    max_age: Duration,
}

impl CacheEntry {
    /// Check if entry is expired
    pub fn is_expired(&self) -> bool {
        self.cached_at.elapsed() > self.max_age
    }

    /// Check if entry is fresh
    pub fn is_fresh(&self) -> bool {
        !self.is_expired()
    }

    /// Get remaining TTL
    pub fn ttl(&self) -> Duration {
        let elapsed = self.cached_at.elapsed();
        if elapsed >= self.max_age {
            Duration::ZERO
        } else {
            self.max_age - elapsed
        }
    }
}

/// URL-keyed response cache.
#[derive(Debug)]
pub struct ResponseCache {
    entries: HashMap<String, CacheEntry>,
    max_entries: usize,
    default_ttl: Duration,
}

impl ResponseCache {
    pub fn new(max_entries: usize, default_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            max_entries,
            default_ttl,
        }
    }

    /// Get a fresh cached response; expired entries are dropped.
    pub fn get(&mut self, url: &str) -> Option<&CacheEntry> {
        if let Some(entry) = self.entries.get(url) {
            if entry.is_fresh() {
                return self.entries.get(url);
            }
            self.entries.remove(url);
        }
        None
    }

    /// Check if a URL is cached and fresh.
    pub fn contains(&self, url: &str) -> bool {
        self.entries.get(url).map(|e| e.is_fresh()).unwrap_or(false)
    }

    /// Store a response body.
    pub fn put(&mut self, url: &str, body: String) {
        while self.entries.len() >= self.max_entries {
            if !self.evict_one() {
                break;
            }
        }
        self.entries.insert(
            url.to_string(),
            CacheEntry {
                body,
                cached_at: Instant::now(),
                max_age: self.default_ttl,
            },
        );
    }

    /// Evict the oldest entry. Returns false when empty.
    fn evict_one(&mut self) -> bool {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.cached_at)
            .map(|(url, _)| url.clone());
        match oldest {
            Some(url) => {
                self.entries.remove(&url);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(128, Duration::from_secs(300))
    }
}
