//! In-memory, TTL-bounded cache of summarization results, keyed by content
//! hash. Process-local: a restart loses it, and the persistent
//! summary_records table remains the source of truth.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use pulsefeed_common::Clock;

#[derive(Debug, Clone)]
pub struct CachedSummary {
    pub summary: String,
    pub translation: Option<String>,
    pub provider: String,
    pub model: String,
    pub is_generated: bool,
}

struct Entry {
    value: CachedSummary,
    inserted_at: DateTime<Utc>,
}

pub struct SummaryCache {
    entries: Mutex<HashMap<String, Entry>>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl SummaryCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            clock,
        }
    }

    /// Look up a fresh entry. Expired entries are evicted on read.
    pub fn get(&self, key: &str) -> Option<CachedSummary> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get(key) {
            Some(entry) if now - entry.inserted_at <= self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: String, value: CachedSummary) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.insert(
            key,
            Entry {
                value,
                inserted_at: self.clock.now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsefeed_common::clock::ManualClock;

    fn cached(summary: &str) -> CachedSummary {
        CachedSummary {
            summary: summary.to_string(),
            translation: None,
            provider: "anthropic".to_string(),
            model: "m".to_string(),
            is_generated: true,
        }
    }

    #[test]
    fn round_trip_within_ttl() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = SummaryCache::new(Duration::from_secs(3600), clock.clone());

        cache.insert("k".to_string(), cached("hello"));
        clock.advance(chrono::Duration::minutes(30));
        assert_eq!(cache.get("k").unwrap().summary, "hello");
    }

    #[test]
    fn expires_after_ttl() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = SummaryCache::new(Duration::from_secs(3600), clock.clone());

        cache.insert("k".to_string(), cached("hello"));
        clock.advance(chrono::Duration::hours(2));
        assert!(cache.get("k").is_none());
        // Eviction happened on read.
        assert!(cache.is_empty());
    }

    #[test]
    fn miss_on_unknown_key() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = SummaryCache::new(Duration::from_secs(60), clock);
        assert!(cache.get("nope").is_none());
    }
}
