use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

const MIN_KEY_LEN: usize = 10;
/// Longest accepted TTL, one year.
const MAX_TTL_MINUTES: i64 = 365 * 24 * 60;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    created_at: DateTime<Utc>,
    hits: u64,
    /// Insertion order, breaks ties on eviction
    seq: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub total_hits: u64,
    pub avg_hits: f64,
    pub ttl_minutes: i64,
}

/// Answer cache keyed by the normalised question. Entries expire after the
/// TTL; when full, the least-hit entry (oldest among equals) is evicted.
#[derive(Debug)]
pub struct ResponseCache {
    entries: HashMap<String, CacheEntry>,
    max_size: usize,
    ttl: Duration,
    next_seq: u64,
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

fn is_expired(entry: &CacheEntry, ttl: Duration, now: DateTime<Utc>) -> bool {
    match entry.created_at.checked_add_signed(ttl) {
        Some(deadline) => now > deadline,
        None => false,
    }
}

impl ResponseCache {
    pub fn new(max_size: usize, ttl_minutes: i64) -> Self {
        let ttl_minutes = ttl_minutes.clamp(0, MAX_TTL_MINUTES);
        tracing::info!(
            "Response cache initialized (size={}, ttl={}min)",
            max_size,
            ttl_minutes
        );
        Self {
            entries: HashMap::new(),
            max_size,
            ttl: Duration::minutes(ttl_minutes),
            next_seq: 0,
        }
    }

    pub fn get(&mut self, key: &str) -> Option<String> {
        self.get_at(key, Utc::now())
    }

    fn get_at(&mut self, key: &str, now: DateTime<Utc>) -> Option<String> {
        let key = normalize_key(key);
        let expired = match self.entries.get(&key) {
            None => return None,
            Some(entry) => is_expired(entry, self.ttl, now),
        };
        if expired {
            self.entries.remove(&key);
            return None;
        }
        let entry = self.entries.get_mut(&key)?;
        entry.hits += 1;
        Some(entry.value.clone())
    }

    /// Store an answer. Keys shorter than ten characters are ignored.
    pub fn set(&mut self, key: &str, value: &str) {
        self.set_at(key, value, Utc::now());
    }

    fn set_at(&mut self, key: &str, value: &str, now: DateTime<Utc>) {
        if key.trim().chars().count() < MIN_KEY_LEN || self.max_size == 0 {
            return;
        }
        let key = normalize_key(key);
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_size {
            self.evict_least_used();
        }
        self.next_seq += 1;
        self.entries.insert(
            key,
            CacheEntry {
                value: value.to_string(),
                created_at: now,
                hits: 0,
                seq: self.next_seq,
            },
        );
    }

    fn evict_least_used(&mut self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, e)| (e.hits, e.seq))
            .map(|(k, _)| k.clone());
        if let Some(key) = victim {
            tracing::debug!("Evicting least used cache entry: {}", key);
            self.entries.remove(&key);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        tracing::info!("Response cache cleared");
    }

    pub fn clear_expired(&mut self) -> usize {
        self.clear_expired_at(Utc::now())
    }

    fn clear_expired_at(&mut self, now: DateTime<Utc>) -> usize {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, e| !is_expired(e, ttl, now));
        let removed = before - self.entries.len();
        if removed > 0 {
            tracing::info!("Cleared {} expired cache entries", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let total_hits: u64 = self.entries.values().map(|e| e.hits).sum();
        CacheStats {
            size: self.entries.len(),
            max_size: self.max_size,
            total_hits,
            avg_hits: if self.entries.is_empty() {
                0.0
            } else {
                total_hits as f64 / self.entries.len() as f64
            },
            ttl_minutes: self.ttl.num_minutes(),
        }
    }

    /// Most requested keys with their hit counts.
    pub fn top(&self, limit: usize) -> Vec<(String, u64)> {
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort_by(|a, b| b.1.hits.cmp(&a.1.hits).then(a.1.seq.cmp(&b.1.seq)));
        entries
            .into_iter()
            .take(limit)
            .map(|(k, e)| (k.clone(), e.hits))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const Q1: &str = "Что принимать от простуды?";
    const Q2: &str = "Что помогает для печени?";
    const Q3: &str = "Какой магний выбрать вечером?";

    #[test]
    fn keys_are_normalised_and_short_keys_skipped() {
        let mut cache = ResponseCache::new(10, 60);
        cache.set(&format!("  {}  ", Q1.to_uppercase()), "ответ");
        assert_eq!(cache.get(Q1).as_deref(), Some("ответ"));

        cache.set("привет", "нет");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn entries_expire_after_ttl() {
        let mut cache = ResponseCache::new(10, 60);
        let start = Utc::now();
        cache.set_at(Q1, "ответ", start);
        cache.set_at(Q2, "ответ", start);

        assert!(cache.get_at(Q1, start + Duration::minutes(60)).is_some());
        assert!(cache.get_at(Q1, start + Duration::minutes(61)).is_none());
        assert_eq!(cache.len(), 1);

        assert_eq!(cache.clear_expired_at(start + Duration::minutes(61)), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn oversized_ttl_is_clamped() {
        let mut cache = ResponseCache::new(10, 10_000_000_000_000);
        assert_eq!(cache.stats().ttl_minutes, MAX_TTL_MINUTES);

        let start = Utc::now();
        cache.set_at(Q1, "ответ", start);
        assert!(cache.get_at(Q1, start + Duration::days(364)).is_some());
        assert!(cache.get_at(Q1, start + Duration::days(366)).is_none());

        let cache = ResponseCache::new(10, -5);
        assert_eq!(cache.stats().ttl_minutes, 0);
    }

    #[test]
    fn evicts_least_hit_entry_when_full() {
        let mut cache = ResponseCache::new(2, 60);
        cache.set(Q1, "a");
        cache.set(Q2, "b");
        cache.get(Q1);

        cache.set(Q3, "c");
        assert_eq!(cache.len(), 2);
        assert!(cache.get(Q2).is_none());
        assert!(cache.get(Q1).is_some());
        assert!(cache.get(Q3).is_some());

        // Overwriting an existing key never evicts
        cache.set(Q3, "c2");
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn stats_and_top() {
        let mut cache = ResponseCache::new(5, 30);
        cache.set(Q1, "a");
        cache.set(Q2, "b");
        cache.get(Q2);
        cache.get(Q2);
        cache.get(Q1);

        let stats = cache.stats();
        assert_eq!(stats.size, 2);
        assert_eq!(stats.total_hits, 3);
        assert_eq!(stats.avg_hits, 1.5);
        assert_eq!(stats.ttl_minutes, 30);
        assert_eq!(cache.top(1), vec![(normalize_key(Q2), 2)]);
    }
}
