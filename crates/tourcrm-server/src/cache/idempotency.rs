// SPDX-License-Identifier: Apache-2.0

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// A completed response kept for replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone)]
struct Entry {
    fingerprint: String,
    response: StoredResponse,
    created_at: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Miss,
    Replay(StoredResponse),
    /// Same key, different request body.
    Mismatch,
}

/// Bounded, TTL-expiring map from idempotency scope to the first response
/// produced under it. Oldest entries are evicted first.
pub struct IdempotencyCache {
    ttl: Duration,
    max_entries: usize,
    entries: HashMap<String, Entry>,
    order: VecDeque<(String, Instant)>,
}

impl IdempotencyCache {
    #[must_use]
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn expire(&mut self, now: Instant) {
        while let Some((key, created_at)) = self.order.front() {
            if now.duration_since(*created_at) <= self.ttl {
                break;
            }
            if self
                .entries
                .get(key)
                .is_some_and(|e| e.created_at == *created_at)
            {
                self.entries.remove(key);
            }
            self.order.pop_front();
        }
    }

    pub fn lookup(&mut self, key: &str, fingerprint: &str, now: Instant) -> Lookup {
        self.expire(now);
        match self.entries.get(key) {
            None => Lookup::Miss,
            Some(entry) if entry.fingerprint == fingerprint => {
                Lookup::Replay(entry.response.clone())
            }
            Some(_) => Lookup::Mismatch,
        }
    }

    pub fn insert(
        &mut self,
        key: String,
        fingerprint: String,
        response: StoredResponse,
        now: Instant,
    ) {
        self.expire(now);
        while self.entries.len() >= self.max_entries {
            let Some((victim, created_at)) = self.order.pop_front() else {
                break;
            };
            if self
                .entries
                .get(&victim)
                .is_some_and(|e| e.created_at == created_at)
            {
                self.entries.remove(&victim);
            }
        }
        self.order.push_back((key.clone(), now));
        self.entries.insert(
            key,
            Entry {
                fingerprint,
                response,
                created_at: now,
            },
        );
    }
}

/// 1 to 255 visible ASCII characters.
#[must_use]
pub fn valid_key(key: &str) -> bool {
    (1..=255).contains(&key.len()) && key.bytes().all(|b| (0x21..=0x7e).contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(body: &str) -> StoredResponse {
        StoredResponse {
            status: 201,
            content_type: Some("application/json".to_string()),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn replays_same_body_and_flags_different_body() {
        let mut cache = IdempotencyCache::new(Duration::from_secs(60), 10);
        let t0 = Instant::now();
        assert_eq!(cache.lookup("k", "f1", t0), Lookup::Miss);
        cache.insert("k".to_string(), "f1".to_string(), stored("{}"), t0);
        assert_eq!(cache.lookup("k", "f1", t0), Lookup::Replay(stored("{}")));
        assert_eq!(cache.lookup("k", "f2", t0), Lookup::Mismatch);
    }

    #[test]
    fn entries_expire_after_ttl() {
        let mut cache = IdempotencyCache::new(Duration::from_secs(10), 10);
        let t0 = Instant::now();
        cache.insert("k".to_string(), "f".to_string(), stored("{}"), t0);
        assert_eq!(
            cache.lookup("k", "f", t0 + Duration::from_secs(11)),
            Lookup::Miss
        );
        assert!(cache.is_empty());
    }

    #[test]
    fn oldest_entry_is_evicted_at_capacity() {
        let mut cache = IdempotencyCache::new(Duration::from_secs(60), 2);
        let t0 = Instant::now();
        cache.insert("a".to_string(), "f".to_string(), stored("1"), t0);
        cache.insert("b".to_string(), "f".to_string(), stored("2"), t0);
        cache.insert("c".to_string(), "f".to_string(), stored("3"), t0);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.lookup("a", "f", t0), Lookup::Miss);
        assert_eq!(cache.lookup("c", "f", t0), Lookup::Replay(stored("3")));
    }

    #[test]
    fn key_charset_is_visible_ascii() {
        assert!(valid_key("order-2025-0001"));
        assert!(!valid_key(""));
        assert!(!valid_key("has space"));
        assert!(!valid_key(&"k".repeat(256)));
        assert!(!valid_key("ключ"));
    }
}
