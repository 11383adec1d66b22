//! Keyed TTL cache for outbound call results.
//!
//! Values are stored as their JSON envelope so one cache serves every call
//! shape. Expiry is lazy: an expired entry is dropped on the read that finds
//! it. Duplicate concurrent misses re-fetch the same key twice, which is
//! tolerated by design.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Entry {
    value: Value,
    fetched_at: Instant,
    ttl: Duration,
}

#[derive(Debug, Default)]
pub struct TtlCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl TtlCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get(key) {
            Some(entry) if entry.fetched_at.elapsed() < entry.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: &str, value: Value, ttl: Duration) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.insert(
            key.to_string(),
            Entry {
                value,
                fetched_at: Instant::now(),
                ttl,
            },
        );
    }
}
