//! In-memory TTL cache with lazy expiry on read and a periodic sweeper.
//!
//! Owned by the composition root and shared behind an `Arc`; nothing here is
//! a process-wide singleton.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use metrics::{counter, gauge};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::metrics::names;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache lock poisoned")]
    Poisoned,
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    created_at: Instant,
    ttl: Duration,
}

impl<V> Entry<V> {
    fn expired(&self, now: Instant) -> bool {
        // ttl == 0 is expired the instant it is written.
        now.duration_since(self.created_at) >= self.ttl
    }
}

pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
    default_ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn put(&self, key: &str, value: V) -> Result<(), CacheError> {
        self.put_with_ttl(key, value, self.default_ttl)
    }

    /// Insert, replacing any previous entry for `key`.
    pub fn put_with_ttl(&self, key: &str, value: V, ttl: Duration) -> Result<(), CacheError> {
        let mut map = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        map.insert(
            key.to_string(),
            Entry {
                value,
                created_at: Instant::now(),
                ttl,
            },
        );
        gauge!(names::CACHE_ENTRIES).set(map.len() as f64);
        Ok(())
    }

    /// `Ok(None)` for absent or expired keys. Expired entries are removed.
    pub fn get(&self, key: &str) -> Result<Option<V>, CacheError> {
        let mut map = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        let now = Instant::now();
        match map.get(key) {
            Some(e) if e.expired(now) => {
                map.remove(key);
                counter!(names::CACHE_EVICTIONS).increment(1);
                gauge!(names::CACHE_ENTRIES).set(map.len() as f64);
                Ok(None)
            }
            Some(e) => Ok(Some(e.value.clone())),
            None => Ok(None),
        }
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> Result<usize, CacheError> {
        let mut map = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        let now = Instant::now();
        let before = map.len();
        map.retain(|_, e| !e.expired(now));
        let removed = before - map.len();
        if removed > 0 {
            counter!(names::CACHE_EVICTIONS).increment(removed as u64);
        }
        gauge!(names::CACHE_ENTRIES).set(map.len() as f64);
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Background sweep every `interval`. The first tick fires immediately.
pub fn spawn_sweeper<V>(cache: Arc<TtlCache<V>>, interval: Duration) -> JoinHandle<()>
where
    V: Clone + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match cache.sweep() {
                Ok(0) => {}
                Ok(removed) => {
                    tracing::info!(target: "cache", removed, remaining = cache.len(), "swept expired searches")
                }
                Err(e) => {
                    tracing::error!(target: "cache", error = %e, "cache sweep failed");
                }
            }
        }
    })
}
