//! Short-lived client-side cache for vehicle-plate lookups.
//!
//! Entries expire after a fixed TTL (10 minutes by default). The cache is
//! opportunistic and never fails a lookup; a poisoned lock is logged and
//! recovered.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Default lifetime of a cached plate lookup.
pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

struct Entry<V> {
    stored_at: Instant,
    value: V,
}

/// Thread-safe TTL cache keyed by string.
pub struct TtlCache<V> {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return a fresh value for `key`, evicting it if it has expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(key);
        }
        None
    }

    /// Store `value` under `key`, overwriting any previous entry.
    pub fn put(&self, key: impl Into<String>, value: V) {
        self.lock().insert(
            key.into(),
            Entry {
                stored_at: Instant::now(),
                value,
            },
        );
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry<V>>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Plate cache lock poisoned; recovering");
            self.entries.clear_poison();
            PoisonError::into_inner(poisoned)
        })
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
