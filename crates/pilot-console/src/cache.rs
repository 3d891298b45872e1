use std::{
    collections::HashMap,
    hash::Hash,
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Cached<V> {
    stored_at: Instant,
    value: V,
}

impl<V: Clone> Cached<V> {
    fn new(value: V) -> Self {
        Self {
            stored_at: Instant::now(),
            value,
        }
    }

    fn fresh(&self, ttl: Duration) -> Option<V> {
        (self.stored_at.elapsed() < ttl).then(|| self.value.clone())
    }
}

#[derive(Debug)]
struct Entries<K, V> {
    // Bumped by every invalidation.
    generation: u64,
    map: HashMap<K, Cached<V>>,
}

/// Keyed cache whose entries are served only while younger than `ttl`.
///
/// Expiry is checked on read; stale entries linger until overwritten or
/// explicitly invalidated. A loader that may race with invalidation reads
/// [`TtlCache::generation`] before fetching and stores through
/// [`TtlCache::set_if_current`].
#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Mutex<Entries<K, V>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(Entries {
                generation: 0,
                map: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Entries<K, V>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.lock().map.get(key).and_then(|c| c.fresh(self.ttl))
    }

    pub fn set(&self, key: K, value: V) {
        self.lock().map.insert(key, Cached::new(value));
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Store `value` only if nothing was invalidated since `generation` was
    /// read. Returns whether it was stored.
    pub fn set_if_current(&self, generation: u64, key: K, value: V) -> bool {
        let mut entries = self.lock();
        if entries.generation != generation {
            return false;
        }
        entries.map.insert(key, Cached::new(value));
        true
    }

    pub fn invalidate(&self, key: &K) {
        let mut entries = self.lock();
        entries.generation += 1;
        entries.map.remove(key);
    }

    pub fn clear(&self) {
        let mut entries = self.lock();
        entries.generation += 1;
        entries.map.clear();
    }

    /// Stored entries, fresh or not.
    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().map.is_empty()
    }
}

/// Single-value form of [`TtlCache`].
#[derive(Debug)]
pub struct TtlCell<V> {
    inner: TtlCache<(), V>,
}

impl<V: Clone> TtlCell<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: TtlCache::new(ttl),
        }
    }

    pub fn get(&self) -> Option<V> {
        self.inner.get(&())
    }

    pub fn set(&self, value: V) {
        self.inner.set((), value);
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation()
    }

    pub fn set_if_current(&self, generation: u64, value: V) -> bool {
        self.inner.set_if_current(generation, (), value)
    }

    pub fn invalidate(&self) {
        self.inner.invalidate(&());
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
