//! Expiring in-memory cache
//!
//! Used for both the namespace -> sender configuration lookups and the
//! api key -> mailer lookups. Entries live for a fixed TTL and are never
//! revalidated while fresh. Expired entries are swept lazily on writes once the
//! sweep interval has elapsed, so the cache never spawns background work.
//!
//! A zero TTL means entries never expire.

use std::{collections::HashMap, fmt, future::Future, hash::Hash, sync::Arc, time::Duration};

use tokio::{sync::RwLock, time::Instant};

#[derive(Debug)]
struct Entry<V> {
    value: V,
    /// `None` never expires
    expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |expires_at| expires_at > now)
    }
}

#[derive(Debug)]
struct Store<K, V> {
    entries: HashMap<K, Entry<V>>,
    last_sweep: Instant,
}

/// A thread-safe key/value cache whose entries expire after a fixed TTL
pub struct ExpiringCache<K, V> {
    store: Arc<RwLock<Store<K, V>>>,
    ttl: Duration,
    sweep_interval: Duration,
}

impl<K, V> ExpiringCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Creates a cache with an item TTL and a sweep interval for removing
    /// expired entries.
    pub fn new(ttl: Duration, sweep_interval: Duration) -> Self {
        Self {
            store: Arc::new(RwLock::new(Store {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            })),
            ttl,
            sweep_interval,
        }
    }

    /// Creates a cache that sweeps at twice the item TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self::new(ttl, ttl.saturating_mul(2))
    }

    /// Expiry for an entry written at `now`. TTLs past the end of the clock
    /// behave like a zero TTL.
    fn expiry_from(&self, now: Instant) -> Option<Instant> {
        if self.ttl.is_zero() {
            return None;
        }

        now.checked_add(self.ttl)
    }

    /// The item TTL
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The sweep interval
    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    /// Returns a clone of the cached value if present and not expired.
    pub async fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let store = self.store.read().await;

        store
            .entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
    }

    /// Stores a value under `key`, replacing any previous value and resetting
    /// its expiry to the cache-wide TTL.
    pub async fn insert(&self, key: K, value: V) {
        let now = Instant::now();
        let mut store = self.store.write().await;

        if !self.ttl.is_zero() && now.duration_since(store.last_sweep) >= self.sweep_interval {
            store.entries.retain(|_, entry| entry.is_live(now));
            store.last_sweep = now;
        }

        let expires_at = self.expiry_from(now);
        store.entries.insert(key, Entry { value, expires_at });
    }

    /// Returns the cached value for `key`, or computes it with `compute` and
    /// stores it on success. Errors are returned as-is and nothing is stored.
    ///
    /// Concurrent misses on the same key are not coalesced: each caller runs
    /// its own `compute` and the last writer wins.
    pub async fn get_or_try_insert_with<F, Fut, E>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key).await {
            return Ok(value);
        }

        let value = compute().await?;
        self.insert(key, value.clone()).await;

        Ok(value)
    }

    /// Removes every expired entry, returning how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut store = self.store.write().await;

        let before = store.entries.len();
        store.entries.retain(|_, entry| entry.is_live(now));
        store.last_sweep = now;

        before - store.entries.len()
    }

    /// Number of entries that have not expired yet
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let store = self.store.read().await;

        store
            .entries
            .values()
            .filter(|entry| entry.is_live(now))
            .count()
    }

    /// Whether the cache holds no live entries
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<K, V> Clone for ExpiringCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            ttl: self.ttl,
            sweep_interval: self.sweep_interval,
        }
    }
}

impl<K, V> fmt::Debug for ExpiringCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpiringCache")
            .field("ttl", &self.ttl)
            .field("sweep_interval", &self.sweep_interval)
            .finish()
    }
}
