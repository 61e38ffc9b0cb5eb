use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Entry<T> {
    payload: Arc<T>,
    expires_at: Instant,
    inserted_at: Instant,
}

/// TTL + capacity bounded memo cache for pipeline results. Entries are
/// replaced, never mutated; expired entries are treated as absent. A single
/// async flight lock collapses simultaneous misses into one compute.
pub struct ResultCache<T> {
    entries: RwLock<HashMap<String, Entry<T>>>,
    flight: tokio::sync::Mutex<()>,
    ttl: Duration,
    capacity: usize,
}

impl<T> ResultCache<T> {
    pub fn new(ttl_secs: u64, capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            flight: tokio::sync::Mutex::new(()),
            ttl: Duration::from_secs(ttl_secs),
            capacity: capacity.max(1),
        }
    }

    /// Live entry for `key`, if any. Zero-copy: returns an Arc clone.
    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        let entries = self.entries.read();
        entries
            .get(key)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.payload.clone())
    }

    /// Store a fresh result, evicting expired then oldest entries once the
    /// capacity bound is hit.
    pub fn insert(&self, key: String, payload: T) -> Arc<T> {
        let payload = Arc::new(payload);
        let now = Instant::now();
        let mut entries = self.entries.write();

        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            entries.retain(|_, e| e.expires_at > now);
            if entries.len() >= self.capacity {
                if let Some(oldest) = entries
                    .iter()
                    .min_by_key(|(_, e)| e.inserted_at)
                    .map(|(k, _)| k.clone())
                {
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(
            key,
            Entry {
                payload: payload.clone(),
                expires_at: now + self.ttl,
                inserted_at: now,
            },
        );
        payload
    }

    /// Return the live entry for `key` or run `compute` and store its result.
    /// Within a TTL window a given key invokes `compute` at most once, even
    /// under concurrent misses (double-checked behind the flight lock).
    pub async fn get_or_compute<F, Fut, E>(&self, key: &str, compute: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }

        let _guard = self.flight.lock().await;
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }

        let payload = compute().await?;
        Ok(self.insert(key.to_string(), payload))
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }
}
