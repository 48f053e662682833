use crate::client::CacheClient;
use crate::error::BackendError;
use crate::model::SessionKey;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use time::{Duration, OffsetDateTime};

const CLEANUP_INTERVAL: Duration = Duration::seconds(60);

struct Entry {
    data: Vec<u8>,
    expires_at: Option<OffsetDateTime>,
}

impl Entry {
    fn new(data: &[u8], ttl: std::time::Duration, now: OffsetDateTime) -> Self {
        // A zero TTL, or one reaching past the representable calendar, never expires.
        let expires_at = if ttl.is_zero() {
            None
        } else {
            Duration::try_from(ttl)
                .ok()
                .and_then(|ttl| now.checked_add(ttl))
        };
        Self {
            data: data.to_vec(),
            expires_at,
        }
    }

    fn is_expired(&self, now: OffsetDateTime) -> bool {
        match self.expires_at {
            Some(exp) => now >= exp,
            None => false,
        }
    }
}

/// In-process cache backed by a concurrent hash map.
///
/// Useful for tests and single-process deployments. Expiration is handled
/// lazily on access, with an occasional sweep of stale entries.
pub struct InMemoryCacheClient {
    entries: DashMap<String, Entry>,
    cleanup_hint: Mutex<OffsetDateTime>,
    closed: AtomicBool,
}

impl Default for InMemoryCacheClient {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            cleanup_hint: Mutex::new(OffsetDateTime::now_utc()),
            closed: AtomicBool::new(false),
        }
    }
}

impl InMemoryCacheClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw cache keys currently holding a live value, sorted.
    pub fn keys(&self) -> Vec<String> {
        let now = Self::now();
        let mut keys: Vec<_> = self
            .entries
            .iter()
            .filter(|entry| !entry.value().is_expired(now))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        keys
    }

    /// Live value stored under a raw cache key.
    pub fn raw_get(&self, raw_key: &str) -> Option<Vec<u8>> {
        let now = Self::now();
        self.entries
            .get(raw_key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.data.clone())
    }

    /// Remaining lifetime of the value under a raw cache key.
    pub fn ttl_of(&self, raw_key: &str) -> Option<Duration> {
        let now = Self::now();
        self.entries
            .get(raw_key)
            .and_then(|entry| entry.expires_at)
            .map(|exp| exp - now)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn now() -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }

    fn ensure_open(&self) -> Result<(), BackendError> {
        if self.is_closed() {
            return Err(BackendError::Closed);
        }
        Ok(())
    }

    fn maybe_cleanup(&self, now: OffsetDateTime) {
        let mut guard = self.cleanup_hint.lock();
        if now - *guard < CLEANUP_INTERVAL {
            return;
        }

        self.entries.retain(|_, entry| !entry.is_expired(now));
        *guard = now;
    }
}

#[async_trait]
impl CacheClient for InMemoryCacheClient {
    async fn get(&self, key: &SessionKey) -> Result<Option<Vec<u8>>, BackendError> {
        self.ensure_open()?;
        let now = Self::now();
        self.maybe_cleanup(now);
        let raw = key.to_string();
        if let Some(entry) = self.entries.get(&raw) {
            if entry.is_expired(now) {
                drop(entry);
                self.entries.remove_if(&raw, |_, entry| entry.is_expired(now));
                return Ok(None);
            }
            return Ok(Some(entry.data.clone()));
        }
        Ok(None)
    }

    async fn set(
        &self,
        key: &SessionKey,
        data: &[u8],
        ttl: std::time::Duration,
    ) -> Result<(), BackendError> {
        self.ensure_open()?;
        let now = Self::now();
        self.maybe_cleanup(now);
        self.entries.insert(key.to_string(), Entry::new(data, ttl, now));
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &SessionKey,
        data: &[u8],
        ttl: std::time::Duration,
    ) -> Result<bool, BackendError> {
        self.ensure_open()?;
        let now = Self::now();
        self.maybe_cleanup(now);
        match self.entries.entry(key.to_string()) {
            MapEntry::Occupied(mut occ) => {
                if !occ.get().is_expired(now) {
                    return Ok(false);
                }
                occ.insert(Entry::new(data, ttl, now));
                Ok(true)
            }
            MapEntry::Vacant(vac) => {
                vac.insert(Entry::new(data, ttl, now));
                Ok(true)
            }
        }
    }

    async fn delete(&self, key: &SessionKey) -> Result<(), BackendError> {
        self.ensure_open()?;
        self.entries.remove(&key.to_string());
        Ok(())
    }

    async fn close(&self) -> Result<(), BackendError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
