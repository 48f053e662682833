use async_trait::async_trait;
use std::time::Duration;

use crate::error::BackendError;
use crate::model::SessionKey;

/// TTL-capable key-value cache that session blobs are persisted in.
///
/// Implementations own their connections; the session store only ever talks to
/// this trait. Every method may be cancelled by dropping the returned future.
#[async_trait]
pub trait CacheClient: Send + Sync + 'static {
    /// Fetches the blob under `key`. `Ok(None)` means absent, which is not an error.
    async fn get(&self, key: &SessionKey) -> Result<Option<Vec<u8>>, BackendError>;

    /// Unconditionally writes `data` under `key`, expiring after `ttl`.
    async fn set(&self, key: &SessionKey, data: &[u8], ttl: Duration) -> Result<(), BackendError>;

    /// Atomically writes `data` only if `key` is unoccupied.
    ///
    /// Returns `Ok(false)` when another value already holds the key.
    async fn set_if_absent(
        &self,
        key: &SessionKey,
        data: &[u8],
        ttl: Duration,
    ) -> Result<bool, BackendError>;

    /// Removes `key`. Removing an absent key succeeds.
    async fn delete(&self, key: &SessionKey) -> Result<(), BackendError>;

    /// Releases underlying connections.
    async fn close(&self) -> Result<(), BackendError>;
}
