use crate::client::CacheClient;
use crate::error::{redis_error, BackendError};
use crate::model::SessionKey;
use async_trait::async_trait;
use parking_lot::RwLock;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;

/// Redis-backed cache client.
///
/// Constructors accept connection URLs only; no Redis client types appear in
/// the public API. Clones of the internal `ConnectionManager` share a single
/// multiplexed connection.
pub struct RedisCacheClient {
    conn: RwLock<Option<ConnectionManager>>,
}

impl RedisCacheClient {
    /// Connects to the Redis server at `url` (e.g. `redis://127.0.0.1:6379`).
    pub async fn from_url(url: impl AsRef<str>) -> Result<Self, BackendError> {
        let client = Client::open(url.as_ref()).map_err(redis_error)?;
        let manager = ConnectionManager::new(client).await.map_err(redis_error)?;
        Ok(Self {
            conn: RwLock::new(Some(manager)),
        })
    }

    fn conn(&self) -> Result<ConnectionManager, BackendError> {
        self.conn.read().clone().ok_or(BackendError::Closed)
    }

    // Redis expiries are whole seconds; anything shorter rounds up to one and
    // anything past the server's millisecond range is clamped to it.
    fn ttl_secs(ttl: Duration) -> u64 {
        ttl.as_secs().clamp(1, MAX_TTL_SECS)
    }
}

const MAX_TTL_SECS: u64 = i64::MAX as u64 / 1000;

#[async_trait]
impl CacheClient for RedisCacheClient {
    async fn get(&self, key: &SessionKey) -> Result<Option<Vec<u8>>, BackendError> {
        let mut conn = self.conn()?;
        conn.get(key.to_string()).await.map_err(redis_error)
    }

    async fn set(&self, key: &SessionKey, data: &[u8], ttl: Duration) -> Result<(), BackendError> {
        let mut conn = self.conn()?;
        conn.set_ex::<_, _, ()>(key.to_string(), data, Self::ttl_secs(ttl))
            .await
            .map_err(redis_error)
    }

    async fn set_if_absent(
        &self,
        key: &SessionKey,
        data: &[u8],
        ttl: Duration,
    ) -> Result<bool, BackendError> {
        let mut conn = self.conn()?;
        // SET .. NX EX replies OK on write and nil when the key is taken.
        let reply: Option<String> = redis::cmd("SET")
            .arg(key.to_string())
            .arg(data)
            .arg("NX")
            .arg("EX")
            .arg(Self::ttl_secs(ttl))
            .query_async(&mut conn)
            .await
            .map_err(redis_error)?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &SessionKey) -> Result<(), BackendError> {
        let mut conn = self.conn()?;
        conn.del::<_, ()>(key.to_string())
            .await
            .map_err(redis_error)
    }

    async fn close(&self) -> Result<(), BackendError> {
        self.conn.write().take();
        Ok(())
    }
}
