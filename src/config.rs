use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::client::CacheClient;
use crate::error::{config_error, SessionResult};
use crate::inmemory::InMemoryCacheClient;
use crate::model::SessionOptions;

pub const DEFAULT_BACKGROUND_TIMEOUT_MS: u64 = 5_000;

/// Store-wide settings, fixed once the store is built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(default)]
pub struct StoreConfig {
    /// Prepended verbatim to every session id to form the cache key.
    pub key_prefix: String,
    /// Defaults copied into every new session.
    pub options: SessionOptions,
    /// Dispatch writes and deletes as detached tasks instead of awaiting them.
    pub no_wait_writing_mode: bool,
    /// Deadline for each cache call made while a request waits on it.
    pub operation_timeout_ms: Option<u64>,
    /// Deadline for each detached write or delete.
    pub background_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            key_prefix: String::new(),
            options: SessionOptions::default(),
            no_wait_writing_mode: false,
            operation_timeout_ms: None,
            background_timeout_ms: DEFAULT_BACKGROUND_TIMEOUT_MS,
        }
    }
}

impl StoreConfig {
    /// Defaults overlaid with `SESSION_*` environment variables.
    pub fn from_env() -> SessionResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) but reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> SessionResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(prefix) = lookup("SESSION_KEY_PREFIX") {
            config.key_prefix = prefix;
        }
        if let Some(path) = lookup("SESSION_PATH") {
            config.options.path = path;
        }
        if let Some(max_age) = lookup("SESSION_MAX_AGE") {
            config.options.max_age = parse("SESSION_MAX_AGE", &max_age)?;
        }
        if let Some(no_wait) = lookup("SESSION_NO_WAIT") {
            config.no_wait_writing_mode = parse_bool("SESSION_NO_WAIT", &no_wait)?;
        }
        if let Some(timeout) = lookup("SESSION_OP_TIMEOUT_MS") {
            config.operation_timeout_ms = Some(parse("SESSION_OP_TIMEOUT_MS", &timeout)?);
        }
        if let Some(timeout) = lookup("SESSION_BACKGROUND_TIMEOUT_MS") {
            config.background_timeout_ms = parse("SESSION_BACKGROUND_TIMEOUT_MS", &timeout)?;
        }
        Ok(config)
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_ms.map(Duration::from_millis)
    }

    pub fn background_timeout(&self) -> Duration {
        Duration::from_millis(self.background_timeout_ms)
    }
}

fn parse<T: std::str::FromStr>(name: &str, raw: &str) -> SessionResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| config_error(format!("{name} is not a valid number: {raw:?}")))
}

fn parse_bool(name: &str, raw: &str) -> SessionResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(config_error(format!("{name} is not a valid boolean: {raw:?}"))),
    }
}

/// Which cache backend to connect the store to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheBackendConfig {
    InMemory,
    /// Redis connection URL, e.g. `redis://127.0.0.1:6379`.
    #[cfg(feature = "redis")]
    RedisUrl(String),
}

/// Builds a cache client for the requested backend.
pub async fn create_cache_client(
    config: CacheBackendConfig,
) -> SessionResult<Arc<dyn CacheClient>> {
    match config {
        CacheBackendConfig::InMemory => Ok(Arc::new(InMemoryCacheClient::new())),
        #[cfg(feature = "redis")]
        CacheBackendConfig::RedisUrl(url) => {
            let client = crate::redis_client::RedisCacheClient::from_url(url)
                .await
                .map_err(crate::error::SessionError::Connect)?;
            Ok(Arc::new(client))
        }
    }
}
