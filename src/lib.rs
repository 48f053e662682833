#![forbid(unsafe_code)]

pub mod client;
pub mod config;
pub mod cookie;
pub mod error;
pub mod inmemory;
pub mod keygen;
pub mod model;
#[cfg(feature = "redis")]
pub mod redis_client;
pub mod registry;
pub mod serializer;
pub mod store;

pub use client::CacheClient;
pub use config::{create_cache_client, CacheBackendConfig, StoreConfig};
pub use error::{BackendError, BoxError, CodecError, Phase, SessionError, SessionResult};
pub use keygen::{KeyGenerator, RandomKeyGenerator};
pub use model::{SameSite, Session, SessionKey, SessionOptions, SessionValues};
pub use registry::SessionRegistry;
pub use serializer::{JsonSerializer, Serializer};
pub use store::SessionStore;
