#![allow(dead_code)]

use async_trait::async_trait;
use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderValue};
use kv_session::inmemory::InMemoryCacheClient;
use kv_session::{BackendError, BoxError, CacheClient, KeyGenerator, SessionKey};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Always hands out the same id.
pub struct FixedKeyGenerator(pub &'static str);

impl KeyGenerator for FixedKeyGenerator {
    fn generate_key(&self) -> Result<String, BoxError> {
        Ok(self.0.to_owned())
    }
}

/// Simulates an exhausted entropy source.
pub struct BrokenKeyGenerator;

impl KeyGenerator for BrokenKeyGenerator {
    fn generate_key(&self) -> Result<String, BoxError> {
        Err("entropy unavailable".into())
    }
}

/// In-memory client that counts calls and can delay or fail them.
#[derive(Default)]
pub struct InstrumentedClient {
    pub inner: InMemoryCacheClient,
    pub gets: AtomicUsize,
    pub sets: AtomicUsize,
    pub set_if_absents: AtomicUsize,
    pub deletes: AtomicUsize,
    pub delay: Duration,
    pub fail: bool,
}

impl InstrumentedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn delayed(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    async fn pause(&self) -> Result<(), BackendError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(BackendError::Other("connection refused".into()));
        }
        Ok(())
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheClient for InstrumentedClient {
    async fn get(&self, key: &SessionKey) -> Result<Option<Vec<u8>>, BackendError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.pause().await?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &SessionKey, data: &[u8], ttl: Duration) -> Result<(), BackendError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.pause().await?;
        self.inner.set(key, data, ttl).await
    }

    async fn set_if_absent(
        &self,
        key: &SessionKey,
        data: &[u8],
        ttl: Duration,
    ) -> Result<bool, BackendError> {
        self.set_if_absents.fetch_add(1, Ordering::SeqCst);
        self.pause().await?;
        self.inner.set_if_absent(key, data, ttl).await
    }

    async fn delete(&self, key: &SessionKey) -> Result<(), BackendError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.pause().await?;
        self.inner.delete(key).await
    }

    async fn close(&self) -> Result<(), BackendError> {
        self.inner.close().await
    }
}

/// Request headers carrying a single `name=value` cookie.
pub fn request_with_cookie(name: &str, value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        COOKIE,
        HeaderValue::from_str(&format!("{name}={value}")).expect("cookie header"),
    );
    headers
}

/// Turns the last `Set-Cookie` in a response into request headers for the next request.
pub fn follow_up_request(response: &HeaderMap) -> HeaderMap {
    let set_cookie = last_set_cookie(response);
    let pair = set_cookie.split(';').next().expect("cookie pair");
    let mut headers = HeaderMap::new();
    headers.insert(COOKIE, HeaderValue::from_str(pair).expect("cookie header"));
    headers
}

pub fn last_set_cookie(response: &HeaderMap) -> String {
    response
        .get_all(SET_COOKIE)
        .iter()
        .last()
        .expect("Set-Cookie emitted")
        .to_str()
        .expect("ascii cookie")
        .to_owned()
}

/// Value part of the last `Set-Cookie`.
pub fn cookie_value(response: &HeaderMap) -> String {
    let set_cookie = last_set_cookie(response);
    let pair = set_cookie.split(';').next().expect("cookie pair");
    pair.split_once('=').expect("name=value").1.to_owned()
}
