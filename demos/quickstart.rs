use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderValue};
use kv_session::{
    create_cache_client, CacheBackendConfig, SessionRegistry, SessionStore, StoreConfig,
};
use tracing_subscriber::EnvFilter;

fn follow_up(response: &HeaderMap) -> HeaderMap {
    let mut request = HeaderMap::new();
    if let Some(pair) = response
        .get(SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
    {
        if let Ok(value) = HeaderValue::from_str(pair) {
            request.insert(COOKIE, value);
        }
    }
    request
}

fn backend() -> CacheBackendConfig {
    match std::env::var("REDIS_URL") {
        Ok(url) => CacheBackendConfig::RedisUrl(url),
        Err(_) => CacheBackendConfig::InMemory,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("kv_session=debug")),
        )
        .init();

    let mut config = StoreConfig::from_env()?;
    if config.key_prefix.is_empty() {
        config.key_prefix = "demo:".into();
    }
    let client = create_cache_client(backend()).await?;
    let store = SessionStore::with_config(client, config);

    println!("== request 1: no cookie ==");
    let mut registry = SessionRegistry::new();
    let request = HeaderMap::new();
    let session = store.get(&mut registry, &request, "demo").await?;
    println!("new session? {}", session.is_new());
    session.insert("visits", 1)?;
    let mut response = HeaderMap::new();
    registry.save_all(&store, &mut response).await?;
    println!("Set-Cookie: {:?}", response.get(SET_COOKIE));

    println!("== request 2: cookie from request 1 ==");
    let request = follow_up(&response);
    let mut registry = SessionRegistry::new();
    let session = store.get(&mut registry, &request, "demo").await?;
    let visits: u32 = session.get("visits").unwrap_or_default();
    println!("loaded session (new? {}), visits = {visits}", session.is_new());
    session.invalidate();
    let mut response = HeaderMap::new();
    registry.save_all(&store, &mut response).await?;
    println!("Set-Cookie: {:?}", response.get(SET_COOKIE));

    store.close().await?;
    Ok(())
}
