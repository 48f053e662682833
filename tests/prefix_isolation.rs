mod common;

use common::{follow_up_request, FixedKeyGenerator};
use http::HeaderMap;
use kv_session::inmemory::InMemoryCacheClient;
use kv_session::{SessionStore, StoreConfig};
use std::sync::Arc;

fn tenant_store(client: Arc<InMemoryCacheClient>, prefix: &str) -> SessionStore {
    let config = StoreConfig {
        key_prefix: prefix.to_owned(),
        ..StoreConfig::default()
    };
    SessionStore::with_config(client, config).with_key_generator(FixedKeyGenerator("shared"))
}

#[tokio::test]
async fn different_prefixes_never_share_cache_keys() {
    let client = Arc::new(InMemoryCacheClient::new());
    let tenant_a = tenant_store(client.clone(), "tenant-a:");
    let tenant_b = tenant_store(client.clone(), "tenant-b:");

    let mut a = tenant_a.new_session(&HeaderMap::new(), "hello").await.unwrap();
    a.insert("owner", "a").unwrap();
    let mut response_a = HeaderMap::new();
    tenant_a.save(&mut response_a, &mut a).await.unwrap();

    let mut b = tenant_b.new_session(&HeaderMap::new(), "hello").await.unwrap();
    b.insert("owner", "b").unwrap();
    let mut response_b = HeaderMap::new();
    tenant_b.save(&mut response_b, &mut b).await.unwrap();

    assert_eq!(
        client.keys(),
        vec!["tenant-a:shared".to_owned(), "tenant-b:shared".to_owned()]
    );

    let loaded_a = tenant_a
        .new_session(&follow_up_request(&response_a), "hello")
        .await
        .unwrap();
    let loaded_b = tenant_b
        .new_session(&follow_up_request(&response_b), "hello")
        .await
        .unwrap();
    assert_eq!(loaded_a.get::<String>("owner").as_deref(), Some("a"));
    assert_eq!(loaded_b.get::<String>("owner").as_deref(), Some("b"));
}
