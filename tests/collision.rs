mod common;

use common::{FixedKeyGenerator, InstrumentedClient};
use http::HeaderMap;
use kv_session::{Session, SessionStore, StoreConfig};
use std::sync::Arc;
use std::time::Duration;

fn colliding_store(client: Arc<InstrumentedClient>) -> SessionStore {
    let config = StoreConfig {
        key_prefix: "sess:".into(),
        ..StoreConfig::default()
    };
    SessionStore::with_config(client, config).with_key_generator(FixedKeyGenerator("same-id"))
}

async fn save_user(
    store: Arc<SessionStore>,
    user: &'static str,
) -> (Session, kv_session::SessionResult<()>) {
    let mut session = store.new_session(&HeaderMap::new(), "hello").await.unwrap();
    session.insert("user", user).unwrap();
    let mut response = HeaderMap::new();
    let result = store.save(&mut response, &mut session).await;
    (session, result)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_saves_with_the_same_id_admit_exactly_one() {
    let client = InstrumentedClient::delayed(Duration::from_millis(20));
    let store = Arc::new(colliding_store(client.clone()));

    let a = tokio::spawn(save_user(Arc::clone(&store), "alice"));
    let b = tokio::spawn(save_user(Arc::clone(&store), "bob"));
    let (a, b) = (a.await.unwrap(), b.await.unwrap());

    let outcomes = [&a, &b];
    let winners: Vec<_> = outcomes.iter().filter(|(_, r)| r.is_ok()).collect();
    let losers: Vec<_> = outcomes.iter().filter(|(_, r)| r.is_err()).collect();
    assert_eq!(winners.len(), 1);
    assert_eq!(losers.len(), 1);

    let (loser_session, loser_result) = losers[0];
    let err = loser_result.as_ref().unwrap_err();
    assert!(err.is_duplicate_id());
    assert!(err.to_string().contains("same-id"));
    assert!(loser_session.id().is_none(), "loser must not adopt the taken id");

    let (winner_session, _) = winners[0];
    let winner_user: String = winner_session.get("user").unwrap();
    let blob = client.inner.raw_get("sess:same-id").unwrap();
    let stored: serde_json::Value = serde_json::from_slice(&blob).unwrap();
    assert_eq!(stored["user"], winner_user.as_str());
}

#[tokio::test]
async fn collision_is_not_retried_with_a_new_id() {
    let client = InstrumentedClient::new();
    let store = Arc::new(colliding_store(client.clone()));

    let (_, first) = save_user(Arc::clone(&store), "alice").await;
    first.unwrap();
    let (_, second) = save_user(Arc::clone(&store), "mallory").await;
    assert!(second.unwrap_err().is_duplicate_id());

    assert_eq!(InstrumentedClient::count(&client.set_if_absents), 2);
    assert_eq!(InstrumentedClient::count(&client.sets), 0);
    assert_eq!(client.inner.keys(), vec!["sess:same-id".to_owned()]);
    let stored: serde_json::Value =
        serde_json::from_slice(&client.inner.raw_get("sess:same-id").unwrap()).unwrap();
    assert_eq!(stored["user"], "alice");
}
