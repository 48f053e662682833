use http::HeaderMap;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::error::SessionResult;
use crate::model::Session;
use crate::store::SessionStore;

/// Sessions opened during one request, keyed by name.
///
/// Create one per request; the first lookup of a name loads it from the store
/// and later lookups return the same instance.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<String, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(
        &mut self,
        store: &SessionStore,
        headers: &HeaderMap,
        name: &str,
    ) -> SessionResult<&mut Session> {
        match self.sessions.entry(name.to_owned()) {
            Entry::Occupied(occ) => Ok(occ.into_mut()),
            Entry::Vacant(vac) => {
                let session = store.new_session(headers, name).await?;
                Ok(vac.insert(session))
            }
        }
    }

    /// Saves every registered session, stopping at the first failure.
    pub async fn save_all(
        &mut self,
        store: &SessionStore,
        response: &mut HeaderMap,
    ) -> SessionResult<()> {
        for session in self.sessions.values_mut() {
            store.save(response, session).await?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inmemory::InMemoryCacheClient;
    use http::header::SET_COOKIE;
    use std::sync::Arc;

    #[tokio::test]
    async fn same_name_returns_same_instance() {
        let store = SessionStore::new(Arc::new(InMemoryCacheClient::new()));
        let headers = HeaderMap::new();
        let mut registry = SessionRegistry::new();

        registry
            .get(&store, &headers, "hello")
            .await
            .unwrap()
            .insert("user", "alice")
            .unwrap();
        let again = store.get(&mut registry, &headers, "hello").await.unwrap();
        assert_eq!(again.get::<String>("user").as_deref(), Some("alice"));

        registry.get(&store, &headers, "other").await.unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn save_all_emits_one_cookie_per_session() {
        let store = SessionStore::new(Arc::new(InMemoryCacheClient::new()));
        let headers = HeaderMap::new();
        let mut registry = SessionRegistry::new();
        registry.get(&store, &headers, "a").await.unwrap();
        registry.get(&store, &headers, "b").await.unwrap();

        let mut response = HeaderMap::new();
        registry.save_all(&store, &mut response).await.unwrap();
        assert_eq!(response.get_all(SET_COOKIE).iter().count(), 2);
    }
}
