use http::HeaderMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::client::CacheClient;
use crate::config::StoreConfig;
use crate::cookie;
use crate::error::{Phase, SessionError, SessionResult};
use crate::keygen::{KeyGenerator, RandomKeyGenerator};
use crate::model::{fingerprint, Session, SessionKey};
use crate::registry::SessionRegistry;
use crate::serializer::{JsonSerializer, Serializer};

/// Persists cookie-identified sessions in a TTL key-value cache.
///
/// One store is shared by every request a server handles. Its configuration and
/// collaborators are fixed at construction, so `&SessionStore` is all a request
/// flow needs; per-request state lives in the [`Session`] it is handed.
pub struct SessionStore {
    client: Arc<dyn CacheClient>,
    key_generator: Arc<dyn KeyGenerator>,
    serializer: Arc<dyn Serializer>,
    config: StoreConfig,
}

impl SessionStore {
    /// Store with default configuration, random ids and JSON values.
    pub fn new(client: Arc<dyn CacheClient>) -> Self {
        Self::with_config(client, StoreConfig::default())
    }

    pub fn with_config(client: Arc<dyn CacheClient>, config: StoreConfig) -> Self {
        Self {
            client,
            key_generator: Arc::new(RandomKeyGenerator::new()),
            serializer: Arc::new(JsonSerializer),
            config,
        }
    }

    pub fn with_key_generator(mut self, key_generator: impl KeyGenerator) -> Self {
        self.key_generator = Arc::new(key_generator);
        self
    }

    pub fn with_serializer(mut self, serializer: impl Serializer) -> Self {
        self.serializer = Arc::new(serializer);
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Cache key for a session id under this store's prefix.
    pub fn session_key(&self, id: &str) -> SessionKey {
        SessionKey::new(self.config.key_prefix.clone(), id)
    }

    /// Returns the request's session named `name` through `registry`,
    /// loading it on first access.
    pub async fn get<'r>(
        &self,
        registry: &'r mut SessionRegistry,
        headers: &HeaderMap,
        name: &str,
    ) -> SessionResult<&'r mut Session> {
        registry.get(self, headers, name).await
    }

    /// Creates a session for `name`, loading its values when the request
    /// carries a cookie whose id is present in the cache.
    ///
    /// Without a cookie no cache round-trip happens. A cookie whose id is not
    /// in the cache yields an empty new session that keeps the id.
    ///
    /// Dropping the returned future abandons the cache read.
    pub async fn new_session(&self, headers: &HeaderMap, name: &str) -> SessionResult<Session> {
        self.load(headers, name, None).await
    }

    /// Like [`new_session`](Self::new_session), failing with
    /// [`SessionError::Timeout`] once `deadline` passes. The configured
    /// operation timeout still applies when it is earlier.
    pub async fn new_session_with_deadline(
        &self,
        headers: &HeaderMap,
        name: &str,
        deadline: Instant,
    ) -> SessionResult<Session> {
        self.load(headers, name, Some(deadline)).await
    }

    async fn load(
        &self,
        headers: &HeaderMap,
        name: &str,
        deadline: Option<Instant>,
    ) -> SessionResult<Session> {
        let mut session = Session::new(name, self.config.options.clone());

        let Some(id) = cookie::find_cookie(headers, name).filter(|id| !id.is_empty()) else {
            debug!(session = name, "no session cookie; starting a new session");
            return Ok(session);
        };
        let key = self.session_key(&id);
        session.set_id(id);
        let id = key.id();

        let fetched = self
            .bounded(Phase::Get, deadline, async {
                self.client
                    .get(&key)
                    .await
                    .map_err(|source| SessionError::Get {
                        key: key.to_string(),
                        source,
                    })
            })
            .await?;

        let Some(bytes) = fetched else {
            debug!(session = name, id = %fingerprint(id), "session id not found in cache");
            return Ok(session);
        };

        self.serializer
            .deserialize(&bytes, &mut session)
            .map_err(|source| SessionError::Deserialize {
                name: name.to_owned(),
                source,
            })?;
        session.set_new(false);
        debug!(session = name, id = %fingerprint(id), "session loaded");
        Ok(session)
    }

    /// Persists `session` and appends its `Set-Cookie` header to `response`.
    ///
    /// A non-positive max-age deletes the stored value and clears the cookie.
    /// Otherwise a session without an id gets a fresh one and is written only
    /// if that id is unoccupied; a session with an id is overwritten.
    ///
    /// Dropping the returned future before it resolves abandons the write; the
    /// cache may or may not hold the value and no cookie is emitted.
    pub async fn save(&self, response: &mut HeaderMap, session: &mut Session) -> SessionResult<()> {
        self.persist(response, session, None).await
    }

    /// Like [`save`](Self::save), failing with [`SessionError::Timeout`] once
    /// `deadline` passes. Detached writes in no-wait mode are not bound by it.
    pub async fn save_with_deadline(
        &self,
        response: &mut HeaderMap,
        session: &mut Session,
        deadline: Instant,
    ) -> SessionResult<()> {
        self.persist(response, session, Some(deadline)).await
    }

    async fn persist(
        &self,
        response: &mut HeaderMap,
        session: &mut Session,
        deadline: Option<Instant>,
    ) -> SessionResult<()> {
        if session.options().is_deletion() {
            if let Some(id) = session.id() {
                let key = self.session_key(id);
                self.apply(Mutation::Delete { key }, deadline).await?;
                debug!(session = session.name(), id = %fingerprint(id), "session deleted");
            }
            return cookie::set_cookie(response, session.name(), "", session.options());
        }

        let (id, overwrite) = match session.id() {
            Some(id) => (id.to_owned(), true),
            None => {
                let id = self
                    .key_generator
                    .generate_key()
                    .map_err(SessionError::Generate)?;
                (id, false)
            }
        };

        let bytes = self
            .serializer
            .serialize(session)
            .map_err(|source| SessionError::Serialize {
                name: session.name().to_owned(),
                source,
            })?;
        let ttl = Duration::from_secs(session.options().max_age.unsigned_abs());
        let key = self.session_key(&id);
        let mutation = if overwrite {
            Mutation::Set { key, bytes, ttl }
        } else {
            Mutation::SetIfAbsent {
                id: id.clone(),
                key,
                bytes,
                ttl,
            }
        };
        self.apply(mutation, deadline).await?;

        debug!(
            session = session.name(),
            id = %fingerprint(&id),
            overwrite,
            "session stored"
        );
        cookie::set_cookie(response, session.name(), &id, session.options())?;
        session.set_id(id);
        Ok(())
    }

    /// Closes the underlying cache client.
    ///
    /// Detached writes still in flight are not awaited.
    pub async fn close(&self) -> SessionResult<()> {
        self.client.close().await.map_err(SessionError::Close)
    }

    async fn apply(&self, mutation: Mutation, deadline: Option<Instant>) -> SessionResult<()> {
        if self.config.no_wait_writing_mode {
            return self.dispatch(mutation);
        }
        let phase = mutation.phase();
        self.bounded(phase, deadline, mutation.run(self.client.as_ref()))
            .await
    }

    // Fire-and-forget: the task owns its key, bytes and TTL and reports only to the log.
    fn dispatch(&self, mutation: Mutation) -> SessionResult<()> {
        let phase = mutation.phase();
        let handle = Handle::try_current().map_err(|_| SessionError::Dispatch { phase })?;
        let client = Arc::clone(&self.client);
        let limit = self.config.background_timeout();
        let id = fingerprint(mutation.key().id());
        handle.spawn(async move {
            match tokio::time::timeout(limit, mutation.run(client.as_ref())).await {
                Ok(Ok(())) => debug!(%phase, %id, "background session write completed"),
                Ok(Err(err)) => warn!(
                    %phase,
                    %id,
                    cause = %redacted_cause(&err),
                    "background session write failed"
                ),
                Err(_) => warn!(%phase, %id, after = ?limit, "background session write timed out"),
            }
        });
        Ok(())
    }

    /// Runs `fut` under the earlier of `deadline` and the configured operation timeout.
    async fn bounded<T, F>(
        &self,
        phase: Phase,
        deadline: Option<Instant>,
        fut: F,
    ) -> SessionResult<T>
    where
        F: Future<Output = SessionResult<T>>,
    {
        let started = Instant::now();
        let configured = self.config.operation_timeout().map(|limit| started + limit);
        let effective = match (deadline, configured) {
            (Some(caller), Some(configured)) => Some(caller.min(configured)),
            (caller, configured) => caller.or(configured),
        };
        match effective {
            Some(at) => tokio::time::timeout_at(at, fut)
                .await
                .map_err(|_| SessionError::Timeout {
                    phase,
                    after: at.saturating_duration_since(started),
                })?,
            None => fut.await,
        }
    }
}

// SessionError's own message names the cache key or id; logs carry only the
// fingerprint, so report the underlying cause instead.
fn redacted_cause(err: &SessionError) -> String {
    match std::error::Error::source(err) {
        Some(source) => source.to_string(),
        None if err.is_duplicate_id() => "id already taken".to_owned(),
        None => err.phase().to_string(),
    }
}

/// A cache write or delete with everything it needs captured by value.
enum Mutation {
    Set {
        key: SessionKey,
        bytes: Vec<u8>,
        ttl: Duration,
    },
    SetIfAbsent {
        id: String,
        key: SessionKey,
        bytes: Vec<u8>,
        ttl: Duration,
    },
    Delete {
        key: SessionKey,
    },
}

impl Mutation {
    fn phase(&self) -> Phase {
        match self {
            Mutation::Set { .. } => Phase::Set,
            Mutation::SetIfAbsent { .. } => Phase::SetIfAbsent,
            Mutation::Delete { .. } => Phase::Delete,
        }
    }

    fn key(&self) -> &SessionKey {
        match self {
            Mutation::Set { key, .. }
            | Mutation::SetIfAbsent { key, .. }
            | Mutation::Delete { key } => key,
        }
    }

    async fn run(self, client: &dyn CacheClient) -> SessionResult<()> {
        match self {
            Mutation::Set { key, bytes, ttl } => {
                client
                    .set(&key, &bytes, ttl)
                    .await
                    .map_err(|source| SessionError::Set {
                        key: key.to_string(),
                        source,
                    })
            }
            Mutation::SetIfAbsent { id, key, bytes, ttl } => {
                let written = client
                    .set_if_absent(&key, &bytes, ttl)
                    .await
                    .map_err(|source| SessionError::SetIfAbsent {
                        key: key.to_string(),
                        source,
                    })?;
                if !written {
                    return Err(SessionError::DuplicateId { id });
                }
                Ok(())
            }
            Mutation::Delete { key } => {
                client
                    .delete(&key)
                    .await
                    .map_err(|source| SessionError::Delete {
                        key: key.to_string(),
                        source,
                    })
            }
        }
    }
}
