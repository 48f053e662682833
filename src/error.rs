use std::fmt;
use std::time::Duration;

use thiserror::Error;

pub type SessionResult<T> = Result<T, SessionError>;

/// Error type for pluggable collaborators such as a
/// [`KeyGenerator`](crate::keygen::KeyGenerator).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Stage of the session lifecycle an error originated from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Generate,
    Get,
    Set,
    SetIfAbsent,
    Delete,
    Serialize,
    Deserialize,
    Close,
    Connect,
    Dispatch,
    Cookie,
    Config,
}

impl Phase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Phase::Generate => "generate",
            Phase::Get => "get",
            Phase::Set => "set",
            Phase::SetIfAbsent => "set_if_absent",
            Phase::Delete => "delete",
            Phase::Serialize => "serialize",
            Phase::Deserialize => "deserialize",
            Phase::Close => "close",
            Phase::Connect => "connect",
            Phase::Dispatch => "dispatch",
            Phase::Cookie => "cookie",
            Phase::Config => "config",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a [`CacheClient`](crate::client::CacheClient) implementation.
#[derive(Debug, Error)]
pub enum BackendError {
    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("cache client is closed")]
    Closed,
    #[error("{0}")]
    Other(String),
}

/// Failure reported by a [`Serializer`](crate::serializer::Serializer) implementation.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("json codec error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("serialized session is not a JSON object")]
    NotAnObject,
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to generate a session id")]
    Generate(#[source] BoxError),

    #[error("failed to get a session value from the cache; key = {key}")]
    Get {
        key: String,
        #[source]
        source: BackendError,
    },

    #[error("failed to set the session to the cache; key = {key}")]
    Set {
        key: String,
        #[source]
        source: BackendError,
    },

    #[error("failed to set-if-absent the session to the cache; key = {key}")]
    SetIfAbsent {
        key: String,
        #[source]
        source: BackendError,
    },

    #[error("failed to set-if-absent the session because of the duplicated id: {id}")]
    DuplicateId { id: String },

    #[error("failed to delete a session from the cache; key = {key}")]
    Delete {
        key: String,
        #[source]
        source: BackendError,
    },

    #[error("failed to serialize session `{name}`")]
    Serialize {
        name: String,
        #[source]
        source: CodecError,
    },

    #[error("failed to deserialize the fetched session `{name}`")]
    Deserialize {
        name: String,
        #[source]
        source: CodecError,
    },

    #[error("failed to close the cache client")]
    Close(#[source] BackendError),

    #[error("failed to connect to the cache backend")]
    Connect(#[source] BackendError),

    #[error("cache {phase} timed out after {after:?}")]
    Timeout { phase: Phase, after: Duration },

    #[error("no async runtime available to dispatch a background {phase}")]
    Dispatch { phase: Phase },

    #[error("invalid session cookie: {0}")]
    Cookie(#[from] http::header::InvalidHeaderValue),

    #[error("session `{name}` cookie value contains characters not allowed in a cookie")]
    CookieValue { name: String },

    #[error("invalid session store configuration: {0}")]
    Config(String),
}

impl SessionError {
    /// Lifecycle stage the error came from.
    pub fn phase(&self) -> Phase {
        match self {
            SessionError::Generate(_) => Phase::Generate,
            SessionError::Get { .. } => Phase::Get,
            SessionError::Set { .. } => Phase::Set,
            SessionError::SetIfAbsent { .. } | SessionError::DuplicateId { .. } => {
                Phase::SetIfAbsent
            }
            SessionError::Delete { .. } => Phase::Delete,
            SessionError::Serialize { .. } => Phase::Serialize,
            SessionError::Deserialize { .. } => Phase::Deserialize,
            SessionError::Close(_) => Phase::Close,
            SessionError::Connect(_) => Phase::Connect,
            SessionError::Timeout { phase, .. } => *phase,
            SessionError::Dispatch { .. } => Phase::Dispatch,
            SessionError::Cookie(_) | SessionError::CookieValue { .. } => Phase::Cookie,
            SessionError::Config(_) => Phase::Config,
        }
    }

    /// True when a freshly generated id was already occupied in the cache.
    pub fn is_duplicate_id(&self) -> bool {
        matches!(self, SessionError::DuplicateId { .. })
    }
}

pub(crate) fn serde_error(err: serde_json::Error) -> CodecError {
    CodecError::Json(err)
}

#[cfg(feature = "redis")]
pub(crate) fn redis_error(err: redis::RedisError) -> BackendError {
    BackendError::Redis(err)
}

pub(crate) fn config_error(msg: impl Into<String>) -> SessionError {
    SessionError::Config(msg.into())
}
