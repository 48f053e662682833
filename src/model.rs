use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{serde_error, CodecError};

/// Thirty days, in seconds.
pub const DEFAULT_MAX_AGE: i64 = 86_400 * 30;

/// String-keyed bag of session values.
pub type SessionValues = serde_json::Map<String, serde_json::Value>;

pub use cookie::SameSite;

/// Cookie attributes and storage TTL for a session.
///
/// `max_age <= 0` marks the session for deletion on the next save. A positive
/// value is used both as the cookie `Max-Age` and as the cache TTL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(default)]
pub struct SessionOptions {
    pub path: String,
    pub domain: Option<String>,
    pub max_age: i64,
    pub secure: bool,
    pub http_only: bool,
    #[serde(with = "same_site_serde")]
    #[cfg_attr(feature = "schema", schemars(with = "Option<String>"))]
    pub same_site: Option<SameSite>,
}

mod same_site_serde {
    use super::SameSite;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<SameSite>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(same_site) => s.serialize_some(&same_site.to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<SameSite>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|raw| match raw.to_ascii_lowercase().as_str() {
                "strict" => Ok(SameSite::Strict),
                "lax" => Ok(SameSite::Lax),
                "none" => Ok(SameSite::None),
                _ => Err(D::Error::custom(format!("unknown SameSite value {raw:?}"))),
            })
            .transpose()
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            path: "/".to_owned(),
            domain: None,
            max_age: DEFAULT_MAX_AGE,
            secure: false,
            http_only: false,
            same_site: None,
        }
    }
}

impl SessionOptions {
    /// Whether saving a session with these options deletes it.
    pub fn is_deletion(&self) -> bool {
        self.max_age <= 0
    }
}

/// Storage-layer lookup key: the store prefix immediately followed by the id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionKey {
    prefix: String,
    id: String,
}

impl SessionKey {
    pub fn new(prefix: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            id: id.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix)?;
        f.write_str(&self.id)
    }
}

/// Per-request session state.
///
/// Created by [`SessionStore::new_session`](crate::store::SessionStore::new_session)
/// with its own copy of the store's default options; later changes to the store
/// configuration never reach an existing session.
#[derive(Clone, Debug)]
pub struct Session {
    name: String,
    id: Option<String>,
    values: SessionValues,
    options: SessionOptions,
    is_new: bool,
}

impl Session {
    /// Creates an empty, new session with no identifier.
    pub fn new(name: impl Into<String>, options: SessionOptions) -> Self {
        Self {
            name: name.into(),
            id: None,
            values: SessionValues::new(),
            options,
            is_new: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifier, or `None` until the first save allocates one.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub(crate) fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// True unless the session was loaded from the cache.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub(crate) fn set_new(&mut self, is_new: bool) {
        self.is_new = is_new;
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut SessionOptions {
        &mut self.options
    }

    /// Marks the session for deletion on the next save.
    pub fn invalidate(&mut self) {
        self.options.max_age = -1;
    }

    pub fn values(&self) -> &SessionValues {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut SessionValues {
        &mut self.values
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn insert<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: T,
    ) -> Result<(), CodecError> {
        let value = serde_json::to_value(value).map_err(serde_error)?;
        self.values.insert(key.into(), value);
        Ok(())
    }

    /// Returns the value under `key` decoded as `T`, or `None` if absent or of another shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|value| T::deserialize(value).ok())
    }

    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.values.remove(key)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Short digest of a session id, safe to put in logs.
pub fn fingerprint(id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(id.as_bytes());
    hex::encode(&hasher.finalize()[..6])
}
