use crate::error::{serde_error, CodecError};
use crate::model::{Session, SessionValues};

/// Codec between a session's values and the blob kept in the cache.
pub trait Serializer: Send + Sync + 'static {
    fn serialize(&self, session: &Session) -> Result<Vec<u8>, CodecError>;

    /// Merges decoded entries into `session`: decoded keys overwrite, others are left alone.
    fn deserialize(&self, bytes: &[u8], session: &mut Session) -> Result<(), CodecError>;
}

/// Stores values as a single JSON object.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize(&self, session: &Session) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(session.values()).map_err(serde_error)
    }

    fn deserialize(&self, bytes: &[u8], session: &mut Session) -> Result<(), CodecError> {
        let decoded: serde_json::Value = serde_json::from_slice(bytes).map_err(serde_error)?;
        let serde_json::Value::Object(decoded) = decoded else {
            return Err(CodecError::NotAnObject);
        };
        merge(session.values_mut(), decoded);
        Ok(())
    }
}

fn merge(target: &mut SessionValues, decoded: SessionValues) {
    for (key, value) in decoded {
        target.insert(key, value);
    }
}
