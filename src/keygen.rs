use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::BoxError;

/// Source of identifiers for brand-new sessions.
pub trait KeyGenerator: Send + Sync + 'static {
    /// Returns a fresh identifier that is safe inside a cookie value and a cache key.
    fn generate_key(&self) -> Result<String, BoxError>;
}

/// Number of random bytes behind a default session id (256 bits).
pub const DEFAULT_KEY_BYTES: usize = 32;

/// Draws bytes from the operating system CSPRNG and encodes them as unpadded
/// URL-safe base64. A failing OS source is reported, never papered over.
#[derive(Clone, Debug)]
pub struct RandomKeyGenerator {
    len: usize,
}

impl Default for RandomKeyGenerator {
    fn default() -> Self {
        Self {
            len: DEFAULT_KEY_BYTES,
        }
    }
}

impl RandomKeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generator producing ids from `len` random bytes. Lengths under 16 bytes are raised to 16.
    pub fn with_len(len: usize) -> Self {
        Self { len: len.max(16) }
    }
}

impl KeyGenerator for RandomKeyGenerator {
    fn generate_key(&self) -> Result<String, BoxError> {
        let mut bytes = vec![0u8; self.len];
        OsRng.try_fill_bytes(&mut bytes)?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_url_safe_and_sized() {
        let key = RandomKeyGenerator::new().generate_key().expect("entropy");
        assert_eq!(key.len(), 43);
        assert!(key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_'));
    }

    #[test]
    fn ids_do_not_repeat() {
        let generator = RandomKeyGenerator::new();
        let ids: HashSet<_> = (0..256)
            .map(|_| generator.generate_key().expect("entropy"))
            .collect();
        assert_eq!(ids.len(), 256);
    }

    #[test]
    fn short_lengths_are_clamped() {
        let key = RandomKeyGenerator::with_len(4).generate_key().expect("entropy");
        assert_eq!(key.len(), 22);
    }
}
