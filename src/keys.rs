//! Signing Key Material
//!
//! Loading and validation of the symmetric key used to sign and verify
//! tokens. Validation happens once, when the key is constructed: a gateway
//! with a missing or undersized key must refuse to start rather than issue
//! weak tokens per-request.
//!
//! # Example
//!
//! ```ignore
//! use portaria::keys::SigningKey;
//!
//! // From the environment (JWT_SIGNING_KEY_B64 preferred, JWT_SECRET raw)
//! let key = SigningKey::from_env()?;
//!
//! // Or explicitly
//! let key = SigningKey::from_base64("c2VjcmV0...")?;
//! ```

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// Minimum key length in bytes. HS256 keys below the hash output size
/// weaken the MAC.
pub const MIN_KEY_BYTES: usize = 32;

/// Validated symmetric signing key material.
#[derive(Clone)]
pub struct SigningKey {
    bytes: Vec<u8>,
}

// Key bytes stay out of Debug output.
impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Signing key construction failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SigningKeyError {
    /// Neither `JWT_SIGNING_KEY_B64` nor `JWT_SECRET` is set
    #[error("no signing key configured (set JWT_SIGNING_KEY_B64 or JWT_SECRET)")]
    Missing,
    /// The base64 form did not decode
    #[error("signing key is not valid base64")]
    NotBase64,
    /// Decoded key material is below [`MIN_KEY_BYTES`]
    #[error("signing key is {actual} bytes, minimum is {minimum}")]
    TooShort { actual: usize, minimum: usize },
}

impl SigningKey {
    /// Load the key from the environment.
    ///
    /// `JWT_SIGNING_KEY_B64` (base64-encoded bytes) takes precedence;
    /// `JWT_SECRET` is accepted as a raw UTF-8 secret.
    pub fn from_env() -> Result<Self, SigningKeyError> {
        if let Ok(b64) = std::env::var("JWT_SIGNING_KEY_B64") {
            return Self::from_base64(&b64);
        }
        if let Ok(raw) = std::env::var("JWT_SECRET") {
            return Self::from_raw(raw.as_bytes());
        }
        Err(SigningKeyError::Missing)
    }

    /// Construct from base64-encoded key bytes.
    pub fn from_base64(encoded: &str) -> Result<Self, SigningKeyError> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|_| SigningKeyError::NotBase64)?;
        Self::from_raw(&bytes)
    }

    /// Construct from raw key bytes.
    pub fn from_raw(bytes: &[u8]) -> Result<Self, SigningKeyError> {
        if bytes.len() < MIN_KEY_BYTES {
            return Err(SigningKeyError::TooShort {
                actual: bytes.len(),
                minimum: MIN_KEY_BYTES,
            });
        }
        Ok(Self {
            bytes: bytes.to_vec(),
        })
    }

    /// Generate a random key of `len` bytes (tests and local development).
    ///
    /// # Panics
    ///
    /// Panics if `len` is below [`MIN_KEY_BYTES`]; the generator exists to
    /// make valid keys.
    pub fn generate(len: usize) -> Self {
        use rand::RngCore;

        assert!(len >= MIN_KEY_BYTES, "generated keys must be at least {MIN_KEY_BYTES} bytes");
        let mut bytes = vec![0u8; len];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Raw key bytes, for handing to the token codec.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_key_requires_minimum_length() {
        let err = SigningKey::from_raw(&[0u8; 16]).unwrap_err();
        assert_eq!(
            err,
            SigningKeyError::TooShort {
                actual: 16,
                minimum: MIN_KEY_BYTES
            }
        );
    }

    #[test]
    fn base64_key_round_trips() {
        let encoded = BASE64.encode([7u8; 48]);
        let key = SigningKey::from_base64(&encoded).unwrap();
        assert_eq!(key.as_bytes(), &[7u8; 48]);
    }

    #[test]
    fn invalid_base64_is_rejected() {
        assert_eq!(
            SigningKey::from_base64("not base64!!").unwrap_err(),
            SigningKeyError::NotBase64
        );
    }

    #[test]
    fn generated_keys_validate() {
        let key = SigningKey::generate(64);
        assert_eq!(key.as_bytes().len(), 64);
        assert!(SigningKey::from_raw(key.as_bytes()).is_ok());
    }

    #[test]
    fn debug_hides_key_bytes() {
        let key = SigningKey::generate(32);
        let printed = format!("{:?}", key);
        assert!(printed.contains("len"));
        assert!(!printed.contains("bytes:"));
    }
}
