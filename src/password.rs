//! Password Hashing
//!
//! Deterministic one-way digest of a plaintext password, comparable
//! byte-for-byte against the digest held by the credential store.
//!
//! The digest is the SHA-256 of the UTF-8 plaintext, base64-encoded with the
//! standard alphabet. There is no per-call salt: the same plaintext always
//! yields the same digest, which is what allows direct comparison at
//! verification time against a store the gateway does not write to.
//!
//! Verification compares digests in constant time via the `subtle` crate.
//! Standard `==` on strings exits early at the first mismatching byte,
//! creating a timing side-channel that lets an attacker discover a secret
//! one byte at a time.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Hash a plaintext password to its comparable digest.
///
/// Total over any input string, including the empty string.
pub fn hash_password(plaintext: &str) -> String {
    let digest = Sha256::digest(plaintext.as_bytes());
    BASE64.encode(digest)
}

/// Verify a plaintext password against a stored digest.
///
/// Hashes the plaintext and compares the two digests in constant time.
pub fn verify_password(plaintext: &str, stored_digest: &str) -> bool {
    constant_time_str_eq(&hash_password(plaintext), stored_digest)
}

/// Constant-time comparison of two byte slices.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Constant-time comparison of two strings.
pub fn constant_time_str_eq(a: &str, b: &str) -> bool {
    constant_time_eq(a.as_bytes(), b.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashing_is_deterministic() {
        assert_eq!(hash_password("hunter2"), hash_password("hunter2"));
        assert_eq!(hash_password(""), hash_password(""));
    }

    // Known digest pinned so a hash-scheme change cannot slip in silently:
    // every stored credential would stop verifying.
    #[test]
    fn golden_digest() {
        assert_eq!(
            hash_password("senha123"),
            "VaXp54IHtN+GmdYIhvoHAHlGNUewldGgW8cZu05s0lE="
        );
    }

    #[test]
    fn verify_accepts_matching_password() {
        let stored = hash_password("senha123");
        assert!(verify_password("senha123", &stored));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let stored = hash_password("senha123");
        assert!(!verify_password("senha124", &stored));
        assert!(!verify_password("", &stored));
    }

    #[test]
    fn constant_time_eq_handles_lengths() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"short", b"longer"));
        assert!(constant_time_str_eq("", ""));
    }
}
