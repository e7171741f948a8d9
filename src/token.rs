//! Token Issuance and Verification
//!
//! Builds and verifies the signed identity tokens the gateway trades in:
//! compact HS256 JWTs carrying a fixed claim set.
//!
//! # Claim set
//!
//! | Claim | Content |
//! |-------|---------|
//! | `sub` | store record id |
//! | `name` | display name (omitted when the store has none) |
//! | `email` | email (omitted when the store has none) |
//! | `cpf` | digits-normalized CPF |
//! | `role` | wire role name, recomputed at issuance |
//! | `jti` | fresh UUID per issuance; two tokens for the same user are always distinguishable |
//! | `iss` / `aud` | configured issuer and audience, matched exactly at verification |
//! | `iat` / `nbf` / `exp` | issuance window; `exp = iat + ttl` |
//!
//! Verification accepts zero clock skew: `exp`/`nbf` are checked with no
//! leeway, and issuer/audience must match the configuration exactly.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::keys::SigningKey;
use crate::role::Role;

/// Default token time-to-live.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

// ============================================================================
// Claims
// ============================================================================

/// The claim set carried by every issued token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the store record id
    pub sub: String,
    /// Display name, when the store has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Email, when the store has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Digits-normalized CPF
    pub cpf: String,
    /// Role derived from the record's user type at issuance
    pub role: Role,
    /// Unique token id, fresh per issuance
    pub jti: String,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
    /// Issued-at (Unix seconds)
    pub iat: i64,
    /// Not-before (Unix seconds)
    pub nbf: i64,
    /// Expiry (Unix seconds); always `iat + ttl`
    pub exp: i64,
}

/// The identity a token asserts, as read from the credential store.
#[derive(Debug, Clone)]
pub struct Identity {
    /// Store record id
    pub id: String,
    /// Display name
    pub name: Option<String>,
    /// Email
    pub email: Option<String>,
    /// Digits-normalized CPF
    pub cpf: String,
}

/// A freshly signed token with its lifetime, so callers never re-decode the
/// token to learn when it expires.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Compact serialized JWT
    pub token: String,
    /// Whole seconds between issuance and expiry (`exp - iat`)
    pub expires_in: u64,
}

/// Token codec failures.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Claim values could not be serialized or signed
    #[error("token claims could not be encoded")]
    Encoding(#[source] jsonwebtoken::errors::Error),
    /// Signature, issuer, audience, or validity window rejected
    #[error("token rejected")]
    Rejected(#[source] jsonwebtoken::errors::Error),
}

// ============================================================================
// Issuer
// ============================================================================

/// Signs tokens under a process-scoped key, issuer/audience pair, and TTL.
///
/// Construction takes an already-validated [`SigningKey`], so a missing or
/// malformed key fails at startup, not per call. Issuance itself is pure
/// CPU-bound signing.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    header: Header,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl TokenIssuer {
    /// Create an issuer for the given key and claim configuration.
    pub fn new(
        key: &SigningKey,
        issuer: impl Into<String>,
        audience: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(key.as_bytes()),
            header: Header::new(Algorithm::HS256),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl,
        }
    }

    /// Issue a token for `identity` with `role`, valid from now for the
    /// configured TTL.
    pub fn issue(&self, identity: &Identity, role: Role) -> Result<IssuedToken, TokenError> {
        self.issue_at(identity, role, Utc::now().timestamp())
    }

    fn issue_at(
        &self,
        identity: &Identity,
        role: Role,
        now: i64,
    ) -> Result<IssuedToken, TokenError> {
        let ttl_secs = self.ttl.as_secs() as i64;
        let claims = Claims {
            sub: identity.id.clone(),
            name: identity.name.clone(),
            email: identity.email.clone(),
            cpf: identity.cpf.clone(),
            role,
            jti: Uuid::new_v4().to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now,
            nbf: now,
            exp: now + ttl_secs,
        };

        let token = encode(&self.header, &claims, &self.encoding_key)
            .map_err(TokenError::Encoding)?;

        Ok(IssuedToken {
            token,
            expires_in: (claims.exp - claims.iat) as u64,
        })
    }
}

// ============================================================================
// Verifier
// ============================================================================

/// Verifies tokens against the configured key, issuer, and audience.
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    /// Create a verifier matching the issuer's configuration.
    pub fn new(key: &SigningKey, issuer: &str, audience: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        validation.validate_nbf = true;
        // Zero clock-skew tolerance: an expired token is expired.
        validation.leeway = 0;

        Self {
            decoding_key: DecodingKey::from_secret(key.as_bytes()),
            validation,
        }
    }

    /// Verify a compact token and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(TokenError::Rejected)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            id: "user-123".to_string(),
            name: Some("João Silva".to_string()),
            email: Some("joao@example.com".to_string()),
            cpf: "12345678900".to_string(),
        }
    }

    fn issuer_and_verifier(ttl: Duration) -> (TokenIssuer, TokenVerifier) {
        let key = SigningKey::generate(32);
        let issuer = TokenIssuer::new(&key, "portaria", "portaria-api", ttl);
        let verifier = TokenVerifier::new(&key, "portaria", "portaria-api");
        (issuer, verifier)
    }

    #[test]
    fn round_trip_preserves_identity_claims() {
        let (issuer, verifier) = issuer_and_verifier(DEFAULT_TTL);
        let issued = issuer.issue(&identity(), Role::Customer).unwrap();

        let claims = verifier.verify(&issued.token).unwrap();
        assert_eq!(claims.sub, "user-123");
        assert_eq!(claims.cpf, "12345678900");
        assert_eq!(claims.role, Role::Customer);
        assert_eq!(claims.name.as_deref(), Some("João Silva"));
        assert_eq!(issued.expires_in, (claims.exp - claims.iat) as u64);
        assert_eq!(issued.expires_in, 1800);
        assert_eq!(claims.nbf, claims.iat);
    }

    #[test]
    fn each_issuance_gets_a_fresh_jti() {
        let (issuer, verifier) = issuer_and_verifier(DEFAULT_TTL);
        let a = issuer.issue(&identity(), Role::Admin).unwrap();
        let b = issuer.issue(&identity(), Role::Admin).unwrap();
        let jti_a = verifier.verify(&a.token).unwrap().jti;
        let jti_b = verifier.verify(&b.token).unwrap().jti;
        assert_ne!(jti_a, jti_b);
    }

    #[test]
    fn expired_token_is_rejected() {
        let (issuer, verifier) = issuer_and_verifier(Duration::from_secs(1800));
        let now = Utc::now().timestamp();
        let stale = issuer
            .issue_at(&identity(), Role::Customer, now - 3600)
            .unwrap();
        assert!(verifier.verify(&stale.token).is_err());
    }

    #[test]
    fn token_expiring_one_second_from_now_passes() {
        let (issuer, verifier) = issuer_and_verifier(Duration::from_secs(1));
        let issued = issuer.issue(&identity(), Role::Customer).unwrap();
        assert!(verifier.verify(&issued.token).is_ok());
    }

    #[test]
    fn issuer_and_audience_must_match_exactly() {
        let key = SigningKey::generate(32);
        let issuer = TokenIssuer::new(&key, "portaria", "portaria-api", DEFAULT_TTL);
        let issued = issuer.issue(&identity(), Role::Customer).unwrap();

        let wrong_iss = TokenVerifier::new(&key, "someone-else", "portaria-api");
        assert!(wrong_iss.verify(&issued.token).is_err());

        let wrong_aud = TokenVerifier::new(&key, "portaria", "other-api");
        assert!(wrong_aud.verify(&issued.token).is_err());
    }

    #[test]
    fn foreign_key_is_rejected() {
        let (issuer, _) = issuer_and_verifier(DEFAULT_TTL);
        let issued = issuer.issue(&identity(), Role::Customer).unwrap();

        let other_key = SigningKey::generate(32);
        let verifier = TokenVerifier::new(&other_key, "portaria", "portaria-api");
        assert!(verifier.verify(&issued.token).is_err());
    }

    #[test]
    fn optional_claims_are_omitted_when_absent() {
        let (issuer, verifier) = issuer_and_verifier(DEFAULT_TTL);
        let bare = Identity {
            id: "user-9".to_string(),
            name: None,
            email: None,
            cpf: "98765432100".to_string(),
        };
        let issued = issuer.issue(&bare, Role::Kitchen).unwrap();
        let claims = verifier.verify(&issued.token).unwrap();
        assert_eq!(claims.name, None);
        assert_eq!(claims.email, None);
    }
}
