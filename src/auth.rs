//! Authentication Use Case
//!
//! The CPF (plus optional password) to signed-token flow: validate input,
//! look the user up, verify the password when the deployment requires one,
//! derive the role, issue the token.
//!
//! Two deployment modes share one contract. [`AuthMode::CpfOnly`] issues a
//! token to any known CPF (the kiosk flow, where possession of the CPF is
//! the credential). [`AuthMode::CpfPassword`] additionally verifies a
//! password digest against the store.
//!
//! "Not found", "deleted", and "wrong password" all surface as the same
//! `Ok(None)`: the caller maps it to 401 and the response discloses nothing
//! about which check failed. Store trouble is different: a timeout or
//! transport error is an infrastructure failure (503), never an
//! authentication outcome.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::error::AppError;
use crate::observability::SecurityEvent;
use crate::role::Role;
use crate::store::{normalize_cpf, CredentialStore, UserRecord};
use crate::token::{Identity, TokenIssuer};

/// Default credential-store lookup timeout.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Request / Response Types
// ============================================================================

/// Deployment mode: whether a password is verified at login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// CPF lookup only; any known CPF gets a token
    CpfOnly,
    /// CPF lookup plus password digest verification
    #[default]
    CpfPassword,
}

impl AuthMode {
    /// Parse the configuration value ("cpf" or "cpf-password").
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "cpf" | "cpf-only" => Some(Self::CpfOnly),
            "cpf-password" | "password" => Some(Self::CpfPassword),
            _ => None,
        }
    }
}

/// Login request body.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthRequest {
    /// CPF in any punctuation
    #[serde(default)]
    pub cpf: String,
    /// Password; required only in [`AuthMode::CpfPassword`]
    #[serde(default)]
    pub password: Option<String>,
}

/// Public view of the authenticated user. Never carries the password digest.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    /// Store record id
    pub id: String,
    /// Display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Email
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Integer role code
    pub user_type: i32,
}

impl From<&UserRecord> for UserSummary {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            email: record.email.clone(),
            user_type: record.user_type,
        }
    }
}

/// Successful authentication: the token, its lifetime, and the user summary.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSuccess {
    /// Compact signed token
    pub token: String,
    /// Seconds until the token expires
    pub expires_in: u64,
    /// Public user summary
    pub user: UserSummary,
}

// ============================================================================
// Authenticator
// ============================================================================

/// Composes the store adapter, password hasher, role mapper, and token
/// issuer into the login use case.
pub struct Authenticator {
    store: Arc<dyn CredentialStore>,
    issuer: TokenIssuer,
    mode: AuthMode,
    lookup_timeout: Duration,
}

impl Authenticator {
    /// Wire up the use case. Dependencies are injected at startup; the only
    /// shared mutable state in the gateway lives in the rate limiter.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        issuer: TokenIssuer,
        mode: AuthMode,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            store,
            issuer,
            mode,
            lookup_timeout,
        }
    }

    /// Authenticate a CPF (and password, when the mode requires one).
    ///
    /// Returns `Ok(None)` when the credentials do not verify, a business
    /// outcome, not an error. Input validation happens before any store
    /// access; a blank CPF never touches the store.
    pub async fn authenticate(
        &self,
        request: &AuthRequest,
    ) -> Result<Option<AuthSuccess>, AppError> {
        if request.cpf.trim().is_empty() {
            return Err(AppError::bad_request("cpf_required"));
        }
        let password = match self.mode {
            AuthMode::CpfOnly => None,
            AuthMode::CpfPassword => {
                match request.password.as_deref().map(str::trim) {
                    Some(p) if !p.is_empty() => Some(p),
                    _ => return Err(AppError::bad_request("password_required")),
                }
            }
        };

        let cpf = normalize_cpf(&request.cpf);

        let lookup = tokio::time::timeout(self.lookup_timeout, self.store.find_by_cpf(&cpf));
        let record = match lookup.await {
            Err(_) => {
                crate::security_event!(
                    SecurityEvent::StoreUnavailable,
                    timeout_ms = self.lookup_timeout.as_millis() as u64,
                    "Credential store lookup timed out"
                );
                return Err(AppError::unavailable_msg("credential store timed out"));
            }
            Ok(Err(e)) => return Err(e.into()),
            Ok(Ok(None)) => return Ok(self.reject(&cpf, "unknown_cpf")),
            Ok(Ok(Some(record))) => record,
        };

        if record.deleted {
            return Ok(self.reject(&cpf, "deleted"));
        }

        if let Some(password) = password {
            let verified = record
                .password_hash
                .as_deref()
                .is_some_and(|stored| crate::password::verify_password(password, stored));
            if !verified {
                return Ok(self.reject(&cpf, "bad_password"));
            }
        }

        let role = Role::from_user_type(record.user_type);
        let identity = Identity {
            id: record.id.clone(),
            name: record.name.clone(),
            email: record.email.clone(),
            cpf,
        };
        let issued = self
            .issuer
            .issue(&identity, role)
            .map_err(|e| AppError::configuration("token could not be issued", e))?;

        metrics::counter!("portaria_logins_issued_total").increment(1);
        crate::security_event!(
            SecurityEvent::AuthenticationSuccess,
            user_id = %record.id,
            role = %role,
            "Token issued"
        );

        Ok(Some(AuthSuccess {
            token: issued.token,
            expires_in: issued.expires_in,
            user: UserSummary::from(&record),
        }))
    }

    fn reject(&self, cpf: &str, reason: &'static str) -> Option<AuthSuccess> {
        metrics::counter!("portaria_auth_failures_total").increment(1);
        // The reason stays in the log; the caller sees an undifferentiated
        // authentication failure.
        crate::security_event!(
            SecurityEvent::AuthenticationFailure,
            cpf_digits = cpf.len(),
            reason = reason,
            "Authentication failed"
        );
        None
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::keys::SigningKey;
    use crate::password::hash_password;
    use crate::store::{MemoryStore, StoreError};
    use crate::token::{TokenVerifier, DEFAULT_TTL};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn user(cpf: &str, user_type: i32, password: Option<&str>) -> UserRecord {
        UserRecord {
            id: "user-123".to_string(),
            cpf: cpf.to_string(),
            name: Some("João Silva".to_string()),
            email: Some("joao@example.com".to_string()),
            user_type,
            password_hash: password.map(hash_password),
            deleted: false,
            created_at: Utc::now(),
        }
    }

    fn authenticator(store: Arc<dyn CredentialStore>, mode: AuthMode) -> (Authenticator, TokenVerifier) {
        let key = SigningKey::generate(32);
        let issuer = TokenIssuer::new(&key, "portaria", "portaria-api", DEFAULT_TTL);
        let verifier = TokenVerifier::new(&key, "portaria", "portaria-api");
        (
            Authenticator::new(store, issuer, mode, DEFAULT_LOOKUP_TIMEOUT),
            verifier,
        )
    }

    /// Store wrapper that counts lookups, to pin "validation happens before
    /// any store access".
    struct CountingStore {
        inner: MemoryStore,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CredentialStore for CountingStore {
        async fn find_by_cpf(&self, cpf: &str) -> Result<Option<UserRecord>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.find_by_cpf(cpf).await
        }
    }

    struct FailingStore;

    #[async_trait]
    impl CredentialStore for FailingStore {
        async fn find_by_cpf(&self, _cpf: &str) -> Result<Option<UserRecord>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    struct SlowStore;

    #[async_trait]
    impl CredentialStore for SlowStore {
        async fn find_by_cpf(&self, _cpf: &str) -> Result<Option<UserRecord>, StoreError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(None)
        }
    }

    #[tokio::test]
    async fn blank_cpf_fails_before_any_lookup() {
        let store = Arc::new(CountingStore {
            inner: MemoryStore::new(),
            calls: AtomicUsize::new(0),
        });
        let (auth, _) = authenticator(store.clone(), AuthMode::CpfPassword);

        for cpf in ["", "   ", "\t"] {
            let err = auth
                .authenticate(&AuthRequest {
                    cpf: cpf.to_string(),
                    password: Some("senha123".to_string()),
                })
                .await
                .unwrap_err();
            assert_eq!(err.code, Some("cpf_required"));
        }
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn blank_password_fails_before_any_lookup() {
        let store = Arc::new(CountingStore {
            inner: MemoryStore::new(),
            calls: AtomicUsize::new(0),
        });
        let (auth, _) = authenticator(store.clone(), AuthMode::CpfPassword);

        for password in [None, Some("".to_string()), Some("  ".to_string())] {
            let err = auth
                .authenticate(&AuthRequest {
                    cpf: "12345678900".to_string(),
                    password,
                })
                .await
                .unwrap_err();
            assert_eq!(err.code, Some("password_required"));
        }
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_cpf_is_a_none_not_an_error() {
        let store = Arc::new(MemoryStore::new());
        let (auth, _) = authenticator(store, AuthMode::CpfPassword);

        let outcome = auth
            .authenticate(&AuthRequest {
                cpf: "99999999999".to_string(),
                password: Some("senha123".to_string()),
            })
            .await
            .unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn wrong_password_looks_like_not_found() {
        let store = Arc::new(MemoryStore::new());
        store.insert(user("12345678900", 1, Some("senha123")));
        let (auth, _) = authenticator(store, AuthMode::CpfPassword);

        let outcome = auth
            .authenticate(&AuthRequest {
                cpf: "12345678900".to_string(),
                password: Some("wrong".to_string()),
            })
            .await
            .unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn record_without_digest_cannot_pass_password_mode() {
        let store = Arc::new(MemoryStore::new());
        store.insert(user("12345678900", 1, None));
        let (auth, _) = authenticator(store, AuthMode::CpfPassword);

        let outcome = auth
            .authenticate(&AuthRequest {
                cpf: "12345678900".to_string(),
                password: Some("anything".to_string()),
            })
            .await
            .unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn success_issues_a_token_with_the_mapped_role() {
        let store = Arc::new(MemoryStore::new());
        store.insert(user("123.456.789-00", 1, Some("senha123")));
        let (auth, verifier) = authenticator(store, AuthMode::CpfPassword);

        let success = auth
            .authenticate(&AuthRequest {
                cpf: "12345678900".to_string(),
                password: Some("senha123".to_string()),
            })
            .await
            .unwrap()
            .expect("credentials should verify");

        assert_eq!(success.expires_in, 1800);
        assert_eq!(success.user.id, "user-123");
        assert_eq!(success.user.user_type, 1);

        let claims = verifier.verify(&success.token).unwrap();
        assert_eq!(claims.role, Role::Customer);
        assert_eq!(claims.cpf, "12345678900");
        assert_eq!(claims.sub, "user-123");
    }

    #[tokio::test]
    async fn cpf_only_mode_ignores_the_password() {
        let store = Arc::new(MemoryStore::new());
        store.insert(user("12345678900", 0, None));
        let (auth, verifier) = authenticator(store, AuthMode::CpfOnly);

        let success = auth
            .authenticate(&AuthRequest {
                cpf: "123.456.789-00".to_string(),
                password: None,
            })
            .await
            .unwrap()
            .expect("known CPF should get a token");

        let claims = verifier.verify(&success.token).unwrap();
        assert_eq!(claims.role, Role::Admin);
    }

    #[tokio::test]
    async fn store_failure_is_unavailable_not_unauthorized() {
        let (auth, _) = authenticator(Arc::new(FailingStore), AuthMode::CpfOnly);

        let err = auth
            .authenticate(&AuthRequest {
                cpf: "12345678900".to_string(),
                password: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_store_times_out_as_unavailable() {
        let key = SigningKey::generate(32);
        let issuer = TokenIssuer::new(&key, "portaria", "portaria-api", DEFAULT_TTL);
        let auth = Authenticator::new(
            Arc::new(SlowStore),
            issuer,
            AuthMode::CpfOnly,
            Duration::from_millis(50),
        );

        let err = auth
            .authenticate(&AuthRequest {
                cpf: "12345678900".to_string(),
                password: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unavailable);
    }
}
