//! Credential Store Adapter
//!
//! The seam between the gateway and whatever holds user records. The
//! gateway only ever reads: records are created and mutated by external
//! systems. One trait, alternative implementations selected at process
//! configuration time: an in-memory map for embedding and tests, and a
//! PostgreSQL adapter behind the `postgres` feature.
//!
//! Lookup is by CPF, the natural login key. Stored and supplied CPFs may
//! carry different punctuation (`123.456.789-00` vs `12345678900`), so both
//! sides are normalized to bare digits before comparison. A store must never
//! return a record whose tombstone is set.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

#[cfg(feature = "postgres")]
pub mod postgres;

/// Strip everything but ASCII digits from a CPF.
pub fn normalize_cpf(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

// ============================================================================
// User Record
// ============================================================================

/// A user identity as known to the credential store.
#[derive(Debug, Clone)]
pub struct UserRecord {
    /// Opaque unique identifier
    pub id: String,
    /// CPF as stored (possibly punctuated); unique among non-deleted records
    pub cpf: String,
    /// Display name
    pub name: Option<String>,
    /// Email
    pub email: Option<String>,
    /// Integer role code; mapped to a role at issuance time
    pub user_type: i32,
    /// Password digest; present only in stores that require password auth
    pub password_hash: Option<String>,
    /// Tombstone; a deleted record must never be returned by lookup
    pub deleted: bool,
    /// Record creation time
    pub created_at: DateTime<Utc>,
}

/// Store access failures. Infrastructure trouble only; "no such user" is a
/// `None`, not an error.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Connection, query, or transport failure
    #[error("credential store unavailable: {0}")]
    Unavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Read-only lookup into the user store.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Find the non-deleted record whose CPF matches `cpf` (digits-only
    /// form). Returns `Ok(None)` when no such record exists.
    async fn find_by_cpf(&self, cpf: &str) -> Result<Option<UserRecord>, StoreError>;
}

// ============================================================================
// In-Memory Store
// ============================================================================

/// In-memory credential store for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record, keyed by its normalized CPF.
    pub fn insert(&self, record: UserRecord) {
        let key = normalize_cpf(&record.cpf);
        self.users
            .write()
            .expect("user map lock poisoned")
            .insert(key, record);
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_by_cpf(&self, cpf: &str) -> Result<Option<UserRecord>, StoreError> {
        let users = self.users.read().expect("user map lock poisoned");
        Ok(users
            .get(&normalize_cpf(cpf))
            .filter(|record| !record.deleted)
            .cloned())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn record(cpf: &str) -> UserRecord {
        UserRecord {
            id: "user-1".to_string(),
            cpf: cpf.to_string(),
            name: Some("Maria".to_string()),
            email: None,
            user_type: 1,
            password_hash: None,
            deleted: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn normalize_strips_punctuation() {
        assert_eq!(normalize_cpf("123.456.789-00"), "12345678900");
        assert_eq!(normalize_cpf("12345678900"), "12345678900");
        assert_eq!(normalize_cpf(" 123 456 "), "123456");
        assert_eq!(normalize_cpf(""), "");
    }

    #[tokio::test]
    async fn lookup_matches_across_formatting() {
        let store = MemoryStore::new();
        store.insert(record("123.456.789-00"));

        let found = store.find_by_cpf("12345678900").await.unwrap();
        assert!(found.is_some());

        let found = store.find_by_cpf("123.456.789-00").await.unwrap();
        assert_eq!(found.unwrap().id, "user-1");
    }

    #[tokio::test]
    async fn missing_cpf_is_none() {
        let store = MemoryStore::new();
        assert!(store.find_by_cpf("99999999999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleted_records_are_never_returned() {
        let store = MemoryStore::new();
        let mut tombstoned = record("12345678900");
        tombstoned.deleted = true;
        store.insert(tombstoned);

        assert!(store.find_by_cpf("12345678900").await.unwrap().is_none());
    }
}
