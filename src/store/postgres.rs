//! PostgreSQL Credential Store
//!
//! sqlx-backed [`CredentialStore`] with security-focused pool defaults:
//! conservative connection limits and aggressive timeouts so a sick
//! database degrades into lookup failures instead of piled-up requests.
//!
//! Database credentials resolve two ways:
//! - `DATABASE_URL`: a full connection URL, the common case.
//! - `DB_CREDENTIALS_JSON`: a vault-style secret payload
//!   (`{"username": "...", "password": "..."}`) combined with
//!   `DATABASE_HOST`/`DATABASE_PORT`/`DATABASE_NAME`, for deployments where
//!   a secret manager injects only the credential pair.

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

use super::{CredentialStore, StoreError, UserRecord};

// ============================================================================
// Configuration
// ============================================================================

/// Connection pool configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Connection URL
    pub database_url: String,
    /// Maximum pool size
    pub max_connections: u32,
    /// Minimum idle connections
    pub min_connections: u32,
    /// Maximum wait for a pooled connection
    pub acquire_timeout: Duration,
    /// Maximum connection lifetime before recycling
    pub max_lifetime: Duration,
    /// Maximum idle time before a connection is closed
    pub idle_timeout: Duration,
}

/// Database configuration failures. Fail fast at startup.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseConfigError {
    /// Neither `DATABASE_URL` nor `DB_CREDENTIALS_JSON` is set
    #[error("no database configured (set DATABASE_URL or DB_CREDENTIALS_JSON)")]
    Missing,
    /// The credential secret payload did not parse
    #[error("database credential secret is not valid JSON")]
    BadSecret(#[source] serde_json::Error),
    /// `DB_CREDENTIALS_JSON` requires `DATABASE_HOST`
    #[error("DATABASE_HOST is required when using DB_CREDENTIALS_JSON")]
    MissingHost,
}

impl DatabaseConfig {
    /// Load configuration from the environment.
    ///
    /// Pool knobs: `DB_MAX_CONNECTIONS` (10), `DB_MIN_CONNECTIONS` (1),
    /// `DB_ACQUIRE_TIMEOUT` (30s), `DB_MAX_LIFETIME` (30m),
    /// `DB_IDLE_TIMEOUT` (10m).
    pub fn from_env() -> Result<Self, DatabaseConfigError> {
        let database_url = match std::env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                let secret =
                    std::env::var("DB_CREDENTIALS_JSON").map_err(|_| DatabaseConfigError::Missing)?;
                let host =
                    std::env::var("DATABASE_HOST").map_err(|_| DatabaseConfigError::MissingHost)?;
                let port = std::env::var("DATABASE_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5432);
                let database =
                    std::env::var("DATABASE_NAME").unwrap_or_else(|_| "portaria".to_string());
                DatabaseCredentials::from_secret_json(&secret, host, port, database)?
                    .database_url()
            }
        };

        let env_u32 = |name: &str, default: u32| {
            std::env::var(name)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        };
        let env_secs = |name: &str, default: u64| {
            std::env::var(name)
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(default))
        };

        Ok(Self {
            database_url,
            max_connections: env_u32("DB_MAX_CONNECTIONS", 10),
            min_connections: env_u32("DB_MIN_CONNECTIONS", 1),
            acquire_timeout: env_secs("DB_ACQUIRE_TIMEOUT", 30),
            max_lifetime: env_secs("DB_MAX_LIFETIME", 30 * 60),
            idle_timeout: env_secs("DB_IDLE_TIMEOUT", 10 * 60),
        })
    }

    /// Open a connection pool with this configuration.
    pub async fn connect(&self) -> Result<PgPool, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(self.acquire_timeout)
            .max_lifetime(self.max_lifetime)
            .idle_timeout(self.idle_timeout)
            .connect(&self.database_url)
            .await
            .map_err(|e| StoreError::Unavailable(Box::new(e)))?;

        info!(
            max_connections = self.max_connections,
            "Credential store pool ready"
        );
        Ok(pool)
    }
}

/// Credential pair resolved from a vault-style secret, plus the connection
/// coordinates that arrive out-of-band.
#[derive(Debug, Clone)]
pub struct DatabaseCredentials {
    /// Database host
    pub host: String,
    /// Database port
    pub port: u16,
    /// Database name
    pub database: String,
    /// Username from the secret
    pub username: String,
    /// Password from the secret
    pub password: String,
}

#[derive(Deserialize)]
struct SecretPayload {
    username: String,
    password: String,
}

impl DatabaseCredentials {
    /// Parse the secret payload and combine it with connection coordinates.
    pub fn from_secret_json(
        secret: &str,
        host: String,
        port: u16,
        database: String,
    ) -> Result<Self, DatabaseConfigError> {
        let payload: SecretPayload =
            serde_json::from_str(secret).map_err(DatabaseConfigError::BadSecret)?;
        Ok(Self {
            host,
            port,
            database,
            username: payload.username,
            password: payload.password,
        })
    }

    /// Render a connection URL.
    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }
}

// ============================================================================
// Store
// ============================================================================

/// PostgreSQL-backed credential store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    cpf: String,
    name: Option<String>,
    email: Option<String>,
    user_type: i32,
    password_hash: Option<String>,
    deleted: bool,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            cpf: row.cpf,
            name: row.name,
            email: row.email,
            user_type: row.user_type,
            password_hash: row.password_hash,
            deleted: row.deleted,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_by_cpf(&self, cpf: &str) -> Result<Option<UserRecord>, StoreError> {
        // Stored CPFs may be punctuated; compare digits-only on both sides.
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id::text AS id, cpf, name, email, user_type,
                   password_hash, deleted, created_at
            FROM users
            WHERE deleted = false
              AND regexp_replace(cpf, '[^0-9]', '', 'g') = $1
            LIMIT 1
            "#,
        )
        .bind(cpf)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(Box::new(e)))?;

        Ok(row.map(UserRecord::from))
    }
}

// ============================================================================
// Tests
// ============================================================================
