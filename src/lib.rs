//! # Portaria
//!
//! CPF authentication and gateway admission infrastructure for Axum
//! applications.
//!
//! Portaria authenticates users by CPF (optionally with a password), issues
//! signed tokens asserting identity and role, and guards a front-door
//! gateway with an ordered admission pipeline: rate limiting, CORS, token
//! verification, and route role policies, before anything reaches the
//! upstream.
//!
//! ## Components
//!
//! - **[`password`]**: deterministic password digests, constant-time compare
//! - **[`role`]**: integer user-type code → role mapping
//! - **[`keys`] / [`token`]**: signing-key hygiene, token issuance and
//!   verification with a fixed claim set
//! - **[`store`]**: the credential store seam (in-memory, PostgreSQL)
//! - **[`auth`]**: the CPF(+password) → token use case
//! - **[`rate_limit`] / [`policy`] / [`admission`]**: the gateway-side
//!   admission pipeline
//! - **[`proxy`]**: the routing boundary to the upstream
//! - **[`login`]**: the gateway's own HTTP surface
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use portaria::prelude::*;
//!
//! let config = GatewayConfig::from_env()?;
//! let key = SigningKey::from_env()?;
//!
//! let issuer = TokenIssuer::new(&key, &config.issuer, &config.audience, config.token_ttl);
//! let verifier = Arc::new(TokenVerifier::new(&key, &config.issuer, &config.audience));
//!
//! let store = Arc::new(MemoryStore::new());
//! let authenticator = Arc::new(Authenticator::new(
//!     store, issuer, config.auth_mode, config.lookup_timeout,
//! ));
//!
//! let state = GatewayState { authenticator, upstream: None };
//! let admission = AdmissionState::new(
//!     verifier,
//!     config.route_policies.clone(),
//!     config.public_paths.clone(),
//! );
//! let app = gateway_router(&config, state, admission);
//! // axum::serve(listener, app).await?;
//! ```

pub mod admission;
pub mod audit;
pub mod auth;
pub mod config;
pub mod error;
pub mod keys;
pub mod login;
pub mod observability;
pub mod password;
pub mod policy;
pub mod proxy;
pub mod rate_limit;
pub mod role;
pub mod store;
pub mod token;

/// Convenience re-exports for wiring up a gateway.
pub mod prelude {
    pub use crate::admission::{AdmissionRouter, AdmissionState};
    pub use crate::auth::{AuthMode, AuthRequest, Authenticator};
    pub use crate::config::GatewayConfig;
    pub use crate::error::{AppError, ErrorKind};
    pub use crate::keys::SigningKey;
    pub use crate::login::{gateway_router, GatewayState};
    pub use crate::policy::{RolePolicy, RoutePolicies};
    pub use crate::proxy::UpstreamClient;
    pub use crate::rate_limit::{FixedWindowLimiter, RateLimitConfig};
    pub use crate::role::Role;
    pub use crate::store::{CredentialStore, MemoryStore, UserRecord};
    pub use crate::token::{TokenIssuer, TokenVerifier};
}
