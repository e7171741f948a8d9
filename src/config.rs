//! Gateway Configuration
//!
//! One configuration surface for the whole gateway: token claim
//! configuration, rate-limit budget, CORS policy, public routes, route role
//! policies, upstream address, and the ambient limits (body size, timeouts).
//!
//! # Example
//!
//! ```ignore
//! use portaria::config::GatewayConfig;
//!
//! // From environment variables
//! let config = GatewayConfig::from_env()?;
//!
//! // Or programmatically
//! let config = GatewayConfig::builder()
//!     .issuer("portaria")
//!     .audience("portaria-api")
//!     .rate_limit(100, std::time::Duration::from_secs(60))
//!     .build();
//! ```

use std::time::Duration;

use crate::auth::{AuthMode, DEFAULT_LOOKUP_TIMEOUT};
use crate::policy::RoutePolicies;
use crate::role::UnknownRole;
use crate::token::DEFAULT_TTL;

/// Gateway configuration.
///
/// # Environment Variables
///
/// - `LISTEN_ADDR`: bind address (default: "0.0.0.0:8080")
/// - `JWT_ISSUER` / `JWT_AUDIENCE`: claim configuration (defaults:
///   "portaria" / "portaria-api")
/// - `TOKEN_TTL`: e.g. "30m", "1h" (default: "30m")
/// - `AUTH_MODE`: "cpf" or "cpf-password" (default: "cpf-password")
/// - `RATE_LIMIT_PERMITS`: permits per window (default: 100)
/// - `RATE_LIMIT_WINDOW`: e.g. "60s" (default: "60s")
/// - `RATE_LIMIT_SKIP_PATHS`: comma-separated path prefixes (default: none)
/// - `CORS_ALLOWED_ORIGINS`: comma-separated, or "*" (default: "*")
/// - `PUBLIC_PATHS`: comma-separated (default: "/,/auth/login")
/// - `ROUTE_POLICIES`: `prefix=ROLE,ROLE;prefix=ROLE` rules (default: none)
/// - `UPSTREAM_URL`: base URL admitted requests forward to (default: unset)
/// - `STORE_LOOKUP_TIMEOUT`: e.g. "5s" (default: "5s")
/// - `REQUEST_TIMEOUT`: e.g. "30s" (default: "30s")
/// - `MAX_REQUEST_SIZE`: e.g. "1MB" (default: "1MB")
/// - `SECURITY_HEADERS_ENABLED`: "true"/"false" (default: "true")
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Bind address for the server binary
    pub listen_addr: String,
    /// Token `iss` claim, matched exactly at verification
    pub issuer: String,
    /// Token `aud` claim, matched exactly at verification
    pub audience: String,
    /// Token time-to-live
    pub token_ttl: Duration,
    /// Whether login verifies a password
    pub auth_mode: AuthMode,
    /// Rate-limit permits per window per client
    pub rate_limit_permits: u32,
    /// Rate-limit window length
    pub rate_limit_window: Duration,
    /// Path prefixes exempt from rate limiting
    pub rate_limit_skip_paths: Vec<String>,
    /// CORS origins: empty = same-origin, `["*"]` = any, else allowlist
    pub cors_origins: Vec<String>,
    /// Routes that bypass token verification
    pub public_paths: Vec<String>,
    /// Route role policies
    pub route_policies: RoutePolicies,
    /// Upstream base URL for admitted requests
    pub upstream_url: Option<String>,
    /// Credential-store lookup timeout
    pub lookup_timeout: Duration,
    /// Whole-request timeout
    pub request_timeout: Duration,
    /// Maximum request body size in bytes
    pub max_request_size: usize,
    /// Whether to attach security headers to responses
    pub security_headers_enabled: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            issuer: "portaria".to_string(),
            audience: "portaria-api".to_string(),
            token_ttl: DEFAULT_TTL,
            auth_mode: AuthMode::default(),
            rate_limit_permits: 100,
            rate_limit_window: Duration::from_secs(60),
            rate_limit_skip_paths: Vec::new(),
            // Fully permissive, as the original deployment shipped. A known
            // policy gap until a production origin list exists.
            cors_origins: vec!["*".to_string()],
            public_paths: vec!["/".to_string(), "/auth/login".to_string()],
            route_policies: RoutePolicies::new(),
            upstream_url: None,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            request_timeout: Duration::from_secs(30),
            max_request_size: 1024 * 1024,
            security_headers_enabled: true,
        }
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// The only hard failure is an unparseable `ROUTE_POLICIES` rule;
    /// silently dropping an authorization rule would widen access.
    pub fn from_env() -> Result<Self, UnknownRole> {
        let defaults = Self::default();

        let env_string = |name: &str, default: &str| {
            std::env::var(name).unwrap_or_else(|_| default.to_string())
        };
        let env_list = |name: &str, default: &[String]| {
            std::env::var(name)
                .map(|s| {
                    s.split(',')
                        .map(str::trim)
                        .filter(|v| !v.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_else(|_| default.to_vec())
        };
        let env_duration = |name: &str, default: Duration| {
            std::env::var(name)
                .map(|s| parse_duration(&s))
                .unwrap_or(default)
        };

        let route_policies = match std::env::var("ROUTE_POLICIES") {
            Ok(s) => RoutePolicies::parse(&s)?,
            Err(_) => RoutePolicies::new(),
        };

        Ok(Self {
            listen_addr: env_string("LISTEN_ADDR", &defaults.listen_addr),
            issuer: env_string("JWT_ISSUER", &defaults.issuer),
            audience: env_string("JWT_AUDIENCE", &defaults.audience),
            token_ttl: env_duration("TOKEN_TTL", defaults.token_ttl),
            auth_mode: std::env::var("AUTH_MODE")
                .ok()
                .and_then(|s| AuthMode::from_str_loose(&s))
                .unwrap_or(defaults.auth_mode),
            rate_limit_permits: std::env::var("RATE_LIMIT_PERMITS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.rate_limit_permits),
            rate_limit_window: env_duration("RATE_LIMIT_WINDOW", defaults.rate_limit_window),
            rate_limit_skip_paths: env_list("RATE_LIMIT_SKIP_PATHS", &[]),
            cors_origins: env_list("CORS_ALLOWED_ORIGINS", &defaults.cors_origins),
            public_paths: env_list("PUBLIC_PATHS", &defaults.public_paths),
            route_policies,
            upstream_url: std::env::var("UPSTREAM_URL").ok().filter(|s| !s.is_empty()),
            lookup_timeout: env_duration("STORE_LOOKUP_TIMEOUT", defaults.lookup_timeout),
            request_timeout: env_duration("REQUEST_TIMEOUT", defaults.request_timeout),
            max_request_size: std::env::var("MAX_REQUEST_SIZE")
                .map(|s| parse_size(&s))
                .unwrap_or(defaults.max_request_size),
            security_headers_enabled: std::env::var("SECURITY_HEADERS_ENABLED")
                .map(|s| s.to_lowercase() != "false")
                .unwrap_or(true),
        })
    }

    /// Create a new builder.
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder::default()
    }

    /// CORS allows any origin.
    pub fn cors_is_permissive(&self) -> bool {
        self.cors_origins.len() == 1 && self.cors_origins[0] == "*"
    }

    /// CORS is same-origin only.
    pub fn cors_is_restrictive(&self) -> bool {
        self.cors_origins.is_empty()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`GatewayConfig`].
#[derive(Debug, Clone, Default)]
pub struct GatewayConfigBuilder {
    config: GatewayConfig,
}

impl GatewayConfigBuilder {
    /// Set the token issuer.
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.config.issuer = issuer.into();
        self
    }

    /// Set the token audience.
    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.config.audience = audience.into();
        self
    }

    /// Set the token time-to-live.
    pub fn token_ttl(mut self, ttl: Duration) -> Self {
        self.config.token_ttl = ttl;
        self
    }

    /// Set the authentication mode.
    pub fn auth_mode(mut self, mode: AuthMode) -> Self {
        self.config.auth_mode = mode;
        self
    }

    /// Set the rate-limit budget.
    pub fn rate_limit(mut self, permits: u32, window: Duration) -> Self {
        self.config.rate_limit_permits = permits;
        self.config.rate_limit_window = window;
        self
    }

    /// Set the CORS origin allowlist.
    pub fn cors_origins(mut self, origins: Vec<&str>) -> Self {
        self.config.cors_origins = origins.into_iter().map(String::from).collect();
        self
    }

    /// Set the public (verification-exempt) routes.
    pub fn public_paths(mut self, paths: Vec<&str>) -> Self {
        self.config.public_paths = paths.into_iter().map(String::from).collect();
        self
    }

    /// Set the route role policies.
    pub fn route_policies(mut self, policies: RoutePolicies) -> Self {
        self.config.route_policies = policies;
        self
    }

    /// Set the upstream base URL.
    pub fn upstream_url(mut self, url: impl Into<String>) -> Self {
        self.config.upstream_url = Some(url.into());
        self
    }

    /// Set the credential-store lookup timeout.
    pub fn lookup_timeout(mut self, timeout: Duration) -> Self {
        self.config.lookup_timeout = timeout;
        self
    }

    /// Disable security headers.
    pub fn disable_security_headers(mut self) -> Self {
        self.config.security_headers_enabled = false;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> GatewayConfig {
        self.config
    }
}

// ============================================================================
// Value Parsing
// ============================================================================

/// Parse a duration string ("100ms", "30s", "5m", "1h"; bare numbers are
/// seconds). Falls back to 30 seconds when unparseable.
fn parse_duration(s: &str) -> Duration {
    let s = s.trim().to_lowercase();
    let (number, unit_ms) = if let Some(n) = s.strip_suffix("ms") {
        (n, 1)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1000)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60 * 1000)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 60 * 60 * 1000)
    } else {
        (s.as_str(), 1000)
    };

    number
        .trim()
        .parse::<u64>()
        .map(|n| Duration::from_millis(n * unit_ms))
        .unwrap_or(Duration::from_secs(30))
}

/// Parse a size string ("512KB", "10MB", "1GB"; bare numbers are bytes).
/// Falls back to 1MB when unparseable.
fn parse_size(s: &str) -> usize {
    let s = s.trim().to_uppercase();
    let (number, multiplier) = if let Some(n) = s.strip_suffix("GB") {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = s.strip_suffix("MB") {
        (n, 1024 * 1024)
    } else if let Some(n) = s.strip_suffix("KB") {
        (n, 1024)
    } else if let Some(n) = s.strip_suffix('B') {
        (n, 1)
    } else {
        (s.as_str(), 1)
    };

    number
        .trim()
        .parse::<usize>()
        .map(|n| n * multiplier)
        .unwrap_or(1024 * 1024)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_shipped_deployment() {
        let config = GatewayConfig::default();
        assert_eq!(config.rate_limit_permits, 100);
        assert_eq!(config.rate_limit_window, Duration::from_secs(60));
        assert_eq!(config.token_ttl, Duration::from_secs(1800));
        assert!(config.cors_is_permissive());
        assert_eq!(config.public_paths, vec!["/", "/auth/login"]);
        assert_eq!(config.auth_mode, AuthMode::CpfPassword);
    }

    #[test]
    fn cors_mode_detection() {
        let mut config = GatewayConfig::default();
        assert!(config.cors_is_permissive());

        config.cors_origins = Vec::new();
        assert!(config.cors_is_restrictive());

        config.cors_origins = vec!["https://app.example.com".to_string()];
        assert!(!config.cors_is_permissive());
        assert!(!config.cors_is_restrictive());
    }

    #[test]
    fn builder_overrides_stick() {
        let config = GatewayConfig::builder()
            .issuer("auth.example")
            .audience("orders")
            .rate_limit(5, Duration::from_secs(10))
            .token_ttl(Duration::from_secs(60))
            .build();
        assert_eq!(config.issuer, "auth.example");
        assert_eq!(config.audience, "orders");
        assert_eq!(config.rate_limit_permits, 5);
        assert_eq!(config.token_ttl, Duration::from_secs(60));
    }

    #[test]
    fn duration_parsing() {
        assert_eq!(parse_duration("100ms"), Duration::from_millis(100));
        assert_eq!(parse_duration("30s"), Duration::from_secs(30));
        assert_eq!(parse_duration("5m"), Duration::from_secs(300));
        assert_eq!(parse_duration("1h"), Duration::from_secs(3600));
        assert_eq!(parse_duration("45"), Duration::from_secs(45));
        assert_eq!(parse_duration("junk"), Duration::from_secs(30));
    }

    #[test]
    fn size_parsing() {
        assert_eq!(parse_size("512KB"), 512 * 1024);
        assert_eq!(parse_size("10MB"), 10 * 1024 * 1024);
        assert_eq!(parse_size("1GB"), 1024 * 1024 * 1024);
        assert_eq!(parse_size("2048"), 2048);
        assert_eq!(parse_size("junk"), 1024 * 1024);
    }
}
