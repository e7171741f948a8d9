//! Request Admission Pipeline
//!
//! The ordered checks every inbound request passes before it reaches
//! routing. Each stage is a pure predicate over the request plus current
//! configuration and time, and each can short-circuit to a terminal
//! response. No stage retries.
//!
//! [`AdmissionRouter::with_admission`] applies the stack to any router.
//! The order is load-bearing:
//!
//! 1. TraceLayer (outermost request logging)
//! 2. Audit middleware (captures every outcome, 429s included)
//! 3. Rate limiting: before authentication, so invalid-token floods burn
//!    permits instead of signature checks; terminal 429
//! 4. CORS: before authentication, so browsers get preflight answers
//!    without a token
//! 5. Security headers
//! 6. Token verification: public routes (login, liveness) bypass this
//!    stage; anything else needs a valid bearer token; terminal 401
//! 7. Role policy: route-specific allowed-role sets; terminal 403
//! 8. Request body limit
//! 9. Timeout (innermost)

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::audit::audit_middleware;
use crate::config::GatewayConfig;
use crate::error::AppError;
use crate::observability::SecurityEvent;
use crate::policy::{log_access_decision, RoutePolicies};
use crate::rate_limit::{rate_limit_middleware, FixedWindowLimiter};
use crate::token::{Claims, TokenVerifier};

// ============================================================================
// Admission State
// ============================================================================

/// Shared state for the verification and policy stages.
#[derive(Clone)]
pub struct AdmissionState {
    verifier: Arc<TokenVerifier>,
    policies: Arc<RoutePolicies>,
    public_paths: Arc<Vec<String>>,
}

impl AdmissionState {
    /// Bundle the verifier, route policies, and public-route list.
    pub fn new(
        verifier: Arc<TokenVerifier>,
        policies: RoutePolicies,
        public_paths: Vec<String>,
    ) -> Self {
        Self {
            verifier,
            policies: Arc::new(policies),
            public_paths: Arc::new(public_paths),
        }
    }

    /// Whether `path` bypasses token verification. The gateway root (`/`)
    /// matches only itself; other entries match themselves and their
    /// sub-paths.
    fn is_public(&self, path: &str) -> bool {
        self.public_paths.iter().any(|public| {
            if public == "/" {
                path == "/"
            } else {
                path == public || path.starts_with(&format!("{public}/"))
            }
        })
    }
}

/// Pull the bearer token out of the `Authorization` header.
pub fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

// ============================================================================
// Pipeline Stages
// ============================================================================

/// Stage: token verification, with public-route bypass.
///
/// Verified claims are attached to the request (for downstream handlers and
/// the policy stage) and to the response (so the audit middleware can log
/// the subject).
pub async fn authenticate_middleware(
    State(state): State<AdmissionState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if state.is_public(&path) {
        return next.run(request).await;
    }

    let Some(token) = bearer_token(&request) else {
        return AppError::unauthorized("missing bearer token").into_response();
    };

    match state.verifier.verify(token) {
        Ok(claims) => {
            request.extensions_mut().insert(claims.clone());
            let mut response = next.run(request).await;
            response.extensions_mut().insert(claims);
            response
        }
        Err(e) => {
            crate::security_event!(
                SecurityEvent::TokenRejected,
                path = %path,
                "Token failed verification"
            );
            AppError::unauthorized("token failed verification")
                .with_details(e.to_string())
                .into_response()
        }
    }
}

/// Stage: role-policy evaluation for routes that carry one.
pub async fn authorize_middleware(
    State(state): State<AdmissionState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    if let Some(policy) = state.policies.resolve(&path) {
        let Some(claims) = request.extensions().get::<Claims>() else {
            // A policy-guarded route that skipped verification has no
            // identity to judge.
            return AppError::unauthorized("identity required for this route").into_response();
        };

        let allowed = policy.permits(claims.role);
        log_access_decision(claims, &path, allowed);
        if !allowed {
            return AppError::forbidden(format!(
                "role {} is not allowed on this route",
                claims.role
            ))
            .into_response();
        }
    }

    next.run(request).await
}

// ============================================================================
// Router Extension
// ============================================================================

/// Extension trait applying the full admission stack to a router.
pub trait AdmissionRouter {
    /// Wrap the router with every admission stage, in pipeline order.
    fn with_admission(
        self,
        config: &GatewayConfig,
        state: AdmissionState,
        limiter: FixedWindowLimiter,
    ) -> Self;
}

impl<S> AdmissionRouter for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_admission(
        self,
        config: &GatewayConfig,
        state: AdmissionState,
        limiter: FixedWindowLimiter,
    ) -> Self {
        // Layers are listed innermost-first; the last one added runs first.
        let mut router = self
            .layer(TimeoutLayer::new(config.request_timeout))
            .layer(RequestBodyLimitLayer::new(config.max_request_size))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                authorize_middleware,
            ))
            .layer(middleware::from_fn_with_state(
                state,
                authenticate_middleware,
            ));

        if config.security_headers_enabled {
            router = router
                .layer(SetResponseHeaderLayer::overriding(
                    header::STRICT_TRANSPORT_SECURITY,
                    HeaderValue::from_static("max-age=31536000; includeSubDomains"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_FRAME_OPTIONS,
                    HeaderValue::from_static("DENY"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("no-store, no-cache, must-revalidate, private"),
                ));
        }

        router
            .layer(build_cors_layer(config))
            .layer(middleware::from_fn_with_state(
                limiter,
                rate_limit_middleware,
            ))
            .layer(middleware::from_fn(audit_middleware))
            .layer(TraceLayer::new_for_http())
    }
}

/// Build the CORS layer from configuration.
///
/// Empty origin list means same-origin only; `["*"]` allows any origin (the
/// shipped default, a documented policy gap rather than an accident); anything
/// else is an explicit allowlist with credentials enabled.
fn build_cors_layer(config: &GatewayConfig) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .max_age(std::time::Duration::from_secs(3600));

    if config.cors_is_restrictive() {
        base
    } else if config.cors_is_permissive() {
        base.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|s| HeaderValue::from_str(s).ok())
            .collect();
        base.allow_origin(origins).allow_credentials(true)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::SigningKey;
    use crate::policy::RolePolicy;
    use crate::role::Role;

    fn state(public: &[&str]) -> AdmissionState {
        let key = SigningKey::generate(32);
        AdmissionState::new(
            Arc::new(TokenVerifier::new(&key, "portaria", "portaria-api")),
            RoutePolicies::new().require("/admin", RolePolicy::allow([Role::Admin])),
            public.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn root_is_public_only_for_itself() {
        let state = state(&["/", "/auth/login"]);
        assert!(state.is_public("/"));
        assert!(!state.is_public("/orders"));
    }

    #[test]
    fn public_prefixes_cover_sub_paths() {
        let state = state(&["/auth/login"]);
        assert!(state.is_public("/auth/login"));
        assert!(state.is_public("/auth/login/"));
        assert!(!state.is_public("/auth/loginx"));
        assert!(!state.is_public("/auth"));
    }

    #[test]
    fn bearer_token_extraction() {
        let request = Request::builder()
            .header(header::AUTHORIZATION, "Bearer abc.def.ghi")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&request), Some("abc.def.ghi"));

        let request = Request::builder()
            .header(header::AUTHORIZATION, "Basic dXNlcjpwdw==")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&request), None);

        let request = Request::builder().body(axum::body::Body::empty()).unwrap();
        assert_eq!(bearer_token(&request), None);
    }
}
