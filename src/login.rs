//! Login Endpoint and Router Assembly
//!
//! The gateway's own HTTP surface: the login route (the unauthenticated
//! path into the authenticator use case), the liveness route, and the
//! fallback that hands everything else to the routing boundary. All of it
//! is wrapped by the admission pipeline in [`gateway_router`].

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

use crate::admission::{AdmissionRouter, AdmissionState};
use crate::auth::{AuthRequest, AuthSuccess, Authenticator};
use crate::config::GatewayConfig;
use crate::error::AppError;
use crate::proxy::UpstreamClient;
use crate::rate_limit::{FixedWindowLimiter, RateLimitConfig};

/// Handler state: the authenticator use case and the routing boundary.
#[derive(Clone)]
pub struct GatewayState {
    /// The CPF(+password) → token use case
    pub authenticator: Arc<Authenticator>,
    /// Upstream client; `None` means no routing boundary is configured
    pub upstream: Option<UpstreamClient>,
}

/// `POST /auth/login`: authenticate and issue a token.
///
/// Success: `200 {"token": ..., "expires_in": ..., "user": {...}}`.
/// Blank input: `400 {"error": "cpf_required"}` (or `password_required`).
/// Unknown CPF or bad password: `401`, indistinguishable from each other.
pub async fn login(
    State(state): State<GatewayState>,
    payload: Result<Json<AuthRequest>, JsonRejection>,
) -> Result<Json<AuthSuccess>, AppError> {
    let Json(request) = payload.map_err(|_| AppError::bad_request("invalid_json"))?;

    match state.authenticator.authenticate(&request).await? {
        Some(success) => Ok(Json(success)),
        None => Err(AppError::unauthorized("credentials did not verify")),
    }
}

/// `GET /`: liveness. Always 200, no auth.
pub async fn liveness() -> &'static str {
    "portaria gateway OK"
}

/// Fallback: every admitted non-gateway route forwards upstream.
pub async fn forward(
    State(state): State<GatewayState>,
    request: Request,
) -> Result<Response, AppError> {
    match &state.upstream {
        Some(upstream) => upstream.forward(request).await,
        None => Err(AppError::unavailable_msg("no upstream configured")),
    }
}

/// Assemble the gateway router: routes, state, and the full admission
/// pipeline.
pub fn gateway_router(
    config: &GatewayConfig,
    state: GatewayState,
    admission: AdmissionState,
) -> Router {
    let limiter = FixedWindowLimiter::new(RateLimitConfig {
        permits: config.rate_limit_permits,
        window: config.rate_limit_window,
        skip_paths: config.rate_limit_skip_paths.clone(),
    });

    Router::new()
        .route("/", get(liveness))
        .route("/auth/login", post(login))
        .fallback(forward)
        .with_state(state)
        .with_admission(config, admission, limiter)
}

#[cfg(test)]
mod tests {
    use crate::auth::{AuthSuccess, UserSummary};

    #[test]
    fn login_response_shape() {
        let success = AuthSuccess {
            token: "aaa.bbb.ccc".to_string(),
            expires_in: 1800,
            user: UserSummary {
                id: "user-123".to_string(),
                name: Some("João Silva".to_string()),
                email: None,
                user_type: 1,
            },
        };

        let body = serde_json::to_value(&success).unwrap();
        assert_eq!(body["token"], "aaa.bbb.ccc");
        assert_eq!(body["expires_in"], 1800);
        assert_eq!(body["user"]["id"], "user-123");
        assert_eq!(body["user"]["user_type"], 1);
        // Absent optionals are omitted, and the digest never appears.
        assert!(body["user"].get("email").is_none());
        assert!(body["user"].get("password_hash").is_none());
    }
}
