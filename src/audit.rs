//! Request Audit Middleware
//!
//! Logs every request with a correlation id, client address, verified
//! subject when one exists, status, and latency, and emits security events
//! for the admission pipeline's terminal outcomes (401, 403, 429, 5xx).
//!
//! Sits just inside the trace layer so it observes the final status of
//! every stage, including rate-limit rejections that never reach a handler.

use axum::{
    body::Body,
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{error, info, warn};

use crate::observability::{SecurityEvent, Severity};
use crate::token::Claims;

/// Audit middleware function, for `axum::middleware::from_fn`.
pub async fn audit_middleware(request: Request, next: Next) -> Response {
    let correlation_id = correlation_id(&request);
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let client_ip = client_address(&request);

    let start = Instant::now();
    let response = next.run(request).await;
    let latency = start.elapsed();
    let status = response.status();

    // The verification stage attaches the claims to the response it saw.
    let subject = response
        .extensions()
        .get::<Claims>()
        .map(|claims| claims.sub.clone());
    let subject = subject.as_deref().unwrap_or("-");

    emit_security_event(status, &path, &client_ip, subject);

    info!(
        correlation_id = %correlation_id,
        method = %method,
        path = %path,
        client_ip = %client_ip,
        user_id = %subject,
        status = %status.as_u16(),
        latency_ms = %latency.as_millis(),
        "Request completed"
    );

    response
}

fn emit_security_event(status: StatusCode, path: &str, client_ip: &str, subject: &str) {
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            // The rate limiter already emitted the event with its retry
            // budget; nothing to add here.
        }
        StatusCode::UNAUTHORIZED => {
            warn!(
                security_event = SecurityEvent::TokenRejected.name(),
                category = SecurityEvent::TokenRejected.category(),
                severity = %Severity::High,
                ip_address = %client_ip,
                path = %path,
                "Request not authenticated"
            );
        }
        StatusCode::FORBIDDEN => {
            warn!(
                security_event = SecurityEvent::AccessDenied.name(),
                category = SecurityEvent::AccessDenied.category(),
                severity = %Severity::High,
                ip_address = %client_ip,
                path = %path,
                user_id = %subject,
                "Request not authorized"
            );
        }
        status if status.is_server_error() => {
            error!(
                status = %status.as_u16(),
                ip_address = %client_ip,
                path = %path,
                user_id = %subject,
                "Server error"
            );
        }
        _ => {}
    }
}

/// Correlation id from `X-Correlation-ID` / `X-Request-ID`, or a fresh one.
fn correlation_id(request: &Request<Body>) -> String {
    request
        .headers()
        .get("x-correlation-id")
        .or_else(|| request.headers().get("x-request-id"))
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .unwrap_or_else(|| format!("req-{}", uuid::Uuid::new_v4().simple()))
}

/// Client address from proxy headers, or "unknown".
fn client_address(request: &Request<Body>) -> String {
    let headers = request.headers();

    if let Some(xff) = headers.get("x-forwarded-for") {
        if let Ok(s) = xff.to_str() {
            if let Some(first) = s.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(s) = real_ip.to_str() {
            return s.trim().to_string();
        }
    }

    "unknown".to_string()
}
