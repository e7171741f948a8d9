//! Error Handling
//!
//! One error type for the whole gateway, with a fixed taxonomy mapping to
//! HTTP statuses and a JSON response body that never leaks internals.
//!
//! # Taxonomy
//!
//! | Kind | Status | Meaning |
//! |------|--------|---------|
//! | `BadRequest` | 400 | caller-supplied input malformed or missing |
//! | `Unauthorized` | 401 | credentials did not verify (including not-found) |
//! | `Forbidden` | 403 | valid identity, insufficient role |
//! | `RateLimited` | 429 | admission rate limit exceeded |
//! | `Configuration` | 500 | missing/invalid signing key or store configuration |
//! | `Unavailable` | 503 | credential store or upstream unreachable |
//!
//! Validation and auth failures are expected business outcomes: they are
//! returned as structured responses and logged at warn/debug, never as
//! errors. Configuration and upstream failures log their full context and
//! return a generic message to the client.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::fmt;

// ============================================================================
// Error Types
// ============================================================================

/// Gateway error with secure response handling.
///
/// Carries a machine-readable `code` (surfaced as the `error` field of the
/// JSON body), a human message, and optional internal details that are only
/// ever logged.
#[derive(Debug)]
pub struct AppError {
    /// Category; determines HTTP status and logging level
    pub kind: ErrorKind,
    /// Wire code overriding the kind's default (e.g. `cpf_required`)
    pub code: Option<&'static str>,
    /// Human-readable message
    pub message: String,
    /// Internal details (logged, never exposed)
    pub details: Option<String>,
    /// Original error, kept for logging
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

/// Error categories with their HTTP status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller-supplied input malformed or missing (400)
    BadRequest,
    /// Credentials did not verify, indistinguishable from not-found (401)
    Unauthorized,
    /// Authenticated but the role is not allowed on this route (403)
    Forbidden,
    /// Admission rate limit exceeded (429)
    RateLimited,
    /// Missing or invalid process configuration (500)
    Configuration,
    /// Credential store or upstream failure (503)
    Unavailable,
}

impl ErrorKind {
    /// HTTP status code for this kind.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Configuration => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Whether the message can be returned to the client verbatim.
    pub fn expose_message(&self) -> bool {
        matches!(self, Self::BadRequest | Self::RateLimited)
    }

    /// Default wire code for the `error` field of the response body.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::RateLimited => "rate_limited",
            Self::Configuration => "internal_error",
            Self::Unavailable => "service_unavailable",
        }
    }
}

impl AppError {
    /// Create a new error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// Bad request (400) where the wire code IS the message, e.g.
    /// `cpf_required`.
    pub fn bad_request(code: &'static str) -> Self {
        Self {
            code: Some(code),
            ..Self::new(ErrorKind::BadRequest, code)
        }
    }

    /// Authentication failure (401). The message is replaced with a generic
    /// one on the wire.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    /// Authorization failure (403).
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    /// Rate limit exceeded (429).
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, message)
    }

    /// Configuration failure (500) with its source preserved for logging.
    pub fn configuration(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            details: Some(source.to_string()),
            source: Some(Box::new(source)),
            ..Self::new(ErrorKind::Configuration, message)
        }
    }

    /// Store/upstream failure (503) with its source preserved for logging.
    pub fn unavailable(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            details: Some(source.to_string()),
            source: Some(Box::new(source)),
            ..Self::new(ErrorKind::Unavailable, message)
        }
    }

    /// Store/upstream failure (503) without a source error.
    pub fn unavailable_msg(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, message)
    }

    /// Attach internal details (logged, never exposed).
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    fn log(&self) {
        let details = self.details.as_deref().unwrap_or("none");
        match self.kind {
            ErrorKind::Configuration | ErrorKind::Unavailable => {
                tracing::error!(
                    error_kind = %self.kind,
                    message = %self.message,
                    details = %details,
                    "Gateway failure"
                );
            }
            ErrorKind::Unauthorized | ErrorKind::Forbidden | ErrorKind::RateLimited => {
                tracing::warn!(
                    error_kind = %self.kind,
                    message = %self.message,
                    "Request rejected"
                );
            }
            ErrorKind::BadRequest => {
                tracing::debug!(
                    error_kind = %self.kind,
                    message = %self.message,
                    "Client error"
                );
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

// ============================================================================
// Error Response
// ============================================================================

/// JSON error body: `{"error": "...", "message": "..."}`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ErrorResponse {
    /// Machine-readable code
    pub error: String,
    /// Human-readable message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.kind.status_code();
        let error = self.code.unwrap_or(self.kind.as_str()).to_string();

        // Internal kinds get a fixed generic message; business outcomes keep
        // theirs. The code-as-error shape (`cpf_required`) stays bare.
        let message = if self.code.is_some() {
            None
        } else if self.kind.expose_message() {
            Some(self.message)
        } else {
            Some(
                match self.kind {
                    ErrorKind::Unauthorized => "Authentication required",
                    ErrorKind::Forbidden => "Access denied",
                    ErrorKind::Configuration => "An internal error occurred",
                    ErrorKind::Unavailable => "Service temporarily unavailable",
                    _ => "Request failed",
                }
                .to_string(),
            )
        };

        (status, Json(ErrorResponse { error, message })).into_response()
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<crate::store::StoreError> for AppError {
    fn from(err: crate::store::StoreError) -> Self {
        AppError::unavailable("credential store failure", err)
    }
}

impl From<crate::keys::SigningKeyError> for AppError {
    fn from(err: crate::keys::SigningKeyError) -> Self {
        AppError::configuration("signing key rejected", err)
    }
}

/// Result alias for handlers returning [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;

// ============================================================================
// Tests
// ============================================================================
