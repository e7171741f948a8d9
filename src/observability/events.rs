//! Security Event Logging
//!
//! Structured audit records for security-relevant gateway events.
//!
//! # Usage
//!
//! ```ignore
//! use portaria::observability::SecurityEvent;
//! use portaria::security_event;
//!
//! security_event!(
//!     SecurityEvent::AuthenticationSuccess,
//!     user_id = %user.id,
//!     ip_address = %client_ip,
//!     "User authenticated"
//! );
//! ```

use std::fmt;

/// Security event categories for audit logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEvent {
    // Authentication events
    /// Credentials verified and a token was issued
    AuthenticationSuccess,
    /// Credentials did not verify (not-found or bad password)
    AuthenticationFailure,
    /// A presented token was rejected at the gateway
    TokenRejected,

    // Authorization events
    /// Route policy admitted the request
    AccessGranted,
    /// Route policy rejected the request
    AccessDenied,

    // Security events
    /// Fixed-window rate limit exceeded
    RateLimitExceeded,

    // System events
    /// Gateway started
    SystemStartup,
    /// Gateway shutting down
    SystemShutdown,
    /// Credential store lookup failed or timed out
    StoreUnavailable,
}

impl SecurityEvent {
    /// Event category for filtering and grouping.
    pub fn category(&self) -> &'static str {
        match self {
            Self::AuthenticationSuccess
            | Self::AuthenticationFailure
            | Self::TokenRejected => "authentication",

            Self::AccessGranted | Self::AccessDenied => "authorization",

            Self::RateLimitExceeded => "security",

            Self::SystemStartup | Self::SystemShutdown | Self::StoreUnavailable => "system",
        }
    }

    /// Severity level for the event.
    pub fn severity(&self) -> Severity {
        match self {
            Self::StoreUnavailable => Severity::Critical,

            Self::AuthenticationFailure
            | Self::TokenRejected
            | Self::AccessDenied
            | Self::RateLimitExceeded => Severity::High,

            Self::AuthenticationSuccess => Severity::Medium,

            Self::AccessGranted | Self::SystemStartup | Self::SystemShutdown => Severity::Low,
        }
    }

    /// Event name as emitted in log records.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AuthenticationSuccess => "authentication_success",
            Self::AuthenticationFailure => "authentication_failure",
            Self::TokenRejected => "token_rejected",
            Self::AccessGranted => "access_granted",
            Self::AccessDenied => "access_denied",
            Self::RateLimitExceeded => "rate_limit_exceeded",
            Self::SystemStartup => "system_startup",
            Self::SystemShutdown => "system_shutdown",
            Self::StoreUnavailable => "store_unavailable",
        }
    }
}

impl fmt::Display for SecurityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Event severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Routine operations
    Low,
    /// Important state changes
    Medium,
    /// Security-relevant failures
    High,
    /// Immediate attention required
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Log a security event with structured fields.
///
/// Automatically attaches `security_event`, `category`, and `severity`
/// fields, and picks the tracing level from the event severity.
#[macro_export]
macro_rules! security_event {
    ($event:expr, $($field:tt)*) => {{
        let event = $event;
        let severity = event.severity();
        let category = event.category();
        let event_name = event.name();

        match severity {
            $crate::observability::Severity::Critical => {
                ::tracing::error!(
                    security_event = event_name,
                    category = category,
                    severity = "critical",
                    $($field)*
                );
            }
            $crate::observability::Severity::High => {
                ::tracing::warn!(
                    security_event = event_name,
                    category = category,
                    severity = "high",
                    $($field)*
                );
            }
            $crate::observability::Severity::Medium => {
                ::tracing::info!(
                    security_event = event_name,
                    category = category,
                    severity = "medium",
                    $($field)*
                );
            }
            $crate::observability::Severity::Low => {
                ::tracing::debug!(
                    security_event = event_name,
                    category = category,
                    severity = "low",
                    $($field)*
                );
            }
        }
    }};
}

pub use security_event;
