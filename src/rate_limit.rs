//! Fixed-Window Rate Limiting
//!
//! The first admission stage: every inbound request spends a permit from a
//! fixed window keyed by client network address, before any authentication
//! work happens. Running this stage first bounds the cost of repeated
//! invalid-token probing: an attacker flooding garbage tokens burns
//! permits, not signature verifications.
//!
//! Within a window of configured length, a key gets the configured number
//! of permits; the next request is rejected with 429 and a `Retry-After`
//! telling the client when the window rolls over. Admitted responses carry
//! `X-RateLimit-Limit` and `X-RateLimit-Remaining`.
//!
//! The per-key counter is read-modified-written under one mutex, so
//! concurrent requests from the same key can never observe more permits
//! than the window allows.
//!
//! # Example
//!
//! ```ignore
//! use portaria::rate_limit::{FixedWindowLimiter, RateLimitConfig};
//! use std::time::Duration;
//!
//! let limiter = FixedWindowLimiter::new(RateLimitConfig {
//!     permits: 100,
//!     window: Duration::from_secs(60),
//!     skip_paths: vec![],
//! });
//! ```

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::observability::SecurityEvent;

// ============================================================================
// Configuration
// ============================================================================

/// Fixed-window configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Permits per window per client key
    pub permits: u32,
    /// Window length
    pub window: Duration,
    /// Path prefixes exempt from rate limiting
    pub skip_paths: Vec<String>,
}

impl Default for RateLimitConfig {
    /// 100 requests per minute per client address.
    fn default() -> Self {
        Self {
            permits: 100,
            window: Duration::from_secs(60),
            skip_paths: Vec::new(),
        }
    }
}

// ============================================================================
// Limiter
// ============================================================================

#[derive(Debug)]
struct Window {
    started: Instant,
    used: u32,
}

/// Shared fixed-window limiter. Cloning is cheap; clones share counters.
#[derive(Debug, Clone)]
pub struct FixedWindowLimiter {
    config: Arc<RateLimitConfig>,
    windows: Arc<Mutex<HashMap<String, Window>>>,
}

/// Remaining budget after an admitted request.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitStatus {
    /// Permits left in the current window
    pub remaining: u32,
    /// Permits per window
    pub limit: u32,
    /// Window length in seconds
    pub window_secs: u64,
}

/// Window exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitExceeded {
    /// Seconds until the current window rolls over
    pub retry_after_secs: u64,
}

impl FixedWindowLimiter {
    /// Create a limiter with the given configuration.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config: Arc::new(config),
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Spend one permit for `key`, or report when the window resets.
    ///
    /// The check-and-spend is a single critical section: exactly `permits`
    /// requests pass per window no matter how they interleave.
    pub fn check(&self, key: &str) -> Result<RateLimitStatus, RateLimitExceeded> {
        let now = Instant::now();
        let mut windows = self.windows.lock().expect("rate limit window lock poisoned");

        let window = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            used: 0,
        });

        // Window elapsed: start a fresh one.
        if now.duration_since(window.started) >= self.config.window {
            window.started = now;
            window.used = 0;
        }

        if window.used >= self.config.permits {
            let elapsed = now.duration_since(window.started);
            let retry_after = self.config.window.saturating_sub(elapsed);
            return Err(RateLimitExceeded {
                // Ceil so the client never retries into the same window.
                retry_after_secs: retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0),
            });
        }

        window.used += 1;
        Ok(RateLimitStatus {
            remaining: self.config.permits - window.used,
            limit: self.config.permits,
            window_secs: self.config.window.as_secs(),
        })
    }

    /// Drop windows that have fully elapsed, bounding memory under key churn.
    pub fn sweep(&self) {
        let now = Instant::now();
        let mut windows = self.windows.lock().expect("rate limit window lock poisoned");
        windows.retain(|_, w| now.duration_since(w.started) < self.config.window);
    }

    fn is_exempt(&self, path: &str) -> bool {
        self.config
            .skip_paths
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }
}

// ============================================================================
// Axum Middleware
// ============================================================================

#[derive(Debug, Serialize)]
struct RateLimitErrorBody {
    error: &'static str,
    message: String,
    retry_after_secs: u64,
}

/// Rate limiting middleware. Keyed by client address: proxy headers
/// (`X-Forwarded-For`, `X-Real-IP`) when present, the socket peer address
/// otherwise.
pub async fn rate_limit_middleware(
    State(limiter): State<FixedWindowLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if limiter.is_exempt(&path) {
        return next.run(request).await;
    }

    let key = client_key(&request);

    match limiter.check(&key) {
        Ok(status) => {
            debug!(
                client = %key,
                path = %path,
                remaining = status.remaining,
                "Rate limit check passed"
            );

            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            if let Ok(v) = HeaderValue::from_str(&status.limit.to_string()) {
                headers.insert("X-RateLimit-Limit", v);
            }
            if let Ok(v) = HeaderValue::from_str(&status.remaining.to_string()) {
                headers.insert("X-RateLimit-Remaining", v);
            }
            response
        }
        Err(exceeded) => {
            metrics::counter!("portaria_rate_limited_total").increment(1);
            crate::security_event!(
                SecurityEvent::RateLimitExceeded,
                ip_address = %key,
                path = %path,
                retry_after_secs = exceeded.retry_after_secs,
                "Rate limit exceeded"
            );
            warn!(client = %key, path = %path, "Request rejected by rate limiter");

            let body = RateLimitErrorBody {
                error: "rate_limited",
                message: format!(
                    "Too many requests. Try again in {} seconds.",
                    exceeded.retry_after_secs
                ),
                retry_after_secs: exceeded.retry_after_secs,
            };
            let mut response =
                (StatusCode::TOO_MANY_REQUESTS, axum::Json(body)).into_response();
            if let Ok(v) = HeaderValue::from_str(&exceeded.retry_after_secs.to_string()) {
                response.headers_mut().insert("Retry-After", v);
            }
            response
        }
    }
}

/// Client key for rate limiting: proxy headers first, socket peer second.
fn client_key(request: &Request) -> String {
    if let Some(xff) = request.headers().get("x-forwarded-for") {
        if let Ok(s) = xff.to_str() {
            if let Some(first) = s.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }
    }
    if let Some(real_ip) = request.headers().get("x-real-ip") {
        if let Ok(s) = real_ip.to_str() {
            return s.trim().to_string();
        }
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(permits: u32, window: Duration) -> FixedWindowLimiter {
        FixedWindowLimiter::new(RateLimitConfig {
            permits,
            window,
            skip_paths: Vec::new(),
        })
    }

    #[test]
    fn exactly_n_requests_pass_per_window() {
        let limiter = limiter(3, Duration::from_secs(60));

        for used in 1..=3 {
            let status = limiter.check("10.0.0.1").expect("within budget");
            assert_eq!(status.remaining, 3 - used);
        }

        let exceeded = limiter.check("10.0.0.1").unwrap_err();
        assert!(exceeded.retry_after_secs <= 60);
        assert!(exceeded.retry_after_secs > 0);
    }

    #[test]
    fn window_resets_after_it_elapses() {
        let limiter = limiter(1, Duration::from_millis(20));

        assert!(limiter.check("10.0.0.2").is_ok());
        assert!(limiter.check("10.0.0.2").is_err());

        std::thread::sleep(Duration::from_millis(30));
        assert!(limiter.check("10.0.0.2").is_ok());
    }

    #[test]
    fn keys_are_independent() {
        let limiter = limiter(1, Duration::from_secs(60));

        assert!(limiter.check("10.0.0.3").is_ok());
        assert!(limiter.check("10.0.0.3").is_err());
        assert!(limiter.check("10.0.0.4").is_ok());
    }

    #[test]
    fn concurrent_spenders_never_exceed_the_budget() {
        let limiter = limiter(50, Duration::from_secs(60));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let limiter = limiter.clone();
            handles.push(std::thread::spawn(move || {
                (0..25).filter(|_| limiter.check("shared").is_ok()).count()
            }));
        }

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 50);
    }

    #[test]
    fn sweep_drops_elapsed_windows() {
        let limiter = limiter(1, Duration::from_millis(10));
        limiter.check("a").unwrap();
        limiter.check("b").unwrap();

        std::thread::sleep(Duration::from_millis(20));
        limiter.sweep();
        assert!(limiter.windows.lock().unwrap().is_empty());
    }
}
