//! Routing Boundary
//!
//! Hands admitted requests to the upstream service. The routing table and
//! load-balancing policy live on the other side of this boundary; the
//! gateway knows one base URL and forwards method, path, query, headers,
//! and body unchanged, plus the identity context derived from the verified
//! claims:
//!
//! - `x-user-id`: the `sub` claim
//! - `x-user-role`: the `role` claim
//! - `x-user-cpf`: the `cpf` claim
//!
//! Any `x-user-*` headers arriving from the client are stripped first, so
//! the upstream can trust them unconditionally.

use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderMap, HeaderName, HeaderValue},
    response::Response,
};

use crate::error::AppError;
use crate::token::Claims;

/// Header carrying the verified subject id.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the verified role.
pub const USER_ROLE_HEADER: &str = "x-user-role";
/// Header carrying the verified CPF.
pub const USER_CPF_HEADER: &str = "x-user-cpf";

/// Client for the configured upstream.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    base_url: String,
    client: reqwest::Client,
}

impl UpstreamClient {
    /// Create a client forwarding to `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Forward an admitted request and relay the upstream response.
    pub async fn forward(&self, request: Request) -> Result<Response, AppError> {
        let (parts, body) = request.into_parts();

        let mut url = format!("{}{}", self.base_url, parts.uri.path());
        if let Some(query) = parts.uri.query() {
            url.push('?');
            url.push_str(query);
        }

        // The admission body-limit layer has already bounded this.
        let body = axum::body::to_bytes(body, usize::MAX)
            .await
            .map_err(|e| AppError::unavailable_msg("request body could not be read")
                .with_details(e.to_string()))?;

        let mut headers = forwardable_headers(&parts.headers);
        if let Some(claims) = parts.extensions.get::<Claims>() {
            insert_identity_headers(&mut headers, claims);
        }

        let upstream_response = self
            .client
            .request(parts.method, &url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::unavailable("upstream unreachable", e))?;

        let mut response = Response::builder().status(upstream_response.status());
        if let Some(response_headers) = response.headers_mut() {
            *response_headers = forwardable_headers(upstream_response.headers());
        }

        let bytes = upstream_response
            .bytes()
            .await
            .map_err(|e| AppError::unavailable("upstream response truncated", e))?;

        response
            .body(Body::from(bytes))
            .map_err(|e| AppError::unavailable_msg("upstream response could not be relayed")
                .with_details(e.to_string()))
    }
}

/// Copy headers, dropping hop-by-hop fields and any client-supplied
/// identity headers.
fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    const HOP_BY_HOP: &[&str] = &[
        "connection",
        "keep-alive",
        "proxy-authenticate",
        "proxy-authorization",
        "te",
        "trailer",
        "transfer-encoding",
        "upgrade",
    ];

    headers
        .iter()
        .filter(|(name, _)| {
            let name = name.as_str();
            name != header::HOST.as_str()
                && name != header::CONTENT_LENGTH.as_str()
                && !HOP_BY_HOP.contains(&name)
                && !name.starts_with("x-user-")
        })
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

fn insert_identity_headers(headers: &mut HeaderMap, claims: &Claims) {
    let pairs = [
        (USER_ID_HEADER, claims.sub.as_str()),
        (USER_ROLE_HEADER, claims.role.as_str()),
        (USER_CPF_HEADER, claims.cpf.as_str()),
    ];
    for (name, value) in pairs {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.insert(name, value);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::Role;

    fn claims() -> Claims {
        Claims {
            sub: "user-123".to_string(),
            name: None,
            email: None,
            cpf: "12345678900".to_string(),
            role: Role::Kitchen,
            jti: "jti-1".to_string(),
            iss: "portaria".to_string(),
            aud: "portaria-api".to_string(),
            iat: 0,
            nbf: 0,
            exp: 0,
        }
    }

    #[test]
    fn base_url_loses_its_trailing_slash() {
        let client = UpstreamClient::new("http://orders.internal/");
        assert_eq!(client.base_url, "http://orders.internal");
    }

    #[test]
    fn hop_by_hop_and_spoofed_identity_headers_are_dropped() {
        let mut headers = HeaderMap::new();
        headers.insert("connection", HeaderValue::from_static("keep-alive"));
        headers.insert("host", HeaderValue::from_static("gateway.local"));
        headers.insert("x-user-id", HeaderValue::from_static("attacker"));
        headers.insert("accept", HeaderValue::from_static("application/json"));

        let forwarded = forwardable_headers(&headers);
        assert!(forwarded.get("connection").is_none());
        assert!(forwarded.get("host").is_none());
        assert!(forwarded.get("x-user-id").is_none());
        assert_eq!(forwarded.get("accept").unwrap(), "application/json");
    }

    #[test]
    fn identity_headers_come_from_the_claims() {
        let mut headers = HeaderMap::new();
        insert_identity_headers(&mut headers, &claims());
        assert_eq!(headers.get(USER_ID_HEADER).unwrap(), "user-123");
        assert_eq!(headers.get(USER_ROLE_HEADER).unwrap(), "KITCHEN");
        assert_eq!(headers.get(USER_CPF_HEADER).unwrap(), "12345678900");
    }
}
