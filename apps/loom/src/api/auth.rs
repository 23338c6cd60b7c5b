//! # Authentication Module
//!
//! API key authentication for the Loom HTTP API.
//!
//! - `LOOM_API_KEY`: If set, all requests except `/health` must send
//!   `Authorization: Bearer <key>` (a bare `<key>` is accepted too)

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use super::types::ApiError;

/// Returns `Some(key)` if `LOOM_API_KEY` is set and non-empty.
pub fn get_api_key_from_env() -> Option<String> {
    std::env::var("LOOM_API_KEY").ok().filter(|k| !k.is_empty())
}

/// Compare two keys in constant time.
///
/// Both sides are padded to the same length so the comparison does not
/// leak the expected key's length.
fn keys_match(provided: &[u8], expected: &[u8]) -> bool {
    let max_len = provided.len().max(expected.len());
    let mut padded_provided = vec![0u8; max_len];
    let mut padded_expected = vec![0u8; max_len];
    padded_provided[..provided.len()].copy_from_slice(provided);
    padded_expected[..expected.len()].copy_from_slice(expected);

    let bytes_match: bool = padded_provided.ct_eq(&padded_expected).into();
    bytes_match && provided.len() == expected.len()
}

fn unauthorized(reason: &'static str) -> Response {
    tracing::warn!(event = "auth_failure", reason, "Authentication failed");
    ApiError::new(StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
}

/// API key authentication middleware.
pub async fn api_key_auth_middleware(request: Request<Body>, next: Next) -> Response {
    let Some(expected) = get_api_key_from_env() else {
        return next.run(request).await;
    };

    // Load balancer checks stay public.
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match auth_header {
        Some(value) => {
            let provided = value.strip_prefix("Bearer ").unwrap_or(value);
            if keys_match(provided.as_bytes(), expected.as_bytes()) {
                next.run(request).await
            } else {
                unauthorized("invalid_api_key")
            }
        }
        None => unauthorized("missing_authorization_header"),
    }
}

// =============================================================================
// TESTS
// =============================================================================
