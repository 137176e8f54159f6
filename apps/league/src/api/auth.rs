//! # Authentication Module
//!
//! Two independent layers:
//!
//! - Operator API key (`LEAGUE_API_KEY`): if set, every request except
//!   `/health` must carry `Authorization: Bearer <key>`
//! - Caller identity: user authentication happens upstream; the gateway
//!   forwards the authenticated user id in the `x-user-id` header, read by
//!   the [`Caller`] extractor

use super::types::ErrorResponse;
use axum::{
    Json,
    body::Body,
    extract::FromRequestParts,
    http::{Request, StatusCode, header, request::Parts},
    middleware::Next,
    response::Response,
};
use league_core::UserId;
use subtle::ConstantTimeEq;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

// =============================================================================
// API KEY AUTHENTICATION
// =============================================================================

/// API key from `LEAGUE_API_KEY`, or `None` if unset or empty.
pub fn get_api_key_from_env() -> Option<String> {
    std::env::var("LEAGUE_API_KEY")
        .ok()
        .filter(|k| !k.is_empty())
}

/// Constant-time key comparison over equal-length padded buffers.
fn keys_match(provided: &[u8], expected: &[u8]) -> bool {
    let len = provided.len().max(expected.len());
    let mut padded_provided = vec![0u8; len];
    let mut padded_expected = vec![0u8; len];
    padded_provided[..provided.len()].copy_from_slice(provided);
    padded_expected[..expected.len()].copy_from_slice(expected);

    let bytes_match: bool = padded_provided.ct_eq(&padded_expected).into();
    bytes_match && provided.len() == expected.len()
}

/// API key middleware. `/health` is always allowed.
pub async fn api_key_auth_middleware(
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    let Some(expected) = get_api_key_from_env() else {
        return Ok(next.run(request).await);
    };

    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v));

    match provided {
        Some(key) if keys_match(key.as_bytes(), expected.as_bytes()) => {
            Ok(next.run(request).await)
        }
        Some(_) => {
            tracing::warn!(
                event = "auth_failure",
                reason = "invalid_api_key",
                "Authentication failed: invalid API key"
            );
            Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
        }
        None => {
            tracing::warn!(
                event = "auth_failure",
                reason = "missing_authorization_header",
                "Missing Authorization header"
            );
            Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
        }
    }
}

// =============================================================================
// CALLER IDENTITY
// =============================================================================

/// The authenticated user making the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub UserId);

fn parse_caller(parts: &Parts) -> Option<UserId> {
    parts
        .headers
        .get(USER_ID_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(UserId)
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parse_caller(parts) {
            Some(user) => Ok(Caller(user)),
            None => {
                tracing::warn!(
                    event = "auth_failure",
                    reason = "missing_caller_identity",
                    path = %parts.uri.path(),
                    "Request without a valid x-user-id"
                );
                Err((
                    StatusCode::UNAUTHORIZED,
                    Json(ErrorResponse::new("Unauthorized")),
                ))
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
