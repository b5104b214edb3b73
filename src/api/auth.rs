//! Shared-secret check for the memory routes.
//!
//! The secret is read from `Authorization: Bearer <secret>`, falling back to a
//! bare `token` header. A server whose secret was never changed from the
//! placeholder rejects every protected request (fail-closed).

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use super::AppContext;
use crate::error::MemoryError;

/// Middleware guarding `/lookup` and `/add`.
pub async fn require_token(
    State(ctx): State<Arc<AppContext>>,
    request: Request,
    next: Next,
) -> Result<Response, MemoryError> {
    verify_token(request.headers(), ctx.secret())?;
    Ok(next.run(request).await)
}

/// Pull the presented token out of the request headers.
pub fn presented_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    bearer
        .or_else(|| headers.get("token").and_then(|v| v.to_str().ok()))
        .map(str::trim)
}

/// Check the request against `expected`. `None` means no real secret is
/// configured.
pub fn verify_token(headers: &HeaderMap, expected: Option<&str>) -> Result<(), MemoryError> {
    let Some(expected) = expected else {
        tracing::warn!("rejecting request: api secret is still the placeholder");
        return Err(MemoryError::Misconfigured(
            "api secret is not configured; set VESPER_API_SECRET".into(),
        ));
    };

    let presented = presented_token(headers).unwrap_or_default();
    if bool::from(presented.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        tracing::warn!("rejecting request with a missing or wrong token");
        Err(MemoryError::Forbidden("invalid token".into()))
    }
}
