//! Bearer token middleware.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use super::{ApiError, AppState};

/// Reject requests without a valid bearer token and attach the
/// authenticated [`crate::auth::Principal`] to the request extensions.
pub async fn require_bearer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;

    let principal = state.credentials.verify_bearer(token).map_err(|e| {
        tracing::warn!("Rejected bearer token for {}: {}", req.uri().path(), e);
        ApiError::from(e)
    })?;

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
