use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::{error::ApiError, routes::AppState};

const BEARER_PREFIX: &str = "Bearer ";

/// Checks a raw `Authorization` header value against the configured key.
pub fn authorize(header: Option<&str>, expected: &str) -> Result<(), ApiError> {
    let header = header.ok_or_else(|| {
        ApiError::unauthorized("Missing Authorization header. Use 'Bearer <key>'.")
    })?;

    let token = header.strip_prefix(BEARER_PREFIX).ok_or_else(|| {
        ApiError::unauthorized("Invalid Authorization header format. Use 'Bearer <key>'.")
    })?;

    if !secure_compare(token, expected) {
        return Err(ApiError::unauthorized("Invalid or expired API key."));
    }

    Ok(())
}

fn secure_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Route layer for the protected endpoints. Runs before any body extractor.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // A header that is not valid UTF-8 is treated as malformed.
    let header = match request.headers().get(AUTHORIZATION) {
        Some(value) => Some(value.to_str().map_err(|_| {
            ApiError::unauthorized("Invalid Authorization header format. Use 'Bearer <key>'.")
        })?),
        None => None,
    };

    authorize(header, &state.config.api_key)?;
    Ok(next.run(request).await)
}
