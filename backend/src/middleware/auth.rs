//! Operator authentication middleware
//!
//! Operator endpoints require `Authorization: Bearer <server.operator_token>`.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::AppState;

/// Reject requests without the configured operator token
pub async fn operator_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let expected = state.config.server.operator_token.as_str();
    if expected.is_empty() {
        return AppError::Unauthorized("Operator API is disabled".to_string()).into_response();
    }

    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    match token {
        Some(token) if token_matches(token, expected) => next.run(request).await,
        Some(_) => AppError::Unauthorized("Invalid operator token".to_string()).into_response(),
        None => AppError::Unauthorized("Missing or invalid Authorization header".to_string())
            .into_response(),
    }
}

/// Length-independent comparison of two tokens
fn token_matches(given: &str, expected: &str) -> bool {
    let (given, expected) = (given.as_bytes(), expected.as_bytes());
    let mut diff = given.len() ^ expected.len();
    for (i, byte) in expected.iter().enumerate() {
        diff |= usize::from(byte ^ given.get(i).copied().unwrap_or(0));
    }
    diff == 0
}
