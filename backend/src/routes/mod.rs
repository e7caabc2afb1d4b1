//! Route definitions for the Agro Advisory bot

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::operator_auth, AppState};

/// Create API routes
pub fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Telegram webhook (public, checked against the webhook secret)
        .route("/webhook/telegram", post(handlers::handle_telegram_webhook))
        // Operator routes
        .merge(operator_routes(state))
}

/// Operator routes (bearer token)
fn operator_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/sweeps/:kind", post(handlers::trigger_sweep))
        .route("/delivery-logs", get(handlers::list_delivery_logs))
        .route_layer(middleware::from_fn_with_state(state.clone(), operator_auth))
}
