//! Agro Advisory bot
//!
//! Onboards farmers over Telegram and pushes daily forecasts and agronomic
//! advice matched to each farm's nearest cell of a gridded dataset.

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod db;
pub mod error;
pub mod external;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;

pub use config::Config;
pub use error::{AppError, AppResult};

use db::PgFarmStore;
use external::TelegramClient;
use services::{ChatbotService, ReminderScheduler, SweepService};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: PgFarmStore,
    pub config: Arc<Config>,
    pub chatbot: Arc<ChatbotService<PgFarmStore, TelegramClient>>,
    pub sweeps: Arc<SweepService<PgFarmStore, TelegramClient>>,
    pub reminders: ReminderScheduler<TelegramClient>,
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", routes::api_routes(&state))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Agro Advisory Bot API v1"
}
