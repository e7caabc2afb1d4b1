//! HTTP handler for the Telegram webhook

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;

use crate::services::chatbot::Update;
use crate::AppState;

/// Header Telegram sets to the secret given in `setWebhook`
pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub ok: bool,
}

/// Handle one Telegram update
/// POST /api/v1/webhook/telegram
///
/// The secret token is checked before the body is parsed. Processing
/// failures are logged and still acknowledged, so Telegram does not
/// redeliver the update.
pub async fn handle_telegram_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, StatusCode> {
    if let Some(expected) = state.config.telegram.webhook_secret.as_deref() {
        let given = headers
            .get(SECRET_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());
        if given != Some(expected) {
            tracing::warn!("Rejected webhook call with a bad secret token");
            return Err(StatusCode::UNAUTHORIZED);
        }
    }

    let update: Update = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!("Rejected malformed webhook update: {}", e);
        StatusCode::BAD_REQUEST
    })?;

    let update_id = update.update_id;
    match state.chatbot.process_update(update).await {
        Ok(()) => Ok(Json(WebhookResponse { ok: true })),
        Err(e) => {
            tracing::error!("Update {} failed: {}", update_id, e);
            Ok(Json(WebhookResponse { ok: false }))
        }
    }
}
