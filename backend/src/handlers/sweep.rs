//! HTTP handlers for operator-triggered sweeps and the delivery log

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use shared::DeliveryLog;

use crate::db::FarmStore;
use crate::error::AppResult;
use crate::services::notification::DeliveryReport;
use crate::services::sweep::SweepKind;
use crate::AppState;

const DEFAULT_LOG_LIMIT: i64 = 50;
const MAX_LOG_LIMIT: i64 = 500;

/// Run a sweep now
/// POST /api/v1/sweeps/:kind
pub async fn trigger_sweep(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> AppResult<Json<DeliveryReport>> {
    let kind: SweepKind = kind.parse()?;
    tracing::info!("Operator triggered {} sweep", kind);
    let report = state.sweeps.run(kind, Utc::now()).await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct DeliveryLogQuery {
    pub limit: Option<i64>,
}

/// Newest delivery log entries
/// GET /api/v1/delivery-logs
pub async fn list_delivery_logs(
    State(state): State<AppState>,
    Query(query): Query<DeliveryLogQuery>,
) -> AppResult<Json<Vec<DeliveryLog>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, MAX_LOG_LIMIT);
    let logs = state.store.recent_delivery_logs(limit).await?;
    Ok(Json(logs))
}
