//! Purge and diagnostics endpoints

use super::require_actor;
use crate::retention::{self, DiagnosticsReport, PurgeReport};
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Diagnostics window when `days` is not given
pub const DEFAULT_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Deserialize)]
pub struct PurgeRequest {
    pub actor: String,
    /// Defaults to now minus the configured retention window
    #[serde(default)]
    pub cutoff: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct DiagnosticsQuery {
    pub days: Option<i64>,
}

/// POST /api/access/purge
pub async fn purge_ledger(
    State(state): State<AppState>,
    payload: Result<Json<PurgeRequest>, JsonRejection>,
) -> ApiResult<Json<PurgeReport>> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let actor = require_actor(&request.actor)?;

    let report = match request.cutoff {
        Some(cutoff) => {
            retention::purge_older_than(&state.db, &state.event_bus, actor, cutoff).await?
        }
        None => {
            let policy = state.current_policy().await;
            retention::purge_expired(&state.db, &state.event_bus, actor, &policy).await?
        }
    };
    Ok(Json(report))
}

/// GET /api/access/diagnostics?days=
pub async fn get_diagnostics(
    State(state): State<AppState>,
    query: Result<Query<DiagnosticsQuery>, QueryRejection>,
) -> ApiResult<Json<DiagnosticsReport>> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let policy = state.current_policy().await;
    let report = retention::diagnostics(
        &state.db,
        &policy,
        query.days.unwrap_or(DEFAULT_WINDOW_DAYS),
    )
    .await?;
    Ok(Json(report))
}

pub fn retention_routes() -> Router<AppState> {
    Router::new()
        .route("/api/access/purge", post(purge_ledger))
        .route("/api/access/diagnostics", get(get_diagnostics))
}
