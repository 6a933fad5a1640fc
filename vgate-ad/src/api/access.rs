//! Detection intake and ledger reads
//!
//! POST /api/access/attempts
//! GET  /api/access/attempts
//! GET  /api/access/attempts/:id

use super::parse_attempt_id;
use crate::engine::{self, Decision};
use crate::ledger::{self, AttemptFilter};
use crate::models::{AccessAttempt, DetectionEvent};
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct AttemptListResponse {
    pub count: usize,
    pub attempts: Vec<AccessAttempt>,
}

/// POST /api/access/attempts
///
/// Accepts a perception event and returns the recorded decision with its
/// `mensaje`. Nothing is returned unless the ledger write succeeded.
pub async fn register_attempt(
    State(state): State<AppState>,
    payload: Result<Json<DetectionEvent>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Decision>)> {
    let Json(event) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let policy = state.current_policy().await;
    let decision = engine::evaluate(&state.db, &state.event_bus, &policy, event).await?;
    Ok((StatusCode::CREATED, Json(decision)))
}

/// GET /api/access/attempts/:id
pub async fn get_attempt(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<AccessAttempt>> {
    let id = parse_attempt_id(&id)?;
    Ok(Json(ledger::get(&state.db, id).await?))
}

/// GET /api/access/attempts?from&to&outcome&direction&limit
///
/// Newest first. `from` and `to` are RFC 3339 timestamps, both inclusive.
pub async fn list_attempts(
    State(state): State<AppState>,
    filter: Result<Query<AttemptFilter>, QueryRejection>,
) -> ApiResult<Json<AttemptListResponse>> {
    let Query(filter) = filter.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    if let (Some(from), Some(to)) = (&filter.from, &filter.to) {
        if from > to {
            return Err(ApiError::BadRequest("from must not be after to".to_string()));
        }
    }

    let attempts = ledger::query(&state.db, &filter).await?;
    Ok(Json(AttemptListResponse {
        count: attempts.len(),
        attempts,
    }))
}

pub fn access_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/access/attempts",
            get(list_attempts).post(register_attempt),
        )
        .route("/api/access/attempts/:id", get(get_attempt))
}
