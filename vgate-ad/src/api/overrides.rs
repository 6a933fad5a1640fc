//! Manual authorize/deny endpoints

use super::{parse_attempt_id, require_actor};
use crate::models::AccessAttempt;
use crate::overrides::{authorize_manually, deny_manually};
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;

/// Body of both override endpoints
#[derive(Debug, Deserialize)]
pub struct OverrideRequest {
    pub actor: String,
    #[serde(default)]
    pub note: Option<String>,
}

/// POST /api/access/attempts/:id/authorize
pub async fn authorize_attempt(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<OverrideRequest>, JsonRejection>,
) -> ApiResult<Json<AccessAttempt>> {
    let id = parse_attempt_id(&id)?;
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let actor = require_actor(&request.actor)?;

    let attempt = authorize_manually(
        &state.db,
        &state.event_bus,
        id,
        actor,
        request.note.as_deref(),
    )
    .await?;
    Ok(Json(attempt))
}

/// POST /api/access/attempts/:id/deny
pub async fn deny_attempt(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<OverrideRequest>, JsonRejection>,
) -> ApiResult<Json<AccessAttempt>> {
    let id = parse_attempt_id(&id)?;
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let actor = require_actor(&request.actor)?;

    let attempt = deny_manually(
        &state.db,
        &state.event_bus,
        id,
        actor,
        request.note.as_deref(),
    )
    .await?;
    Ok(Json(attempt))
}

pub fn override_routes() -> Router<AppState> {
    Router::new()
        .route("/api/access/attempts/:id/authorize", post(authorize_attempt))
        .route("/api/access/attempts/:id/deny", post(deny_attempt))
}
