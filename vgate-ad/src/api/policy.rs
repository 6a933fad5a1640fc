//! Access policy endpoints
//!
//! GET returns the policy in force. PUT changes it (administrators only),
//! persists it to the settings table and swaps it into the shared state so
//! the next request decides under the new values.

use super::require_actor;
use crate::authz::{self, Action};
use crate::error::AccessError;
use crate::policy::AccessPolicyConfig;
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{rejection::JsonRejection, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::info;
use vgate_common::time::now;
use vgate_common::GateEvent;

/// PUT body; omitted fields keep their current value
#[derive(Debug, Deserialize)]
pub struct PolicyUpdateRequest {
    pub actor: String,
    pub plate_confidence_threshold: Option<f64>,
    pub vehicle_confidence_threshold: Option<f64>,
    pub max_processing_seconds: Option<f64>,
    pub attempt_retention_days: Option<i64>,
    pub allow_perception_fallback: Option<bool>,
}

impl PolicyUpdateRequest {
    fn apply_to(&self, current: &AccessPolicyConfig) -> AccessPolicyConfig {
        AccessPolicyConfig {
            plate_confidence_threshold: self
                .plate_confidence_threshold
                .unwrap_or(current.plate_confidence_threshold),
            vehicle_confidence_threshold: self
                .vehicle_confidence_threshold
                .unwrap_or(current.vehicle_confidence_threshold),
            max_processing_seconds: self
                .max_processing_seconds
                .unwrap_or(current.max_processing_seconds),
            attempt_retention_days: self
                .attempt_retention_days
                .unwrap_or(current.attempt_retention_days),
            allow_perception_fallback: self
                .allow_perception_fallback
                .unwrap_or(current.allow_perception_fallback),
        }
    }
}

/// GET /api/access/policy
pub async fn get_policy(State(state): State<AppState>) -> Json<AccessPolicyConfig> {
    Json(state.current_policy().await)
}

/// PUT /api/access/policy
pub async fn update_policy(
    State(state): State<AppState>,
    payload: Result<Json<PolicyUpdateRequest>, JsonRejection>,
) -> ApiResult<Json<AccessPolicyConfig>> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let actor = require_actor(&request.actor)?;
    authz::require(&state.db, actor, Action::EditPolicy).await?;

    // Held across the save so concurrent updates apply one after another
    let mut policy = state.policy.write().await;
    let updated = request.apply_to(&policy);
    updated.save(&state.db).await.map_err(AccessError::from)?;
    *policy = updated.clone();
    drop(policy);

    info!(actor = %actor, ?updated, "Access policy updated");
    state.event_bus.emit_lossy(GateEvent::PolicyUpdated {
        actor: actor.to_string(),
        timestamp: now(),
    });

    Ok(Json(updated))
}

pub fn policy_routes() -> Router<AppState> {
    Router::new().route("/api/access/policy", get(get_policy).put(update_policy))
}
