//! HTTP API handlers for vgate-ad

pub mod access;
pub mod health;
pub mod overrides;
pub mod policy;
pub mod retention;
pub mod sse;

pub use access::access_routes;
pub use health::health_routes;
pub use overrides::override_routes;
pub use policy::policy_routes;
pub use retention::retention_routes;
pub use sse::event_stream;

use crate::ApiError;
use uuid::Uuid;

/// Parse an attempt id from a path segment
pub(crate) fn parse_attempt_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid attempt id: {}", raw)))
}

/// Reject a missing or blank actor
pub(crate) fn require_actor(actor: &str) -> Result<&str, ApiError> {
    let actor = actor.trim();
    if actor.is_empty() {
        return Err(ApiError::BadRequest("actor is required".to_string()));
    }
    Ok(actor)
}
