//! vgate-ad library - Access Decision module
//!
//! Decides whether a vehicle detected at the condominium gate may pass,
//! records every decision in an append-only ledger and lets access-control
//! staff override outcomes.

pub mod api;
pub mod authz;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod models;
pub mod overrides;
pub mod plate;
pub mod policy;
pub mod registry;
pub mod retention;

pub use crate::error::{AccessError, AccessResult, ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use policy::AccessPolicyConfig;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use vgate_common::EventBus;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Gate events for SSE subscribers
    pub event_bus: EventBus,
    /// Loaded once at startup; replaced wholesale on policy update
    pub policy: Arc<RwLock<AccessPolicyConfig>>,
    /// For uptime in /health
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, event_bus: EventBus, policy: AccessPolicyConfig) -> Self {
        Self {
            db,
            event_bus,
            policy: Arc::new(RwLock::new(policy)),
            startup_time: Utc::now(),
        }
    }

    /// Copy of the current policy for one request
    pub async fn current_policy(&self) -> AccessPolicyConfig {
        self.policy.read().await.clone()
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::access_routes())
        .merge(api::override_routes())
        .merge(api::retention_routes())
        .merge(api::policy_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
