//! Retention & Diagnostics
//!
//! Purges are administrator-only hard deletes. Each one is recorded in
//! `ledger_purges` inside the same transaction as the delete.
//!
//! Diagnostics aggregate the trailing window of the ledger into rates and a
//! short list of advisory recommendations. Nothing here changes decisions.

use crate::authz::{self, Action};
use crate::error::{AccessError, AccessResult};
use crate::policy::AccessPolicyConfig;
use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use tracing::{error, info};
use uuid::Uuid;
use vgate_common::time::{now, to_db};
use vgate_common::{EventBus, GateEvent};

/// Longest diagnostics window accepted
pub const MAX_WINDOW_DAYS: i64 = 3650;

/// Latest year that stores as a four-digit timestamp
const MAX_CUTOFF_YEAR: i32 = 9999;

pub const RECOMMEND_NO_TRAFFIC: &str =
    "No access attempts in this window; check camera connectivity";
pub const RECOMMEND_LOW_CONFIDENCE: &str =
    "Average perception confidence is below 60; review camera placement and lighting or the plate confidence threshold";
pub const RECOMMEND_HIGH_DENIALS: &str =
    "More than half of attempts were denied; review resident and guest registry completeness";
pub const RECOMMEND_HIGH_PENDING: &str =
    "More than 30% of attempts needed manual review; register frequent visitors or revisit the plate confidence threshold";
pub const RECOMMEND_SLOW_PIPELINE: &str =
    "Some attempts exceeded the processing budget; review perception pipeline latency";
pub const RECOMMEND_VEHICLE_RECOGNITION: &str =
    "Vehicle attributes were missed on more than half of attempts; review vehicle recognition";

/// Result of one purge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurgeReport {
    pub purge_id: Uuid,
    pub actor: String,
    pub cutoff: DateTime<Utc>,
    pub deleted_attempts: u64,
    pub purged_at: DateTime<Utc>,
}

/// Hard-delete every ledger entry strictly older than `cutoff`
///
/// Override history goes with its attempt (`ON DELETE CASCADE`). Running
/// the same purge twice deletes nothing the second time. Cutoffs outside
/// years 0-9999 are rejected: they do not compare correctly against the
/// stored text timestamps.
pub async fn purge_older_than(
    pool: &SqlitePool,
    bus: &EventBus,
    actor: &str,
    cutoff: DateTime<Utc>,
) -> AccessResult<PurgeReport> {
    authz::require(pool, actor, Action::Purge).await?;

    if !(0..=MAX_CUTOFF_YEAR).contains(&cutoff.year()) {
        return Err(AccessError::InvalidInput(format!(
            "purge cutoff must fall within years 0-{}, got {}",
            MAX_CUTOFF_YEAR, cutoff
        )));
    }

    let purge_id = Uuid::new_v4();
    let purged_at = now();

    let mut tx = pool.begin().await?;
    let deleted_attempts = sqlx::query("DELETE FROM access_attempts WHERE occurred_at < ?")
        .bind(to_db(&cutoff))
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!(actor = %actor, "Ledger purge failed: {}", e);
            AccessError::Persistence(e.to_string())
        })?
        .rows_affected();

    sqlx::query(
        r#"
        INSERT INTO ledger_purges (guid, actor, cutoff, deleted_attempts, purged_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(purge_id.to_string())
    .bind(actor)
    .bind(to_db(&cutoff))
    .bind(deleted_attempts as i64)
    .bind(to_db(&purged_at))
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(
        actor = %actor,
        cutoff = %to_db(&cutoff),
        deleted_attempts,
        "Access ledger purged"
    );

    bus.emit_lossy(GateEvent::LedgerPurged {
        actor: actor.to_string(),
        cutoff,
        deleted_attempts,
        timestamp: purged_at,
    });

    Ok(PurgeReport {
        purge_id,
        actor: actor.to_string(),
        cutoff,
        deleted_attempts,
        purged_at,
    })
}

/// Purge everything outside the configured retention window
pub async fn purge_expired(
    pool: &SqlitePool,
    bus: &EventBus,
    actor: &str,
    config: &AccessPolicyConfig,
) -> AccessResult<PurgeReport> {
    let cutoff = now() - Duration::days(config.attempt_retention_days);
    purge_older_than(pool, bus, actor, cutoff).await
}

/// Raw counts for one diagnostics window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowTotals {
    pub total: u64,
    pub authorized: u64,
    pub denied: u64,
    pub pending: u64,
    /// `None` when the window is empty
    pub avg_perception_confidence: Option<f64>,
    pub overrides: u64,
    pub over_budget: u64,
    /// Vehicle not recognized, or perception below the vehicle threshold
    pub vehicle_shortfall: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsReport {
    pub window_days: i64,
    pub since: DateTime<Utc>,
    pub total_attempts: u64,
    pub authorized: u64,
    pub denied: u64,
    pub pending: u64,
    /// Percentages, 0-100
    pub approval_rate: f64,
    pub denial_rate: f64,
    pub pending_rate: f64,
    pub avg_perception_confidence: f64,
    pub overrides: u64,
    pub over_budget: u64,
    pub vehicle_shortfall_rate: f64,
    pub recommendations: Vec<String>,
}

/// Aggregate the trailing `window_days` of the ledger
pub async fn diagnostics(
    pool: &SqlitePool,
    config: &AccessPolicyConfig,
    window_days: i64,
) -> AccessResult<DiagnosticsReport> {
    if !(1..=MAX_WINDOW_DAYS).contains(&window_days) {
        return Err(AccessError::InvalidInput(format!(
            "window_days must be between 1 and {}, got {}",
            MAX_WINDOW_DAYS, window_days
        )));
    }

    let since = now() - Duration::days(window_days);
    let since_db = to_db(&since);

    let mut tx = pool.begin().await?;
    let row = sqlx::query(
        r#"
        SELECT
            COUNT(*) AS total,
            COALESCE(SUM(outcome = 'authorized'), 0) AS authorized,
            COALESCE(SUM(outcome = 'denied'), 0) AS denied,
            COALESCE(SUM(outcome = 'pending'), 0) AS pending,
            AVG(perception_confidence) AS avg_confidence,
            COALESCE(SUM(processing_seconds > ?), 0) AS over_budget,
            COALESCE(SUM(vehicle_recognized = 0 OR perception_confidence < ?), 0) AS vehicle_shortfall
        FROM access_attempts
        WHERE occurred_at >= ?
        "#,
    )
    .bind(config.max_processing_seconds)
    .bind(config.vehicle_confidence_threshold)
    .bind(&since_db)
    .fetch_one(&mut *tx)
    .await?;

    let overrides: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM access_overrides WHERE overridden_at >= ?")
            .bind(&since_db)
            .fetch_one(&mut *tx)
            .await?;
    tx.commit().await?;

    let count = |column: &str| -> AccessResult<u64> {
        let value: i64 = row.try_get(column)?;
        Ok(value.max(0) as u64)
    };

    let totals = WindowTotals {
        total: count("total")?,
        authorized: count("authorized")?,
        denied: count("denied")?,
        pending: count("pending")?,
        avg_perception_confidence: row.try_get("avg_confidence")?,
        overrides: overrides.max(0) as u64,
        over_budget: count("over_budget")?,
        vehicle_shortfall: count("vehicle_shortfall")?,
    };

    Ok(build_report(&totals, window_days, since))
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

/// Turn window totals into rates and recommendations
pub fn build_report(
    totals: &WindowTotals,
    window_days: i64,
    since: DateTime<Utc>,
) -> DiagnosticsReport {
    let approval_rate = percent(totals.authorized, totals.total);
    let denial_rate = percent(totals.denied, totals.total);
    let pending_rate = percent(totals.pending, totals.total);
    let vehicle_shortfall_rate = percent(totals.vehicle_shortfall, totals.total);
    let avg_perception_confidence = totals.avg_perception_confidence.unwrap_or(0.0);

    let mut recommendations = Vec::new();
    if totals.total == 0 {
        recommendations.push(RECOMMEND_NO_TRAFFIC.to_string());
    } else {
        if avg_perception_confidence < 60.0 {
            recommendations.push(RECOMMEND_LOW_CONFIDENCE.to_string());
        }
        if denial_rate > 50.0 {
            recommendations.push(RECOMMEND_HIGH_DENIALS.to_string());
        }
        if pending_rate > 30.0 {
            recommendations.push(RECOMMEND_HIGH_PENDING.to_string());
        }
        if totals.over_budget > 0 {
            recommendations.push(RECOMMEND_SLOW_PIPELINE.to_string());
        }
        if vehicle_shortfall_rate > 50.0 {
            recommendations.push(RECOMMEND_VEHICLE_RECOGNITION.to_string());
        }
    }

    DiagnosticsReport {
        window_days,
        since,
        total_attempts: totals.total,
        authorized: totals.authorized,
        denied: totals.denied,
        pending: totals.pending,
        approval_rate,
        denial_rate,
        pending_rate,
        avg_perception_confidence,
        overrides: totals.overrides,
        over_budget: totals.over_budget,
        vehicle_shortfall_rate,
        recommendations,
    }
}
