//! Override Workflow
//!
//! The only path that changes a recorded outcome. The update is a
//! compare-and-swap on the outcome the caller validated against, so of two
//! racing overrides the second fails with `InvalidTransition` instead of
//! overwriting the first.

use crate::authz::{self, Action};
use crate::error::{AccessError, AccessResult};
use crate::ledger;
use crate::models::{AccessAttempt, Outcome};
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;
use vgate_common::time::{now, to_db};
use vgate_common::{EventBus, GateEvent};

/// Move an attempt to `authorized`
pub async fn authorize_manually(
    pool: &SqlitePool,
    bus: &EventBus,
    id: Uuid,
    actor: &str,
    note: Option<&str>,
) -> AccessResult<AccessAttempt> {
    apply(pool, bus, id, actor, note, Outcome::Authorized).await
}

/// Move an attempt to `denied`
pub async fn deny_manually(
    pool: &SqlitePool,
    bus: &EventBus,
    id: Uuid,
    actor: &str,
    note: Option<&str>,
) -> AccessResult<AccessAttempt> {
    apply(pool, bus, id, actor, note, Outcome::Denied).await
}

async fn apply(
    pool: &SqlitePool,
    bus: &EventBus,
    id: Uuid,
    actor: &str,
    note: Option<&str>,
    target: Outcome,
) -> AccessResult<AccessAttempt> {
    authz::require(pool, actor, Action::Override).await?;

    let current: String = sqlx::query_scalar("SELECT outcome FROM access_attempts WHERE guid = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or(AccessError::NotFound { id })?;
    let current = Outcome::parse(&current).ok_or_else(|| {
        AccessError::Persistence(format!("Unexpected outcome value '{}' in ledger", current))
    })?;

    if !current.can_transition_to(target) {
        warn!(attempt_id = %id, actor = %actor, from = %current, to = %target, "Override rejected");
        return Err(AccessError::InvalidTransition {
            id,
            from: current,
            to: target,
        });
    }

    let note = note.map(str::trim).filter(|n| !n.is_empty());
    let overridden_at = now();

    // The UPDATE is the first statement so the transaction takes the write
    // lock immediately
    let mut tx = pool.begin().await?;
    let updated =
        sqlx::query("UPDATE access_attempts SET outcome = ? WHERE guid = ? AND outcome = ?")
            .bind(target.as_str())
            .bind(id.to_string())
            .bind(current.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();

    if updated == 0 {
        tx.rollback().await?;
        warn!(attempt_id = %id, actor = %actor, "Override lost a race with a concurrent change");
        return Err(AccessError::InvalidTransition {
            id,
            from: current,
            to: target,
        });
    }

    sqlx::query(
        r#"
        INSERT INTO access_overrides (attempt_guid, actor, previous_outcome, new_outcome, note, overridden_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(actor)
    .bind(current.as_str())
    .bind(target.as_str())
    .bind(note)
    .bind(to_db(&overridden_at))
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(attempt_id = %id, actor = %actor, from = %current, to = %target, "Attempt overridden");

    bus.emit_lossy(GateEvent::AccessOverridden {
        attempt_id: id,
        actor: actor.to_string(),
        previous_outcome: current.as_str().to_string(),
        new_outcome: target.as_str().to_string(),
        timestamp: overridden_at,
    });

    ledger::get(pool, id).await
}
