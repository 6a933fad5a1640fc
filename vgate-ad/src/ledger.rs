//! Access Ledger
//!
//! Append-only record of every decision. Entries are written once by the
//! engine; afterwards only the override workflow touches `outcome`, and
//! only retention deletes rows.

use crate::error::{AccessError, AccessResult};
use crate::models::{
    AccessAttempt, Direction, OverrideRecord, Outcome, PerceptionReport, RawAttempt, ReasonCode,
    Resolution,
};
use crate::registry::{MatchKind, MatchedPlate, RegistrySource};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::{error, info};
use uuid::Uuid;
use vgate_common::time::{from_db, to_db};

/// Rows returned by [`query`] when the caller sets no limit
pub const DEFAULT_QUERY_LIMIT: i64 = 500;
/// Upper bound on rows returned by one [`query`]
pub const MAX_QUERY_LIMIT: i64 = 10_000;

const ATTEMPT_COLUMNS: &str = r#"
    guid, raw_plate, normalized_plate, perception_confidence, plate_recognized,
    vehicle_recognized, detected_make, detected_model, detected_color, direction,
    camera_id, image_url, occurred_at, processing_seconds, outcome, initial_outcome,
    matched_kind, matched_source, matched_guid, matched_plate, matched_holder,
    match_confidence, reason_code, rationale
"#;

/// Filters for [`query`]; every field is optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttemptFilter {
    /// Inclusive lower bound on `occurred_at`
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `occurred_at`
    pub to: Option<DateTime<Utc>>,
    pub outcome: Option<Outcome>,
    pub direction: Option<Direction>,
    pub limit: Option<i64>,
}

/// Append a decision to the ledger
///
/// The row is committed before this returns; an error means the decision
/// was not recorded and must not be reported as made.
pub async fn record(
    pool: &SqlitePool,
    attempt: &RawAttempt,
    resolution: &Resolution,
) -> AccessResult<AccessAttempt> {
    let id = Uuid::new_v4();
    let matched = resolution.matched.as_ref();

    let result = sqlx::query(
        r#"
        INSERT INTO access_attempts (
            guid, raw_plate, normalized_plate, perception_confidence, plate_recognized,
            vehicle_recognized, detected_make, detected_model, detected_color, direction,
            camera_id, image_url, occurred_at, processing_seconds, outcome, initial_outcome,
            matched_kind, matched_source, matched_guid, matched_plate, matched_holder,
            match_confidence, reason_code, rationale
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(&attempt.raw_plate)
    .bind(&attempt.normalized_plate)
    .bind(attempt.perception.confidence)
    .bind(attempt.perception.plate_recognized)
    .bind(attempt.perception.vehicle_recognized)
    .bind(&attempt.perception.make)
    .bind(&attempt.perception.model)
    .bind(&attempt.perception.color)
    .bind(attempt.direction.as_str())
    .bind(&attempt.camera_id)
    .bind(&attempt.image_url)
    .bind(to_db(&attempt.occurred_at))
    .bind(attempt.processing_seconds)
    .bind(resolution.outcome.as_str())
    .bind(resolution.outcome.as_str())
    .bind(matched.map(|m| m.kind.as_str()))
    .bind(matched.map(|m| m.source.as_str()))
    .bind(matched.map(|m| m.record_id.to_string()))
    .bind(matched.map(|m| m.plate.clone()))
    .bind(matched.map(|m| m.holder.clone()))
    .bind(resolution.match_confidence as i64)
    .bind(resolution.reason.as_str())
    .bind(&resolution.rationale)
    .execute(pool)
    .await;

    if let Err(e) = result {
        error!(plate = %attempt.normalized_plate, "Failed to record access attempt: {}", e);
        return Err(AccessError::Persistence(e.to_string()));
    }

    info!(
        attempt_id = %id,
        plate = %attempt.normalized_plate,
        outcome = %resolution.outcome,
        direction = %attempt.direction,
        "Access attempt recorded"
    );

    Ok(AccessAttempt {
        id,
        raw_plate: attempt.raw_plate.clone(),
        normalized_plate: attempt.normalized_plate.clone(),
        perception: attempt.perception.clone(),
        direction: attempt.direction,
        camera_id: attempt.camera_id.clone(),
        image_url: attempt.image_url.clone(),
        occurred_at: attempt.occurred_at,
        processing_seconds: attempt.processing_seconds,
        resolution: resolution.clone(),
        initial_outcome: resolution.outcome,
        overrides: Vec::new(),
    })
}

/// Fetch one ledger entry with its override history
pub async fn get(pool: &SqlitePool, id: Uuid) -> AccessResult<AccessAttempt> {
    let mut conn = pool.acquire().await?;
    get_with(&mut conn, id).await
}

/// [`get`] on an already-acquired connection
async fn get_with(conn: &mut SqliteConnection, id: Uuid) -> AccessResult<AccessAttempt> {
    let sql = format!("SELECT {} FROM access_attempts WHERE guid = ?", ATTEMPT_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AccessError::NotFound { id })?;

    let overrides = sqlx::query(
        r#"
        SELECT attempt_guid, actor, previous_outcome, new_outcome, note, overridden_at
        FROM access_overrides
        WHERE attempt_guid = ?
        ORDER BY id
        "#,
    )
    .bind(id.to_string())
    .fetch_all(&mut *conn)
    .await?
    .iter()
    .map(override_from_row)
    .collect::<AccessResult<Vec<_>>>()?;

    attempt_from_row(&row, overrides)
}

/// Ledger entries matching `filter`, newest first
///
/// Stateless: narrowing a query means issuing a new one.
pub async fn query(pool: &SqlitePool, filter: &AttemptFilter) -> AccessResult<Vec<AccessAttempt>> {
    let limit = filter
        .limit
        .unwrap_or(DEFAULT_QUERY_LIMIT)
        .clamp(1, MAX_QUERY_LIMIT);

    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {} FROM access_attempts WHERE 1 = 1", ATTEMPT_COLUMNS));
    if let Some(from) = &filter.from {
        builder.push(" AND occurred_at >= ").push_bind(to_db(from));
    }
    if let Some(to) = &filter.to {
        builder.push(" AND occurred_at <= ").push_bind(to_db(to));
    }
    if let Some(outcome) = filter.outcome {
        builder.push(" AND outcome = ").push_bind(outcome.as_str());
    }
    if let Some(direction) = filter.direction {
        builder.push(" AND direction = ").push_bind(direction.as_str());
    }
    builder
        .push(" ORDER BY occurred_at DESC, rowid DESC LIMIT ")
        .push_bind(limit);

    let mut conn = pool.acquire().await?;
    let rows = builder.build().fetch_all(&mut *conn).await?;
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<String> = rows
        .iter()
        .map(|row| row.try_get::<String, _>("guid"))
        .collect::<Result<_, _>>()?;
    let mut history = overrides_for(&mut conn, &ids).await?;

    rows.iter()
        .zip(ids.iter())
        .map(|(row, id)| attempt_from_row(row, history.remove(id).unwrap_or_default()))
        .collect()
}

async fn overrides_for(
    conn: &mut SqliteConnection,
    ids: &[String],
) -> AccessResult<HashMap<String, Vec<OverrideRecord>>> {
    let mut history: HashMap<String, Vec<OverrideRecord>> = HashMap::new();

    // Stay well under SQLite's bound-parameter limit
    for chunk in ids.chunks(500) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT attempt_guid, actor, previous_outcome, new_outcome, note, overridden_at \
             FROM access_overrides WHERE attempt_guid IN (",
        );
        let mut separated = builder.separated(", ");
        for id in chunk {
            separated.push_bind(id.as_str());
        }
        separated.push_unseparated(") ORDER BY id");

        for row in builder.build().fetch_all(&mut *conn).await? {
            let guid: String = row.try_get("attempt_guid")?;
            history.entry(guid).or_default().push(override_from_row(&row)?);
        }
    }

    Ok(history)
}

fn corrupt(column: &str, value: &str) -> AccessError {
    AccessError::Persistence(format!("Unexpected {} value '{}' in ledger", column, value))
}

fn parse_outcome(value: &str) -> AccessResult<Outcome> {
    Outcome::parse(value).ok_or_else(|| corrupt("outcome", value))
}

fn parse_uuid(value: &str) -> AccessResult<Uuid> {
    Uuid::parse_str(value).map_err(|_| corrupt("guid", value))
}

fn override_from_row(row: &SqliteRow) -> AccessResult<OverrideRecord> {
    let previous: String = row.try_get("previous_outcome")?;
    let new: String = row.try_get("new_outcome")?;
    let overridden_at: String = row.try_get("overridden_at")?;

    Ok(OverrideRecord {
        actor: row.try_get("actor")?,
        previous_outcome: parse_outcome(&previous)?,
        new_outcome: parse_outcome(&new)?,
        note: row.try_get("note")?,
        overridden_at: from_db(&overridden_at)?,
    })
}

fn matched_from_row(row: &SqliteRow) -> AccessResult<Option<MatchedPlate>> {
    let kind: Option<String> = row.try_get("matched_kind")?;
    let Some(kind) = kind else {
        return Ok(None);
    };

    let source: String = row.try_get("matched_source")?;
    let record_id: String = row.try_get("matched_guid")?;

    Ok(Some(MatchedPlate {
        kind: MatchKind::parse(&kind).ok_or_else(|| corrupt("matched_kind", &kind))?,
        source: RegistrySource::parse(&source).ok_or_else(|| corrupt("matched_source", &source))?,
        record_id: parse_uuid(&record_id)?,
        plate: row.try_get("matched_plate")?,
        holder: row.try_get("matched_holder")?,
    }))
}

fn attempt_from_row(
    row: &SqliteRow,
    overrides: Vec<OverrideRecord>,
) -> AccessResult<AccessAttempt> {
    let guid: String = row.try_get("guid")?;
    let direction: String = row.try_get("direction")?;
    let occurred_at: String = row.try_get("occurred_at")?;
    let outcome: String = row.try_get("outcome")?;
    let initial_outcome: String = row.try_get("initial_outcome")?;
    let reason: String = row.try_get("reason_code")?;
    let match_confidence: i64 = row.try_get("match_confidence")?;

    Ok(AccessAttempt {
        id: parse_uuid(&guid)?,
        raw_plate: row.try_get("raw_plate")?,
        normalized_plate: row.try_get("normalized_plate")?,
        perception: PerceptionReport {
            confidence: row.try_get("perception_confidence")?,
            plate_recognized: row.try_get("plate_recognized")?,
            vehicle_recognized: row.try_get("vehicle_recognized")?,
            make: row.try_get("detected_make")?,
            model: row.try_get("detected_model")?,
            color: row.try_get("detected_color")?,
        },
        direction: Direction::parse(&direction).ok_or_else(|| corrupt("direction", &direction))?,
        camera_id: row.try_get("camera_id")?,
        image_url: row.try_get("image_url")?,
        occurred_at: from_db(&occurred_at)?,
        processing_seconds: row.try_get("processing_seconds")?,
        resolution: Resolution {
            outcome: parse_outcome(&outcome)?,
            matched: matched_from_row(row)?,
            match_confidence: match_confidence.clamp(0, 100) as u8,
            reason: ReasonCode::parse(&reason).ok_or_else(|| corrupt("reason_code", &reason))?,
            rationale: row.try_get("rationale")?,
        },
        initial_outcome: parse_outcome(&initial_outcome)?,
        overrides,
    })
}
