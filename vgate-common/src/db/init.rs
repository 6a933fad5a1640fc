//! Database initialization
//!
//! Creates the database on first run, applies the schema (idempotent) and
//! seeds default access policy settings without overwriting edited values.

use crate::db::settings::ensure_setting;
use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Setting keys for the access policy singleton
pub mod keys {
    pub const PLATE_CONFIDENCE_THRESHOLD: &str = "access_plate_confidence_threshold";
    pub const VEHICLE_CONFIDENCE_THRESHOLD: &str = "access_vehicle_confidence_threshold";
    pub const MAX_PROCESSING_SECONDS: &str = "access_max_processing_seconds";
    pub const ATTEMPT_RETENTION_DAYS: &str = "access_attempt_retention_days";
    pub const ALLOW_PERCEPTION_FALLBACK: &str = "access_allow_perception_fallback";
}

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Pragmas are per connection
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        // WAL: concurrent readers alongside the single ledger writer
        .journal_mode(SqliteJournalMode::Wal)
        // Ledger writes must be on disk before a decision is reported
        .synchronous(SqliteSynchronous::Full)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    init_schema(&pool).await?;

    Ok(pool)
}

/// Create tables and seed default settings on an open pool
///
/// Safe to call repeatedly.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_staff_roles_table(pool).await?;

    // Registries (owned by the surrounding CRUD system, read here)
    create_resident_plates_table(pool).await?;
    create_guest_plates_table(pool).await?;
    create_legacy_vehicles_table(pool).await?;
    create_event_guests_table(pool).await?;

    // Access ledger
    create_access_attempts_table(pool).await?;
    create_access_overrides_table(pool).await?;
    create_ledger_purges_table(pool).await?;

    init_default_settings(pool).await?;

    Ok(())
}

/// Create the settings table
///
/// Stores application configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_staff_roles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS staff_roles (
            actor TEXT PRIMARY KEY,
            role TEXT NOT NULL,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_resident_plates_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS resident_plates (
            guid TEXT PRIMARY KEY,
            plate TEXT NOT NULL,
            owner_ref TEXT NOT NULL,
            owner_name TEXT,
            make TEXT,
            model TEXT,
            color TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            registered_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_resident_plates_active ON resident_plates(active)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_guest_plates_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS guest_plates (
            guid TEXT PRIMARY KEY,
            plate TEXT NOT NULL,
            sponsor_ref TEXT NOT NULL,
            visitor_name TEXT,
            make TEXT,
            model TEXT,
            color TEXT,
            valid_from TEXT NOT NULL,
            valid_until TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            registered_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Alternate vehicle table kept by older parts of the surrounding system
async fn create_legacy_vehicles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS legacy_vehicles (
            guid TEXT PRIMARY KEY,
            plate TEXT NOT NULL,
            owner_ref TEXT NOT NULL,
            owner_name TEXT,
            make TEXT,
            model TEXT,
            color TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            registered_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Guests bound to a scheduled event
async fn create_event_guests_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS event_guests (
            guid TEXT PRIMARY KEY,
            plate TEXT NOT NULL,
            event_ref TEXT NOT NULL,
            sponsor_ref TEXT NOT NULL,
            visitor_name TEXT,
            valid_from TEXT NOT NULL,
            valid_until TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            registered_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_access_attempts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS access_attempts (
            guid TEXT PRIMARY KEY,
            raw_plate TEXT NOT NULL,
            normalized_plate TEXT NOT NULL,
            perception_confidence REAL NOT NULL,
            plate_recognized INTEGER NOT NULL,
            vehicle_recognized INTEGER NOT NULL,
            detected_make TEXT,
            detected_model TEXT,
            detected_color TEXT,
            direction TEXT NOT NULL CHECK (direction IN ('entrada', 'salida')),
            camera_id TEXT,
            image_url TEXT,
            occurred_at TEXT NOT NULL,
            processing_seconds REAL NOT NULL,
            outcome TEXT NOT NULL CHECK (outcome IN ('authorized', 'denied', 'pending')),
            initial_outcome TEXT NOT NULL,
            matched_kind TEXT,
            matched_source TEXT,
            matched_guid TEXT,
            matched_plate TEXT,
            matched_holder TEXT,
            match_confidence INTEGER NOT NULL DEFAULT 0,
            reason_code TEXT NOT NULL,
            rationale TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_access_attempts_occurred ON access_attempts(occurred_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_access_overrides_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS access_overrides (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            attempt_guid TEXT NOT NULL REFERENCES access_attempts(guid) ON DELETE CASCADE,
            actor TEXT NOT NULL,
            previous_outcome TEXT NOT NULL,
            new_outcome TEXT NOT NULL,
            note TEXT,
            overridden_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_access_overrides_attempt ON access_overrides(attempt_guid)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_ledger_purges_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ledger_purges (
            guid TEXT PRIMARY KEY,
            actor TEXT NOT NULL,
            cutoff TEXT NOT NULL,
            deleted_attempts INTEGER NOT NULL,
            purged_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Seed access policy defaults
///
/// Existing values are never overwritten; NULL values are reset.
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    ensure_setting(pool, keys::PLATE_CONFIDENCE_THRESHOLD, "80").await?;
    ensure_setting(pool, keys::VEHICLE_CONFIDENCE_THRESHOLD, "70").await?;
    ensure_setting(pool, keys::MAX_PROCESSING_SECONDS, "5.0").await?;
    ensure_setting(pool, keys::ATTEMPT_RETENTION_DAYS, "90").await?;
    ensure_setting(pool, keys::ALLOW_PERCEPTION_FALLBACK, "false").await?;

    Ok(())
}
