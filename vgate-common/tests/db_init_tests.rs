//! Tests for database initialization and default settings

use tempfile::TempDir;
use vgate_common::db::{get_setting, init_database, keys, set_setting};

const EXPECTED_TABLES: &[&str] = &[
    "settings",
    "staff_roles",
    "resident_plates",
    "guest_plates",
    "legacy_vehicles",
    "event_guests",
    "access_attempts",
    "access_overrides",
    "ledger_purges",
];

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("vgate.db");
    assert!(!db_path.exists());

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_all_tables_created() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("vgate.db")).await.unwrap();

    for table in EXPECTED_TABLES {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1, "table {} missing", table);
    }
}

#[tokio::test]
async fn test_default_policy_settings_initialized() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("vgate.db")).await.unwrap();

    let threshold: Option<f64> =
        get_setting(&pool, keys::PLATE_CONFIDENCE_THRESHOLD).await.unwrap();
    assert_eq!(threshold, Some(80.0));

    let retention: Option<i64> = get_setting(&pool, keys::ATTEMPT_RETENTION_DAYS).await.unwrap();
    assert_eq!(retention, Some(90));

    let fallback: Option<bool> = get_setting(&pool, keys::ALLOW_PERCEPTION_FALLBACK).await.unwrap();
    assert_eq!(fallback, Some(false));
}

#[tokio::test]
async fn test_reopen_preserves_edited_settings() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("vgate.db");

    let pool = init_database(&db_path).await.unwrap();
    set_setting(&pool, keys::PLATE_CONFIDENCE_THRESHOLD, 65.5).await.unwrap();
    pool.close().await;

    let pool = init_database(&db_path).await.unwrap();
    let threshold: Option<f64> =
        get_setting(&pool, keys::PLATE_CONFIDENCE_THRESHOLD).await.unwrap();
    assert_eq!(threshold, Some(65.5));
}

#[tokio::test]
async fn test_null_setting_reset_to_default() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("vgate.db");

    let pool = init_database(&db_path).await.unwrap();
    sqlx::query("UPDATE settings SET value = NULL WHERE key = ?")
        .bind(keys::VEHICLE_CONFIDENCE_THRESHOLD)
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let pool = init_database(&db_path).await.unwrap();
    let threshold: Option<f64> =
        get_setting(&pool, keys::VEHICLE_CONFIDENCE_THRESHOLD).await.unwrap();
    assert_eq!(threshold, Some(70.0));
}

#[tokio::test]
async fn test_unparseable_setting_is_config_error() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("vgate.db")).await.unwrap();
    set_setting(&pool, keys::ATTEMPT_RETENTION_DAYS, "ninety").await.unwrap();

    let result: vgate_common::Result<Option<i64>> =
        get_setting(&pool, keys::ATTEMPT_RETENTION_DAYS).await;
    assert!(matches!(result, Err(vgate_common::Error::Config(_))));
}

#[tokio::test]
async fn test_override_rows_cascade_with_attempt() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("vgate.db")).await.unwrap();

    sqlx::query(
        r#"
        INSERT INTO access_attempts (
            guid, raw_plate, normalized_plate, perception_confidence, plate_recognized,
            vehicle_recognized, direction, occurred_at, processing_seconds, outcome,
            initial_outcome, reason_code, rationale
        ) VALUES ('a1', 'ABC-123', 'ABC123', 90.0, 1, 1, 'entrada',
                  '2024-01-01T00:00:00.000000Z', 0.1, 'denied', 'denied',
                  'unregistered_low_confidence', 'unregistered plate')
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO access_overrides (attempt_guid, actor, previous_outcome, new_outcome, overridden_at)
         VALUES ('a1', 'guard', 'denied', 'authorized', '2024-01-01T00:01:00.000000Z')",
    )
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query("DELETE FROM access_attempts WHERE guid = 'a1'")
        .execute(&pool)
        .await
        .unwrap();

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM access_overrides")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}
