//! Shared fixtures for vgate-ad integration tests
//!
//! Every test gets its own file database in a temporary directory,
//! initialized through the production `init_database`.

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;
use vgate_ad::authz::{assign_role, Role};
use vgate_ad::models::{DetectionEvent, Direction};
use vgate_common::time::to_db;

pub const ADMIN: &str = "admin@condo";
pub const GUARD: &str = "guard@condo";
pub const RESIDENT: &str = "resident@condo";

pub struct TestDb {
    pub pool: SqlitePool,
    // Keeps the directory alive for the pool's lifetime
    _dir: TempDir,
}

pub async fn test_db() -> TestDb {
    let dir = TempDir::new().unwrap();
    let pool = vgate_common::db::init_database(&dir.path().join("vgate.db"))
        .await
        .unwrap();
    TestDb { pool, _dir: dir }
}

/// Database with one actor per role of interest
pub async fn test_db_with_staff() -> TestDb {
    let db = test_db().await;
    assign_role(&db.pool, ADMIN, Role::Administrator).await.unwrap();
    assign_role(&db.pool, GUARD, Role::Security).await.unwrap();
    assign_role(&db.pool, RESIDENT, Role::Resident).await.unwrap();
    db
}

pub async fn seed_resident(
    pool: &SqlitePool,
    plate: &str,
    owner_ref: &str,
    owner_name: &str,
) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO resident_plates (guid, plate, owner_ref, owner_name, make, model, color, active, registered_at)
        VALUES (?, ?, ?, ?, 'Mazda', '3', 'red', 1, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(plate)
    .bind(owner_ref)
    .bind(owner_name)
    .bind(to_db(&Utc::now()))
    .execute(pool)
    .await
    .unwrap();
    id
}

pub async fn seed_guest(
    pool: &SqlitePool,
    plate: &str,
    sponsor_ref: &str,
    visitor_name: &str,
    valid_from: DateTime<Utc>,
    valid_until: DateTime<Utc>,
) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO guest_plates (guid, plate, sponsor_ref, visitor_name, valid_from, valid_until, active, registered_at)
        VALUES (?, ?, ?, ?, ?, ?, 1, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(plate)
    .bind(sponsor_ref)
    .bind(visitor_name)
    .bind(to_db(&valid_from))
    .bind(to_db(&valid_until))
    .bind(to_db(&Utc::now()))
    .execute(pool)
    .await
    .unwrap();
    id
}

/// Guest valid from ten days ago through three days ago
pub async fn seed_expired_guest(pool: &SqlitePool, plate: &str) -> Uuid {
    let now = Utc::now();
    seed_guest(
        pool,
        plate,
        "apt-7",
        "Expired Visitor",
        now - Duration::days(10),
        now - Duration::days(3),
    )
    .await
}

/// Guest valid from yesterday through tomorrow
pub async fn seed_current_guest(pool: &SqlitePool, plate: &str, visitor_name: &str) -> Uuid {
    let now = Utc::now();
    seed_guest(
        pool,
        plate,
        "apt-12",
        visitor_name,
        now - Duration::days(1),
        now + Duration::days(1),
    )
    .await
}

pub fn detection(plate: &str, confidence: f64, plate_recognized: bool) -> DetectionEvent {
    DetectionEvent {
        plate: plate.to_string(),
        confidence,
        plate_recognized,
        vehicle_recognized: true,
        direction: Some(Direction::Entry),
        camera_id: Some("gate-north".to_string()),
        processing_seconds: Some(0.4),
        ..Default::default()
    }
}

/// Move an attempt's timestamp, for retention tests
pub async fn backdate_attempt(pool: &SqlitePool, id: Uuid, occurred_at: DateTime<Utc>) {
    sqlx::query("UPDATE access_attempts SET occurred_at = ? WHERE guid = ?")
        .bind(to_db(&occurred_at))
        .bind(id.to_string())
        .execute(pool)
        .await
        .unwrap();
}
