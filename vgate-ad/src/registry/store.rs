//! SQLite-backed registry snapshots
//!
//! All four registries are read inside one transaction, so a single
//! `resolve` never sees a plate deactivated halfway through the lookup.

use super::{GuestPlate, RegistrySnapshot, ResidentPlate, VehicleDescriptor};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;
use vgate_common::time::from_db;
use vgate_common::{Error, Result};

/// Load every active registry record, in registry order
pub async fn load_snapshot(pool: &SqlitePool) -> Result<RegistrySnapshot> {
    let mut tx = pool.begin().await?;

    let residents = sqlx::query(
        r#"
        SELECT guid, plate, owner_ref, owner_name, make, model, color, active, registered_at
        FROM resident_plates
        WHERE active = 1
        ORDER BY registered_at, rowid
        "#,
    )
    .fetch_all(&mut *tx)
    .await?;

    let guests = sqlx::query(
        r#"
        SELECT guid, plate, sponsor_ref, visitor_name, make, model, color,
               NULL AS event_ref, valid_from, valid_until, active
        FROM guest_plates
        WHERE active = 1
        ORDER BY registered_at, rowid
        "#,
    )
    .fetch_all(&mut *tx)
    .await?;

    let legacy_vehicles = sqlx::query(
        r#"
        SELECT guid, plate, owner_ref, owner_name, make, model, color, active, registered_at
        FROM legacy_vehicles
        WHERE active = 1
        ORDER BY registered_at, rowid
        "#,
    )
    .fetch_all(&mut *tx)
    .await?;

    let event_guests = sqlx::query(
        r#"
        SELECT guid, plate, sponsor_ref, visitor_name, NULL AS make, NULL AS model, NULL AS color,
               event_ref, valid_from, valid_until, active
        FROM event_guests
        WHERE active = 1
        ORDER BY registered_at, rowid
        "#,
    )
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(RegistrySnapshot {
        residents: residents.iter().map(resident_from_row).collect::<Result<_>>()?,
        guests: guests.iter().map(guest_from_row).collect::<Result<_>>()?,
        legacy_vehicles: legacy_vehicles
            .iter()
            .map(resident_from_row)
            .collect::<Result<_>>()?,
        event_guests: event_guests.iter().map(guest_from_row).collect::<Result<_>>()?,
    })
}

fn parse_guid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Invalid guid '{}': {}", value, e)))
}

fn vehicle_from_row(row: &SqliteRow) -> Result<VehicleDescriptor> {
    Ok(VehicleDescriptor {
        make: row.try_get("make")?,
        model: row.try_get("model")?,
        color: row.try_get("color")?,
    })
}

fn resident_from_row(row: &SqliteRow) -> Result<ResidentPlate> {
    let guid: String = row.try_get("guid")?;
    let registered_at: String = row.try_get("registered_at")?;
    let active: i64 = row.try_get("active")?;

    Ok(ResidentPlate {
        id: parse_guid(&guid)?,
        plate: row.try_get("plate")?,
        owner_ref: row.try_get("owner_ref")?,
        owner_name: row.try_get("owner_name")?,
        vehicle: vehicle_from_row(row)?,
        active: active != 0,
        registered_at: from_db(&registered_at)?,
    })
}

fn guest_from_row(row: &SqliteRow) -> Result<GuestPlate> {
    let guid: String = row.try_get("guid")?;
    let valid_from: String = row.try_get("valid_from")?;
    let valid_until: String = row.try_get("valid_until")?;
    let active: i64 = row.try_get("active")?;

    Ok(GuestPlate {
        id: parse_guid(&guid)?,
        plate: row.try_get("plate")?,
        sponsor_ref: row.try_get("sponsor_ref")?,
        visitor_name: row.try_get("visitor_name")?,
        vehicle: vehicle_from_row(row)?,
        event_ref: row.try_get("event_ref")?,
        valid_from: from_db(&valid_from)?,
        valid_until: from_db(&valid_until)?,
        active: active != 0,
    })
}
