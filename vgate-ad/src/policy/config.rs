//! Access policy configuration
//!
//! A single value object loaded from the `settings` table once at startup
//! and passed explicitly to the decision policy, retention and diagnostics.
//! Defaults are seeded by `vgate_common::db::init_database`.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use vgate_common::db::{get_setting, keys, set_setting};
use vgate_common::{Error, Result};

/// Upper bound on the retention window (100 years)
pub const MAX_RETENTION_DAYS: i64 = 36_500;

/// Thresholds and windows governing access decisions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessPolicyConfig {
    /// Minimum perception confidence for an unregistered plate to go to
    /// manual review instead of being denied
    pub plate_confidence_threshold: f64,

    /// Minimum perception confidence for vehicle attributes to count as
    /// recognized in diagnostics
    pub vehicle_confidence_threshold: f64,

    /// Processing time budget per detection, in seconds
    pub max_processing_seconds: f64,

    /// Age after which ledger entries are eligible for purge
    pub attempt_retention_days: i64,

    /// When the registry cannot be read: decide as if nothing matched
    /// (true) or fail the request (false)
    pub allow_perception_fallback: bool,
}

impl Default for AccessPolicyConfig {
    fn default() -> Self {
        Self {
            plate_confidence_threshold: 80.0,
            vehicle_confidence_threshold: 70.0,
            max_processing_seconds: 5.0,
            attempt_retention_days: 90,
            allow_perception_fallback: false,
        }
    }
}

impl AccessPolicyConfig {
    /// Load from the settings table; absent keys take the compiled default
    pub async fn load(pool: &SqlitePool) -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            plate_confidence_threshold: get_setting(pool, keys::PLATE_CONFIDENCE_THRESHOLD)
                .await?
                .unwrap_or(defaults.plate_confidence_threshold),
            vehicle_confidence_threshold: get_setting(pool, keys::VEHICLE_CONFIDENCE_THRESHOLD)
                .await?
                .unwrap_or(defaults.vehicle_confidence_threshold),
            max_processing_seconds: get_setting(pool, keys::MAX_PROCESSING_SECONDS)
                .await?
                .unwrap_or(defaults.max_processing_seconds),
            attempt_retention_days: get_setting(pool, keys::ATTEMPT_RETENTION_DAYS)
                .await?
                .unwrap_or(defaults.attempt_retention_days),
            allow_perception_fallback: get_setting(pool, keys::ALLOW_PERCEPTION_FALLBACK)
                .await?
                .unwrap_or(defaults.allow_perception_fallback),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate and persist every field in one transaction
    pub async fn save(&self, pool: &SqlitePool) -> Result<()> {
        self.validate()?;

        let mut tx = pool.begin().await?;
        set_setting(
            &mut *tx,
            keys::PLATE_CONFIDENCE_THRESHOLD,
            self.plate_confidence_threshold,
        )
        .await?;
        set_setting(
            &mut *tx,
            keys::VEHICLE_CONFIDENCE_THRESHOLD,
            self.vehicle_confidence_threshold,
        )
        .await?;
        set_setting(&mut *tx, keys::MAX_PROCESSING_SECONDS, self.max_processing_seconds).await?;
        set_setting(&mut *tx, keys::ATTEMPT_RETENTION_DAYS, self.attempt_retention_days).await?;
        set_setting(
            &mut *tx,
            keys::ALLOW_PERCEPTION_FALLBACK,
            self.allow_perception_fallback,
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        check_percentage("plate_confidence_threshold", self.plate_confidence_threshold)?;
        check_percentage("vehicle_confidence_threshold", self.vehicle_confidence_threshold)?;

        if !(self.max_processing_seconds.is_finite() && self.max_processing_seconds > 0.0) {
            return Err(Error::InvalidInput(format!(
                "max_processing_seconds must be positive, got {}",
                self.max_processing_seconds
            )));
        }
        if !(1..=MAX_RETENTION_DAYS).contains(&self.attempt_retention_days) {
            return Err(Error::InvalidInput(format!(
                "attempt_retention_days must be between 1 and {}, got {}",
                MAX_RETENTION_DAYS, self.attempt_retention_days
            )));
        }
        Ok(())
    }
}

fn check_percentage(name: &str, value: f64) -> Result<()> {
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "{} must be within 0-100, got {}",
            name, value
        )))
    }
}
