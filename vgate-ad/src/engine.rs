//! Decision engine
//!
//! Wires one detection through normalize, lookup, policy and ledger. Holds
//! no state between calls; every evaluation is independent.

use crate::error::{AccessError, AccessResult};
use crate::ledger;
use crate::models::{
    clamp_confidence, AccessAttempt, DetectionEvent, Direction, Outcome, PerceptionReport,
    RawAttempt,
};
use crate::plate::normalize;
use crate::policy::{decide, AccessPolicyConfig};
use crate::registry::{self, MatchKind, MatchResult, RegistrySnapshot};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::time::Instant;
use tracing::{debug, error, warn};
use vgate_common::time::now;
use vgate_common::{EventBus, GateEvent};

/// Appended to the rationale when the registry could not be read
pub const FALLBACK_NOTE: &str = "registry unavailable, decided on perception only";

/// A recorded attempt plus its human-readable summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    #[serde(flatten)]
    pub attempt: AccessAttempt,
    pub mensaje: String,
}

/// Evaluate one detection event and record the result
///
/// Returns only after the attempt is durable in the ledger. With the
/// registry unreadable, either falls back to a perception-only decision or
/// fails without recording, depending on `allow_perception_fallback`.
pub async fn evaluate(
    pool: &SqlitePool,
    bus: &EventBus,
    config: &AccessPolicyConfig,
    event: DetectionEvent,
) -> AccessResult<Decision> {
    let started = Instant::now();
    let occurred_at = now();
    let normalized_plate = normalize(&event.plate);

    let direction = event.direction.unwrap_or_else(|| {
        debug!("Detection without tipo_acceso, assuming entrada");
        Direction::Entry
    });

    let mut fallback = false;
    let lookup = if normalized_plate.is_empty() {
        MatchResult::NotFound
    } else {
        let snapshot = match registry::load_snapshot(pool).await {
            Ok(snapshot) => snapshot,
            Err(e) if config.allow_perception_fallback => {
                warn!(
                    plate = %normalized_plate,
                    "Registry unavailable, using perception fallback: {}", e
                );
                fallback = true;
                RegistrySnapshot::default()
            }
            Err(e) => {
                error!(plate = %normalized_plate, "Registry unavailable: {}", e);
                return Err(AccessError::RegistryUnavailable(e.to_string()));
            }
        };
        registry::resolve(&snapshot, &normalized_plate, occurred_at)
    };

    let mut attempt = RawAttempt {
        raw_plate: event.plate,
        normalized_plate,
        perception: PerceptionReport {
            confidence: clamp_confidence(event.confidence),
            plate_recognized: event.plate_recognized,
            vehicle_recognized: event.vehicle_recognized,
            make: event.make,
            model: event.model,
            color: event.color,
        },
        direction,
        camera_id: event.camera_id,
        image_url: event.image_url,
        occurred_at,
        processing_seconds: 0.0,
    };

    let mut resolution = decide(&attempt, &lookup, config);
    if fallback {
        resolution.rationale = format!("{}; {}", resolution.rationale, FALLBACK_NOTE);
    }

    attempt.processing_seconds = match event.processing_seconds {
        Some(seconds) if seconds.is_finite() && seconds >= 0.0 => seconds,
        _ => started.elapsed().as_secs_f64(),
    };
    if attempt.processing_seconds > config.max_processing_seconds {
        warn!(
            plate = %attempt.normalized_plate,
            processing_seconds = attempt.processing_seconds,
            budget = config.max_processing_seconds,
            "Processing budget exceeded"
        );
    }

    let recorded = ledger::record(pool, &attempt, &resolution).await?;
    let mensaje = mensaje(&recorded);

    bus.emit_lossy(GateEvent::AccessDecided {
        attempt_id: recorded.id,
        plate: recorded.normalized_plate.clone(),
        outcome: recorded.outcome().as_str().to_string(),
        direction: recorded.direction.as_str().to_string(),
        camera_id: recorded.camera_id.clone(),
        message: mensaje.clone(),
        timestamp: recorded.occurred_at,
    });

    Ok(Decision {
        attempt: recorded,
        mensaje,
    })
}

/// Human-readable summary of a recorded attempt for dashboards
pub fn mensaje(attempt: &AccessAttempt) -> String {
    let plate = if attempt.normalized_plate.is_empty() {
        "(none)"
    } else {
        attempt.normalized_plate.as_str()
    };

    match (attempt.outcome(), &attempt.resolution.matched) {
        (Outcome::Authorized, Some(matched)) => {
            let vehicle = detected_vehicle(&attempt.perception);
            match matched.kind {
                MatchKind::Resident => format!(
                    "Access authorized: plate {} belongs to resident {}{}",
                    plate, matched.holder, vehicle
                ),
                MatchKind::Guest => format!(
                    "Access authorized: plate {} registered for guest {}{}",
                    plate, matched.holder, vehicle
                ),
            }
        }
        (Outcome::Authorized, None) => {
            format!("Access authorized manually for plate {}", plate)
        }
        (Outcome::Pending, _) => format!(
            "Plate {} is not registered; manual review requested",
            plate
        ),
        (Outcome::Denied, _) if attempt.normalized_plate.is_empty() => {
            "Access denied: no plate detected".to_string()
        }
        (Outcome::Denied, _) => format!("Access denied: plate {} is not registered", plate),
    }
}

fn detected_vehicle(perception: &PerceptionReport) -> String {
    let parts: Vec<&str> = [&perception.make, &perception.model, &perception.color]
        .into_iter()
        .filter_map(|p| p.as_deref())
        .collect();
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReasonCode, Resolution};
    use crate::registry::{MatchedPlate, RegistrySource};
    use uuid::Uuid;

    fn recorded(outcome: Outcome, plate: &str, matched: Option<MatchedPlate>) -> AccessAttempt {
        let mut perception = PerceptionReport::new(90.0, true, true);
        perception.make = Some("Mazda".to_string());
        perception.color = Some("red".to_string());
        AccessAttempt {
            id: Uuid::new_v4(),
            raw_plate: plate.to_string(),
            normalized_plate: plate.to_string(),
            perception,
            direction: Direction::Entry,
            camera_id: None,
            image_url: None,
            occurred_at: now(),
            processing_seconds: 0.1,
            resolution: Resolution {
                outcome,
                matched,
                match_confidence: 100,
                reason: ReasonCode::RegisteredResident,
                rationale: String::new(),
            },
            initial_outcome: outcome,
            overrides: Vec::new(),
        }
    }

    fn matched(kind: MatchKind, holder: &str) -> MatchedPlate {
        MatchedPlate {
            kind,
            source: RegistrySource::ResidentPlates,
            record_id: Uuid::new_v4(),
            plate: "ABC123".to_string(),
            holder: holder.to_string(),
        }
    }

    #[test]
    fn test_mensaje_names_resident_and_vehicle() {
        let attempt = recorded(
            Outcome::Authorized,
            "ABC123",
            Some(matched(MatchKind::Resident, "Ana Torres")),
        );
        assert_eq!(
            mensaje(&attempt),
            "Access authorized: plate ABC123 belongs to resident Ana Torres (Mazda red)"
        );
    }

    #[test]
    fn test_mensaje_names_guest_and_sponsor() {
        let attempt = recorded(
            Outcome::Authorized,
            "INV001",
            Some(matched(MatchKind::Guest, "Luis (sponsor apt-12)")),
        );
        assert!(mensaje(&attempt).contains("guest Luis (sponsor apt-12)"));
    }

    #[test]
    fn test_mensaje_pending_and_denied() {
        assert_eq!(
            mensaje(&recorded(Outcome::Pending, "ZZZ999", None)),
            "Plate ZZZ999 is not registered; manual review requested"
        );
        assert_eq!(
            mensaje(&recorded(Outcome::Denied, "ZZZ999", None)),
            "Access denied: plate ZZZ999 is not registered"
        );
        assert_eq!(
            mensaje(&recorded(Outcome::Denied, "", None)),
            "Access denied: no plate detected"
        );
    }

    #[test]
    fn test_mensaje_after_manual_authorization() {
        assert_eq!(
            mensaje(&recorded(Outcome::Authorized, "ZZZ999", None)),
            "Access authorized manually for plate ZZZ999"
        );
    }
}
