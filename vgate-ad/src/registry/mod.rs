//! Registry Lookup
//!
//! Resolves a detected plate against the authorized-plate registries the
//! surrounding system maintains. Lookup is ordered and early-exit:
//!
//! 1. exact, active resident plates
//! 2. exact, active in-window guest plates
//! 3. exact, active legacy vehicle records
//! 4. exact, active in-window event guests
//! 5. fuzzy: normalized containment against stages 1-2, so separator
//!    differences never block a partial hit
//!
//! Residents beat guests, and exact beats fuzzy. Within a stage the first
//! record in registry order wins.

mod store;

pub use store::load_snapshot;

use crate::plate::{is_exact_match, normalize};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

/// Match confidence of an exact hit
pub const EXACT_MATCH_CONFIDENCE: u8 = 100;
/// Match confidence of a fuzzy resident hit
pub const FUZZY_RESIDENT_CONFIDENCE: u8 = 85;
/// Match confidence of a fuzzy guest hit
pub const FUZZY_GUEST_CONFIDENCE: u8 = 80;

/// Make/model/color of a vehicle, any of which may be unknown
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleDescriptor {
    pub make: Option<String>,
    pub model: Option<String>,
    pub color: Option<String>,
}

impl fmt::Display for VehicleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = [&self.make, &self.model, &self.color]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .collect();
        if parts.is_empty() {
            write!(f, "unknown vehicle")
        } else {
            write!(f, "{}", parts.join(" "))
        }
    }
}

/// A resident-owned vehicle (also used for legacy vehicle records)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidentPlate {
    pub id: Uuid,
    pub plate: String,
    pub owner_ref: String,
    pub owner_name: Option<String>,
    pub vehicle: VehicleDescriptor,
    pub active: bool,
    pub registered_at: DateTime<Utc>,
}

/// A time-bounded guest authorization (also used for event guests)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestPlate {
    pub id: Uuid,
    pub plate: String,
    pub sponsor_ref: String,
    pub visitor_name: Option<String>,
    pub vehicle: VehicleDescriptor,
    /// Set for guests bound to a scheduled event
    pub event_ref: Option<String>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub active: bool,
}

impl GuestPlate {
    /// Active and `now` inside `[valid_from, valid_until]`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.active && self.valid_from <= now && now <= self.valid_until
    }
}

/// Which side of the tie-break a match belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Resident,
    Guest,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::Resident => "resident",
            MatchKind::Guest => "guest",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "resident" => Some(MatchKind::Resident),
            "guest" => Some(MatchKind::Guest),
            _ => None,
        }
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registry table a match came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrySource {
    ResidentPlates,
    GuestPlates,
    LegacyVehicles,
    EventGuests,
}

impl RegistrySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrySource::ResidentPlates => "resident_plates",
            RegistrySource::GuestPlates => "guest_plates",
            RegistrySource::LegacyVehicles => "legacy_vehicles",
            RegistrySource::EventGuests => "event_guests",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "resident_plates" => Some(RegistrySource::ResidentPlates),
            "guest_plates" => Some(RegistrySource::GuestPlates),
            "legacy_vehicles" => Some(RegistrySource::LegacyVehicles),
            "event_guests" => Some(RegistrySource::EventGuests),
            _ => None,
        }
    }
}

/// Reference to the registry record that authorized an attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedPlate {
    pub kind: MatchKind,
    pub source: RegistrySource,
    pub record_id: Uuid,
    /// Plate as stored in the registry
    pub plate: String,
    /// Owner (residents) or visitor (guests), for the outbound message
    pub holder: String,
}

impl MatchedPlate {
    fn from_resident(record: &ResidentPlate, source: RegistrySource) -> Self {
        Self {
            kind: MatchKind::Resident,
            source,
            record_id: record.id,
            plate: record.plate.clone(),
            holder: record
                .owner_name
                .clone()
                .unwrap_or_else(|| record.owner_ref.clone()),
        }
    }

    fn from_guest(record: &GuestPlate, source: RegistrySource) -> Self {
        let visitor = record
            .visitor_name
            .clone()
            .unwrap_or_else(|| "visitor".to_string());
        Self {
            kind: MatchKind::Guest,
            source,
            record_id: record.id,
            plate: record.plate.clone(),
            holder: format!("{} (sponsor {})", visitor, record.sponsor_ref),
        }
    }
}

/// Outcome of [`resolve`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchResult {
    NotFound,
    Found {
        matched: MatchedPlate,
        /// 100 for exact hits, lower for fuzzy ones
        match_confidence: u8,
    },
}

/// Read capability over the authorized-plate registries
///
/// Each `find_*` returns the first record, in registry order, that is
/// eligible at `now` and whose plate satisfies `matches`. Implementations
/// must answer every call of one [`resolve`] from the same snapshot.
pub trait PlateRegistry {
    fn find_resident_plate(&self, matches: &dyn Fn(&str) -> bool) -> Option<&ResidentPlate>;

    fn find_guest_plate(
        &self,
        now: DateTime<Utc>,
        matches: &dyn Fn(&str) -> bool,
    ) -> Option<&GuestPlate>;

    fn find_legacy_vehicle(&self, matches: &dyn Fn(&str) -> bool) -> Option<&ResidentPlate>;

    fn find_event_guest(
        &self,
        now: DateTime<Utc>,
        matches: &dyn Fn(&str) -> bool,
    ) -> Option<&GuestPlate>;
}

/// Point-in-time copy of every registry, in registry order
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    pub residents: Vec<ResidentPlate>,
    pub guests: Vec<GuestPlate>,
    pub legacy_vehicles: Vec<ResidentPlate>,
    pub event_guests: Vec<GuestPlate>,
}

impl PlateRegistry for RegistrySnapshot {
    fn find_resident_plate(&self, matches: &dyn Fn(&str) -> bool) -> Option<&ResidentPlate> {
        self.residents.iter().find(|r| r.active && matches(&r.plate))
    }

    fn find_guest_plate(
        &self,
        now: DateTime<Utc>,
        matches: &dyn Fn(&str) -> bool,
    ) -> Option<&GuestPlate> {
        self.guests
            .iter()
            .find(|g| g.is_valid_at(now) && matches(&g.plate))
    }

    fn find_legacy_vehicle(&self, matches: &dyn Fn(&str) -> bool) -> Option<&ResidentPlate> {
        self.legacy_vehicles
            .iter()
            .find(|r| r.active && matches(&r.plate))
    }

    fn find_event_guest(
        &self,
        now: DateTime<Utc>,
        matches: &dyn Fn(&str) -> bool,
    ) -> Option<&GuestPlate> {
        self.event_guests
            .iter()
            .find(|g| g.is_valid_at(now) && matches(&g.plate))
    }
}

/// Resolve a detected plate against the registries
///
/// `raw_plate` may be un-normalized; an input that normalizes to nothing is
/// `NotFound` without consulting the registry.
pub fn resolve<R: PlateRegistry + ?Sized>(
    registry: &R,
    raw_plate: &str,
    now: DateTime<Utc>,
) -> MatchResult {
    let plate = normalize(raw_plate);
    if plate.is_empty() {
        debug!("Empty plate, skipping registry lookup");
        return MatchResult::NotFound;
    }

    let exact = |stored: &str| is_exact_match(&normalize(stored), &plate);

    if let Some(record) = registry.find_resident_plate(&exact) {
        debug!(plate = %plate, stage = "resident_exact", "Registry hit");
        let matched = MatchedPlate::from_resident(record, RegistrySource::ResidentPlates);
        return found(matched, EXACT_MATCH_CONFIDENCE);
    }

    if let Some(record) = registry.find_guest_plate(now, &exact) {
        debug!(plate = %plate, stage = "guest_exact", "Registry hit");
        let matched = MatchedPlate::from_guest(record, RegistrySource::GuestPlates);
        return found(matched, EXACT_MATCH_CONFIDENCE);
    }

    if let Some(record) = registry.find_legacy_vehicle(&exact) {
        debug!(plate = %plate, stage = "legacy_exact", "Registry hit");
        let matched = MatchedPlate::from_resident(record, RegistrySource::LegacyVehicles);
        return found(matched, EXACT_MATCH_CONFIDENCE);
    }

    if let Some(record) = registry.find_event_guest(now, &exact) {
        debug!(plate = %plate, stage = "event_guest_exact", "Registry hit");
        let matched = MatchedPlate::from_guest(record, RegistrySource::EventGuests);
        return found(matched, EXACT_MATCH_CONFIDENCE);
    }

    // Stripping every separator on both sides covers each single-kind variation
    let contains = |stored: &str| normalize(stored).contains(plate.as_str());

    if let Some(record) = registry.find_resident_plate(&contains) {
        debug!(plate = %plate, stage = "resident_fuzzy", "Registry hit");
        let matched = MatchedPlate::from_resident(record, RegistrySource::ResidentPlates);
        return found(matched, FUZZY_RESIDENT_CONFIDENCE);
    }

    if let Some(record) = registry.find_guest_plate(now, &contains) {
        debug!(plate = %plate, stage = "guest_fuzzy", "Registry hit");
        let matched = MatchedPlate::from_guest(record, RegistrySource::GuestPlates);
        return found(matched, FUZZY_GUEST_CONFIDENCE);
    }

    debug!(plate = %plate, "No registry match");
    MatchResult::NotFound
}

fn found(matched: MatchedPlate, match_confidence: u8) -> MatchResult {
    MatchResult::Found {
        matched,
        match_confidence,
    }
}
