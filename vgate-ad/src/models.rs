//! Access attempt data model
//!
//! Wire names for outcome and direction match what the perception system
//! and dashboards already exchange ("authorized", "entrada", ...).

use crate::registry::MatchedPlate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

/// Tri-state authorization outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Authorized,
    Denied,
    Pending,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Authorized => "authorized",
            Outcome::Denied => "denied",
            Outcome::Pending => "pending",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "authorized" => Some(Outcome::Authorized),
            "denied" => Some(Outcome::Denied),
            "pending" => Some(Outcome::Pending),
            _ => None,
        }
    }

    /// Whether an override may move an attempt from `self` to `target`
    ///
    /// `pending` is entry-only: nothing moves into it, and no outcome moves
    /// to itself.
    pub fn can_transition_to(&self, target: Outcome) -> bool {
        match (self, target) {
            (_, Outcome::Pending) => false,
            (from, to) if *from == to => false,
            _ => true,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of travel through the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "entrada", alias = "entry")]
    Entry,
    #[serde(rename = "salida", alias = "exit")]
    Exit,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Entry => "entrada",
            Direction::Exit => "salida",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "entrada" | "entry" => Some(Direction::Entry),
            "salida" | "exit" => Some(Direction::Exit),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inbound detection event from the perception system
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DetectionEvent {
    #[serde(rename = "placa_detectada", default, deserialize_with = "null_as_default")]
    pub plate: String,
    #[serde(rename = "marca_detectada", default)]
    pub make: Option<String>,
    #[serde(rename = "modelo_detectado", default)]
    pub model: Option<String>,
    #[serde(rename = "color_detectado", default)]
    pub color: Option<String>,
    #[serde(rename = "ia_confidence", default, deserialize_with = "null_as_default")]
    pub confidence: f64,
    #[serde(rename = "ia_placa_reconocida", default, deserialize_with = "null_as_default")]
    pub plate_recognized: bool,
    #[serde(rename = "ia_vehiculo_reconocido", default, deserialize_with = "null_as_default")]
    pub vehicle_recognized: bool,
    #[serde(rename = "tipo_acceso")]
    pub direction: Option<Direction>,
    #[serde(rename = "imagen_url", default)]
    pub image_url: Option<String>,
    #[serde(rename = "camara_id", default)]
    pub camera_id: Option<String>,
    /// Upstream processing time in seconds
    #[serde(rename = "tiempo_procesamiento", default)]
    pub processing_seconds: Option<f64>,
}

/// Perception sends `null` for fields it could not read
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// What the perception system claimed about one detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerceptionReport {
    /// 0-100, clamped on construction
    pub confidence: f64,
    pub plate_recognized: bool,
    pub vehicle_recognized: bool,
    pub make: Option<String>,
    pub model: Option<String>,
    pub color: Option<String>,
}

impl PerceptionReport {
    pub fn new(confidence: f64, plate_recognized: bool, vehicle_recognized: bool) -> Self {
        Self {
            confidence: clamp_confidence(confidence),
            plate_recognized,
            vehicle_recognized,
            make: None,
            model: None,
            color: None,
        }
    }
}

/// Clamp to 0-100; NaN and infinities count as no confidence
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// A detection ready for a decision, before it is recorded
#[derive(Debug, Clone, PartialEq)]
pub struct RawAttempt {
    pub raw_plate: String,
    pub normalized_plate: String,
    pub perception: PerceptionReport,
    pub direction: Direction,
    pub camera_id: Option<String>,
    pub image_url: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub processing_seconds: f64,
}

/// Structured reason behind an automated outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    NoPlateDetected,
    RegisteredResident,
    RegisteredGuest,
    UnregisteredHighConfidence,
    UnregisteredLowConfidence,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::NoPlateDetected => "no_plate_detected",
            ReasonCode::RegisteredResident => "registered_resident",
            ReasonCode::RegisteredGuest => "registered_guest",
            ReasonCode::UnregisteredHighConfidence => "unregistered_high_confidence",
            ReasonCode::UnregisteredLowConfidence => "unregistered_low_confidence",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "no_plate_detected" => Some(ReasonCode::NoPlateDetected),
            "registered_resident" => Some(ReasonCode::RegisteredResident),
            "registered_guest" => Some(ReasonCode::RegisteredGuest),
            "unregistered_high_confidence" => Some(ReasonCode::UnregisteredHighConfidence),
            "unregistered_low_confidence" => Some(ReasonCode::UnregisteredLowConfidence),
            _ => None,
        }
    }
}

/// Output of the Decision Policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// Current outcome; changes only through overrides once recorded
    pub outcome: Outcome,
    pub matched: Option<MatchedPlate>,
    /// 0 when nothing matched
    pub match_confidence: u8,
    pub reason: ReasonCode,
    pub rationale: String,
}

/// One human change of outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideRecord {
    pub actor: String,
    pub previous_outcome: Outcome,
    pub new_outcome: Outcome,
    pub note: Option<String>,
    pub overridden_at: DateTime<Utc>,
}

/// A ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessAttempt {
    pub id: Uuid,
    pub raw_plate: String,
    pub normalized_plate: String,
    pub perception: PerceptionReport,
    pub direction: Direction,
    pub camera_id: Option<String>,
    pub image_url: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub processing_seconds: f64,
    pub resolution: Resolution,
    /// Outcome set by the Decision Policy, never changed
    pub initial_outcome: Outcome,
    /// Oldest first
    pub overrides: Vec<OverrideRecord>,
}

impl AccessAttempt {
    pub fn outcome(&self) -> Outcome {
        self.resolution.outcome
    }
}
