//! Decision Policy
//!
//! Total and pure: every (attempt, lookup, config) yields exactly one
//! outcome. An empty plate is denied outright. An unmatched plate is never
//! authorized here, whatever the perception confidence; only an override can
//! do that.

use super::AccessPolicyConfig;
use crate::models::{Outcome, RawAttempt, ReasonCode, Resolution};
use crate::registry::{MatchKind, MatchResult};

pub const RATIONALE_RESIDENT: &str = "registered resident vehicle";
pub const RATIONALE_GUEST: &str = "registered guest vehicle";
pub const RATIONALE_REVIEW: &str =
    "unregistered plate, high perception confidence; requires manual review";
pub const RATIONALE_LOW_CONFIDENCE: &str = "unregistered plate, low perception confidence";
pub const RATIONALE_NO_PLATE: &str = "no plate detected";

/// Combine a registry lookup with perception claims into an outcome
pub fn decide(
    attempt: &RawAttempt,
    lookup: &MatchResult,
    config: &AccessPolicyConfig,
) -> Resolution {
    if attempt.normalized_plate.is_empty() {
        return Resolution {
            outcome: Outcome::Denied,
            matched: None,
            match_confidence: 0,
            reason: ReasonCode::NoPlateDetected,
            rationale: RATIONALE_NO_PLATE.to_string(),
        };
    }

    if let MatchResult::Found {
        matched,
        match_confidence,
    } = lookup
    {
        let (reason, rationale) = match matched.kind {
            MatchKind::Resident => (ReasonCode::RegisteredResident, RATIONALE_RESIDENT),
            MatchKind::Guest => (ReasonCode::RegisteredGuest, RATIONALE_GUEST),
        };
        return Resolution {
            outcome: Outcome::Authorized,
            matched: Some(matched.clone()),
            match_confidence: *match_confidence,
            reason,
            rationale: rationale.to_string(),
        };
    }

    let perception = &attempt.perception;
    let (outcome, reason, rationale) = if perception.plate_recognized
        && perception.confidence >= config.plate_confidence_threshold
    {
        (Outcome::Pending, ReasonCode::UnregisteredHighConfidence, RATIONALE_REVIEW)
    } else {
        (Outcome::Denied, ReasonCode::UnregisteredLowConfidence, RATIONALE_LOW_CONFIDENCE)
    };

    Resolution {
        outcome,
        matched: None,
        match_confidence: 0,
        reason,
        rationale: rationale.to_string(),
    }
}
