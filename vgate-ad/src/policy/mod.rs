//! Access policy: configuration and the decision rules that read it

mod config;
mod decision;

pub use config::AccessPolicyConfig;
pub use decision::{
    decide, RATIONALE_GUEST, RATIONALE_LOW_CONFIDENCE, RATIONALE_NO_PLATE, RATIONALE_RESIDENT,
    RATIONALE_REVIEW,
};
