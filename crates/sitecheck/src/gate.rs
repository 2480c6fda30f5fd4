//! Documentation gate.
//!
//! Decides whether a job has the photos its next transition needs. The same
//! check backs the advisory readiness shown to a worker and the enforcement
//! done when a transition is committed.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::catalog::{FeatureCatalog, UnitType};
use crate::categories::{required_keys, FeatureSet, Phase};
use crate::lifecycle::Job;

/// Why a gate check failed independently of photo state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateBlock {
    /// No unit type chosen; the required set cannot be known.
    UnitTypeUnset,
}

/// Outcome of a gate check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateDecision {
    pub allowed: bool,
    /// Required category keys without a captured photo, in derivation order.
    pub missing: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<GateBlock>,
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }
}

/// Checks `job` against the photos captured for `phase`.
///
/// `captured` holds the category keys with at least one confirmed photo in
/// that phase; how many photos exist per key does not matter.
pub fn can_transition(
    catalog: &FeatureCatalog,
    job: &Job,
    phase: Phase,
    captured: &BTreeSet<String>,
) -> GateDecision {
    check(catalog, job.unit_type, &job.features, phase, captured)
}

/// Gate check over explicit attributes, for callers evaluating a job with
/// attributes that are about to be applied.
pub fn check(
    catalog: &FeatureCatalog,
    unit_type: Option<UnitType>,
    features: &FeatureSet,
    phase: Phase,
    captured: &BTreeSet<String>,
) -> GateDecision {
    let missing: Vec<String> = required_keys(catalog, unit_type, features, phase)
        .into_iter()
        .filter(|key| !captured.contains(key))
        .collect();

    let blocked_by = unit_type.is_none().then_some(GateBlock::UnitTypeUnset);

    GateDecision {
        allowed: missing.is_empty() && blocked_by.is_none(),
        missing,
        blocked_by,
    }
}
