//! Derivation of the photo categories a job must document.
//!
//! This is the only place that decides "what must be photographed". It is a
//! pure function of the catalog, unit type, feature set and phase, so the
//! gate can recompute it on every check without drift.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::catalog::{bedroom_key, FeatureCatalog, UnitType, BASE_COMPARE, CORE_GENERAL};

/// Feature keys selected for a job. Ordered so persisted and serialized
/// forms are stable; derivation order comes from the catalog, not the set.
pub type FeatureSet = BTreeSet<String>;

/// Documentation phase of a photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Captured before work starts; gates the start transition.
    Before,
    /// Captured after work; gates the completion transition.
    After,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Before => "before",
            Phase::After => "after",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "before" => Ok(Phase::Before),
            "after" => Ok(Phase::After),
            other => Err(format!("unknown phase '{}'", other)),
        }
    }
}

/// Group a category belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryGroup {
    /// Needs a before and an after capture of the same item.
    Compare,
    /// Whole-area condition; needs an after capture only.
    General,
}

/// A required documentation checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoCategory {
    pub key: String,
    pub label: String,
    pub group: CategoryGroup,
}

impl PhotoCategory {
    fn new(key: &str, label: &str, group: CategoryGroup) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            group,
        }
    }

    /// Phase a photo of this category is recorded under when captured
    /// during `phase`. General areas are never tagged as before.
    pub fn effective_phase(&self, phase: Phase) -> Phase {
        match self.group {
            CategoryGroup::General => Phase::After,
            CategoryGroup::Compare => phase,
        }
    }
}

/// Computes the ordered list of categories required for `phase`.
///
/// Order: base compare categories, then feature compare categories in
/// catalog order; for [`Phase::After`] additionally the core general areas,
/// feature general areas in catalog order, and `bedroom_1..bedroom_N`.
/// Unknown feature keys are ignored.
pub fn derive_categories(
    catalog: &FeatureCatalog,
    unit_type: Option<UnitType>,
    features: &FeatureSet,
    phase: Phase,
) -> Vec<PhotoCategory> {
    let mut out: Vec<PhotoCategory> = BASE_COMPARE
        .iter()
        .map(|(key, label)| PhotoCategory::new(key, label, CategoryGroup::Compare))
        .collect();

    let selected: Vec<_> = catalog
        .features()
        .iter()
        .filter(|f| features.contains(&f.key))
        .collect();

    for feature in &selected {
        if let Some(ref c) = feature.compare {
            push_unique(&mut out, PhotoCategory::new(&c.key, &c.label, CategoryGroup::Compare));
        }
    }

    if phase == Phase::Before {
        return out;
    }

    for (key, label) in CORE_GENERAL {
        push_unique(&mut out, PhotoCategory::new(key, label, CategoryGroup::General));
    }

    for feature in &selected {
        if let Some(ref g) = feature.general {
            push_unique(&mut out, PhotoCategory::new(&g.key, &g.label, CategoryGroup::General));
        }
    }

    let bedrooms = unit_type.map(|u| u.bedroom_count()).unwrap_or(0);
    for index in 1..=bedrooms {
        let key = bedroom_key(index);
        let label = format!("Bedroom {}", index);
        push_unique(&mut out, PhotoCategory::new(&key, &label, CategoryGroup::General));
    }

    out
}

/// Keys of [`derive_categories`], in the same order.
pub fn required_keys(
    catalog: &FeatureCatalog,
    unit_type: Option<UnitType>,
    features: &FeatureSet,
    phase: Phase,
) -> Vec<String> {
    derive_categories(catalog, unit_type, features, phase)
        .into_iter()
        .map(|c| c.key)
        .collect()
}

fn push_unique(out: &mut Vec<PhotoCategory>, category: PhotoCategory) {
    if !out.iter().any(|c| c.key == category.key) {
        out.push(category);
    }
}
