//! Feature catalog and unit types.
//!
//! The catalog is the mapping table from optional amenities to the extra
//! photo categories they require. It is plain data: the default table ships
//! with the crate and a replacement can be supplied through configuration.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Dwelling shape of the unit a job is performed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitType {
    #[serde(rename = "bachelor")]
    Bachelor,
    #[serde(rename = "studio")]
    Studio,
    #[serde(rename = "house")]
    House,
    #[serde(rename = "1_bed")]
    OneBed,
    #[serde(rename = "2_beds")]
    TwoBeds,
    #[serde(rename = "3_beds")]
    ThreeBeds,
    #[serde(rename = "4_beds")]
    FourBeds,
}

impl UnitType {
    pub const ALL: [UnitType; 7] = [
        UnitType::Bachelor,
        UnitType::Studio,
        UnitType::House,
        UnitType::OneBed,
        UnitType::TwoBeds,
        UnitType::ThreeBeds,
        UnitType::FourBeds,
    ];

    /// Number of bedrooms implied by the unit type. Shapes without a fixed
    /// count (bachelor, studio, house) have none.
    pub fn bedroom_count(&self) -> u8 {
        match self {
            UnitType::Bachelor | UnitType::Studio | UnitType::House => 0,
            UnitType::OneBed => 1,
            UnitType::TwoBeds => 2,
            UnitType::ThreeBeds => 3,
            UnitType::FourBeds => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UnitType::Bachelor => "bachelor",
            UnitType::Studio => "studio",
            UnitType::House => "house",
            UnitType::OneBed => "1_bed",
            UnitType::TwoBeds => "2_beds",
            UnitType::ThreeBeds => "3_beds",
            UnitType::FourBeds => "4_beds",
        }
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UnitType::ALL
            .iter()
            .copied()
            .find(|u| u.as_str() == s)
            .ok_or_else(|| format!("unknown unit type '{}'", s))
    }
}

/// Highest bedroom count any unit type can produce.
pub const MAX_BEDROOMS: u8 = 4;

/// Compare categories every job requires, in declaration order.
pub const BASE_COMPARE: &[(&str, &str)] = &[
    ("stove", "Stove (front)"),
    ("behind_stove", "Behind stove"),
    ("fridge", "Refrigerator (front)"),
    ("behind_fridge", "Behind refrigerator"),
    ("toilet", "Toilet"),
    ("bathtub", "Bathtub"),
    ("sink", "Sink"),
];

/// General areas always documented at completion, in declaration order.
pub const CORE_GENERAL: &[(&str, &str)] = &[
    ("kitchen", "Kitchen"),
    ("bathroom", "Bathroom"),
    ("living_room", "Living room"),
];

/// Key of the general category for the `index`-th bedroom (1-based).
pub fn bedroom_key(index: u8) -> String {
    format!("bedroom_{}", index)
}

/// A category contributed by a feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedCategory {
    pub key: String,
    pub label: String,
}

impl DerivedCategory {
    pub fn new(key: &str, label: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
        }
    }
}

/// One optional amenity and the categories it adds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub key: String,
    pub label: String,
    /// Extra before/after category, if any.
    #[serde(default)]
    pub compare: Option<DerivedCategory>,
    /// Extra completion-only area, if any.
    #[serde(default)]
    pub general: Option<DerivedCategory>,
}

/// Ordered registry of known features.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureCatalog {
    features: Vec<FeatureSpec>,
}

impl FeatureCatalog {
    /// Builds a catalog from an explicit table after checking it for
    /// collisions with the fixed category sets.
    pub fn new(features: Vec<FeatureSpec>) -> Result<Self, ConfigError> {
        validate_features(&features)?;
        Ok(Self { features })
    }

    /// Features in declaration order.
    pub fn features(&self) -> &[FeatureSpec] {
        &self.features
    }

    pub fn get(&self, key: &str) -> Option<&FeatureSpec> {
        self.features.iter().find(|f| f.key == key)
    }

    pub fn is_known(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Every compare category key this catalog can ever require.
    pub fn compare_universe(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = BASE_COMPARE.iter().map(|(k, _)| *k).collect();
        for feature in &self.features {
            if let Some(ref c) = feature.compare {
                if !keys.contains(&c.key.as_str()) {
                    keys.push(c.key.as_str());
                }
            }
        }
        keys
    }

    /// Whether `key` names a general (after-only) category of this catalog.
    pub fn is_general_key(&self, key: &str) -> bool {
        if CORE_GENERAL.iter().any(|(k, _)| *k == key) {
            return true;
        }
        if (1..=MAX_BEDROOMS).any(|i| bedroom_key(i) == key) {
            return true;
        }
        self.features
            .iter()
            .filter_map(|f| f.general.as_ref())
            .any(|g| g.key == key)
    }

    pub fn is_compare_key(&self, key: &str) -> bool {
        self.compare_universe().contains(&key)
    }
}

impl Default for FeatureCatalog {
    fn default() -> Self {
        Self {
            features: default_features(),
        }
    }
}

/// The shipped mapping table.
pub fn default_features() -> Vec<FeatureSpec> {
    let ac_unit = DerivedCategory::new("ac_unit", "A/C unit");
    vec![
        FeatureSpec {
            key: "dishwasher".to_string(),
            label: "Dishwasher".to_string(),
            compare: Some(DerivedCategory::new("dishwasher", "Dishwasher")),
            general: None,
        },
        FeatureSpec {
            key: "air_conditioner".to_string(),
            label: "Air conditioner".to_string(),
            compare: Some(ac_unit.clone()),
            general: None,
        },
        FeatureSpec {
            key: "laundry".to_string(),
            label: "In-suite laundry".to_string(),
            compare: Some(ac_unit),
            general: Some(DerivedCategory::new("laundry_unit", "Washer/dryer area")),
        },
        FeatureSpec {
            key: "balcony".to_string(),
            label: "Balcony".to_string(),
            compare: None,
            general: Some(DerivedCategory::new("balcony_area", "Balcony")),
        },
        FeatureSpec {
            key: "microwave".to_string(),
            label: "Microwave".to_string(),
            compare: None,
            general: Some(DerivedCategory::new("microwave_area", "Microwave")),
        },
        FeatureSpec {
            key: "freezer".to_string(),
            label: "Freezer".to_string(),
            compare: None,
            general: Some(DerivedCategory::new("freezer_area", "Freezer")),
        },
        FeatureSpec {
            key: "glass_shower".to_string(),
            label: "Glass shower".to_string(),
            compare: None,
            general: Some(DerivedCategory::new("glass_shower_area", "Glass shower")),
        },
        FeatureSpec {
            key: "double_sink".to_string(),
            label: "Double sink".to_string(),
            compare: None,
            general: Some(DerivedCategory::new("double_sink_area", "Double sink")),
        },
    ]
}

fn validate_features(features: &[FeatureSpec]) -> Result<(), ConfigError> {
    let invalid = |key: &str, reason: String| ConfigError::InvalidFeature {
        key: key.to_string(),
        reason,
    };

    let mut seen = HashSet::new();
    let mut compare_keys = HashSet::new();
    let mut general_keys = HashSet::new();

    for feature in features {
        if feature.key.trim().is_empty() {
            return Err(invalid(&feature.key, "feature key must not be empty".into()));
        }
        if !seen.insert(feature.key.as_str()) {
            return Err(invalid(&feature.key, "duplicate feature key".into()));
        }

        if let Some(ref c) = feature.compare {
            check_derived_key(&feature.key, &c.key)?;
            compare_keys.insert(c.key.as_str());
        }
        if let Some(ref g) = feature.general {
            check_derived_key(&feature.key, &g.key)?;
            general_keys.insert(g.key.as_str());
        }
    }

    if let Some(key) = compare_keys.intersection(&general_keys).next() {
        return Err(invalid(
            key,
            "category cannot be both a compare and a general category".into(),
        ));
    }

    Ok(())
}

fn check_derived_key(feature: &str, key: &str) -> Result<(), ConfigError> {
    let reserved = BASE_COMPARE
        .iter()
        .chain(CORE_GENERAL.iter())
        .any(|(k, _)| *k == key)
        || key.starts_with("bedroom_");

    if key.trim().is_empty() || reserved {
        return Err(ConfigError::InvalidFeature {
            key: feature.to_string(),
            reason: format!("derived category '{}' is empty or reserved", key),
        });
    }
    Ok(())
}
