//! Cross-boundary contracts for the kernel, module runtime, CLI, and export.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub mod catalog;
pub mod error;
pub mod events;
pub mod fhir;
pub mod manifest;
pub mod report;

pub const DAYS_PER_YEAR: f64 = 365.0;

/// Attribute key the kernel rewrites on every time advance (time in days).
pub const AGE_YR: &str = "ageYr";
/// Attribute key the module runtime uses for patient age (time in years).
pub const AGE_YEARS: &str = "AGE_YEARS";
pub const SEX_AT_BIRTH: &str = "SEX_AT_BIRTH";

/// Heterogeneous attribute value. Clamping applies only to the numeric case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl AttrValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttrValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Number(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Text(value)
    }
}

/// Mapping from attribute key to value. One per patient.
pub type AttrMap = BTreeMap<String, AttrValue>;

/// Mapping from machine id to its current state name. One per patient.
pub type DiseaseStateMap = BTreeMap<String, String>;

/// Configuration for a cohort run under the month-stepped module runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortConfig {
    pub seed: u32,
    #[serde(default = "default_patient_count")]
    pub patients: u32,
    #[serde(default = "default_horizon_years")]
    pub horizon_years: f64,
    #[serde(default)]
    pub explain: bool,
}

impl Default for CohortConfig {
    fn default() -> Self {
        Self {
            seed: 1,
            patients: default_patient_count(),
            horizon_years: default_horizon_years(),
            explain: false,
        }
    }
}

fn default_patient_count() -> u32 {
    10
}

fn default_horizon_years() -> f64 {
    35.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attr_value_round_trips_untagged() {
        let mut attrs = AttrMap::new();
        attrs.insert("bmi".to_string(), AttrValue::Number(27.5));
        attrs.insert("smoker".to_string(), AttrValue::Bool(true));
        attrs.insert("sex".to_string(), AttrValue::from("F"));

        let serialized = serde_json::to_string(&attrs).expect("serialize");
        let decoded: AttrMap = serde_json::from_str(&serialized).expect("deserialize");
        assert_eq!(attrs, decoded);
    }

    #[test]
    fn cohort_config_fills_defaults() {
        let config: CohortConfig = serde_json::from_str(r#"{"seed": 7}"#).expect("deserialize");
        assert_eq!(config.seed, 7);
        assert_eq!(config.patients, 10);
        assert!((config.horizon_years - 35.0).abs() < f64::EPSILON);
        assert!(!config.explain);
    }

    #[test]
    fn attr_value_accessors_reject_wrong_variant() {
        let value = AttrValue::Number(4.2);
        assert_eq!(value.as_number(), Some(4.2));
        assert_eq!(value.as_bool(), None);
        assert_eq!(value.as_text(), None);
    }
}
