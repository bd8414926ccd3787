//! Attribute catalog and the numeric clamp applied by `set_attr`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::AttrValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Number,
    String,
    Boolean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Durability {
    Intrinsic,
    SemiDurable,
    Stateful,
}

/// Numeric bounds for a catalog entry. Open on either side when absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ValueLimits {
    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            description: None,
        }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        let mut clamped = value;
        if let Some(min) = self.min {
            clamped = clamped.max(min);
        }
        if let Some(max) = self.max {
            clamped = clamped.min(max);
        }
        clamped
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub key: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    pub durability: Durability,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<ValueLimits>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeCatalog {
    pub catalog: Vec<CatalogEntry>,
}

impl AttributeCatalog {
    /// Index the declared limits by attribute key for the `set_attr` clamp.
    pub fn limits_by_key(&self) -> BTreeMap<String, ValueLimits> {
        self.catalog
            .iter()
            .filter_map(|entry| {
                entry
                    .limits
                    .clone()
                    .map(|limits| (entry.key.clone(), limits))
            })
            .collect()
    }
}

/// Clamp an attribute value against optional limits. Non-numeric values and
/// keys without limits pass through untouched.
pub fn clamp_attr(value: AttrValue, limits: Option<&ValueLimits>) -> AttrValue {
    match (&value, limits) {
        (AttrValue::Number(number), Some(limits)) => AttrValue::Number(limits.clamp(*number)),
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_is_idempotent() {
        let limits = ValueLimits::between(10.0, 60.0);
        let clamped = limits.clamp(104.2);
        assert_eq!(clamped, 60.0);
        assert_eq!(limits.clamp(clamped), clamped);
    }

    #[test]
    fn clamp_leaves_non_numeric_values_alone() {
        let limits = ValueLimits::between(0.0, 1.0);
        let value = clamp_attr(AttrValue::from("F"), Some(&limits));
        assert_eq!(value, AttrValue::from("F"));
    }

    #[test]
    fn catalog_round_trip_and_limit_index() {
        let raw = r#"{
            "catalog": [
                {"key": "BMI", "type": "number", "durability": "stateful",
                 "limits": {"min": 12.0, "max": 70.0}, "category": "anthropometrics"},
                {"key": "SEX_AT_BIRTH", "type": "string", "durability": "intrinsic",
                 "category": "demographics"}
            ]
        }"#;
        let catalog: AttributeCatalog = serde_json::from_str(raw).expect("deserialize");
        assert_eq!(catalog.catalog.len(), 2);

        let limits = catalog.limits_by_key();
        assert_eq!(limits.len(), 1);
        assert_eq!(limits["BMI"].clamp(200.0), 70.0);
    }
}
