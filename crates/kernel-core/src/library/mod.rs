//! Built-in module library.
//!
//! World manifests name modules by id; those ids resolve here. Unknown ids
//! are logged and skipped, so a manifest written against a larger library
//! still runs with the modules this build carries.

use std::collections::BTreeMap;

use contracts::catalog::{AttributeCatalog, CatalogEntry, Durability, ValueLimits, ValueType};
use contracts::manifest::WorldManifest;
use contracts::AGE_YEARS;

use crate::module_runtime::{AttributeModule, DiseaseModule, ModuleSet};

pub mod attributes;
pub mod diseases;
pub mod machines;

pub fn attribute_module(id: &str) -> Option<AttributeModule> {
    match id {
        "demographics" => Some(attributes::demographics()),
        "anthropometrics" => Some(attributes::anthropometrics()),
        "smoking" => Some(attributes::smoking()),
        "vitals" => Some(attributes::vitals()),
        _ => None,
    }
}

pub fn disease_module(id: &str) -> Option<DiseaseModule> {
    match id {
        "t2dm" => Some(diseases::t2dm()),
        "hypertension" => Some(diseases::hypertension()),
        "obesity" => Some(diseases::obesity()),
        _ => None,
    }
}

/// Every built-in module, in registration order.
pub fn default_module_set() -> ModuleSet {
    ModuleSet {
        attributes: vec![
            attributes::demographics(),
            attributes::anthropometrics(),
            attributes::smoking(),
            attributes::vitals(),
        ],
        diseases: vec![
            diseases::t2dm(),
            diseases::hypertension(),
            diseases::obesity(),
        ],
    }
}

/// Resolve a manifest's module references against the built-in library.
pub fn resolve(manifest: &WorldManifest) -> ModuleSet {
    let mut set = ModuleSet::default();
    for reference in &manifest.attribute_modules {
        match attribute_module(&reference.id) {
            Some(module) => set.attributes.push(module),
            None => {
                tracing::warn!(id = %reference.id, "unknown attribute module; skipping")
            }
        }
    }
    for reference in &manifest.disease_modules {
        match disease_module(&reference.id) {
            Some(module) => set.diseases.push(module),
            None => tracing::warn!(id = %reference.id, "unknown disease module; skipping"),
        }
    }
    set
}

/// Catalog for the built-in attribute keys.
pub fn default_catalog() -> AttributeCatalog {
    let number = |key: &str, durability, min: f64, max: f64, category: &str| CatalogEntry {
        key: key.to_string(),
        value_type: ValueType::Number,
        durability,
        limits: Some(ValueLimits::between(min, max)),
        description: None,
        category: category.to_string(),
    };

    AttributeCatalog {
        catalog: vec![
            number(AGE_YEARS, Durability::Stateful, 0.0, 115.0, "demographics"),
            CatalogEntry {
                key: contracts::SEX_AT_BIRTH.to_string(),
                value_type: ValueType::String,
                durability: Durability::Intrinsic,
                limits: None,
                description: None,
                category: "demographics".to_string(),
            },
            number(attributes::HEIGHT_CM, Durability::Intrinsic, 120.0, 210.0, "anthropometrics"),
            number(attributes::WEIGHT_KG, Durability::Stateful, 30.0, 250.0, "anthropometrics"),
            number(attributes::BMI, Durability::Stateful, 12.0, 70.0, "anthropometrics"),
            CatalogEntry {
                key: attributes::SMOKER.to_string(),
                value_type: ValueType::Boolean,
                durability: Durability::SemiDurable,
                limits: None,
                description: None,
                category: "behavior".to_string(),
            },
            number(attributes::PACK_YEARS, Durability::Stateful, 0.0, 150.0, "behavior"),
            number(attributes::SBP, Durability::Stateful, 70.0, 260.0, "vitals"),
            number(attributes::A1C, Durability::Stateful, 3.5, 18.0, "vitals"),
        ],
    }
}

/// Limits for the built-in keys, as fed to the `set_attr` clamp.
pub fn default_limits() -> BTreeMap<String, ValueLimits> {
    default_catalog().limits_by_key()
}
