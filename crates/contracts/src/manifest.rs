//! World manifest shapes. Consumed read-only by the simulator.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldManifest {
    pub version: u32,
    pub seed: u32,
    pub model: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub attribute_modules: Vec<AttributeModuleRef>,
    #[serde(default)]
    pub disease_modules: Vec<DiseaseModuleRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_catalog_path: Option<String>,
    #[serde(default)]
    pub acceptance: AcceptanceStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeModuleRef {
    pub id: String,
    pub path: String,
    pub category: String,
    pub declared_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiseaseModuleRef {
    pub id: String,
    pub path: String,
    pub name: String,
}

/// Module acceptance counts recorded by the world builder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptanceStats {
    pub attributes_accepted: u32,
    pub attributes_attempted: u32,
    pub diseases_accepted: u32,
    pub diseases_attempted: u32,
}
