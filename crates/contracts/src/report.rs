//! Patient output records and aggregate run metrics.

use serde::{Deserialize, Serialize};

use crate::events::OutputEvent;
use crate::AttrMap;

/// One simulated patient as written to the `--out` JSON array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecord {
    pub pid: String,
    pub birth_year: i32,
    pub attributes: AttrMap,
    pub events: Vec<OutputEvent>,
}

/// Aggregate metrics written to `sim/summary.json` after every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryMetrics {
    pub patients: u64,
    pub avg_events_per_patient: f64,
    pub condition_onsets: u64,
    pub death_fraction: f64,
}
