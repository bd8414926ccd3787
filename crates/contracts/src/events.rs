//! Clinical event records for both runtimes.
//!
//! The kernel path records [`Event`] entries with a closed [`EventKind`] set;
//! the module runtime records flat [`OutputEvent`] entries shaped for the
//! patient JSON export.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Closed set of kernel event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    EncounterScheduled,
    EncounterStarted,
    EncounterFinished,
    ObservationOrdered,
    ObservationCollected,
    ObservationResulted,
    MedicationStarted,
    MedicationStopped,
    ProcedurePerformed,
    ConditionOnset,
    ConditionResolved,
    Death,
}

/// Kernel event record. `t` is measured in days from simulation start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub pid: String,
    pub t: f64,
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relates_to: Option<String>,
    #[serde(default)]
    pub meta: Value,
}

/// Output event types of the module runtime export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputEventType {
    Encounter,
    Lab,
    Diagnosis,
    Medication,
    Procedure,
    Death,
}

/// Module-runtime event record. `t` is the patient's age in years.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputEvent {
    pub t: f64,
    #[serde(rename = "type")]
    pub event_type: OutputEventType,
    pub payload: Value,
}

impl OutputEvent {
    pub fn encounter(t: f64, kind: &str) -> Self {
        Self {
            t,
            event_type: OutputEventType::Encounter,
            payload: json!({ "kind": kind }),
        }
    }

    pub fn lab(t: f64, id: &str, name: &str, value: f64, unit: Option<&str>) -> Self {
        let mut payload = json!({ "id": id, "name": name, "value": value });
        if let Some(unit) = unit {
            payload["unit"] = json!(unit);
        }
        Self {
            t,
            event_type: OutputEventType::Lab,
            payload,
        }
    }

    pub fn diagnosis(t: f64, code: &str, name: &str) -> Self {
        Self {
            t,
            event_type: OutputEventType::Diagnosis,
            payload: json!({ "code": code, "name": name }),
        }
    }

    pub fn medication(t: f64, drug: &str, dose: Option<&str>) -> Self {
        let mut payload = json!({ "drug": drug });
        if let Some(dose) = dose {
            payload["dose"] = json!(dose);
        }
        Self {
            t,
            event_type: OutputEventType::Medication,
            payload,
        }
    }

    pub fn procedure(t: f64, code: &str, name: &str) -> Self {
        Self {
            t,
            event_type: OutputEventType::Procedure,
            payload: json!({ "code": code, "name": name }),
        }
    }

    pub fn death(t: f64) -> Self {
        Self {
            t,
            event_type: OutputEventType::Death,
            payload: json!({}),
        }
    }
}
