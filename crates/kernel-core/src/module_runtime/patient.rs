use std::collections::BTreeMap;

use contracts::events::OutputEvent;
use contracts::report::PatientRecord;
use contracts::{AttrMap, AttrValue, AGE_YEARS};

/// One synthetic patient under the module runtime.
#[derive(Debug, Clone)]
pub struct Patient {
    pub pid: String,
    pub birth_year: i32,
    pub start_age: f64,
    pub attributes: AttrMap,
    /// Scratchpad for module-private numeric signals.
    pub signals: BTreeMap<String, f64>,
    /// Diagnosis code → display name, mirrored from emitted diagnosis events.
    pub diagnoses: BTreeMap<String, String>,
    /// Drug → dose, mirrored from emitted medication events.
    pub meds_on: BTreeMap<String, Option<String>>,
    pub events: Vec<OutputEvent>,
    pub dead: bool,
}

impl Patient {
    pub fn new(pid: impl Into<String>, birth_year: i32) -> Self {
        Self {
            pid: pid.into(),
            birth_year,
            start_age: 0.0,
            attributes: AttrMap::new(),
            signals: BTreeMap::new(),
            diagnoses: BTreeMap::new(),
            meds_on: BTreeMap::new(),
            events: Vec::new(),
            dead: false,
        }
    }

    pub fn num(&self, key: &str) -> Option<f64> {
        self.attributes.get(key).and_then(AttrValue::as_number)
    }

    pub fn flag(&self, key: &str) -> bool {
        self.attributes
            .get(key)
            .and_then(AttrValue::as_bool)
            .unwrap_or(false)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(AttrValue::as_text)
    }

    pub fn age(&self) -> f64 {
        self.num(AGE_YEARS).unwrap_or(self.start_age)
    }

    pub fn has_diagnosis(&self, code: &str) -> bool {
        self.diagnoses.contains_key(code)
    }

    pub fn on_medication(&self, drug: &str) -> bool {
        self.meds_on.contains_key(drug)
    }

    pub fn to_record(&self) -> PatientRecord {
        PatientRecord {
            pid: self.pid.clone(),
            birth_year: self.birth_year,
            attributes: self.attributes.clone(),
            events: self.events.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_accessors_fall_back_cleanly() {
        let mut patient = Patient::new("p0000", 1971);
        patient.start_age = 44.0;
        assert_eq!(patient.age(), 44.0);

        patient
            .attributes
            .insert(AGE_YEARS.to_string(), AttrValue::Number(45.5));
        assert_eq!(patient.age(), 45.5);
        assert!(!patient.flag("SMOKER"));
        assert!(!patient.has_diagnosis("E11.9"));
    }

    #[test]
    fn record_projection_copies_events() {
        let mut patient = Patient::new("p0001", 1950);
        patient.events.push(OutputEvent::encounter(61.0, "PCP"));
        let record = patient.to_record();
        assert_eq!(record.pid, "p0001");
        assert_eq!(record.events.len(), 1);
    }
}
