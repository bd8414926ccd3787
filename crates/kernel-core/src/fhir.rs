//! FHIR-lite export: a pure mapping from recorded events to
//! resource-shaped records.
//!
//! Kernel records measure time in days from simulation start, so their
//! dates are `birth_year-01-01` plus that many days. Module records measure
//! time in years of age and flatten to a fixed July 1 of the corresponding
//! calendar year.

use contracts::events::{Event, EventKind, OutputEventType};
use contracts::fhir::{FhirCondition, FhirExport, FhirObservation, FhirPatient};

use crate::module_runtime::Patient;

/// Map a kernel event log to FHIR-lite resources.
pub fn export_events(pid: &str, birth_year: i32, events: &[Event]) -> FhirExport {
    let mut observations = Vec::new();
    let mut conditions = Vec::new();

    for event in events {
        match event.kind {
            EventKind::ObservationResulted => {
                let Some(value) = event.meta["value"].as_f64() else {
                    continue;
                };
                let code = event.meta["loinc"]
                    .as_str()
                    .or_else(|| event.meta["id"].as_str())
                    .unwrap_or("unknown");
                observations.push(FhirObservation {
                    code: code.to_string(),
                    display: event.meta["name"].as_str().map(str::to_string),
                    value,
                    unit: event.meta["unit"].as_str().map(str::to_string),
                    effective_date: date_plus_days(birth_year, event.t),
                });
            }
            EventKind::ConditionOnset => {
                let code = event.meta["icd10"]
                    .as_str()
                    .or_else(|| event.meta["code"].as_str())
                    .unwrap_or("unknown");
                conditions.push(FhirCondition {
                    code: code.to_string(),
                    display: event.meta["name"].as_str().unwrap_or_default().to_string(),
                    onset_date: date_plus_days(birth_year, event.t),
                });
            }
            _ => {}
        }
    }

    FhirExport {
        patient: FhirPatient {
            id: pid.to_string(),
            birth_date: format_date(birth_year, 1, 1),
        },
        observations,
        conditions,
    }
}

/// Map a module-runtime patient to FHIR-lite resources.
pub fn export_patient(patient: &Patient) -> FhirExport {
    let mut observations = Vec::new();
    let mut conditions = Vec::new();

    for event in &patient.events {
        let date = july_of_age(patient.birth_year, event.t);
        match event.event_type {
            OutputEventType::Lab => {
                let Some(value) = event.payload["value"].as_f64() else {
                    continue;
                };
                observations.push(FhirObservation {
                    code: event.payload["id"].as_str().unwrap_or("unknown").to_string(),
                    display: event.payload["name"].as_str().map(str::to_string),
                    value,
                    unit: event.payload["unit"].as_str().map(str::to_string),
                    effective_date: date,
                });
            }
            OutputEventType::Diagnosis => {
                conditions.push(FhirCondition {
                    code: event.payload["code"].as_str().unwrap_or("unknown").to_string(),
                    display: event.payload["name"].as_str().unwrap_or_default().to_string(),
                    onset_date: date,
                });
            }
            _ => {}
        }
    }

    FhirExport {
        patient: FhirPatient {
            id: patient.pid.clone(),
            birth_date: format_date(patient.birth_year, 1, 1),
        },
        observations,
        conditions,
    }
}

fn date_plus_days(birth_year: i32, days: f64) -> String {
    let base = days_from_civil(birth_year, 1, 1);
    let (year, month, day) = civil_from_days(base + days.floor() as i64);
    format_date(year, month, day)
}

fn july_of_age(birth_year: i32, age_years: f64) -> String {
    format_date(birth_year + age_years.floor() as i32, 7, 1)
}

fn format_date(year: i32, month: u32, day: u32) -> String {
    format!("{year:04}-{month:02}-{day:02}")
}

// Proleptic-Gregorian day counts relative to 1970-01-01.
fn days_from_civil(year: i32, month: u32, day: u32) -> i64 {
    let year = i64::from(year) - i64::from(month <= 2);
    let era = if year >= 0 { year } else { year - 399 } / 400;
    let year_of_era = year - era * 400;
    let month = i64::from(month);
    let day_of_year = (153 * (if month > 2 { month - 3 } else { month + 9 }) + 2) / 5
        + i64::from(day)
        - 1;
    let day_of_era = year_of_era * 365 + year_of_era / 4 - year_of_era / 100 + day_of_year;
    era * 146_097 + day_of_era - 719_468
}

fn civil_from_days(days: i64) -> (i32, u32, u32) {
    let days = days + 719_468;
    let era = if days >= 0 { days } else { days - 146_096 } / 146_097;
    let day_of_era = days - era * 146_097;
    let year_of_era =
        (day_of_era - day_of_era / 1460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let year = year_of_era + era * 400;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let mp = (5 * day_of_year + 2) / 153;
    let day = day_of_year - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = if month <= 2 { year + 1 } else { year };
    (year as i32, month as u32, day as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::events::OutputEvent;
    use serde_json::json;

    #[test]
    fn civil_day_arithmetic_round_trips() {
        for (year, month, day) in [(1970, 1, 1), (2000, 2, 29), (1958, 12, 31), (2019, 3, 14)] {
            let days = days_from_civil(year, month, day);
            assert_eq!(civil_from_days(days), (year, month, day));
        }
        assert_eq!(days_from_civil(1970, 1, 1), 0);
    }

    #[test]
    fn kernel_dates_add_days_to_the_birth_date() {
        assert_eq!(date_plus_days(1958, 0.0), "1958-01-01");
        assert_eq!(date_plus_days(1958, 31.0), "1958-02-01");
        assert_eq!(date_plus_days(1958, 365.9), "1959-01-01");
    }

    #[test]
    fn module_dates_floor_to_july_first() {
        assert_eq!(july_of_age(1950, 61.25), "2011-07-01");
        assert_eq!(july_of_age(1950, 61.99), "2011-07-01");
    }

    #[test]
    fn kernel_export_maps_results_and_onsets() {
        let events = vec![
            Event {
                id: "evt_p0001_000001".to_string(),
                pid: "p0001".to_string(),
                t: 400.0,
                kind: EventKind::ObservationResulted,
                relates_to: None,
                meta: json!({ "loinc": "4548-4", "name": "Hemoglobin A1c", "value": 7.2, "unit": "%" }),
            },
            Event {
                id: "evt_p0001_000002".to_string(),
                pid: "p0001".to_string(),
                t: 400.0,
                kind: EventKind::ConditionOnset,
                relates_to: Some("evt_p0001_000001".to_string()),
                meta: json!({ "icd10": "E11.9", "name": "Type 2 diabetes mellitus" }),
            },
            Event {
                id: "evt_p0001_000003".to_string(),
                pid: "p0001".to_string(),
                t: 401.0,
                kind: EventKind::EncounterFinished,
                relates_to: None,
                meta: json!({}),
            },
        ];

        let export = export_events("p0001", 1958, &events);
        assert_eq!(export.observations.len(), 1);
        assert_eq!(export.conditions.len(), 1);
        assert_eq!(export.conditions[0].code, "E11.9");
        assert_eq!(export.observations[0].effective_date, "1959-02-05");
    }

    #[test]
    fn module_export_maps_labs_and_diagnoses() {
        let mut patient = Patient::new("p0003", 1950);
        patient
            .events
            .push(OutputEvent::lab(61.2, "4548-4", "Hemoglobin A1c", 6.9, Some("%")));
        patient
            .events
            .push(OutputEvent::diagnosis(61.2, "E11.9", "Type 2 diabetes mellitus"));
        patient.events.push(OutputEvent::death(80.0));

        let export = export_patient(&patient);
        assert_eq!(export.patient.birth_date, "1950-01-01");
        assert_eq!(export.observations.len(), 1);
        assert_eq!(export.observations[0].effective_date, "2011-07-01");
        assert_eq!(export.conditions.len(), 1);
    }
}
