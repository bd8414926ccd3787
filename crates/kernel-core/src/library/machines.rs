//! Kernel machine presets: a primary-care encounter cycle and a type 2
//! diabetes machine whose watchers drive A1C screening and diagnosis.
//!
//! The kernel path reads the lower-case attribute keys (`ageYr`, `bmi`,
//! `smoker`, `a1c`) used by kernel snapshots, not the catalog keys of the
//! module runtime.

use contracts::events::EventKind;
use contracts::{AGE_YR, DAYS_PER_YEAR};
use serde_json::json;

use crate::effect::{Effect, EventDraft};
use crate::machine::{HazardForm, Machine, Transition, Watcher};

pub const T2DM_MACHINE: &str = "t2dm";
pub const ENCOUNTERS_MACHINE: &str = "encounters";
pub const LOINC_A1C: &str = "4548-4";

/// PCP encounter cycle: Idle → InVisit on an age-scaled hazard, back to
/// Idle roughly a day later.
pub fn encounters() -> Machine {
    Machine::new(ENCOUNTERS_MACHINE, &["Idle", "InVisit"], "Idle")
        .transition(
            Transition::new("Idle", "InVisit", |snapshot, _t, _rng| {
                let age = snapshot.num(AGE_YR).unwrap_or(40.0);
                let visits_per_year = 2.0 + 0.03 * (age - 40.0).max(0.0);
                visits_per_year / DAYS_PER_YEAR
            })
            .on_fire(|_ctx| {
                Ok(vec![Effect::emit(
                    EventDraft::new(EventKind::EncounterStarted).meta(json!({ "kind": "PCP" })),
                )])
            })
            .explain(HazardForm::Additive, |snapshot, _t| {
                let age = snapshot.num(AGE_YR).unwrap_or(40.0);
                vec![
                    ("base".to_string(), 2.0 / DAYS_PER_YEAR),
                    ("age".to_string(), 0.03 * (age - 40.0).max(0.0) / DAYS_PER_YEAR),
                ]
            }),
        )
        .transition(
            Transition::new("InVisit", "Idle", |_snapshot, _t, _rng| 1.0).on_fire(|_ctx| {
                Ok(vec![Effect::emit(
                    EventDraft::new(EventKind::EncounterFinished).meta(json!({ "kind": "PCP" })),
                )])
            }),
        )
}

/// Type 2 diabetes machine. Competing paths to onset: a slow log-linear
/// background hazard, and the screening watcher chain that orders an A1C
/// at every encounter and diagnoses on a result at or above 6.5.
pub fn t2dm() -> Machine {
    Machine::new(T2DM_MACHINE, &["None", "T2DM"], "None")
        .transition(
            Transition::new("None", "T2DM", |snapshot, _t, _rng| {
                annual_onset_rate(snapshot) / DAYS_PER_YEAR
            })
            .on_fire(|ctx| {
                Ok(vec![Effect::emit(
                    EventDraft::new(EventKind::ConditionOnset).meta(json!({
                        "icd10": "E11.9",
                        "name": "Type 2 diabetes mellitus",
                        "a1c": ctx.snapshot.num("a1c"),
                    })),
                )])
            })
            .explain(HazardForm::LogLinear, |snapshot, _t| {
                let bmi = snapshot.num("bmi").unwrap_or(25.0);
                let age = snapshot.num(AGE_YR).unwrap_or(40.0);
                let a1c = snapshot.num("a1c").unwrap_or(5.4);
                vec![
                    ("bmi".to_string(), 0.09 * (bmi - 27.0)),
                    ("age".to_string(), 0.04 * (age - 55.0)),
                    ("a1c".to_string(), 0.8 * (a1c - 5.7)),
                    ("smoker".to_string(), if snapshot.flag("smoker") { 0.4 } else { 0.0 }),
                ]
            }),
        )
        .watcher(Watcher::new(
            "a1c-screening-order",
            |event| event.kind == EventKind::EncounterStarted,
            |event, _ctx| {
                Ok(vec![Effect::emit(
                    EventDraft::new(EventKind::ObservationOrdered)
                        .relates_to(event.id.clone())
                        .meta(json!({ "loinc": LOINC_A1C, "name": "Hemoglobin A1c" })),
                )])
            },
        ))
        .watcher(Watcher::new(
            "a1c-resulting",
            |event| {
                event.kind == EventKind::ObservationOrdered
                    && event.meta["loinc"] == json!(LOINC_A1C)
            },
            |event, ctx| {
                let latent = ctx.snapshot.num("a1c").unwrap_or(5.4);
                let value = latent + ctx.rng.normal(0.0, 0.1);
                Ok(vec![
                    Effect::emit(
                        EventDraft::new(EventKind::ObservationCollected)
                            .relates_to(event.id.clone())
                            .meta(json!({ "loinc": LOINC_A1C })),
                    ),
                    Effect::emit(
                        EventDraft::new(EventKind::ObservationResulted)
                            .relates_to(event.id.clone())
                            .meta(json!({
                                "loinc": LOINC_A1C,
                                "name": "Hemoglobin A1c",
                                "value": value,
                                "unit": "%",
                            })),
                    ),
                ])
            },
        ))
        .watcher(Watcher::new(
            "a1c-diagnosis",
            |event| {
                event.kind == EventKind::ObservationResulted
                    && event.meta["loinc"] == json!(LOINC_A1C)
                    && event.meta["value"].as_f64().unwrap_or(0.0) >= 6.5
            },
            |event, ctx| {
                if ctx.snapshot.state(T2DM_MACHINE) != Some("None") {
                    return Ok(Vec::new());
                }
                Ok(vec![
                    Effect::emit(
                        EventDraft::new(EventKind::ConditionOnset)
                            .relates_to(event.id.clone())
                            .meta(json!({
                                "icd10": "E11.9",
                                "name": "Type 2 diabetes mellitus",
                            })),
                    ),
                    Effect::set_disease(T2DM_MACHINE, "T2DM"),
                    Effect::emit(
                        EventDraft::new(EventKind::MedicationStarted)
                            .meta(json!({ "drug": "metformin", "dose": "500 mg" })),
                    ),
                ])
            },
        ))
}

fn annual_onset_rate(snapshot: &crate::machine::Snapshot<'_>) -> f64 {
    let bmi = snapshot.num("bmi").unwrap_or(25.0);
    let age = snapshot.num(AGE_YR).unwrap_or(40.0);
    let a1c = snapshot.num("a1c").unwrap_or(5.4);
    let smoker = if snapshot.flag("smoker") { 0.4 } else { 0.0 };
    let exponent = 0.09 * (bmi - 27.0) + 0.04 * (age - 55.0) + 0.8 * (a1c - 5.7) + smoker;
    (0.02 * exponent.exp()).min(0.8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{AttrMap, AttrValue, DiseaseStateMap};

    #[test]
    fn onset_rate_tracks_risk_factors() {
        let mut attributes = AttrMap::new();
        attributes.insert(AGE_YR.to_string(), AttrValue::Number(60.0));
        attributes.insert("bmi".to_string(), AttrValue::Number(34.0));
        attributes.insert("a1c".to_string(), AttrValue::Number(7.0));
        attributes.insert("smoker".to_string(), AttrValue::Bool(true));
        let diseases = DiseaseStateMap::new();
        let snapshot = crate::machine::Snapshot {
            attributes: &attributes,
            diseases: &diseases,
        };
        let elevated = annual_onset_rate(&snapshot);

        let lean = AttrMap::new();
        let baseline = crate::machine::Snapshot {
            attributes: &lean,
            diseases: &diseases,
        };
        assert!(elevated > annual_onset_rate(&baseline));
    }

    #[test]
    fn presets_declare_expected_shapes() {
        let encounters = encounters();
        assert_eq!(encounters.transitions.len(), 2);
        assert!(encounters.watchers.is_empty());

        let t2dm = t2dm();
        assert_eq!(t2dm.initial, "None");
        assert_eq!(t2dm.watchers.len(), 3);
    }
}
