//! Built-in disease modules.

use contracts::error::HookError;
use contracts::events::OutputEvent;
use contracts::{AttrValue, AGE_YEARS};

use crate::module_runtime::{DiseaseModule, Patient, SimContext};

use super::attributes::{A1C, BMI, SBP, SMOKER};

const A1C_DIAGNOSTIC_THRESHOLD: f64 = 6.5;
const SBP_DIAGNOSTIC_THRESHOLD: f64 = 140.0;

pub fn t2dm() -> DiseaseModule {
    DiseaseModule {
        id: "t2dm".to_string(),
        version: "1.0".to_string(),
        summary: "Type 2 diabetes: A1C progression and diagnosis".to_string(),
        init: Some(Box::new(|ctx: &mut SimContext<'_>| {
            if ctx.attr(A1C).is_none() {
                let baseline = ctx.rng_normal(5.4, 0.4);
                ctx.set_attr(A1C, baseline);
            }
            Ok(())
        })),
        eligible: Box::new(|patient: &Patient| {
            Ok(patient.age() >= 30.0 && !patient.has_diagnosis("E11.9"))
        }),
        risk: Box::new(t2dm_annual_risk),
        step: Box::new(|ctx: &mut SimContext<'_>| {
            if ctx.patient().has_diagnosis("E11.9") {
                return Ok(());
            }
            let risk = t2dm_annual_risk(ctx.patient());
            let a1c = ctx.patient().num(A1C).unwrap_or(5.4);
            let drift = ctx.rng_normal(risk * 0.05, 0.01).max(0.0);
            let next = a1c + drift;
            ctx.set_attr(A1C, next);

            if next >= A1C_DIAGNOSTIC_THRESHOLD {
                ctx.emit(OutputEvent::lab(0.0, "4548-4", "Hemoglobin A1c", next, Some("%")));
                ctx.emit(OutputEvent::diagnosis(0.0, "E11.9", "Type 2 diabetes mellitus"));
                ctx.emit(OutputEvent::medication(0.0, "metformin", Some("500 mg")));
            }
            Ok(())
        }),
        invariants: Some(Box::new(|patient: &Patient| {
            if let Some(a1c) = patient.num(A1C) {
                if !a1c.is_finite() || a1c <= 0.0 {
                    return Err(HookError::new("t2dm", format!("implausible A1C {a1c}")));
                }
            }
            if patient.has_diagnosis("E11.9") && !patient.on_medication("metformin") {
                return Err(HookError::new("t2dm", "E11.9 recorded without first-line therapy"));
            }
            Ok(())
        })),
        test: Some(Box::new(|_seed| {
            let probe = |bmi: f64, age: f64, a1c: f64| {
                let mut patient = Patient::new("probe", 1960);
                patient.attributes.insert(BMI.to_string(), AttrValue::Number(bmi));
                patient
                    .attributes
                    .insert(AGE_YEARS.to_string(), AttrValue::Number(age));
                patient.attributes.insert(A1C.to_string(), AttrValue::Number(a1c));
                t2dm_annual_risk(&patient)
            };
            if probe(34.0, 60.0, 7.0) <= probe(22.0, 45.0, 5.2) {
                return Err(HookError::new("t2dm", "risk not monotone in risk factors"));
            }
            Ok(())
        })),
    }
}

fn t2dm_annual_risk(patient: &Patient) -> f64 {
    let bmi = patient.num(BMI).unwrap_or(25.0);
    let age = patient.num(AGE_YEARS).unwrap_or(40.0);
    let a1c = patient.num(A1C).unwrap_or(5.4);
    let smoker = if patient.flag(SMOKER) { 0.4 } else { 0.0 };
    let exponent = 0.09 * (bmi - 27.0) + 0.04 * (age - 55.0) + 0.8 * (a1c - 5.7) + smoker;
    (0.02 * exponent.exp()).min(0.8)
}

pub fn hypertension() -> DiseaseModule {
    DiseaseModule {
        id: "hypertension".to_string(),
        version: "1.0".to_string(),
        summary: "Essential hypertension from sustained systolic pressure".to_string(),
        init: None,
        eligible: Box::new(|patient: &Patient| {
            Ok(patient.age() >= 18.0 && !patient.has_diagnosis("I10"))
        }),
        risk: Box::new(hypertension_annual_risk),
        step: Box::new(|ctx: &mut SimContext<'_>| {
            if ctx.patient().has_diagnosis("I10") {
                return Ok(());
            }
            let sbp = ctx.patient().num(SBP).unwrap_or(120.0);
            if sbp < SBP_DIAGNOSTIC_THRESHOLD {
                return Ok(());
            }
            // sustained elevation: require two consecutive elevated steps
            let streak = ctx.get("sbp_elevated_steps").unwrap_or(0.0) + 1.0;
            ctx.set("sbp_elevated_steps", streak);
            if streak >= 2.0 {
                ctx.emit(OutputEvent::lab(0.0, "8480-6", "Systolic blood pressure", sbp, Some("mm[Hg]")));
                ctx.emit(OutputEvent::diagnosis(0.0, "I10", "Essential hypertension"));
                ctx.emit(OutputEvent::medication(0.0, "lisinopril", Some("10 mg")));
            }
            Ok(())
        }),
        invariants: None,
        test: None,
    }
}

fn hypertension_annual_risk(patient: &Patient) -> f64 {
    let sbp = patient.num(SBP).unwrap_or(120.0);
    let age = patient.num(AGE_YEARS).unwrap_or(40.0);
    (0.01 * ((sbp - 115.0) * 0.06 + (age - 40.0) * 0.02).exp()).min(0.9)
}

pub fn obesity() -> DiseaseModule {
    DiseaseModule {
        id: "obesity".to_string(),
        version: "1.0".to_string(),
        summary: "Obesity diagnosis from BMI".to_string(),
        init: None,
        eligible: Box::new(|_: &Patient| Ok(true)),
        risk: Box::new(|patient: &Patient| {
            let bmi = patient.num(BMI).unwrap_or(25.0);
            ((bmi - 25.0) * 0.05).clamp(0.0, 1.0)
        }),
        step: Box::new(|ctx: &mut SimContext<'_>| {
            if ctx.patient().has_diagnosis("E66.9") {
                return Ok(());
            }
            if ctx.patient().num(BMI).unwrap_or(25.0) >= 30.0 {
                ctx.emit(OutputEvent::diagnosis(0.0, "E66.9", "Obesity"));
            }
            Ok(())
        }),
        invariants: None,
        test: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::AttrValue;

    fn patient_with(bmi: f64, age: f64, a1c: f64) -> Patient {
        let mut patient = Patient::new("p0000", 1960);
        patient
            .attributes
            .insert(BMI.to_string(), AttrValue::Number(bmi));
        patient
            .attributes
            .insert(AGE_YEARS.to_string(), AttrValue::Number(age));
        patient
            .attributes
            .insert(A1C.to_string(), AttrValue::Number(a1c));
        patient
    }

    #[test]
    fn t2dm_risk_grows_with_bmi_and_a1c() {
        let low = t2dm_annual_risk(&patient_with(22.0, 45.0, 5.2));
        let high = t2dm_annual_risk(&patient_with(34.0, 60.0, 7.0));
        assert!(high > low);
        assert!(high <= 0.8);
    }

    #[test]
    fn t2dm_eligibility_excludes_diagnosed_patients() {
        let module = t2dm();
        let mut patient = patient_with(30.0, 50.0, 6.0);
        assert!((module.eligible)(&patient).expect("eligible"));

        patient
            .diagnoses
            .insert("E11.9".to_string(), "Type 2 diabetes mellitus".to_string());
        assert!(!(module.eligible)(&patient).expect("eligible"));
    }

    #[test]
    fn obesity_is_always_eligible() {
        let module = obesity();
        assert!((module.eligible)(&Patient::new("p0000", 1990)).expect("eligible"));
    }

    #[test]
    fn t2dm_self_test_and_invariants_accept_a_consistent_patient() {
        let module = t2dm();
        (module.test.expect("test hook"))(7).expect("self-test");

        let invariants = module.invariants.expect("invariants hook");
        let mut patient = patient_with(30.0, 50.0, 6.0);
        invariants(&patient).expect("plausible patient");

        patient
            .diagnoses
            .insert("E11.9".to_string(), "Type 2 diabetes mellitus".to_string());
        assert!(invariants(&patient).is_err(), "diagnosis without therapy passed");
    }
}
