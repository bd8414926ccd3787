use std::collections::BTreeMap;

use contracts::catalog::{clamp_attr, ValueLimits};
use contracts::events::{OutputEvent, OutputEventType};
use contracts::{AttrValue, CohortConfig, AGE_YEARS, SEX_AT_BIRTH};

use crate::queue::EventQueue;
use crate::rng::Xorshift32;

use super::{ModuleSet, Patient, SimContext};

const MONTH_YEARS: f64 = 1.0 / 12.0;
const MAX_AGE: f64 = 115.0;
const ENCOUNTER_SPAN_YEARS: f64 = 35.0;
const DEATH_MEAN_AGE: f64 = 88.0;
const DEATH_SCALE: f64 = 10.0;
const DEATH_SAMPLE_ATTEMPTS: u32 = 128;

/// Simulate a whole cohort sequentially. Patients are independent; each
/// gets its own RNG stream derived from the world seed and its index.
pub fn run_cohort(
    config: &CohortConfig,
    modules: &ModuleSet,
    limits: &BTreeMap<String, ValueLimits>,
) -> Vec<Patient> {
    (0..config.patients)
        .map(|index| run_patient(config, modules, limits, index))
        .collect()
}

pub fn run_patient(
    config: &CohortConfig,
    modules: &ModuleSet,
    limits: &BTreeMap<String, ValueLimits>,
    index: u32,
) -> Patient {
    let seed = config.seed.wrapping_add(index.wrapping_mul(7919));
    let mut rng = Xorshift32::new(seed);
    let birth_year = 1940 + (rng.uniform() * 60.0).floor() as i32;
    let mut patient = Patient::new(format!("p{index:04}"), birth_year);

    generate_attributes(modules, limits, &mut rng, &mut patient);

    let start_age = patient.num(AGE_YEARS).unwrap_or(18.0);
    patient.start_age = start_age;
    patient
        .attributes
        .insert(AGE_YEARS.to_string(), AttrValue::Number(start_age));

    let mut queue = EventQueue::new();
    schedule_routine_encounters(&mut rng, start_age, &mut queue);
    if let Some(death_age) = sample_death_age(&mut rng, start_age) {
        queue.push(death_age, OutputEvent::death(death_age));
    }

    for disease in &modules.diseases {
        if let Some(init) = &disease.init {
            let mut ctx = SimContext::new(start_age, &mut rng, &mut patient, &mut queue, limits);
            if let Err(err) = init(&mut ctx) {
                tracing::warn!(pid = %patient.pid, module = %disease.id, error = %err, "disease init failed");
            }
        }
    }

    let mut eligibility = recompute_eligibility(modules, &patient);

    let horizon = start_age + config.horizon_years;
    let mut last_t = start_age;
    while let Some(entry) = queue.pop() {
        let (t, event) = (entry.time, entry.item);
        if t > horizon {
            tracing::debug!(pid = %patient.pid, t, horizon, "halting on over-horizon item");
            break;
        }

        let months = ((t - last_t) * 12.0).floor().max(0.0) as u32;
        for month in 0..months {
            let month_t = last_t + f64::from(month + 1) * MONTH_YEARS;
            patient
                .attributes
                .insert(AGE_YEARS.to_string(), AttrValue::Number(month_t));
            for module in &modules.attributes {
                if let Some(update) = &module.update {
                    let mut ctx =
                        SimContext::new(month_t, &mut rng, &mut patient, &mut queue, limits);
                    if let Err(err) = update(&mut ctx, MONTH_YEARS) {
                        tracing::warn!(pid = %patient.pid, module = %module.id, error = %err, "attribute update failed");
                    }
                }
            }
            eligibility = recompute_eligibility(modules, &patient);
            step_eligible_diseases(modules, &eligibility, limits, &mut rng, &mut patient, &mut queue, month_t);
        }

        patient
            .attributes
            .insert(AGE_YEARS.to_string(), AttrValue::Number(t));
        last_t = t;

        let event_type = event.event_type;
        patient.events.push(OutputEvent { t, ..event });

        if event_type == OutputEventType::Encounter {
            if config.explain {
                for (disease, eligible) in modules.diseases.iter().zip(&eligibility) {
                    if *eligible {
                        let risk = (disease.risk)(&patient);
                        tracing::info!(pid = %patient.pid, t, disease = %disease.id, risk, "encounter risk");
                    }
                }
            }
            step_eligible_diseases(modules, &eligibility, limits, &mut rng, &mut patient, &mut queue, t);
        }

        if event_type == OutputEventType::Death {
            patient.dead = true;
            break;
        }
    }

    patient
}

fn generate_attributes(
    modules: &ModuleSet,
    limits: &BTreeMap<String, ValueLimits>,
    rng: &mut Xorshift32,
    patient: &mut Patient,
) {
    for module in &modules.attributes {
        let sub_seed = rng.child(&module.id).state();
        match (module.generate)(sub_seed, patient.birth_year) {
            Ok(generated) => {
                for (key, value) in generated.attributes {
                    let value = clamp_attr(value, limits.get(&key));
                    patient.attributes.insert(key, value);
                }
                patient.signals.extend(generated.signals);
                if let Some(sex) = generated.sex_at_birth {
                    patient
                        .attributes
                        .insert(SEX_AT_BIRTH.to_string(), AttrValue::Text(sex));
                }
            }
            Err(err) => {
                tracing::warn!(pid = %patient.pid, module = %module.id, error = %err, "attribute generation failed");
            }
        }
    }
}

/// Routine-encounter series: cadence by start age with ±3 months jitter,
/// beginning within a year of start, until `start_age + 35` or age 115.
fn schedule_routine_encounters(
    rng: &mut Xorshift32,
    start_age: f64,
    queue: &mut EventQueue<OutputEvent>,
) {
    let cadence_months = if start_age < 40.0 {
        18.0
    } else if start_age >= 65.0 {
        10.0
    } else {
        14.0
    };

    let stop = (start_age + ENCOUNTER_SPAN_YEARS).min(MAX_AGE);
    let mut t = start_age + rng.uniform();
    while t < stop {
        queue.push(t, OutputEvent::encounter(t, "PCP"));
        let jitter = rng.uniform() * 6.0 - 3.0;
        t += (cadence_months + jitter) * MONTH_YEARS;
    }
}

/// Logistic death-age draw, rejected outside `(start_age + 0.75, 115)`.
/// Some patients omit the death event entirely, so their record runs to
/// the horizon instead.
fn sample_death_age(rng: &mut Xorshift32, start_age: f64) -> Option<f64> {
    let omit_probability = (0.36 - 0.0035 * (start_age - 35.0).max(0.0)).clamp(0.15, 0.5);
    if rng.uniform() < omit_probability {
        return None;
    }
    for _ in 0..DEATH_SAMPLE_ATTEMPTS {
        let u = rng.uniform();
        let draw = DEATH_MEAN_AGE + DEATH_SCALE * (u / (1.0 - u)).ln();
        if draw > start_age + 0.75 && draw < MAX_AGE {
            return Some(draw);
        }
    }
    None
}

fn recompute_eligibility(modules: &ModuleSet, patient: &Patient) -> Vec<bool> {
    modules
        .diseases
        .iter()
        .map(|disease| match (disease.eligible)(patient) {
            Ok(eligible) => eligible,
            Err(err) => {
                tracing::warn!(pid = %patient.pid, module = %disease.id, error = %err, "eligibility check failed; treating as not eligible");
                false
            }
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn step_eligible_diseases(
    modules: &ModuleSet,
    eligibility: &[bool],
    limits: &BTreeMap<String, ValueLimits>,
    rng: &mut Xorshift32,
    patient: &mut Patient,
    queue: &mut EventQueue<OutputEvent>,
    now: f64,
) {
    for (disease, eligible) in modules.diseases.iter().zip(eligibility) {
        if !*eligible {
            continue;
        }
        let mut ctx = SimContext::new(now, rng, patient, queue, limits);
        if let Err(err) = (disease.step)(&mut ctx) {
            tracing::warn!(pid = %patient.pid, module = %disease.id, error = %err, "disease step failed");
        }
        if let Some(invariants) = &disease.invariants {
            if let Err(err) = invariants(patient) {
                tracing::warn!(pid = %patient.pid, module = %disease.id, error = %err, "module invariant violated");
            }
        }
    }
}
