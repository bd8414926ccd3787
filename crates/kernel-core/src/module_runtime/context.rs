use std::collections::BTreeMap;

use contracts::catalog::{clamp_attr, ValueLimits};
use contracts::events::{OutputEvent, OutputEventType};
use contracts::AttrValue;

use crate::queue::EventQueue;
use crate::rng::Xorshift32;

use super::Patient;

/// Execution context handed to module hooks.
///
/// `now` is the patient's current age in years; it starts at the patient's
/// start age and tracks age for the whole run. Emitted events are stamped
/// at `now`; emitted diagnoses and medications are also reflected into the
/// patient's `diagnoses` / `meds_on` maps.
pub struct SimContext<'a> {
    now: f64,
    rng: &'a mut Xorshift32,
    patient: &'a mut Patient,
    queue: &'a mut EventQueue<OutputEvent>,
    limits: &'a BTreeMap<String, ValueLimits>,
}

impl<'a> SimContext<'a> {
    pub fn new(
        now: f64,
        rng: &'a mut Xorshift32,
        patient: &'a mut Patient,
        queue: &'a mut EventQueue<OutputEvent>,
        limits: &'a BTreeMap<String, ValueLimits>,
    ) -> Self {
        Self {
            now,
            rng,
            patient,
            queue,
            limits,
        }
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn patient(&self) -> &Patient {
        self.patient
    }

    pub fn rng_uniform(&mut self) -> f64 {
        self.rng.uniform()
    }

    pub fn rng_normal(&mut self, mu: f64, sigma: f64) -> f64 {
        self.rng.normal(mu, sigma)
    }

    /// Record an event at the current time.
    pub fn emit(&mut self, event: OutputEvent) {
        let mut event = event;
        event.t = self.now;
        match event.event_type {
            OutputEventType::Diagnosis => {
                let code = event.payload["code"].as_str().unwrap_or_default();
                let name = event.payload["name"].as_str().unwrap_or_default();
                if !code.is_empty() {
                    self.patient
                        .diagnoses
                        .insert(code.to_string(), name.to_string());
                }
            }
            OutputEventType::Medication => {
                let drug = event.payload["drug"].as_str().unwrap_or_default();
                let dose = event.payload["dose"].as_str().map(str::to_string);
                if !drug.is_empty() {
                    self.patient.meds_on.insert(drug.to_string(), dose);
                }
            }
            _ => {}
        }
        self.patient.events.push(event);
    }

    /// Enqueue an event `delay_years` from now. Negative delays clamp to now.
    pub fn schedule(&mut self, delay_years: f64, event: OutputEvent) {
        let at = self.now + delay_years.max(0.0);
        self.queue.push(at, event);
    }

    /// Read a signal from the scratchpad.
    pub fn get(&self, key: &str) -> Option<f64> {
        self.patient.signals.get(key).copied()
    }

    /// Write a signal to the scratchpad.
    pub fn set(&mut self, key: &str, value: f64) {
        self.patient.signals.insert(key.to_string(), value);
    }

    pub fn attr(&self, id: &str) -> Option<&AttrValue> {
        self.patient.attributes.get(id)
    }

    /// Write an attribute; numeric values are re-clamped against the catalog.
    pub fn set_attr(&mut self, id: &str, value: impl Into<AttrValue>) {
        let value = clamp_attr(value.into(), self.limits.get(id));
        self.patient.attributes.insert(id.to_string(), value);
    }

    pub fn log(&self, message: &str) {
        tracing::debug!(pid = %self.patient.pid, t = self.now, "{message}");
    }
}
