//! Month-stepped module runtime.
//!
//! A simpler driver than the kernel: it advances a patient month by month
//! between scheduled encounter and death events, calling attribute-update
//! hooks and per-disease step hooks. Shares the RNG, event model, and
//! priority queue with the kernel. Time here is the patient's age in years.
//!
//! Modules are explicit capability records rather than duck-typed objects:
//! an attribute module is `{id, category, summary, generate, update?, test?}`,
//! a disease module is
//! `{id, version, summary, init?, eligible, risk, step, invariants?, test?}`.

use std::collections::BTreeMap;
use std::fmt;

use contracts::error::{HookError, HookResult};
use contracts::AttrMap;

mod context;
mod patient;
mod runner;

pub use context::SimContext;
pub use patient::Patient;
pub use runner::{run_cohort, run_patient};

/// Result of an attribute module's `generate` hook.
#[derive(Debug, Clone, Default)]
pub struct GeneratedAttributes {
    pub attributes: AttrMap,
    pub signals: BTreeMap<String, f64>,
    pub sex_at_birth: Option<String>,
}

pub type GenerateFn = Box<dyn Fn(u32, i32) -> HookResult<GeneratedAttributes>>;
pub type UpdateFn = Box<dyn Fn(&mut SimContext<'_>, f64) -> HookResult<()>>;
/// Seeded self-check a module may declare; run in a batch by
/// [`ModuleSet::self_test`].
pub type TestFn = Box<dyn Fn(u32) -> HookResult<()>>;

pub struct AttributeModule {
    pub id: String,
    pub category: String,
    pub summary: String,
    pub generate: GenerateFn,
    pub update: Option<UpdateFn>,
    pub test: Option<TestFn>,
}

impl fmt::Debug for AttributeModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttributeModule({})", self.id)
    }
}

pub type InitFn = Box<dyn Fn(&mut SimContext<'_>) -> HookResult<()>>;
pub type EligibleFn = Box<dyn Fn(&Patient) -> HookResult<bool>>;
pub type RiskFn = Box<dyn Fn(&Patient) -> f64>;
pub type StepFn = Box<dyn Fn(&mut SimContext<'_>) -> HookResult<()>>;
/// Per-patient consistency check run after each eligible `step`; a failure
/// is logged and does not abort the patient.
pub type InvariantFn = Box<dyn Fn(&Patient) -> HookResult<()>>;

pub struct DiseaseModule {
    pub id: String,
    pub version: String,
    pub summary: String,
    pub init: Option<InitFn>,
    pub eligible: EligibleFn,
    pub risk: RiskFn,
    pub step: StepFn,
    pub invariants: Option<InvariantFn>,
    pub test: Option<TestFn>,
}

impl fmt::Debug for DiseaseModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DiseaseModule({} v{})", self.id, self.version)
    }
}

/// Resolved modules for one cohort run.
#[derive(Debug, Default)]
pub struct ModuleSet {
    pub attributes: Vec<AttributeModule>,
    pub diseases: Vec<DiseaseModule>,
}

impl ModuleSet {
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.diseases.is_empty()
    }

    /// Run every declared module self-check with `seed`, collecting failures.
    pub fn self_test(&self, seed: u32) -> Vec<HookError> {
        let mut failures = Vec::new();
        for module in &self.attributes {
            if let Some(test) = &module.test {
                if let Err(err) = test(seed) {
                    failures.push(err);
                }
            }
        }
        for module in &self.diseases {
            if let Some(test) = &module.test {
                if let Err(err) = test(seed) {
                    failures.push(err);
                }
            }
        }
        failures
    }
}
