//! Deterministic event-driven clinical simulation kernel.
//!
//! Advances a population of synthetic patients along a simulated timeline,
//! firing stochastic state-machine transitions whose rates depend on
//! patient state, applying their side effects, and recording a strictly
//! ordered event log. Two drivers share the RNG, event model, and priority
//! queue:
//!
//! - [`kernel::Kernel`] is the continuous-time event loop with competing
//!   hazards, watchers, and hazard modifiers; time in days.
//! - [`module_runtime`] is a month-stepped driver calling attribute-update
//!   and per-disease step hooks between scheduled events; time in years.

pub mod effect;
pub mod fhir;
pub mod kernel;
pub mod library;
pub mod machine;
pub mod module_runtime;
pub mod queue;
pub mod report;
pub mod rng;

pub use effect::{Effect, EventDraft};
pub use kernel::{BufferTrace, Kernel, KernelConfig, StdoutTrace, TraceSink};
pub use machine::{HookCtx, Machine, Snapshot, Transition, Watcher};
pub use module_runtime::{
    run_cohort, run_patient, AttributeModule, DiseaseModule, ModuleSet, Patient, SimContext,
};
pub use queue::EventQueue;
pub use rng::Xorshift32;
