//! The central event loop: holds one patient's state and drives it to the
//! horizon.

use std::collections::BTreeMap;

use contracts::catalog::ValueLimits;
use contracts::events::{Event, EventKind};
use contracts::{AttrMap, AttrValue, DiseaseStateMap, AGE_YR, DAYS_PER_YEAR};
use serde_json::Value;

use crate::machine::{Machine, ModifierFn, Snapshot, ThunkFn};
use crate::queue::EventQueue;
use crate::rng::Xorshift32;

mod effects;
mod explain;
mod schedule;
mod step;

pub use explain::{BufferTrace, StdoutTrace, TraceSink};

const DEFAULT_AGE_BASE: f64 = 40.0;

/// Explanation detail captured when a transition item is enqueued.
#[derive(Debug, Clone)]
pub struct TransitionDetail {
    pub base_rate: f64,
    pub modifier_rates: Vec<(String, f64)>,
    pub delay: f64,
    pub terms: Vec<(String, f64)>,
}

pub(crate) enum QueueItem {
    Transition {
        machine: usize,
        transition: usize,
        version: u64,
        detail: TransitionDetail,
    },
    Thunk(ThunkFn),
    ModifierExpiry {
        machine: usize,
        modifier_id: String,
        token: u64,
    },
}

#[derive(Debug, Clone)]
struct MachineRuntime {
    state: String,
    version: u64,
}

struct ModifierEntry {
    id: String,
    token: u64,
    apply: ModifierFn,
}

#[derive(Debug, Clone)]
pub struct KernelConfig {
    pub pid: String,
    pub start: f64,
    pub horizon: f64,
    pub explain: bool,
}

impl KernelConfig {
    pub fn new(pid: impl Into<String>, horizon: f64) -> Self {
        Self {
            pid: pid.into(),
            start: 0.0,
            horizon,
            explain: false,
        }
    }

    pub fn explain(mut self, explain: bool) -> Self {
        self.explain = explain;
        self
    }
}

pub struct Kernel {
    pid: String,
    machines: Vec<Machine>,
    machine_index: BTreeMap<String, usize>,
    attributes: AttrMap,
    diseases: DiseaseStateMap,
    runtimes: Vec<MachineRuntime>,
    modifiers: Vec<Vec<ModifierEntry>>,
    limits: BTreeMap<String, ValueLimits>,
    queue: EventQueue<QueueItem>,
    events: Vec<Event>,
    now: f64,
    horizon: f64,
    age_base: f64,
    explain_enabled: bool,
    rng: Xorshift32,
    fx_rng: Xorshift32,
    next_token: u64,
    next_event_seq: u64,
    replay_hash: u64,
    dead: bool,
    trace: Option<Box<dyn TraceSink>>,
}

impl Kernel {
    pub fn new(
        config: KernelConfig,
        machines: Vec<Machine>,
        initial_attributes: AttrMap,
        initial_diseases: DiseaseStateMap,
        rng: Xorshift32,
    ) -> Self {
        let age_base = initial_attributes
            .get(AGE_YR)
            .and_then(AttrValue::as_number)
            .unwrap_or(DEFAULT_AGE_BASE);

        let mut diseases = initial_diseases;
        let mut machine_index = BTreeMap::new();
        let mut runtimes = Vec::with_capacity(machines.len());
        for (index, machine) in machines.iter().enumerate() {
            machine_index.insert(machine.id.clone(), index);
            let state = diseases
                .entry(machine.id.clone())
                .or_insert_with(|| machine.initial.clone())
                .clone();
            runtimes.push(MachineRuntime { state, version: 0 });
        }

        let fx_rng = rng.child("fx");
        let mut kernel = Self {
            pid: config.pid,
            machines,
            machine_index,
            attributes: initial_attributes,
            diseases,
            runtimes,
            modifiers: Vec::new(),
            limits: BTreeMap::new(),
            queue: EventQueue::new(),
            events: Vec::new(),
            now: config.start,
            horizon: config.horizon,
            age_base,
            explain_enabled: config.explain,
            rng,
            fx_rng,
            next_token: 0,
            next_event_seq: 0,
            replay_hash: 0,
            dead: false,
            trace: None,
        };

        kernel.modifiers = kernel.machines.iter().map(|_| Vec::new()).collect();
        for machine in 0..kernel.machines.len() {
            let listed = kernel.machines[machine]
                .modifiers
                .iter()
                .map(|def| (def.id.clone(), def.apply.clone()))
                .collect::<Vec<_>>();
            for (id, apply) in listed {
                kernel.install_modifier(machine, &id, apply);
            }
        }
        kernel
    }

    pub fn with_limits(mut self, limits: BTreeMap<String, ValueLimits>) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_trace(mut self, sink: Box<dyn TraceSink>) -> Self {
        self.trace = Some(sink);
        self
    }

    pub fn pid(&self) -> &str {
        &self.pid
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn horizon(&self) -> f64 {
        self.horizon
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn attributes(&self) -> &AttrMap {
        &self.attributes
    }

    pub fn diseases(&self) -> &DiseaseStateMap {
        &self.diseases
    }

    pub fn replay_hash(&self) -> u64 {
        self.replay_hash
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    pub fn state_of(&self, machine: &str) -> Option<&str> {
        let index = self.machine_index.get(machine)?;
        Some(self.runtimes[*index].state.as_str())
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            attributes: &self.attributes,
            diseases: &self.diseases,
        }
    }

    pub(crate) fn machine_idx(&self, machine: &str) -> Option<usize> {
        self.machine_index.get(machine).copied()
    }

    pub(crate) fn advance_to(&mut self, t: f64) {
        self.now = t;
        let age = self.age_base + t / DAYS_PER_YEAR;
        self.attributes
            .insert(AGE_YR.to_string(), AttrValue::Number(age));
    }

    pub(crate) fn push_event(
        &mut self,
        kind: EventKind,
        relates_to: Option<String>,
        meta: Value,
    ) -> Event {
        self.next_event_seq += 1;
        let id = format!("evt_{}_{:06}", self.pid, self.next_event_seq);
        let event = Event {
            id: id.clone(),
            pid: self.pid.clone(),
            t: self.now,
            kind,
            relates_to,
            meta,
        };
        self.replay_hash = mix_replay_hash(self.replay_hash, &id, self.now, self.next_event_seq);
        self.events.push(event.clone());
        event
    }

    /// Install a modifier, returning its fresh token. Reinstalling under an
    /// existing id replaces the entry in place, preserving insertion order.
    pub(crate) fn install_modifier(
        &mut self,
        machine: usize,
        modifier_id: &str,
        apply: ModifierFn,
    ) -> u64 {
        self.next_token += 1;
        let token = self.next_token;
        let entries = &mut self.modifiers[machine];
        match entries.iter_mut().find(|entry| entry.id == modifier_id) {
            Some(existing) => {
                existing.token = token;
                existing.apply = apply;
            }
            None => entries.push(ModifierEntry {
                id: modifier_id.to_string(),
                token,
                apply,
            }),
        }
        token
    }

    /// Remove a modifier only when its stored token still matches; a later
    /// reinstallation under the same id survives the original's expiry.
    pub(crate) fn remove_modifier_if_current(
        &mut self,
        machine: usize,
        modifier_id: &str,
        token: u64,
    ) -> bool {
        let entries = &mut self.modifiers[machine];
        let position = entries
            .iter()
            .position(|entry| entry.id == modifier_id && entry.token == token);
        match position {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }
}

fn mix_replay_hash(current: u64, event_id: &str, t: f64, sequence: u64) -> u64 {
    let mut hash = current ^ t.to_bits().wrapping_mul(0xA24B_1C62_5B93_2D47);
    hash ^= sequence.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    for byte in event_id.as_bytes() {
        hash = hash.rotate_left(7) ^ u64::from(*byte);
        hash = hash.wrapping_mul(0x517C_C1B7_2722_0A95);
    }
    hash
}
