//! Effects returned by transitions, watchers, and thunks.
//!
//! The closed effect set is the only mutation surface of the kernel: hooks
//! never touch attributes, disease states, or the queue directly.

use std::fmt;

use contracts::events::EventKind;
use contracts::AttrValue;
use serde_json::Value;

use crate::machine::{ModifierFn, ThunkFn};

/// Event content as produced by a hook. The kernel stamps `id`, `pid`, and
/// `t` when the draft is appended to the log.
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub kind: EventKind,
    pub relates_to: Option<String>,
    pub meta: Value,
}

impl EventDraft {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            relates_to: None,
            meta: Value::Null,
        }
    }

    pub fn relates_to(mut self, event_id: impl Into<String>) -> Self {
        self.relates_to = Some(event_id.into());
        self
    }

    pub fn meta(mut self, meta: Value) -> Self {
        self.meta = meta;
        self
    }
}

pub enum Effect {
    /// Append an event to the log and dispatch every watcher against it.
    Emit(EventDraft),
    /// Write an attribute through the catalog clamp.
    SetAttr { key: String, value: AttrValue },
    /// Force a machine into a state; no-op when the state is unchanged.
    SetDisease { machine: String, state: String },
    /// Install a hazard modifier, optionally with a timed removal.
    ModifyHazard {
        machine: String,
        modifier_id: String,
        apply: ModifierFn,
        until: Option<f64>,
    },
    /// Enqueue a thunk at `at` (clamped to now when in the past).
    Schedule { at: f64, thunk: ThunkFn },
}

impl Effect {
    pub fn emit(draft: EventDraft) -> Self {
        Effect::Emit(draft)
    }

    pub fn set_attr(key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        Effect::SetAttr {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn set_disease(machine: impl Into<String>, state: impl Into<String>) -> Self {
        Effect::SetDisease {
            machine: machine.into(),
            state: state.into(),
        }
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Emit(draft) => write!(f, "Emit({:?})", draft.kind),
            Effect::SetAttr { key, value } => write!(f, "SetAttr({key} = {value:?})"),
            Effect::SetDisease { machine, state } => write!(f, "SetDisease({machine} -> {state})"),
            Effect::ModifyHazard {
                machine,
                modifier_id,
                until,
                ..
            } => write!(f, "ModifyHazard({machine}, {modifier_id}, until={until:?})"),
            Effect::Schedule { at, .. } => write!(f, "Schedule(at={at})"),
        }
    }
}
