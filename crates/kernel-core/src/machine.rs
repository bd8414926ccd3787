//! State machines, snapshots, and the closures that drive them.
//!
//! Hazards, watchers, and modifiers are boxed callables holding only their
//! machine's static data; they observe [`Snapshot`] views and never mutate
//! kernel state directly. Mutation flows back through returned effects.

use std::fmt;
use std::rc::Rc;

use contracts::error::HookResult;
use contracts::events::Event;
use contracts::{AttrMap, AttrValue, DiseaseStateMap};

use crate::effect::Effect;
use crate::rng::Xorshift32;

/// Read-only view of patient attributes and per-machine disease states.
#[derive(Clone, Copy)]
pub struct Snapshot<'a> {
    pub attributes: &'a AttrMap,
    pub diseases: &'a DiseaseStateMap,
}

impl<'a> Snapshot<'a> {
    pub fn num(&self, key: &str) -> Option<f64> {
        self.attributes.get(key).and_then(AttrValue::as_number)
    }

    pub fn flag(&self, key: &str) -> bool {
        self.attributes
            .get(key)
            .and_then(AttrValue::as_bool)
            .unwrap_or(false)
    }

    pub fn text(&self, key: &str) -> Option<&'a str> {
        self.attributes.get(key).and_then(AttrValue::as_text)
    }

    pub fn state(&self, machine: &str) -> Option<&'a str> {
        self.diseases.get(machine).map(String::as_str)
    }
}

impl fmt::Debug for Snapshot<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("attributes", &self.attributes.len())
            .field("diseases", &self.diseases.len())
            .finish()
    }
}

/// Context handed to `on_fire` handlers, watcher reactions, and thunks.
pub struct HookCtx<'a> {
    pub pid: &'a str,
    pub now: f64,
    pub snapshot: Snapshot<'a>,
    pub rng: &'a mut Xorshift32,
}

pub type HazardFn = Box<dyn Fn(&Snapshot<'_>, f64, &mut Xorshift32) -> f64>;
pub type ModifierFn = Rc<dyn Fn(f64, &Snapshot<'_>, f64) -> f64>;
pub type OnFireFn = Box<dyn Fn(&mut HookCtx<'_>) -> HookResult<Vec<Effect>>>;
pub type MatchFn = Box<dyn Fn(&Event) -> bool>;
pub type ReactFn = Box<dyn Fn(&Event, &mut HookCtx<'_>) -> HookResult<Vec<Effect>>>;
pub type ThunkFn = Box<dyn FnOnce(&mut HookCtx<'_>) -> HookResult<Vec<Effect>>>;
pub type TermsFn = Box<dyn Fn(&Snapshot<'_>, f64) -> Vec<(String, f64)>>;

/// Declared combination form of a hazard's explanation terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HazardForm {
    Additive,
    LogLinear,
}

/// Optional per-term breakdown printed on the explain stream.
pub struct HazardExplain {
    pub form: HazardForm,
    pub terms: TermsFn,
}

pub struct Transition {
    pub from: String,
    pub to: String,
    pub hazard: HazardFn,
    pub on_fire: Option<OnFireFn>,
    pub explain: Option<HazardExplain>,
}

impl Transition {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        hazard: impl Fn(&Snapshot<'_>, f64, &mut Xorshift32) -> f64 + 'static,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            hazard: Box::new(hazard),
            on_fire: None,
            explain: None,
        }
    }

    pub fn on_fire(
        mut self,
        hook: impl Fn(&mut HookCtx<'_>) -> HookResult<Vec<Effect>> + 'static,
    ) -> Self {
        self.on_fire = Some(Box::new(hook));
        self
    }

    pub fn explain(
        mut self,
        form: HazardForm,
        terms: impl Fn(&Snapshot<'_>, f64) -> Vec<(String, f64)> + 'static,
    ) -> Self {
        self.explain = Some(HazardExplain {
            form,
            terms: Box::new(terms),
        });
        self
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transition({} -> {})", self.from, self.to)
    }
}

/// Filter-and-react pair tested against every emitted event.
pub struct Watcher {
    pub id: String,
    pub matches: MatchFn,
    pub react: ReactFn,
}

impl Watcher {
    pub fn new(
        id: impl Into<String>,
        matches: impl Fn(&Event) -> bool + 'static,
        react: impl Fn(&Event, &mut HookCtx<'_>) -> HookResult<Vec<Effect>> + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            matches: Box::new(matches),
            react: Box::new(react),
        }
    }
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Watcher({})", self.id)
    }
}

/// Modifier listed in a machine's catalog; installed with a fresh token at
/// kernel construction.
pub struct ModifierDef {
    pub id: String,
    pub apply: ModifierFn,
}

pub struct Machine {
    pub id: String,
    pub states: Vec<String>,
    pub initial: String,
    pub transitions: Vec<Transition>,
    pub watchers: Vec<Watcher>,
    pub modifiers: Vec<ModifierDef>,
}

impl Machine {
    pub fn new(id: impl Into<String>, states: &[&str], initial: &str) -> Self {
        Self {
            id: id.into(),
            states: states.iter().map(|state| state.to_string()).collect(),
            initial: initial.to_string(),
            transitions: Vec::new(),
            watchers: Vec::new(),
            modifiers: Vec::new(),
        }
    }

    pub fn transition(mut self, transition: Transition) -> Self {
        self.transitions.push(transition);
        self
    }

    pub fn watcher(mut self, watcher: Watcher) -> Self {
        self.watchers.push(watcher);
        self
    }

    pub fn modifier(
        mut self,
        id: impl Into<String>,
        apply: impl Fn(f64, &Snapshot<'_>, f64) -> f64 + 'static,
    ) -> Self {
        self.modifiers.push(ModifierDef {
            id: id.into(),
            apply: Rc::new(apply),
        });
        self
    }
}

impl fmt::Debug for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("id", &self.id)
            .field("initial", &self.initial)
            .field("transitions", &self.transitions.len())
            .field("watchers", &self.watchers.len())
            .field("modifiers", &self.modifiers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::AttrValue;

    #[test]
    fn snapshot_accessors_read_both_maps() {
        let mut attributes = AttrMap::new();
        attributes.insert("bmi".to_string(), AttrValue::Number(31.0));
        attributes.insert("smoker".to_string(), AttrValue::Bool(true));
        attributes.insert("sex".to_string(), AttrValue::from("M"));
        let mut diseases = DiseaseStateMap::new();
        diseases.insert("t2dm".to_string(), "None".to_string());

        let snapshot = Snapshot {
            attributes: &attributes,
            diseases: &diseases,
        };
        assert_eq!(snapshot.num("bmi"), Some(31.0));
        assert!(snapshot.flag("smoker"));
        assert!(!snapshot.flag("absent"));
        assert_eq!(snapshot.text("sex"), Some("M"));
        assert_eq!(snapshot.state("t2dm"), Some("None"));
        assert_eq!(snapshot.state("chf"), None);
    }

    #[test]
    fn machine_builder_collects_parts() {
        let machine = Machine::new("t2dm", &["None", "T2DM"], "None")
            .transition(Transition::new("None", "T2DM", |_, _, _| 0.001))
            .modifier("half", |rate, _, _| rate * 0.5);

        assert_eq!(machine.transitions.len(), 1);
        assert_eq!(machine.modifiers.len(), 1);
        assert_eq!(machine.initial, "None");
    }
}
