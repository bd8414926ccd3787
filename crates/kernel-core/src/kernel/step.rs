use super::*;
use crate::machine::HookCtx;

impl Kernel {
    /// Run the event loop to completion: queue exhaustion, the first
    /// over-horizon pop, or a recorded death.
    pub fn run(&mut self) {
        for machine in 0..self.machines.len() {
            self.schedule_machine(machine);
        }

        while let Some(entry) = self.queue.pop() {
            if entry.time > self.horizon {
                // effects scheduled past the horizon are dropped, not re-enqueued
                tracing::debug!(
                    pid = %self.pid,
                    t = entry.time,
                    horizon = self.horizon,
                    "halting on over-horizon item"
                );
                break;
            }
            self.advance_to(entry.time);

            match entry.item {
                QueueItem::Transition {
                    machine,
                    transition,
                    version,
                    detail,
                } => self.fire_transition(machine, transition, version, detail),
                QueueItem::Thunk(thunk) => {
                    let result = {
                        let snapshot = Snapshot {
                            attributes: &self.attributes,
                            diseases: &self.diseases,
                        };
                        let mut ctx = HookCtx {
                            pid: &self.pid,
                            now: self.now,
                            snapshot,
                            rng: &mut self.fx_rng,
                        };
                        thunk(&mut ctx)
                    };
                    match result {
                        Ok(effects) => self.apply(effects),
                        Err(err) => tracing::warn!(
                            pid = %self.pid,
                            error = %err,
                            "scheduled thunk failed; continuing"
                        ),
                    }
                }
                QueueItem::ModifierExpiry {
                    machine,
                    modifier_id,
                    token,
                } => {
                    if self.remove_modifier_if_current(machine, &modifier_id, token) {
                        self.schedule_machine(machine);
                    }
                }
            }

            if self.dead {
                break;
            }
        }
    }

    fn fire_transition(
        &mut self,
        machine: usize,
        transition: usize,
        version: u64,
        detail: TransitionDetail,
    ) {
        if self.runtimes[machine].version != version {
            return; // stale item, superseded by a later state or modifier change
        }
        if self.machines[machine].transitions[transition].from != self.runtimes[machine].state {
            return;
        }

        let from = self.runtimes[machine].state.clone();
        let to = self.machines[machine].transitions[transition].to.clone();
        let machine_id = self.machines[machine].id.clone();

        self.runtimes[machine].state = to.clone();
        self.runtimes[machine].version += 1;
        self.diseases.insert(machine_id.clone(), to.clone());

        if self.explain_enabled {
            self.trace_transition(&machine_id, &from, &to, &detail);
        }

        let fired = {
            let hook = self.machines[machine].transitions[transition].on_fire.as_ref();
            hook.map(|on_fire| {
                let snapshot = Snapshot {
                    attributes: &self.attributes,
                    diseases: &self.diseases,
                };
                let mut ctx = HookCtx {
                    pid: &self.pid,
                    now: self.now,
                    snapshot,
                    rng: &mut self.fx_rng,
                };
                on_fire(&mut ctx)
            })
        };
        match fired {
            Some(Ok(effects)) => self.apply(effects),
            Some(Err(err)) => tracing::warn!(
                pid = %self.pid,
                machine = %machine_id,
                error = %err,
                "on_fire failed; state change is not rolled back"
            ),
            None => {}
        }

        self.schedule_machine(machine);
    }
}
