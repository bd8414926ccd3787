use std::collections::VecDeque;

use contracts::catalog::clamp_attr;

use super::*;
use crate::effect::Effect;
use crate::machine::HookCtx;

impl Kernel {
    /// Apply a batch of effects in breadth-first order.
    ///
    /// Watcher reactions are appended to the same processing queue, so a
    /// transition's effects and everything they spawn transitively complete
    /// before the next scheduled item is dequeued.
    pub fn apply(&mut self, effects: Vec<Effect>) {
        let mut pending: VecDeque<Effect> = effects.into();
        while let Some(effect) = pending.pop_front() {
            match effect {
                Effect::Emit(draft) => {
                    let event = self.push_event(draft.kind, draft.relates_to, draft.meta);
                    if event.kind == EventKind::Death {
                        self.dead = true;
                    }
                    for machine in 0..self.machines.len() {
                        for watcher in 0..self.machines[machine].watchers.len() {
                            if !(self.machines[machine].watchers[watcher].matches)(&event) {
                                continue;
                            }
                            let reaction = {
                                let hook = &self.machines[machine].watchers[watcher];
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
                                (hook.react)(&event, &mut ctx)
                            };
                            match reaction {
                                Ok(spawned) => pending.extend(spawned),
                                Err(err) => tracing::warn!(
                                    pid = %self.pid,
                                    watcher = %self.machines[machine].watchers[watcher].id,
                                    error = %err,
                                    "watcher reaction failed; continuing"
                                ),
                            }
                        }
                    }
                }
                Effect::SetAttr { key, value } => {
                    self.set_attr(&key, value);
                }
                Effect::SetDisease { machine, state } => {
                    let Some(index) = self.machine_idx(&machine) else {
                        tracing::warn!(pid = %self.pid, machine = %machine, "setDisease on unknown machine");
                        continue;
                    };
                    if self.runtimes[index].state == state {
                        continue;
                    }
                    self.runtimes[index].state = state.clone();
                    self.runtimes[index].version += 1;
                    self.diseases.insert(machine, state);
                    self.schedule_machine(index);
                }
                Effect::ModifyHazard {
                    machine,
                    modifier_id,
                    apply,
                    until,
                } => {
                    let Some(index) = self.machine_idx(&machine) else {
                        tracing::warn!(pid = %self.pid, machine = %machine, "modifyHazard on unknown machine");
                        continue;
                    };
                    let token = self.install_modifier(index, &modifier_id, apply);
                    self.schedule_machine(index);
                    match until {
                        Some(until) if until.is_finite() => {
                            self.queue.push(
                                until.max(self.now),
                                QueueItem::ModifierExpiry {
                                    machine: index,
                                    modifier_id,
                                    token,
                                },
                            );
                        }
                        // a non-finite `until` installs without a removal
                        _ => {}
                    }
                }
                Effect::Schedule { at, thunk } => {
                    if !at.is_finite() {
                        tracing::warn!(pid = %self.pid, at, "dropping thunk scheduled at non-finite time");
                        continue;
                    }
                    self.queue.push(at.max(self.now), QueueItem::Thunk(thunk));
                }
            }
        }
    }

    pub(crate) fn set_attr(&mut self, key: &str, value: AttrValue) {
        let value = clamp_attr(value, self.limits.get(key));
        self.attributes.insert(key.to_string(), value);
    }
}
