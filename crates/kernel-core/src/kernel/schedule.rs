use super::*;

impl Kernel {
    /// Recompute and enqueue the next candidate transition for one machine.
    ///
    /// Bumps the machine's version first, so any item already in the queue
    /// for this machine dies by version mismatch when popped. At most one
    /// live transition item exists per machine.
    pub(crate) fn schedule_machine(&mut self, machine: usize) {
        self.runtimes[machine].version += 1;
        let version = self.runtimes[machine].version;
        let state = self.runtimes[machine].state.clone();
        let machine_id = self.machines[machine].id.clone();

        let mut best: Option<(f64, usize, TransitionDetail)> = None;
        for (index, transition) in self.machines[machine].transitions.iter().enumerate() {
            if transition.from != state {
                continue;
            }

            let namespace = format!("{machine_id}:v{version}:t{index}");
            let mut child = self.rng.child(&namespace);
            let snapshot = Snapshot {
                attributes: &self.attributes,
                diseases: &self.diseases,
            };

            let base_rate = (transition.hazard)(&snapshot, self.now, &mut child);
            if !base_rate.is_finite() || base_rate <= 0.0 {
                continue;
            }

            let mut rate = base_rate;
            let mut modifier_rates = Vec::new();
            let mut suppressed = false;
            for entry in &self.modifiers[machine] {
                rate = (entry.apply)(rate, &snapshot, self.now);
                modifier_rates.push((entry.id.clone(), rate));
                if !rate.is_finite() || rate <= 0.0 {
                    suppressed = true;
                    break;
                }
            }
            if suppressed {
                continue;
            }

            let delay = child.expo(rate);
            if !delay.is_finite() {
                continue;
            }
            let candidate = self.now + delay;

            let terms = if self.explain_enabled {
                transition
                    .explain
                    .as_ref()
                    .map(|explain| (explain.terms)(&snapshot, self.now))
                    .unwrap_or_default()
            } else {
                Vec::new()
            };

            let replace = match &best {
                Some((time, _, _)) => candidate < *time,
                None => true,
            };
            if replace {
                best = Some((
                    candidate,
                    index,
                    TransitionDetail {
                        base_rate,
                        modifier_rates,
                        delay,
                        terms,
                    },
                ));
            }
        }

        if let Some((time, transition, detail)) = best {
            self.queue.push(
                time,
                QueueItem::Transition {
                    machine,
                    transition,
                    version,
                    detail,
                },
            );
        }
    }
}
