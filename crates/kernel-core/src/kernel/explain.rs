use super::*;
use crate::machine::HazardForm;

/// Sink for the human-readable explanation stream.
pub trait TraceSink {
    fn line(&mut self, line: &str);
}

/// Default sink: the process's standard output.
#[derive(Debug, Default)]
pub struct StdoutTrace;

impl TraceSink for StdoutTrace {
    fn line(&mut self, line: &str) {
        println!("{line}");
    }
}

/// Collecting sink for tests and embedding callers. Cloned handles share
/// the same buffer, so a caller can keep one and read it after the run.
#[derive(Debug, Default, Clone)]
pub struct BufferTrace {
    lines: std::rc::Rc<std::cell::RefCell<Vec<String>>>,
}

impl BufferTrace {
    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }
}

impl TraceSink for BufferTrace {
    fn line(&mut self, line: &str) {
        self.lines.borrow_mut().push(line.to_string());
    }
}

impl Kernel {
    pub(crate) fn trace_transition(
        &mut self,
        machine_id: &str,
        from: &str,
        to: &str,
        detail: &TransitionDetail,
    ) {
        let mut lines = Vec::new();
        lines.push(format!(
            "{} :: {} {}→{} @ t={:.3} λ={:.6}",
            self.pid, machine_id, from, to, self.now, detail.base_rate
        ));
        if !detail.terms.is_empty() {
            let form = self
                .machines
                .iter()
                .find(|machine| machine.id == machine_id)
                .and_then(|machine| {
                    machine
                        .transitions
                        .iter()
                        .find(|transition| transition.from == from && transition.to == to)
                })
                .and_then(|transition| transition.explain.as_ref())
                .map(|explain| explain.form);
            let label = match form {
                Some(HazardForm::LogLinear) => "log-linear",
                _ => "additive",
            };
            for (term, value) in &detail.terms {
                lines.push(format!("  term[{label}] {term} = {value:.6}"));
            }
        }
        for (modifier, rate) in &detail.modifier_rates {
            lines.push(format!("  modifier {modifier} λ={rate:.6}"));
        }

        for line in lines {
            self.emit_trace(&line);
        }
    }

    fn emit_trace(&mut self, line: &str) {
        match self.trace.as_mut() {
            Some(sink) => sink.line(line),
            None => println!("{line}"),
        }
    }
}
