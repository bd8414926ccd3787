//! Aggregate metrics. Pure computation; all filesystem output belongs to
//! the caller.

use contracts::events::OutputEventType;
use contracts::report::SummaryMetrics;

use crate::module_runtime::Patient;

pub fn summarize(patients: &[Patient]) -> SummaryMetrics {
    let total_events: usize = patients.iter().map(|patient| patient.events.len()).sum();
    let condition_onsets = patients
        .iter()
        .flat_map(|patient| &patient.events)
        .filter(|event| event.event_type == OutputEventType::Diagnosis)
        .count() as u64;
    let deaths = patients.iter().filter(|patient| patient.dead).count();

    let count = patients.len();
    SummaryMetrics {
        patients: count as u64,
        avg_events_per_patient: if count == 0 {
            0.0
        } else {
            total_events as f64 / count as f64
        },
        condition_onsets,
        death_fraction: if count == 0 {
            0.0
        } else {
            deaths as f64 / count as f64
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::events::OutputEvent;

    #[test]
    fn summary_counts_diagnoses_and_deaths() {
        let mut alive = Patient::new("p0000", 1960);
        alive.events.push(OutputEvent::encounter(50.0, "PCP"));
        alive
            .events
            .push(OutputEvent::diagnosis(51.0, "I10", "Essential hypertension"));

        let mut dead = Patient::new("p0001", 1945);
        dead.events.push(OutputEvent::death(84.0));
        dead.dead = true;

        let summary = summarize(&[alive, dead]);
        assert_eq!(summary.patients, 2);
        assert_eq!(summary.condition_onsets, 1);
        assert!((summary.avg_events_per_patient - 1.5).abs() < f64::EPSILON);
        assert!((summary.death_fraction - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_cohort_yields_zeroes() {
        let summary = summarize(&[]);
        assert_eq!(summary.patients, 0);
        assert_eq!(summary.avg_events_per_patient, 0.0);
        assert_eq!(summary.death_fraction, 0.0);
    }
}
