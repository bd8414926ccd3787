use std::cell::RefCell;
use std::rc::Rc;

use contracts::catalog::ValueLimits;
use contracts::events::EventKind;
use contracts::{AttrMap, AttrValue, DiseaseStateMap};
use kernel_core::effect::{Effect, EventDraft};
use kernel_core::library::machines;
use kernel_core::machine::{HookCtx, Machine, Snapshot, Transition, Watcher};
use kernel_core::{BufferTrace, Kernel, KernelConfig, Xorshift32};
use serde_json::json;

fn diabetes_attributes() -> AttrMap {
    let mut attributes = AttrMap::new();
    attributes.insert("ageYr".to_string(), AttrValue::Number(60.0));
    attributes.insert("sex".to_string(), AttrValue::from("M"));
    attributes.insert("bmi".to_string(), AttrValue::Number(34.0));
    attributes.insert("smoker".to_string(), AttrValue::Bool(true));
    attributes.insert("a1c".to_string(), AttrValue::Number(7.0));
    attributes
}

fn diabetes_kernel(horizon_days: f64, seed: u32) -> Kernel {
    Kernel::new(
        KernelConfig::new("p0001", horizon_days),
        vec![machines::encounters(), machines::t2dm()],
        diabetes_attributes(),
        DiseaseStateMap::new(),
        Xorshift32::new(seed),
    )
}

#[test]
fn single_patient_diabetes_onset() {
    let mut kernel = diabetes_kernel(1825.0, 1);
    kernel.run();
    let events = kernel.events();

    assert!(events.iter().any(|event| {
        event.kind == EventKind::EncounterStarted && event.meta["kind"] == json!("PCP")
    }));
    assert!(events.iter().any(|event| {
        event.kind == EventKind::ObservationOrdered && event.meta["loinc"] == json!("4548-4")
    }));
    assert!(events.iter().any(|event| {
        event.kind == EventKind::ObservationResulted
            && event.meta["loinc"] == json!("4548-4")
            && event.meta["value"].as_f64().unwrap_or(0.0) >= 6.5
    }));
    assert!(events.iter().any(|event| {
        event.kind == EventKind::ConditionOnset && event.meta["icd10"] == json!("E11.9")
    }));
    assert_eq!(kernel.diseases().get("t2dm").map(String::as_str), Some("T2DM"));
}

#[test]
fn event_log_is_time_ordered() {
    let mut kernel = diabetes_kernel(1825.0, 1);
    kernel.run();
    let events = kernel.events();
    assert!(!events.is_empty());
    for window in events.windows(2) {
        assert!(
            window[0].t <= window[1].t,
            "events out of order: {} then {}",
            window[0].t,
            window[1].t
        );
    }
}

#[test]
fn horizon_halts_the_loop() {
    let mut kernel = diabetes_kernel(30.0, 1);
    kernel.run();
    for event in kernel.events() {
        assert!(event.t <= 30.0, "event beyond horizon at t={}", event.t);
    }
}

#[test]
fn identical_seeds_replay_identical_logs() {
    let mut first = diabetes_kernel(1825.0, 1);
    first.run();
    let mut second = diabetes_kernel(1825.0, 1);
    second.run();

    assert_eq!(first.events().len(), second.events().len());
    for (a, b) in first.events().iter().zip(second.events()) {
        assert_eq!(a.t, b.t);
        assert_eq!(a.kind, b.kind);
        assert_eq!(a.meta, b.meta);
    }
    assert_eq!(first.replay_hash(), second.replay_hash());

    let mut other_seed = diabetes_kernel(1825.0, 2);
    other_seed.run();
    assert_ne!(first.replay_hash(), other_seed.replay_hash());
}

#[test]
fn stale_transition_is_discarded_after_forced_state_change() {
    // A->B would fire within a few days; a thunk at t=0 emits an
    // EncounterFinished whose watcher forces the machine to C first.
    let machine = Machine::new("m", &["A", "B", "C"], "A")
        .transition(
            Transition::new("A", "B", |_snapshot, _t, _rng| 1.0).on_fire(|_ctx| {
                Ok(vec![Effect::emit(
                    EventDraft::new(EventKind::ProcedurePerformed).meta(json!({ "marker": "A->B" })),
                )])
            }),
        )
        .watcher(Watcher::new(
            "force-c",
            |event| event.kind == EventKind::EncounterFinished,
            |_event, _ctx| Ok(vec![Effect::set_disease("m", "C")]),
        ));

    let mut kernel = Kernel::new(
        KernelConfig::new("p0002", 365.0),
        vec![machine],
        AttrMap::new(),
        DiseaseStateMap::new(),
        Xorshift32::new(7),
    );
    kernel.apply(vec![Effect::Schedule {
        at: 0.0,
        thunk: Box::new(|_ctx: &mut HookCtx<'_>| {
            Ok(vec![Effect::emit(EventDraft::new(
                EventKind::EncounterFinished,
            ))])
        }),
    }]);
    kernel.run();

    assert_eq!(kernel.diseases().get("m").map(String::as_str), Some("C"));
    assert!(
        !kernel
            .events()
            .iter()
            .any(|event| event.kind == EventKind::ProcedurePerformed),
        "stale A->B item fired"
    );
}

/// Hazard gate that is zero before day 10, so the only scheduling chances
/// are the modifier install at 10 and its expiry.
fn gated_machine() -> Machine {
    Machine::new("m", &["A", "B"], "A").transition(
        Transition::new("A", "B", |_snapshot, t, _rng| if t < 10.0 { 0.0 } else { 1.0 }).on_fire(
            |_ctx| {
                Ok(vec![Effect::emit(
                    EventDraft::new(EventKind::ProcedurePerformed).meta(json!({ "marker": "fired" })),
                )])
            },
        ),
    )
}

fn install_zero_modifier_at(at: f64, until: f64) -> Effect {
    Effect::Schedule {
        at,
        thunk: Box::new(move |_ctx: &mut HookCtx<'_>| {
            Ok(vec![Effect::ModifyHazard {
                machine: "m".to_string(),
                modifier_id: "block".to_string(),
                apply: Rc::new(|_rate, _snapshot: &Snapshot<'_>, _t| 0.0),
                until: Some(until),
            }])
        }),
    }
}

#[test]
fn modifier_suppresses_hazard_until_expiry() {
    let mut kernel = Kernel::new(
        KernelConfig::new("p0003", 200.0),
        vec![gated_machine()],
        AttrMap::new(),
        DiseaseStateMap::new(),
        Xorshift32::new(11),
    );
    kernel.apply(vec![install_zero_modifier_at(10.0, 20.0)]);
    kernel.run();

    let fired: Vec<f64> = kernel
        .events()
        .iter()
        .filter(|event| event.kind == EventKind::ProcedurePerformed)
        .map(|event| event.t)
        .collect();
    assert_eq!(fired.len(), 1, "expected exactly one firing, got {fired:?}");
    assert!(fired[0] > 20.0, "fired inside the suppression window: {}", fired[0]);
    assert_eq!(kernel.diseases().get("m").map(String::as_str), Some("B"));
}

#[test]
fn reinstalled_modifier_survives_the_original_expiry() {
    let mut kernel = Kernel::new(
        KernelConfig::new("p0004", 200.0),
        vec![gated_machine()],
        AttrMap::new(),
        DiseaseStateMap::new(),
        Xorshift32::new(11),
    );
    // the second install re-issues the token, so the first expiry at 20
    // must not strip the blocker that now runs to 30
    kernel.apply(vec![
        install_zero_modifier_at(10.0, 20.0),
        install_zero_modifier_at(15.0, 30.0),
    ]);
    kernel.run();

    let fired: Vec<f64> = kernel
        .events()
        .iter()
        .filter(|event| event.kind == EventKind::ProcedurePerformed)
        .map(|event| event.t)
        .collect();
    assert_eq!(fired.len(), 1);
    assert!(fired[0] > 30.0, "fired before the reinstall expired: {}", fired[0]);
}

#[test]
fn every_emitted_event_reaches_every_watcher_once() {
    let seen = Rc::new(RefCell::new(0_u32));
    let seen_by_watcher = Rc::clone(&seen);
    let machine = Machine::new("observer", &["Quiet"], "Quiet").watcher(Watcher::new(
        "counter",
        move |_event| {
            *seen_by_watcher.borrow_mut() += 1;
            false
        },
        |_event, _ctx| Ok(Vec::new()),
    ));

    let mut kernel = Kernel::new(
        KernelConfig::new("p0005", 10.0),
        vec![machine],
        AttrMap::new(),
        DiseaseStateMap::new(),
        Xorshift32::new(3),
    );
    kernel.apply(vec![
        Effect::emit(EventDraft::new(EventKind::EncounterStarted)),
        Effect::emit(EventDraft::new(EventKind::EncounterFinished)),
        Effect::emit(EventDraft::new(EventKind::Death)),
    ]);

    assert_eq!(kernel.events().len(), 3);
    assert_eq!(*seen.borrow(), 3);
}

#[test]
fn set_attr_clamps_against_catalog_limits() {
    let mut limits = std::collections::BTreeMap::new();
    limits.insert("bmi".to_string(), ValueLimits::between(12.0, 70.0));

    let mut kernel = Kernel::new(
        KernelConfig::new("p0006", 10.0),
        Vec::new(),
        AttrMap::new(),
        DiseaseStateMap::new(),
        Xorshift32::new(3),
    )
    .with_limits(limits);

    kernel.apply(vec![Effect::set_attr("bmi", 300.0)]);
    assert_eq!(kernel.attributes()["bmi"], AttrValue::Number(70.0));

    kernel.apply(vec![Effect::set_attr("bmi", 70.0)]);
    assert_eq!(kernel.attributes()["bmi"], AttrValue::Number(70.0));
}

#[test]
fn advance_rewrites_age_from_days() {
    let mut kernel = Kernel::new(
        KernelConfig::new("p0007", 400.0),
        Vec::new(),
        diabetes_attributes(),
        DiseaseStateMap::new(),
        Xorshift32::new(3),
    );
    kernel.apply(vec![Effect::Schedule {
        at: 365.0,
        thunk: Box::new(|_ctx: &mut HookCtx<'_>| Ok(Vec::new())),
    }]);
    kernel.run();

    let age = kernel.attributes()["ageYr"].as_number().expect("ageYr");
    assert!((age - 61.0).abs() < 1e-9, "age was {age}");
}

#[test]
fn death_event_terminates_the_loop() {
    let machine = Machine::new("mortality", &["Alive", "Dead"], "Alive").transition(
        Transition::new("Alive", "Dead", |_snapshot, _t, _rng| 1.0).on_fire(|_ctx| {
            Ok(vec![Effect::emit(EventDraft::new(EventKind::Death))])
        }),
    );
    let noisy = Machine::new("noise", &["A", "B"], "A").transition(
        Transition::new("A", "B", |_snapshot, _t, _rng| 0.0001).on_fire(|_ctx| {
            Ok(vec![Effect::emit(EventDraft::new(
                EventKind::ProcedurePerformed,
            ))])
        }),
    );

    let mut kernel = Kernel::new(
        KernelConfig::new("p0008", 100_000.0),
        vec![machine, noisy],
        AttrMap::new(),
        DiseaseStateMap::new(),
        Xorshift32::new(13),
    );
    kernel.run();

    assert!(kernel.is_dead());
    let death_t = kernel
        .events()
        .iter()
        .find(|event| event.kind == EventKind::Death)
        .map(|event| event.t)
        .expect("death event");
    for event in kernel.events() {
        assert!(event.t <= death_t, "event after death at t={}", event.t);
    }
}

#[test]
fn explain_traces_fired_transitions() {
    let trace = BufferTrace::default();
    let mut kernel = Kernel::new(
        KernelConfig::new("p0009", 1825.0).explain(true),
        vec![machines::encounters(), machines::t2dm()],
        diabetes_attributes(),
        DiseaseStateMap::new(),
        Xorshift32::new(1),
    )
    .with_trace(Box::new(trace.clone()));
    kernel.run();

    let lines = trace.lines();
    assert!(!lines.is_empty());
    assert!(lines
        .iter()
        .any(|line| line.starts_with("p0009 :: encounters Idle→InVisit")));
    assert!(lines.iter().any(|line| line.contains("λ=")));
}
