use super::engine::{Shared, Signal};
use super::*;
use crate::core::{
    lock, Payload, StateEvent, StateLifecycle, TransitionLifecycle, FINAL_STATE_COMPLETED_EVENT,
};
use std::sync::mpsc;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<String>>,
    failure_error: Mutex<Option<StateError>>,
    reports: Mutex<Vec<RunReport>>,
}

impl Recorder {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn completions(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.starts_with("completed") || call.starts_with("faulted"))
            .collect()
    }

    fn push(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

impl StateMachineDelegate for Recorder {
    fn completed_with_success(&self, report: &RunReport) {
        self.push("completed:success");
        self.reports.lock().unwrap().push(report.clone());
    }

    fn completed_with_failure(&self, report: &RunReport, error: Option<&StateError>) {
        self.push("completed:failure");
        *self.failure_error.lock().unwrap() = error.cloned();
        self.reports.lock().unwrap().push(report.clone());
    }

    fn completed_with_cancel(&self, report: &RunReport) {
        self.push("completed:cancel");
        self.reports.lock().unwrap().push(report.clone());
    }

    fn faulted(&self, report: &RunReport, _error: &MachineError) {
        self.push("faulted");
        self.reports.lock().unwrap().push(report.clone());
    }

    fn state_started(&self, _machine: &str, state: &State) {
        self.push(format!("started:{}", state.name()));
    }

    fn state_finished(
        &self,
        _machine: &str,
        state: &State,
        event: &str,
        _error: Option<&StateError>,
    ) {
        self.push(format!("finished:{}:{}", state.name(), event));
    }

    fn state_cancelled(&self, _machine: &str, state: &State) {
        self.push(format!("cancelled:{}", state.name()));
    }
}

/// State that finishes synchronously with a fixed event.
fn immediate(name: &str, event: &'static str) -> State {
    State::from_fn(name, move |handle| handle.report_finished(event, None))
}

/// State that parks its handle until the test finishes it.
fn held(name: &str) -> (State, Arc<Mutex<Option<StateHandle>>>) {
    let slot = Arc::new(Mutex::new(None));
    let parked = Arc::clone(&slot);
    let state = State::from_fn(name, move |handle| {
        *parked.lock().unwrap() = Some(handle);
    });
    (state, slot)
}

struct Ids {
    start: StateId,
    do_: StateId,
    re: StateId,
    mi: StateId,
    success: StateId,
    failure: StateId,
    cancel: StateId,
}

fn scenario(do_state: State, re_state: State, delegate: Arc<Recorder>) -> (StateMachine, Ids) {
    let mut machine = StateMachine::with_delegate("song", delegate);
    let ids = Ids {
        start: machine.add_state(immediate("Start", "go")).unwrap(),
        do_: machine.add_state(do_state).unwrap(),
        re: machine.add_state(re_state).unwrap(),
        mi: machine.add_state(immediate("Mi", "next")).unwrap(),
        success: machine.add_state(State::terminal("Success")).unwrap(),
        failure: machine.add_state(State::terminal("Failure")).unwrap(),
        cancel: machine.add_state(State::terminal("Cancel")).unwrap(),
    };

    machine
        .add_transition(Transition::new(ids.start, ids.do_), "go")
        .unwrap();
    machine
        .add_transition(Transition::new(ids.do_, ids.re), "next")
        .unwrap();
    machine
        .add_transition(Transition::new(ids.do_, ids.failure), "fail")
        .unwrap();
    machine
        .add_transition(Transition::new(ids.re, ids.mi), "next")
        .unwrap();
    machine
        .add_transition(Transition::new(ids.mi, ids.success), "next")
        .unwrap();

    machine.set_start_state(ids.start).unwrap();
    machine.set_success_state(ids.success).unwrap();
    machine.set_failure_state(ids.failure).unwrap();
    machine.set_cancel_state(ids.cancel).unwrap();
    (machine, ids)
}

#[test]
fn scenario_machine_is_valid() {
    let (machine, _) = scenario(
        immediate("Do", "next"),
        immediate("Re", "next"),
        Arc::new(Recorder::default()),
    );
    assert!(machine.is_valid().is_ok());
}

#[test]
fn success_path_completes_once() {
    let recorder = Arc::new(Recorder::default());
    let (machine, ids) = scenario(
        immediate("Do", "next"),
        immediate("Re", "next"),
        Arc::clone(&recorder),
    );

    machine.start().unwrap();

    assert_eq!(recorder.completions(), vec!["completed:success"]);
    assert!(machine.is_in_state(ids.success));
    assert!(machine.is_in_state_with_name("Success"));
    assert!(!machine.is_running());
    assert_eq!(machine.outcome(), Some(Outcome::Success));
    assert!(machine.last_error().is_none());
    assert_eq!(
        machine.history().get_path(),
        vec!["Start", "Do", "Re", "Mi", "Success"]
    );
}

#[test]
fn failure_path_keeps_reported_error() {
    let recorder = Arc::new(Recorder::default());
    let error = StateError::msg("Do could not sing");
    let reported = error.clone();
    let do_state = State::from_fn("Do", move |handle| {
        handle.report_finished("fail", Some(reported.clone()))
    });
    let (machine, ids) = scenario(do_state, immediate("Re", "next"), Arc::clone(&recorder));

    machine.start().unwrap();

    assert_eq!(recorder.completions(), vec!["completed:failure"]);
    assert!(machine.is_in_state(ids.failure));
    assert!(machine.last_error().unwrap().ptr_eq(&error));
    assert!(recorder
        .failure_error
        .lock()
        .unwrap()
        .as_ref()
        .unwrap()
        .ptr_eq(&error));

    let reports = recorder.reports.lock().unwrap();
    assert_eq!(reports[0].outcome, Outcome::Failure);
    assert_eq!(reports[0].error.as_deref(), Some("Do could not sing"));
}

#[test]
fn cancel_while_re_is_active_ends_in_cancel_state() {
    let recorder = Arc::new(Recorder::default());
    let (re_state, re_handle) = held("Re");
    let (machine, ids) = scenario(immediate("Do", "next"), re_state, Arc::clone(&recorder));

    machine.start().unwrap();
    assert!(machine.is_in_state(ids.re));
    assert!(machine.is_running());

    machine.cancel();
    assert!(machine.is_cancelling());
    assert!(machine.state(ids.re).unwrap().is_cancelled());

    std::thread::sleep(Duration::from_millis(5));
    let handle = re_handle.lock().unwrap().take().unwrap();
    assert!(handle.is_cancelled());
    handle.report_finished("next", None);

    assert_eq!(recorder.completions(), vec!["completed:cancel"]);
    assert!(machine.is_in_state(ids.cancel));
    assert_eq!(machine.outcome(), Some(Outcome::Cancelled));

    let re = machine.state(ids.re).unwrap();
    let requested = re.timestamp(StateEvent::CancelRequested).unwrap();
    let finished = re.timestamp(StateEvent::Finish).unwrap();
    assert!(requested < finished);
    assert!(re.timestamp(StateEvent::CancelCompleted).is_some());
    assert!(!recorder.calls().contains(&"finished:Re:next".to_string()));
    assert!(recorder.calls().contains(&"cancelled:Re".to_string()));
}

#[test]
fn report_cancelled_routes_to_cancel_state() {
    let recorder = Arc::new(Recorder::default());
    let do_state = State::from_fn("Do", |handle| handle.report_cancelled());
    let (machine, ids) = scenario(do_state, immediate("Re", "next"), Arc::clone(&recorder));

    machine.start().unwrap();

    assert_eq!(recorder.completions(), vec!["completed:cancel"]);
    assert!(machine.is_in_state(ids.cancel));
}

#[test]
fn cancel_when_idle_is_a_no_op() {
    let recorder = Arc::new(Recorder::default());
    let (machine, _) = scenario(
        immediate("Do", "next"),
        immediate("Re", "next"),
        Arc::clone(&recorder),
    );

    machine.cancel();
    assert!(!machine.is_cancelling());
    assert!(recorder.calls().is_empty());

    machine.start().unwrap();
    assert_eq!(recorder.completions(), vec!["completed:success"]);

    machine.cancel();
    assert_eq!(recorder.completions(), vec!["completed:success"]);
}

#[test]
fn cancel_processed_before_begin_cancels_start_state() {
    let recorder = Arc::new(Recorder::default());
    let (machine, ids) = scenario(
        immediate("Do", "next"),
        immediate("Re", "next"),
        Arc::clone(&recorder),
    );

    // cancel() from another thread landing between start() and Begin
    lock(&machine.shared.run).started = true;
    Shared::dispatch(&machine.shared, Signal::Cancel);
    Shared::dispatch(&machine.shared, Signal::Begin);

    assert_eq!(recorder.completions(), vec!["completed:cancel"]);
    assert!(machine.is_in_state(ids.cancel));
    assert!(machine.state(ids.start).unwrap().is_cancelled());
    assert!(recorder.calls().contains(&"cancelled:Start".to_string()));
    assert_eq!(machine.history().get_path(), vec!["Start", "Cancel"]);
}

#[test]
fn cancel_while_terminal_state_is_active_is_a_no_op() {
    let recorder = Arc::new(Recorder::default());
    let (success, success_handle) = held("Success");
    let machine = StateMachine::builder("wrap-up")
        .delegate(recorder.clone())
        .state(immediate("Start", "go"))
        .success(success)
        .failure(State::terminal("Failure"))
        .cancel(State::terminal("Cancel"))
        .start_state("Start")
        .transition("Start", "go", "Success")
        .build()
        .unwrap();

    machine.start().unwrap();
    assert!(machine.is_in_state_with_name("Success"));
    assert!(machine.is_running());

    machine.cancel();
    assert!(!machine.is_cancelling());
    assert!(!machine.current().unwrap().is_cancelled());

    let handle = success_handle.lock().unwrap().take().unwrap();
    handle.report_finished(FINAL_STATE_COMPLETED_EVENT, None);

    assert_eq!(recorder.completions(), vec!["completed:success"]);
    assert_eq!(machine.outcome(), Some(Outcome::Success));
}

#[test]
fn reports_from_a_stale_activation_are_dropped() {
    let recorder = Arc::new(Recorder::default());
    let (re_state, re_handle) = held("Re");
    let (machine, ids) = scenario(immediate("Do", "next"), re_state, Arc::clone(&recorder));

    machine.start().unwrap();
    assert!(machine.is_in_state(ids.re));

    let activation = lock(&machine.shared.run).activation;
    let stale = StateHandle::new(Arc::downgrade(&machine.shared), ids.re, activation - 1);
    stale.set_output(Payload::new("stale"));
    stale.report_started();
    stale.report_finished("next", None);

    assert!(machine.is_in_state(ids.re));
    assert!(machine.is_running());
    assert!(machine.state(ids.re).unwrap().output().is_none());
    assert!(recorder.completions().is_empty());
    assert!(!recorder.calls().contains(&"started:Re".to_string()));

    let current = re_handle.lock().unwrap().take().unwrap();
    current.report_finished("next", None);
    assert_eq!(recorder.completions(), vec!["completed:success"]);
}

#[test]
fn reports_after_completion_are_ignored() {
    let recorder = Arc::new(Recorder::default());
    let (machine, ids) = scenario(
        immediate("Do", "next"),
        immediate("Re", "next"),
        Arc::clone(&recorder),
    );
    machine.start().unwrap();
    assert_eq!(machine.outcome(), Some(Outcome::Success));

    let activation = lock(&machine.shared.run).activation;
    let late = StateHandle::new(Arc::downgrade(&machine.shared), ids.success, activation);
    late.report_finished(FINAL_STATE_COMPLETED_EVENT, None);

    assert_eq!(recorder.completions(), vec!["completed:success"]);
    assert_eq!(machine.outcome(), Some(Outcome::Success));
    assert_eq!(machine.history().transitions().len(), 4);
}

#[test]
fn unknown_event_faults_the_run() {
    let recorder = Arc::new(Recorder::default());
    let (machine, ids) = scenario(
        immediate("Do", "skip"),
        immediate("Re", "next"),
        Arc::clone(&recorder),
    );

    machine.start().unwrap();

    assert_eq!(recorder.completions(), vec!["faulted"]);
    assert_eq!(machine.outcome(), Some(Outcome::Faulted));
    assert!(!machine.is_running());
    assert!(machine.is_in_state(ids.do_));

    let error = machine.last_error().unwrap();
    assert_eq!(
        error.downcast_ref::<MachineError>(),
        Some(&MachineError::NoTransition {
            state: "Do".to_string(),
            event: "skip".to_string(),
        })
    );
}

#[test]
fn start_requires_start_state() {
    let machine = StateMachine::new("empty");
    assert!(matches!(
        machine.start(),
        Err(MachineError::MissingStartState { .. })
    ));
    assert!(!machine.is_running());
}

#[test]
fn start_twice_fails() {
    let (re_state, _re_handle) = held("Re");
    let (machine, _) = scenario(
        immediate("Do", "next"),
        re_state,
        Arc::new(Recorder::default()),
    );

    machine.start().unwrap();
    assert!(matches!(
        machine.start(),
        Err(MachineError::AlreadyStarted { .. })
    ));
}

#[test]
fn configuration_is_frozen_after_start() {
    let (mut machine, ids) = scenario(
        immediate("Do", "next"),
        immediate("Re", "next"),
        Arc::new(Recorder::default()),
    );
    machine.start().unwrap();

    assert!(matches!(
        machine.add_state(State::terminal("Late")),
        Err(MachineError::AlreadyStarted { .. })
    ));
    assert!(matches!(
        machine.add_transition(Transition::new(ids.mi, ids.failure), "late"),
        Err(MachineError::AlreadyStarted { .. })
    ));
}

#[test]
fn duplicate_transition_is_rejected() {
    let (mut machine, ids) = scenario(
        immediate("Do", "next"),
        immediate("Re", "next"),
        Arc::new(Recorder::default()),
    );

    let err = machine
        .add_transition(Transition::new(ids.do_, ids.mi), "next")
        .unwrap_err();
    assert_eq!(
        err,
        MachineError::DuplicateTransition {
            state: "Do".to_string(),
            event: "next".to_string(),
        }
    );
    assert_eq!(machine.transition_for_state(ids.do_, "next").unwrap().to(), ids.re);
}

#[test]
fn transition_to_foreign_state_is_rejected() {
    let mut machine = StateMachine::new("small");
    let only = machine.add_state(State::terminal("only")).unwrap();

    let err = machine
        .add_transition(Transition::new(only, StateId(5)), "next")
        .unwrap_err();
    assert_eq!(err, MachineError::UnknownState { id: StateId(5) });
    assert!(machine.set_start_state(StateId(5)).is_err());
}

#[test]
fn transitions_for_state_lists_events() {
    let (machine, ids) = scenario(
        immediate("Do", "next"),
        immediate("Re", "next"),
        Arc::new(Recorder::default()),
    );

    let transitions = machine.transitions_for_state(ids.do_);
    let events: Vec<&str> = transitions.keys().copied().collect();
    assert_eq!(events, vec!["fail", "next"]);
    assert!(machine.transitions_for_state(ids.success).is_empty());
}

#[test]
fn output_becomes_next_input() {
    let sent = Payload::new(vec![3u32, 1, 4]);
    let produced = sent.clone();
    let received = Arc::new(Mutex::new(None));
    let seen = Arc::clone(&received);

    let do_state = State::from_fn("Do", move |handle| {
        handle.set_output(produced.clone());
        handle.report_finished("next", None);
    });
    let re_state = State::from_fn("Re", move |handle| {
        *seen.lock().unwrap() = handle.input();
        handle.report_finished("next", None);
    });
    let (machine, _) = scenario(do_state, re_state, Arc::new(Recorder::default()));

    machine.start().unwrap();

    let received = received.lock().unwrap().clone().unwrap();
    assert!(received.ptr_eq(&sent));
    assert_eq!(received.downcast_ref::<Vec<u32>>(), Some(&vec![3, 1, 4]));
}

#[test]
fn hooks_fire_in_lifecycle_order() {
    let log = Arc::new(Mutex::new(Vec::<String>::new()));
    let hooked = |name: &str, event: &'static str| {
        let mut state = immediate(name, event);
        for (point, label) in [
            (StateLifecycle::WillEnter, "will-enter"),
            (StateLifecycle::DidEnter, "did-enter"),
            (StateLifecycle::WillLeave, "will-leave"),
            (StateLifecycle::DidLeave, "did-leave"),
        ] {
            let log = Arc::clone(&log);
            state.on(point, move |s| {
                log.lock().unwrap().push(format!("{}:{}", s.name(), label))
            });
        }
        state
    };

    let mut machine = StateMachine::new("hooks");
    let a = machine.add_state(hooked("A", "next")).unwrap();
    let b = machine.add_state(hooked("B", "done")).unwrap();
    let ok = machine.add_state(State::terminal("Ok")).unwrap();
    let failed = machine.add_state(State::terminal("Failed")).unwrap();
    let stopped = machine.add_state(State::terminal("Stopped")).unwrap();

    let will = Arc::clone(&log);
    let did = Arc::clone(&log);
    let edge = Transition::new(a, b)
        .with_hook(TransitionLifecycle::WillTransition, move |_| {
            will.lock().unwrap().push("A->B:will".to_string())
        })
        .with_hook(TransitionLifecycle::DidTransition, move |_| {
            did.lock().unwrap().push("A->B:did".to_string())
        });
    machine.add_transition(edge, "next").unwrap();
    machine.add_transition(Transition::new(b, ok), "done").unwrap();
    machine.set_start_state(a).unwrap();
    machine.set_success_state(ok).unwrap();
    machine.set_failure_state(failed).unwrap();
    machine.set_cancel_state(stopped).unwrap();

    machine.start().unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "A:will-enter",
            "A:did-enter",
            "A:will-leave",
            "A:did-leave",
            "A->B:will",
            "B:will-enter",
            "B:did-enter",
            "A->B:did",
            "B:will-leave",
            "B:did-leave",
        ]
    );
}

#[test]
fn states_may_finish_on_other_threads() {
    let recorder = Arc::new(Recorder::default());
    let threaded = |name: &str| {
        State::from_fn(name, |handle| {
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(2));
                handle.report_started();
                handle.report_finished("next", None);
            });
        })
    };
    let (machine, ids) = scenario(threaded("Do"), threaded("Re"), Arc::clone(&recorder));

    let (tx, rx) = mpsc::channel();
    std::thread::spawn({
        let recorder = Arc::clone(&recorder);
        move || loop {
            if !recorder.completions().is_empty() {
                let _ = tx.send(());
                return;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    });

    machine.start().unwrap();
    rx.recv_timeout(Duration::from_secs(5)).unwrap();

    assert_eq!(recorder.completions(), vec!["completed:success"]);
    assert!(machine.is_in_state(ids.success));
    let calls = recorder.calls();
    assert!(calls.contains(&"started:Do".to_string()));
    assert!(calls.contains(&"started:Re".to_string()));
}

#[test]
fn report_lists_visited_states() {
    let recorder = Arc::new(Recorder::default());
    let (machine, _) = scenario(
        immediate("Do", "next"),
        immediate("Re", "next"),
        Arc::clone(&recorder),
    );
    machine.start().unwrap();

    let reports = recorder.reports.lock().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].machine_id, machine.id());
    assert_eq!(reports[0].machine_name, "song");
    assert_eq!(reports[0].final_state.as_deref(), Some("Success"));
    assert_eq!(reports[0].history.transitions().len(), 4);
}
