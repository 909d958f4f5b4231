//! Serialized event routing.
//!
//! Every signal that can change the machine (start, cancel, a state's start
//! or finish report) goes through a mailbox. The first caller that finds the
//! mailbox idle drains it; signals sent while it drains, including re-entrant
//! ones from hooks or from work that completes synchronously, are queued and
//! processed in arrival order by that same caller. No lock is held while
//! hooks, delegate callbacks or state work run.

use super::delegate::{Outcome, RunReport, StateMachineDelegate};
use super::error::{MachineError, StateError};
use super::graph::Graph;
use super::handle::StateHandle;
use crate::core::{lock, Payload, RunHistory, StateId, TransitionLifecycle, TransitionRecord};
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub(crate) enum Signal {
    Begin,
    Cancel,
    Started {
        state: StateId,
        activation: u64,
    },
    Finished {
        state: StateId,
        activation: u64,
        event: String,
        error: Option<StateError>,
        cancelled: bool,
    },
}

#[derive(Default)]
struct Mailbox {
    queue: VecDeque<Signal>,
    draining: bool,
}

#[derive(Default)]
pub(crate) struct RunState {
    pub(crate) started: bool,
    pub(crate) cancelling: bool,
    pub(crate) current: Option<StateId>,
    pub(crate) activation: u64,
    pub(crate) outcome: Option<Outcome>,
    pub(crate) last_error: Option<StateError>,
    /// Error carried by the report that led into the current state
    pub(crate) inbound_error: Option<StateError>,
    pub(crate) history: RunHistory,
}

pub(crate) struct Shared {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) delegate: Option<Arc<dyn StateMachineDelegate>>,
    pub(crate) graph: Graph,
    pub(crate) run: Mutex<RunState>,
    mailbox: Mutex<Mailbox>,
}

impl Shared {
    pub(crate) fn new(name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            delegate: None,
            graph: Graph::default(),
            run: Mutex::new(RunState::default()),
            mailbox: Mutex::new(Mailbox::default()),
        }
    }

    /// True while `activation` of `state` is the active one.
    pub(crate) fn is_activation(&self, state: StateId, activation: u64) -> bool {
        let run = lock(&self.run);
        run.outcome.is_none() && run.current == Some(state) && run.activation == activation
    }

    /// Queue a signal and drain the mailbox unless another caller already is.
    pub(crate) fn dispatch(this: &Arc<Self>, signal: Signal) {
        {
            let mut mailbox = lock(&this.mailbox);
            mailbox.queue.push_back(signal);
            if mailbox.draining {
                return;
            }
            mailbox.draining = true;
        }

        loop {
            let next = {
                let mut mailbox = lock(&this.mailbox);
                match mailbox.queue.pop_front() {
                    Some(signal) => signal,
                    None => {
                        mailbox.draining = false;
                        return;
                    }
                }
            };
            this.handle(next);
        }
    }

    fn handle(self: &Arc<Self>, signal: Signal) {
        match signal {
            Signal::Begin => self.begin(),
            Signal::Cancel => self.on_cancel(),
            Signal::Started { state, activation } => self.on_started(state, activation),
            Signal::Finished {
                state,
                activation,
                event,
                error,
                cancelled,
            } => self.on_finished(state, activation, event, error, cancelled),
        }
    }

    fn begin(self: &Arc<Self>) {
        let Some(start) = self.graph.start else {
            self.fault(MachineError::MissingStartState {
                machine: self.name.clone(),
            });
            return;
        };
        info!(machine = %self.name, id = %self.id, "state machine started");
        self.activate(start, None);
    }

    fn activate(self: &Arc<Self>, id: StateId, input: Option<Payload>) {
        let Some(state) = self.graph.state(id) else {
            self.fault(MachineError::UnknownState { id });
            return;
        };

        let (activation, cancelling) = {
            let mut run = lock(&self.run);
            run.current = Some(id);
            run.activation += 1;
            (run.activation, run.cancelling)
        };

        if let Err(err) = state.enter(input) {
            self.fault(err);
            return;
        }
        debug!(machine = %self.name, state = %state.name(), activation, "entered state");

        state.run(StateHandle::new(Arc::downgrade(self), id, activation));

        // cancel() raced with start(): the first state is cancelled right away
        if cancelling && !self.graph.is_terminal(id) {
            state.cancel();
        }
    }

    fn on_started(&self, id: StateId, activation: u64) {
        if !self.is_activation(id, activation) {
            warn!(machine = %self.name, state = %id, "ignoring start report from a stale activation");
            return;
        }
        let Some(state) = self.graph.state(id) else {
            return;
        };
        debug!(machine = %self.name, state = %state.name(), "state reported start");
        if let Some(delegate) = &self.delegate {
            delegate.state_started(&self.name, state);
        }
    }

    fn on_cancel(&self) {
        let current = {
            let mut run = lock(&self.run);
            if !run.started || run.outcome.is_some() || run.cancelling {
                return;
            }
            if run.current.is_some_and(|id| self.graph.is_terminal(id)) {
                return;
            }
            run.cancelling = true;
            run.current
        };

        info!(machine = %self.name, "cancelling state machine");
        if let Some(state) = current.and_then(|id| self.graph.state(id)) {
            state.cancel();
        }
    }

    fn on_finished(
        self: &Arc<Self>,
        id: StateId,
        activation: u64,
        event: String,
        error: Option<StateError>,
        cancelled: bool,
    ) {
        if !self.is_activation(id, activation) {
            warn!(machine = %self.name, state = %id, event = %event, "ignoring completion from a stale activation");
            return;
        }
        let Some(state) = self.graph.state(id) else {
            return;
        };

        state.leave();
        debug!(
            machine = %self.name,
            state = %state.name(),
            event = %event,
            error = ?error.as_ref().map(ToString::to_string),
            "state finished"
        );
        if let Some(delegate) = &self.delegate {
            if state.is_cancelled() || cancelled {
                delegate.state_cancelled(&self.name, state);
            } else {
                delegate.state_finished(&self.name, state, &event, error.as_ref());
            }
        }

        if let Some(outcome) = self.graph.terminal_outcome(id) {
            self.complete(outcome, error);
            return;
        }

        let cancelling = {
            let mut run = lock(&self.run);
            run.cancelling |= cancelled;
            run.cancelling
        };

        if cancelling {
            let Some(cancel) = self.graph.cancel else {
                self.fault(MachineError::MissingCancelState {
                    machine: self.name.clone(),
                });
                return;
            };
            self.record(id, cancel, &event, None);
            self.activate(cancel, state.take_output());
            return;
        }

        let Some(transition) = self.graph.transition(id, &event) else {
            self.fault(MachineError::NoTransition {
                state: state.name().to_string(),
                event,
            });
            return;
        };

        transition.invoke(TransitionLifecycle::WillTransition);
        self.record(id, transition.to(), &event, error);
        self.activate(transition.to(), state.take_output());
        transition.invoke(TransitionLifecycle::DidTransition);
    }

    fn record(&self, from: StateId, to: StateId, event: &str, error: Option<StateError>) {
        let record = TransitionRecord {
            from: self.graph.name(from),
            to: self.graph.name(to),
            event: event.to_string(),
            timestamp: Utc::now(),
        };
        debug!(machine = %self.name, from = %record.from, to = %record.to, event, "transition");

        let mut run = lock(&self.run);
        run.history = run.history.record(record);
        run.inbound_error = error;
    }

    fn complete(&self, outcome: Outcome, error: Option<StateError>) {
        let (report, last_error) = {
            let mut run = lock(&self.run);
            run.outcome = Some(outcome);
            if outcome == Outcome::Failure {
                let inbound = run.inbound_error.take();
                run.last_error = error.or(inbound);
            }
            (self.report(&run), run.last_error.clone())
        };

        info!(
            machine = %self.name,
            outcome = %outcome,
            final_state = ?report.final_state,
            "state machine completed"
        );

        let Some(delegate) = &self.delegate else {
            return;
        };
        match outcome {
            Outcome::Success => delegate.completed_with_success(&report),
            Outcome::Failure => delegate.completed_with_failure(&report, last_error.as_ref()),
            Outcome::Cancelled => delegate.completed_with_cancel(&report),
            Outcome::Faulted => {}
        }
    }

    fn fault(&self, err: MachineError) {
        let report = {
            let mut run = lock(&self.run);
            run.outcome = Some(Outcome::Faulted);
            run.last_error = Some(StateError::from(err.clone()));
            self.report(&run)
        };

        error!(machine = %self.name, error = %err, "state machine faulted");
        if let Some(delegate) = &self.delegate {
            delegate.faulted(&report, &err);
        }
    }

    fn report(&self, run: &RunState) -> RunReport {
        RunReport {
            machine_id: self.id,
            machine_name: self.name.clone(),
            outcome: run.outcome.unwrap_or(Outcome::Faulted),
            final_state: run.current.map(|id| self.graph.name(id)),
            error: run.last_error.as_ref().map(ToString::to_string),
            history: run.history.clone(),
        }
    }
}
