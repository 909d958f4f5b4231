//! The channel a running state reports back through.

use super::engine::{Shared, Signal};
use super::error::StateError;
use crate::core::{Payload, StateId};
use std::sync::Weak;
use tracing::{debug, warn};

/// Handle given to a state's work for one activation.
///
/// The handle only holds a weak reference to the machine. Finishing consumes
/// it, so a state can report its terminal event at most once per activation;
/// dropping it without finishing leaves the machine waiting and logs a
/// warning.
pub struct StateHandle {
    machine: Weak<Shared>,
    state: StateId,
    activation: u64,
    finished: bool,
}

impl StateHandle {
    pub(crate) fn new(machine: Weak<Shared>, state: StateId, activation: u64) -> Self {
        Self {
            machine,
            state,
            activation,
            finished: false,
        }
    }

    /// Id of the state this handle reports for.
    pub fn state_id(&self) -> StateId {
        self.state
    }

    /// Name of the state this handle belongs to.
    pub fn state_name(&self) -> Option<String> {
        self.with_state(|state| state.name().to_string())
    }

    /// Payload handed over by the previous state.
    pub fn input(&self) -> Option<Payload> {
        self.with_state(|state| state.input()).flatten()
    }

    /// Set the payload the next state will receive as input.
    pub fn set_output(&self, payload: Payload) {
        let Some(shared) = self.machine.upgrade() else {
            return;
        };
        if !shared.is_activation(self.state, self.activation) {
            warn!(state = %self.state, "ignoring output from a stale activation");
            return;
        }
        if let Some(state) = shared.graph.state(self.state) {
            state.set_output(Some(payload));
        }
    }

    /// Whether the machine asked this state to wind down.
    pub fn is_cancelled(&self) -> bool {
        self.with_state(|state| state.is_cancelled())
            .unwrap_or(true)
    }

    /// Acknowledge that the work has begun. Purely observational.
    pub fn report_started(&self) {
        self.send(Signal::Started {
            state: self.state,
            activation: self.activation,
        });
    }

    /// Report the terminal event of this activation.
    pub fn report_finished(mut self, event: impl Into<String>, error: Option<StateError>) {
        self.finished = true;
        self.send(Signal::Finished {
            state: self.state,
            activation: self.activation,
            event: event.into(),
            error,
            cancelled: false,
        });
    }

    /// Report that the work stopped because it was cancelled. The machine
    /// moves to its cancel state.
    pub fn report_cancelled(mut self) {
        self.finished = true;
        self.send(Signal::Finished {
            state: self.state,
            activation: self.activation,
            event: String::new(),
            error: None,
            cancelled: true,
        });
    }

    fn with_state<T>(&self, f: impl FnOnce(&crate::core::State) -> T) -> Option<T> {
        let shared = self.machine.upgrade()?;
        let value = shared.graph.state(self.state).map(f);
        value
    }

    fn send(&self, signal: Signal) {
        match self.machine.upgrade() {
            Some(shared) => Shared::dispatch(&shared, signal),
            None => debug!(state = %self.state, "machine dropped, report discarded"),
        }
    }
}

impl Drop for StateHandle {
    fn drop(&mut self) {
        if !self.finished && self.machine.strong_count() > 0 {
            warn!(
                state = %self.state,
                activation = self.activation,
                "state handle dropped without reporting a terminal event"
            );
        }
    }
}

impl std::fmt::Debug for StateHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateHandle")
            .field("state", &self.state)
            .field("activation", &self.activation)
            .field("finished", &self.finished)
            .finish()
    }
}

