//! The state machine engine.
//!
//! A [`StateMachine`] owns its states and transitions, reacts to the
//! completion reports of the active state and routes to the next one until a
//! terminal state is reached.
//!
//! # Key Concepts
//!
//! - **Configuration**: states, transitions and the four designated states
//!   are registered before `start`; the graph is frozen afterwards
//! - **Routing**: the finished state's event name selects the transition, its
//!   output becomes the next state's input
//! - **Cancellation**: cooperative; the active state winds down and the
//!   machine ends in its cancel state whatever event it reports
//! - **Serialization**: reports may arrive from any thread and are processed
//!   one at a time, in arrival order

mod delegate;
mod engine;
mod error;
mod graph;
mod handle;

pub use delegate::{Outcome, RunReport, StateMachineDelegate};
pub use error::{MachineError, StateError};
pub use graph::StateRole;
pub use handle::StateHandle;

pub(crate) use graph::Graph;

use crate::core::{lock, RunHistory, State, StateId, Transition};
use crate::validation::{self, ValidationError};
use engine::{Shared, Signal};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// An event-driven state machine.
///
/// # Example
///
/// ```rust
/// use relay_fsm::core::{State, Transition};
/// use relay_fsm::machine::{Outcome, StateMachine};
///
/// let mut machine = StateMachine::new("greeting");
/// let hello = machine
///     .add_state(State::from_fn("hello", |handle| {
///         handle.report_finished("done", None);
///     }))
///     .unwrap();
/// let success = machine.add_state(State::terminal("success")).unwrap();
/// let failure = machine.add_state(State::terminal("failure")).unwrap();
/// let cancel = machine.add_state(State::terminal("cancel")).unwrap();
///
/// machine.add_transition(Transition::new(hello, success), "done").unwrap();
/// machine.set_start_state(hello).unwrap();
/// machine.set_success_state(success).unwrap();
/// machine.set_failure_state(failure).unwrap();
/// machine.set_cancel_state(cancel).unwrap();
///
/// assert!(machine.is_valid().is_ok());
/// machine.start().unwrap();
///
/// assert_eq!(machine.outcome(), Some(Outcome::Success));
/// assert!(machine.is_in_state(success));
/// ```
pub struct StateMachine {
    shared: Arc<Shared>,
}

impl StateMachine {
    /// Create an empty machine without a delegate.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(Shared::new(name.into())),
        }
    }

    /// Create an empty machine that reports to `delegate`.
    pub fn with_delegate(name: impl Into<String>, delegate: Arc<dyn StateMachineDelegate>) -> Self {
        let mut shared = Shared::new(name.into());
        shared.delegate = Some(delegate);
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Mutable access to the configuration; only possible before `start`.
    fn configure(&mut self) -> Result<&mut Shared, MachineError> {
        let machine = self.shared.name.clone();
        let Some(shared) = Arc::get_mut(&mut self.shared) else {
            return Err(MachineError::AlreadyStarted { machine });
        };
        if lock(&shared.run).started {
            return Err(MachineError::AlreadyStarted { machine });
        }
        Ok(shared)
    }

    /// Replace the delegate. Fails once the machine has started.
    pub fn set_delegate(
        &mut self,
        delegate: Arc<dyn StateMachineDelegate>,
    ) -> Result<(), MachineError> {
        self.configure()?.delegate = Some(delegate);
        Ok(())
    }

    /// Register a state. Duplicate names are accepted here and reported by
    /// validation.
    pub fn add_state(&mut self, state: State) -> Result<StateId, MachineError> {
        let states = &mut self.configure()?.graph.states;
        states.push(state);
        Ok(StateId(states.len() - 1))
    }

    /// Register several states, returning their ids in order.
    pub fn add_states(
        &mut self,
        states: impl IntoIterator<Item = State>,
    ) -> Result<Vec<StateId>, MachineError> {
        states
            .into_iter()
            .map(|state| self.add_state(state))
            .collect()
    }

    /// Register `transition` under `(transition.from(), event)`.
    pub fn add_transition(
        &mut self,
        transition: Transition,
        event: impl Into<String>,
    ) -> Result<(), MachineError> {
        let graph = &mut self.configure()?.graph;
        for id in [transition.from(), transition.to()] {
            if !graph.contains(id) {
                return Err(MachineError::UnknownState { id });
            }
        }

        let key = (transition.from(), event.into());
        if graph.transitions.contains_key(&key) {
            return Err(MachineError::DuplicateTransition {
                state: graph.name(key.0),
                event: key.1,
            });
        }
        graph.transitions.insert(key, transition);
        Ok(())
    }

    /// Designate `id` for `role`.
    pub fn set_role(&mut self, role: StateRole, id: StateId) -> Result<(), MachineError> {
        let graph = &mut self.configure()?.graph;
        if !graph.contains(id) {
            return Err(MachineError::UnknownState { id });
        }
        *graph.slot(role) = Some(id);
        Ok(())
    }

    /// Designate the state activated by `start`.
    pub fn set_start_state(&mut self, id: StateId) -> Result<(), MachineError> {
        self.set_role(StateRole::Start, id)
    }

    /// Designate the terminal state that ends a run with success.
    pub fn set_success_state(&mut self, id: StateId) -> Result<(), MachineError> {
        self.set_role(StateRole::Success, id)
    }

    /// Designate the terminal state that ends a run with failure.
    pub fn set_failure_state(&mut self, id: StateId) -> Result<(), MachineError> {
        self.set_role(StateRole::Failure, id)
    }

    /// Designate the terminal state every cancelled run ends in.
    pub fn set_cancel_state(&mut self, id: StateId) -> Result<(), MachineError> {
        self.set_role(StateRole::Cancel, id)
    }

    /// State designated for `role`, if any.
    pub fn role(&self, role: StateRole) -> Option<StateId> {
        self.shared.graph.role(role)
    }

    /// State designated as the start state, if any.
    pub fn start_state(&self) -> Option<StateId> {
        self.role(StateRole::Start)
    }

    /// Unique id of this machine, carried in run reports.
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    /// Name of the machine.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// State registered under `id`.
    pub fn state(&self, id: StateId) -> Option<&State> {
        self.shared.graph.state(id)
    }

    /// First registered state called `name`.
    pub fn state_named(&self, name: &str) -> Option<StateId> {
        self.states()
            .find(|(_, state)| state.name() == name)
            .map(|(id, _)| id)
    }

    /// All registered states with their ids, in registration order.
    pub fn states(&self) -> impl Iterator<Item = (StateId, &State)> {
        self.shared
            .graph
            .states
            .iter()
            .enumerate()
            .map(|(index, state)| (StateId(index), state))
    }

    /// Outgoing transitions of `id`, keyed by event name.
    pub fn transitions_for_state(&self, id: StateId) -> BTreeMap<&str, &Transition> {
        self.shared.graph.outgoing(id).collect()
    }

    /// Transition taken when `id` reports `event`.
    pub fn transition_for_state(&self, id: StateId, event: &str) -> Option<&Transition> {
        self.shared.graph.transition(id, event)
    }

    /// Check the declared graph. Intended for tests and CI rather than hot
    /// paths.
    pub fn is_valid(&self) -> Result<(), ValidationError> {
        validation::check(self)
    }

    /// Activate the start state.
    ///
    /// Work that completes synchronously runs to its next routing step before
    /// this returns.
    pub fn start(&self) -> Result<(), MachineError> {
        {
            let mut run = lock(&self.shared.run);
            if run.started {
                return Err(MachineError::AlreadyStarted {
                    machine: self.shared.name.clone(),
                });
            }
            if self.shared.graph.start.is_none() {
                return Err(MachineError::MissingStartState {
                    machine: self.shared.name.clone(),
                });
            }
            run.started = true;
        }
        Shared::dispatch(&self.shared, Signal::Begin);
        Ok(())
    }

    /// Ask the active state to wind down; the run ends in the cancel state.
    /// Does nothing when the machine is idle or already finishing.
    pub fn cancel(&self) {
        Shared::dispatch(&self.shared, Signal::Cancel);
    }

    /// Id of the active state; stays on the terminal state after the run.
    pub fn current_state(&self) -> Option<StateId> {
        lock(&self.shared.run).current
    }

    /// The active state.
    pub fn current(&self) -> Option<&State> {
        self.current_state().and_then(|id| self.state(id))
    }

    /// Whether `id` is the active state.
    pub fn is_in_state(&self, id: StateId) -> bool {
        self.current_state() == Some(id)
    }

    /// Whether the active state is called `name`.
    pub fn is_in_state_with_name(&self, name: &str) -> bool {
        self.current().is_some_and(|state| state.name() == name)
    }

    /// True from `start` until the run has ended.
    pub fn is_running(&self) -> bool {
        let run = lock(&self.shared.run);
        run.started && run.outcome.is_none()
    }

    /// True between an accepted `cancel` and the end of the run.
    pub fn is_cancelling(&self) -> bool {
        let run = lock(&self.shared.run);
        run.cancelling && run.outcome.is_none()
    }

    /// How the run ended, or `None` while it is still going.
    pub fn outcome(&self) -> Option<Outcome> {
        lock(&self.shared.run).outcome
    }

    /// Error that ended the run in the failure state, or the fault that
    /// stopped it.
    pub fn last_error(&self) -> Option<StateError> {
        lock(&self.shared.run).last_error.clone()
    }

    /// Snapshot of the traversals made so far.
    pub fn history(&self) -> RunHistory {
        lock(&self.shared.run).history.clone()
    }

    pub(crate) fn graph(&self) -> &Graph {
        &self.shared.graph
    }
}

impl fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .field("states", &self.shared.graph.states.len())
            .field("transitions", &self.shared.graph.transitions.len())
            .field("current", &self.current_state())
            .field("outcome", &self.outcome())
            .finish()
    }
}

#[cfg(test)]
mod tests;
