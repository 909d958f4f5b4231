//! Builder for constructing state machines.

use crate::builder::error::BuildError;
use crate::core::{State, StateId, Transition};
use crate::machine::{StateMachine, StateMachineDelegate, StateRole};
use std::sync::Arc;

type Configure = Box<dyn FnOnce(Transition) -> Transition>;

struct PendingTransition {
    from: String,
    event: String,
    to: String,
    configure: Option<Configure>,
}

/// Builder for constructing state machines with a fluent API.
///
/// States are referred to by name; when names are duplicated the first
/// registered state wins and validation reports the duplicate.
pub struct StateMachineBuilder {
    name: String,
    delegate: Option<Arc<dyn StateMachineDelegate>>,
    states: Vec<State>,
    transitions: Vec<PendingTransition>,
    roles: Vec<(StateRole, String)>,
    validate: bool,
}

impl StateMachineBuilder {
    /// Create a new builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            delegate: None,
            states: Vec::new(),
            transitions: Vec::new(),
            roles: Vec::new(),
            validate: true,
        }
    }

    /// Set the delegate notified of the outcome.
    pub fn delegate(mut self, delegate: Arc<dyn StateMachineDelegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    /// Add a state.
    pub fn state(mut self, state: State) -> Self {
        self.states.push(state);
        self
    }

    /// Add multiple states at once.
    pub fn states(mut self, states: impl IntoIterator<Item = State>) -> Self {
        self.states.extend(states);
        self
    }

    /// Set the start state by name (required).
    pub fn start_state(self, name: impl Into<String>) -> Self {
        self.role(StateRole::Start, name)
    }

    /// Add `state` and designate it as the success terminal.
    pub fn success(self, state: State) -> Self {
        self.terminal(StateRole::Success, state)
    }

    /// Add `state` and designate it as the failure terminal.
    pub fn failure(self, state: State) -> Self {
        self.terminal(StateRole::Failure, state)
    }

    /// Add `state` and designate it as the cancel terminal.
    pub fn cancel(self, state: State) -> Self {
        self.terminal(StateRole::Cancel, state)
    }

    /// Add the three standard terminal states: `Success`, `Failure`, `Cancel`.
    pub fn terminals(self) -> Self {
        self.success(State::terminal("Success"))
            .failure(State::terminal("Failure"))
            .cancel(State::terminal("Cancel"))
    }

    /// Designate an already added state for `role`.
    pub fn role(mut self, role: StateRole, name: impl Into<String>) -> Self {
        self.roles.retain(|(r, _)| *r != role);
        self.roles.push((role, name.into()));
        self
    }

    /// Route `event` reported by `from` to `to`.
    pub fn transition(
        mut self,
        from: impl Into<String>,
        event: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        self.transitions.push(PendingTransition {
            from: from.into(),
            event: event.into(),
            to: to.into(),
            configure: None,
        });
        self
    }

    /// Like [`transition`](Self::transition), with a chance to attach hooks.
    pub fn transition_with<F>(
        mut self,
        from: impl Into<String>,
        event: impl Into<String>,
        to: impl Into<String>,
        configure: F,
    ) -> Self
    where
        F: FnOnce(Transition) -> Transition + 'static,
    {
        self.transitions.push(PendingTransition {
            from: from.into(),
            event: event.into(),
            to: to.into(),
            configure: Some(Box::new(configure)),
        });
        self
    }

    /// Run graph validation in `build` (on by default).
    pub fn validate_on_build(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Build the state machine.
    /// Returns an error if the start state is missing, a name does not
    /// resolve, or validation finds violations.
    pub fn build(self) -> Result<StateMachine, BuildError> {
        if !self.roles.iter().any(|(role, _)| *role == StateRole::Start) {
            return Err(BuildError::MissingStartState);
        }

        let mut machine = match self.delegate {
            Some(delegate) => StateMachine::with_delegate(self.name, delegate),
            None => StateMachine::new(self.name),
        };
        machine.add_states(self.states)?;

        for pending in self.transitions {
            let from = resolve(&machine, &pending.from)?;
            let to = resolve(&machine, &pending.to)?;
            let transition = Transition::new(from, to);
            let transition = match pending.configure {
                Some(configure) => configure(transition),
                None => transition,
            };
            machine.add_transition(transition, pending.event)?;
        }

        for (role, name) in self.roles {
            let id = resolve(&machine, &name)?;
            machine.set_role(role, id)?;
        }

        if self.validate {
            machine.is_valid()?;
        }
        Ok(machine)
    }

    fn terminal(mut self, role: StateRole, state: State) -> Self {
        let name = state.name().to_string();
        self.states.push(state);
        self.role(role, name)
    }
}

fn resolve(machine: &StateMachine, name: &str) -> Result<StateId, BuildError> {
    machine
        .state_named(name)
        .ok_or_else(|| BuildError::UnknownState(name.to_string()))
}
