//! Directed edges between states.

use super::hooks::HookSet;
use super::state::StateId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Points around a traversal where transition hooks run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransitionLifecycle {
    WillTransition,
    DidTransition,
}

/// Edge from one registered state to another.
///
/// A transition does not know its event name; the machine keys it by
/// `(from, event)` when it is registered.
///
/// # Example
///
/// ```rust
/// use relay_fsm::core::{State, Transition, TransitionLifecycle};
/// use relay_fsm::machine::StateMachine;
///
/// let mut machine = StateMachine::new("example");
/// let a = machine.add_state(State::terminal("a")).unwrap();
/// let b = machine.add_state(State::terminal("b")).unwrap();
///
/// let transition = Transition::new(a, b)
///     .with_hook(TransitionLifecycle::WillTransition, |t| {
///         println!("{} -> {}", t.from(), t.to());
///     });
///
/// machine.add_transition(transition, "next").unwrap();
/// assert!(machine.transition_for_state(a, "next").is_some());
/// ```
pub struct Transition {
    from: StateId,
    to: StateId,
    hooks: HookSet<TransitionLifecycle, Transition>,
}

impl Transition {
    /// Transition from `from` to `to` without hooks.
    pub fn new(from: StateId, to: StateId) -> Self {
        Self {
            from,
            to,
            hooks: HookSet::new(),
        }
    }

    /// State the transition leaves.
    pub fn from(&self) -> StateId {
        self.from
    }

    /// State the transition enters.
    pub fn to(&self) -> StateId {
        self.to
    }

    /// Register a hook fired around each traversal.
    pub fn on<F>(&mut self, point: TransitionLifecycle, hook: F)
    where
        F: Fn(&Transition) + Send + Sync + 'static,
    {
        self.hooks.register(point, hook);
    }

    /// Builder form of [`Transition::on`].
    pub fn with_hook<F>(mut self, point: TransitionLifecycle, hook: F) -> Self
    where
        F: Fn(&Transition) + Send + Sync + 'static,
    {
        self.on(point, hook);
        self
    }

    /// Run the hooks registered for `point`.
    pub fn invoke(&self, point: TransitionLifecycle) {
        self.hooks.invoke(point, self);
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("hooks", &self.hooks)
            .finish()
    }
}
