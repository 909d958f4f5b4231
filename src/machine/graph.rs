//! Declared states and transitions of a machine.

use super::delegate::Outcome;
use crate::core::{State, StateId, Transition};
use std::collections::BTreeMap;

/// Role a designated state plays in a machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateRole {
    Start,
    Success,
    Failure,
    Cancel,
}

#[derive(Default)]
pub(crate) struct Graph {
    pub(crate) states: Vec<State>,
    pub(crate) transitions: BTreeMap<(StateId, String), Transition>,
    pub(crate) start: Option<StateId>,
    pub(crate) success: Option<StateId>,
    pub(crate) failure: Option<StateId>,
    pub(crate) cancel: Option<StateId>,
}

impl Graph {
    pub(crate) fn state(&self, id: StateId) -> Option<&State> {
        self.states.get(id.0)
    }

    pub(crate) fn contains(&self, id: StateId) -> bool {
        id.0 < self.states.len()
    }

    pub(crate) fn ids(&self) -> impl Iterator<Item = StateId> {
        (0..self.states.len()).map(StateId)
    }

    pub(crate) fn name(&self, id: StateId) -> String {
        self.state(id)
            .map(|state| state.name().to_string())
            .unwrap_or_else(|| id.to_string())
    }

    pub(crate) fn role(&self, role: StateRole) -> Option<StateId> {
        match role {
            StateRole::Start => self.start,
            StateRole::Success => self.success,
            StateRole::Failure => self.failure,
            StateRole::Cancel => self.cancel,
        }
    }

    pub(crate) fn slot(&mut self, role: StateRole) -> &mut Option<StateId> {
        match role {
            StateRole::Start => &mut self.start,
            StateRole::Success => &mut self.success,
            StateRole::Failure => &mut self.failure,
            StateRole::Cancel => &mut self.cancel,
        }
    }

    /// Outcome a terminal state stands for; success wins when roles overlap.
    pub(crate) fn terminal_outcome(&self, id: StateId) -> Option<Outcome> {
        if self.success == Some(id) {
            Some(Outcome::Success)
        } else if self.failure == Some(id) {
            Some(Outcome::Failure)
        } else if self.cancel == Some(id) {
            Some(Outcome::Cancelled)
        } else {
            None
        }
    }

    pub(crate) fn is_terminal(&self, id: StateId) -> bool {
        self.terminal_outcome(id).is_some()
    }

    /// Transitions leaving `id`, ordered by event name.
    pub(crate) fn outgoing(&self, id: StateId) -> impl Iterator<Item = (&str, &Transition)> {
        self.transitions
            .range((id, String::new())..)
            .take_while(move |((from, _), _)| *from == id)
            .map(|((_, event), transition)| (event.as_str(), transition))
    }

    pub(crate) fn transition(&self, id: StateId, event: &str) -> Option<&Transition> {
        self.transitions.get(&(id, event.to_string()))
    }
}
