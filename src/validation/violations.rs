//! Structural problems the validator can find.

use crate::core::StateId;
use crate::machine::StateRole;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Stable code of a violation, for CI gating and reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViolationCode {
    MissingMandatoryStates,
    DeadEndState,
    UnreachableState,
    DuplicateName,
    InvalidTerminalState,
}

impl fmt::Display for ViolationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Self::MissingMandatoryStates => "missing-mandatory-states",
            Self::DeadEndState => "dead-end-state",
            Self::UnreachableState => "unreachable-state",
            Self::DuplicateName => "duplicate-name",
            Self::InvalidTerminalState => "invalid-terminal-state",
        };
        f.write_str(code)
    }
}

/// Why a terminal state is misconfigured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminalIssue {
    /// The same state is designated for more than one terminal role
    SharedRole,
    /// A terminal state has outgoing transitions
    HasTransitions,
}

/// A single structural problem, tagged with the states involved.
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "kebab-case")]
pub enum Violation {
    #[error("Missing mandatory states: {roles:?}")]
    MissingMandatoryStates { roles: Vec<StateRole> },

    #[error("State '{state}' is not terminal and has no outgoing transitions")]
    DeadEndState { state: String, id: StateId },

    #[error("States not reachable from the start state: {states:?}")]
    UnreachableState { states: Vec<String> },

    #[error("{} states share the name '{name}'", .ids.len())]
    DuplicateName { name: String, ids: Vec<StateId> },

    #[error("Terminal state '{state}' is invalid: {issue:?}")]
    InvalidTerminalState {
        state: String,
        id: StateId,
        issue: TerminalIssue,
    },
}

impl Violation {
    /// Stable code of this violation.
    pub fn code(&self) -> ViolationCode {
        match self {
            Self::MissingMandatoryStates { .. } => ViolationCode::MissingMandatoryStates,
            Self::DeadEndState { .. } => ViolationCode::DeadEndState,
            Self::UnreachableState { .. } => ViolationCode::UnreachableState,
            Self::DuplicateName { .. } => ViolationCode::DuplicateName,
            Self::InvalidTerminalState { .. } => ViolationCode::InvalidTerminalState,
        }
    }
}

/// All violations found in one machine.
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
#[error("State machine '{machine}' failed validation with {} violation(s)", .violations.len())]
pub struct ValidationError {
    pub machine: String,
    pub violations: Vec<Violation>,
}

impl ValidationError {
    /// Whether any violation carries `code`.
    pub fn has(&self, code: ViolationCode) -> bool {
        self.violations.iter().any(|v| v.code() == code)
    }

    /// Violations carrying `code`.
    pub fn with_code(&self, code: ViolationCode) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.code() == code)
    }

    /// Pretty-printed JSON report, for CI gates and artifacts.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
