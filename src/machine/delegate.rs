//! Owner notifications and run reports.

use super::error::{MachineError, StateError};
use crate::core::{RunHistory, State};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// How a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
    Cancelled,
    /// The run could not continue, e.g. no transition matched a reported event
    Faulted,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Cancelled => "cancelled",
            Self::Faulted => "faulted",
        };
        f.write_str(name)
    }
}

/// Summary handed to the delegate when a run ends.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub machine_id: Uuid,
    pub machine_name: String,
    pub outcome: Outcome,
    /// Name of the state active when the run ended
    pub final_state: Option<String>,
    /// Rendered last error, if the run failed or faulted
    pub error: Option<String>,
    pub history: RunHistory,
}

impl RunReport {
    /// Pretty-printed JSON, for run logs and audit trails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Receives the outcome of a run.
///
/// Exactly one of the three `completed_*` callbacks fires per run of a valid
/// machine. The per-state callbacks are observational and cannot influence
/// routing.
pub trait StateMachineDelegate: Send + Sync {
    fn completed_with_success(&self, report: &RunReport);

    fn completed_with_failure(&self, report: &RunReport, error: Option<&StateError>);

    fn completed_with_cancel(&self, report: &RunReport);

    /// The run stopped without reaching a terminal state.
    fn faulted(&self, _report: &RunReport, _error: &MachineError) {}

    fn state_started(&self, _machine: &str, _state: &State) {}

    fn state_finished(
        &self,
        _machine: &str,
        _state: &State,
        _event: &str,
        _error: Option<&StateError>,
    ) {
    }

    fn state_cancelled(&self, _machine: &str, _state: &State) {}
}
