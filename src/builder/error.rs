//! Build errors for the state machine builder.

use crate::machine::MachineError;
use crate::validation::ValidationError;
use thiserror::Error;

/// Errors that can occur when building a state machine.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Start state not specified. Call .start_state(name) before .build()")]
    MissingStartState,

    #[error("No state named '{0}'. Add it with .state(...) first")]
    UnknownState(String),

    #[error(transparent)]
    Machine(#[from] MachineError),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}
