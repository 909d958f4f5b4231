//! Errors raised by the engine and errors reported by states.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::core::StateId;

/// Errors that can occur while configuring or running a state machine
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MachineError {
    #[error("State machine '{machine}' was already started")]
    AlreadyStarted { machine: String },

    #[error("State machine '{machine}' has no start state")]
    MissingStartState { machine: String },

    #[error("State machine '{machine}' is cancelling but has no cancel state")]
    MissingCancelState { machine: String },

    #[error("State {id} is not registered with this machine")]
    UnknownState { id: StateId },

    #[error("Transition from '{state}' on event '{event}' is already registered")]
    DuplicateTransition { state: String, event: String },

    #[error("No transition from '{state}' on event '{event}'")]
    NoTransition { state: String, event: String },

    #[error("State '{state}' is already running")]
    StateAlreadyRunning { state: String },
}

#[derive(Debug, Error)]
#[error("{0}")]
struct Message(String);

/// Error a state reports together with its terminal event.
///
/// Cheap to clone so the same error can be kept as the machine's last error
/// and handed to the delegate.
///
/// # Example
///
/// ```rust
/// use relay_fsm::machine::StateError;
///
/// let error = StateError::msg("upstream returned 503");
/// assert_eq!(error.to_string(), "upstream returned 503");
///
/// let io = StateError::new(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
/// assert!(io.downcast_ref::<std::io::Error>().is_some());
/// ```
#[derive(Clone)]
pub struct StateError(Arc<dyn StdError + Send + Sync>);

impl StateError {
    /// Wrap any error type.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self(Arc::new(error))
    }

    /// Error carrying only a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(Message(message.into()))
    }

    /// The wrapped error as `E`, if it is one.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }

    /// True when both values carry the same underlying error.
    pub fn ptr_eq(&self, other: &StateError) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl StdError for StateError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

impl From<MachineError> for StateError {
    fn from(error: MachineError) -> Self {
        Self::new(error)
    }
}
