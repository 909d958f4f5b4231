//! Relay: an embeddable state machine engine
//!
//! Relay chains units of work. Each state performs its work, possibly on
//! another thread, and reports a named event when done; the machine routes
//! that event to the next state and hands the state's output over as the
//! next state's input, until a terminal state ends the run.
//!
//! # Core Concepts
//!
//! - **State**: a named unit of work with lifecycle hooks, payloads and timestamps
//! - **Transition**: a directed edge selected by `(state, event)`
//! - **StateMachine**: routes completion reports, one at a time, to terminal
//!   success, failure or cancel states and notifies a delegate
//! - **Validation**: static checks of the declared graph, all violations at once
//!
//! # Example
//!
//! ```rust
//! use relay_fsm::{Outcome, StateMachine, State, StateError};
//!
//! let machine = StateMachine::builder("checkout")
//!     .state(State::from_fn("Reserve", |h| h.report_finished("reserved", None)))
//!     .state(State::from_fn("Charge", |h| {
//!         h.report_finished("declined", Some(StateError::msg("card declined")))
//!     }))
//!     .terminals()
//!     .start_state("Reserve")
//!     .transition("Reserve", "reserved", "Charge")
//!     .transition("Charge", "charged", "Success")
//!     .transition("Charge", "declined", "Failure")
//!     .build()
//!     .unwrap();
//!
//! machine.start().unwrap();
//!
//! assert_eq!(machine.outcome(), Some(Outcome::Failure));
//! assert_eq!(machine.last_error().unwrap().to_string(), "card declined");
//! assert_eq!(machine.history().get_path(), vec!["Reserve", "Charge", "Failure"]);
//! ```

pub mod builder;
pub mod core;
pub mod machine;
pub mod validation;

// Re-export commonly used types
pub use builder::{BuildError, StateMachineBuilder};
pub use core::{Payload, State, StateId, StateWork, Transition};
pub use machine::{
    MachineError, Outcome, RunReport, StateError, StateHandle, StateMachine,
    StateMachineDelegate,
};
pub use validation::{ValidationError, Violation, ViolationCode};
