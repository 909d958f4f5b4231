//! Builder API for ergonomic state machine construction.
//!
//! The builder refers to states by name, so a whole machine can be declared
//! in one expression and checked on `build`.
//!
//! # Example
//!
//! ```
//! use relay_fsm::builder::StateMachineBuilder;
//! use relay_fsm::core::State;
//! use relay_fsm::machine::Outcome;
//!
//! let machine = StateMachineBuilder::new("deploy")
//!     .state(State::from_fn("Build", |h| h.report_finished("built", None)))
//!     .state(State::from_fn("Ship", |h| h.report_finished("shipped", None)))
//!     .terminals()
//!     .start_state("Build")
//!     .transition("Build", "built", "Ship")
//!     .transition("Ship", "shipped", "Success")
//!     .build()
//!     .unwrap();
//!
//! machine.start().unwrap();
//! assert_eq!(machine.outcome(), Some(Outcome::Success));
//! ```

pub mod error;
pub mod machine;

pub use error::BuildError;
pub use machine::StateMachineBuilder;

use crate::machine::StateMachine;

impl StateMachine {
    /// Start a [`StateMachineBuilder`].
    pub fn builder(name: impl Into<String>) -> StateMachineBuilder {
        StateMachineBuilder::new(name)
    }
}
