//! Core building blocks of a state machine.
//!
//! This module contains the pieces the engine is assembled from:
//! - States and the `StateWork` trait concrete states implement
//! - Transitions between states
//! - Lifecycle hook registries
//! - Type-erased payloads
//! - Immutable run history

mod history;
mod hooks;
mod payload;
mod state;
mod transition;

pub use history::{RunHistory, TransitionRecord};
pub use hooks::{Hook, HookSet};
pub use payload::Payload;
pub use state::{
    FinalState, State, StateEvent, StateId, StateLifecycle, StateTimes, StateWork,
    FINAL_STATE_COMPLETED_EVENT,
};
pub use transition::{Transition, TransitionLifecycle};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock `mutex`, recovering the data if a panicking hook poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
