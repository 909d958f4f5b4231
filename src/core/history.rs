//! Run history tracking.
//!
//! Every traversal the machine makes is kept as an immutable record, so a
//! finished run can be inspected and reported.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Record of a single traversal.
///
/// # Example
///
/// ```rust
/// use relay_fsm::core::TransitionRecord;
/// use chrono::Utc;
///
/// let record = TransitionRecord {
///     from: "Start".to_string(),
///     to: "Fetch".to_string(),
///     event: "go".to_string(),
///     timestamp: Utc::now(),
/// };
/// assert_eq!(record.event, "go");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// Name of the state that finished
    pub from: String,
    /// Name of the state that was entered
    pub to: String,
    /// Event that selected the transition; cancellation routes record the
    /// reported event as well
    pub event: String,
    /// When the traversal happened
    pub timestamp: DateTime<Utc>,
}

/// Ordered history of traversals.
///
/// History is immutable - `record` returns a new history with the traversal
/// appended.
///
/// # Example
///
/// ```rust
/// use relay_fsm::core::{RunHistory, TransitionRecord};
/// use chrono::Utc;
///
/// let history = RunHistory::new();
/// let history = history.record(TransitionRecord {
///     from: "Start".into(),
///     to: "Middle".into(),
///     event: "next".into(),
///     timestamp: Utc::now(),
/// });
/// let history = history.record(TransitionRecord {
///     from: "Middle".into(),
///     to: "End".into(),
///     event: "next".into(),
///     timestamp: Utc::now(),
/// });
///
/// assert_eq!(history.get_path(), vec!["Start", "Middle", "End"]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunHistory {
    transitions: Vec<TransitionRecord>,
}

impl RunHistory {
    /// Empty history.
    pub fn new() -> Self {
        Self {
            transitions: Vec::new(),
        }
    }

    /// Record a traversal, returning a new history.
    pub fn record(&self, transition: TransitionRecord) -> Self {
        let mut transitions = self.transitions.clone();
        transitions.push(transition);
        Self { transitions }
    }

    /// Names of the states visited, in order.
    pub fn get_path(&self) -> Vec<&str> {
        let mut path = Vec::new();
        if let Some(first) = self.transitions.first() {
            path.push(first.from.as_str());
        }
        for transition in &self.transitions {
            path.push(transition.to.as_str());
        }
        path
    }

    /// Duration from the first to the last traversal.
    pub fn duration(&self) -> Option<Duration> {
        if let (Some(first), Some(last)) = (self.transitions.first(), self.transitions.last()) {
            last.timestamp
                .signed_duration_since(first.timestamp)
                .to_std()
                .ok()
        } else {
            None
        }
    }

    /// All recorded traversals, oldest first.
    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}
