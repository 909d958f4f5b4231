//! Static validation of a machine's declared graph.
//!
//! Every check runs and every violation is collected; validation does not
//! stop at the first problem. Results use Stillwater's `Validation` type so
//! the checks compose by accumulation.
//!
//! # Example
//!
//! ```rust
//! use relay_fsm::core::State;
//! use relay_fsm::machine::StateMachine;
//! use relay_fsm::validation::{validate, ViolationCode};
//! use stillwater::validation::Validation;
//!
//! let mut machine = StateMachine::new("incomplete");
//! let start = machine.add_state(State::terminal("Start")).unwrap();
//! machine.set_start_state(start).unwrap();
//!
//! match validate(&machine) {
//!     Validation::Failure(violations) => {
//!         assert!(violations
//!             .iter()
//!             .any(|v| v.code() == ViolationCode::MissingMandatoryStates));
//!     }
//!     Validation::Success(_) => panic!("expected violations"),
//! }
//! ```

mod violations;

pub use violations::{TerminalIssue, ValidationError, Violation, ViolationCode};

use crate::core::StateId;
use crate::machine::{Graph, StateMachine, StateRole};
use std::collections::{BTreeMap, VecDeque};
use stillwater::validation::Validation;
use tracing::debug;

/// Result of one check or of a whole validation run.
pub type Checked = Validation<(), Vec<Violation>>;

const MANDATORY_ROLES: [StateRole; 4] = [
    StateRole::Start,
    StateRole::Success,
    StateRole::Failure,
    StateRole::Cancel,
];

const TERMINAL_ROLES: [StateRole; 3] = [StateRole::Success, StateRole::Failure, StateRole::Cancel];

/// Run every structural check against `machine`, accumulating all
/// violations.
pub fn validate(machine: &StateMachine) -> Checked {
    let graph = machine.graph();
    let checks = vec![
        duplicate_names(graph),
        mandatory_states(graph),
        terminal_states(graph),
        reachability(graph),
    ];
    // Accumulate ALL violations using all_vec
    let result = Validation::all_vec(checks).map(|_| ());

    if let Validation::Failure(violations) = &result {
        debug!(machine = %machine.name(), violations = violations.len(), "validation failed");
    }
    result
}

/// [`validate`] as a `Result`, for `?` and test assertions.
pub fn check(machine: &StateMachine) -> Result<(), ValidationError> {
    match validate(machine) {
        Validation::Success(()) => Ok(()),
        Validation::Failure(violations) => Err(ValidationError {
            machine: machine.name().to_string(),
            violations,
        }),
    }
}

fn from_violations(violations: Vec<Violation>) -> Checked {
    if violations.is_empty() {
        Validation::success(())
    } else {
        Validation::failure(violations)
    }
}

fn duplicate_names(graph: &Graph) -> Checked {
    let mut by_name: BTreeMap<&str, Vec<StateId>> = BTreeMap::new();
    for id in graph.ids() {
        if let Some(state) = graph.state(id) {
            by_name.entry(state.name()).or_default().push(id);
        }
    }

    from_violations(
        by_name
            .into_iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(name, ids)| Violation::DuplicateName {
                name: name.to_string(),
                ids,
            })
            .collect(),
    )
}

fn mandatory_states(graph: &Graph) -> Checked {
    let roles: Vec<StateRole> = MANDATORY_ROLES
        .into_iter()
        .filter(|role| !graph.role(*role).is_some_and(|id| graph.contains(id)))
        .collect();

    if roles.is_empty() {
        Validation::success(())
    } else {
        Validation::failure(vec![Violation::MissingMandatoryStates { roles }])
    }
}

fn terminal_states(graph: &Graph) -> Checked {
    let mut violations = Vec::new();
    let mut seen: Vec<StateId> = Vec::new();

    for role in TERMINAL_ROLES {
        let Some(id) = graph.role(role) else {
            continue;
        };
        if seen.contains(&id) {
            violations.push(Violation::InvalidTerminalState {
                state: graph.name(id),
                id,
                issue: TerminalIssue::SharedRole,
            });
            continue;
        }
        seen.push(id);

        if graph.outgoing(id).next().is_some() {
            violations.push(Violation::InvalidTerminalState {
                state: graph.name(id),
                id,
                issue: TerminalIssue::HasTransitions,
            });
        }
    }
    from_violations(violations)
}

/// Breadth-first walk from the start state. Reports unvisited states and
/// visited non-terminal states without a way out. Terminal states are exempt
/// from reachability: the cancel state is entered through cancellation.
fn reachability(graph: &Graph) -> Checked {
    let Some(start) = graph.start.filter(|id| graph.contains(*id)) else {
        return Validation::success(());
    };

    let mut visited = vec![false; graph.states.len()];
    let mut queue = VecDeque::from([start]);
    visited[start.index()] = true;

    while let Some(id) = queue.pop_front() {
        for (_, transition) in graph.outgoing(id) {
            let next = transition.to();
            if graph.contains(next) && !visited[next.index()] {
                visited[next.index()] = true;
                queue.push_back(next);
            }
        }
    }

    let mut violations: Vec<Violation> = graph
        .ids()
        .filter(|id| visited[id.index()] && !graph.is_terminal(*id))
        .filter(|id| graph.outgoing(*id).next().is_none())
        .map(|id| Violation::DeadEndState {
            state: graph.name(id),
            id,
        })
        .collect();

    let unreachable: Vec<String> = graph
        .ids()
        .filter(|id| !visited[id.index()] && !graph.is_terminal(*id))
        .map(|id| graph.name(id))
        .collect();
    if !unreachable.is_empty() {
        violations.push(Violation::UnreachableState {
            states: unreachable,
        });
    }

    from_violations(violations)
}
