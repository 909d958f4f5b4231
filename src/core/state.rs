//! States: named units of work with an observable lifecycle.
//!
//! A [`State`] is the part the machine manages (flags, payload slots,
//! timestamps, hooks). The work itself is supplied through [`StateWork`] and
//! stays opaque to the engine; it only reports back through a
//! [`StateHandle`].

use super::hooks::HookSet;
use super::lock;
use super::payload::Payload;
use crate::machine::{MachineError, StateHandle};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Event name reported by [`FinalState`] when it completes.
pub const FINAL_STATE_COMPLETED_EVENT: &str = "final-state-completed";

/// Index of a state inside its machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateId(pub(crate) usize);

impl StateId {
    /// Position of the state in its machine.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Points in a state's activation where hooks run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateLifecycle {
    WillEnter,
    DidEnter,
    WillLeave,
    DidLeave,
}

/// Timestamped events of a single activation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateEvent {
    /// The state was entered.
    Start,
    /// The state reported its terminal event.
    Finish,
    /// Cancellation was requested.
    CancelRequested,
    /// The state finished after cancellation had been requested.
    CancelCompleted,
}

/// Timestamps of the most recent activation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateTimes {
    pub start: Option<DateTime<Utc>>,
    pub finish: Option<DateTime<Utc>>,
    pub cancel_requested: Option<DateTime<Utc>>,
    pub cancel_completed: Option<DateTime<Utc>>,
}

impl StateTimes {
    fn slot(&mut self, event: StateEvent) -> &mut Option<DateTime<Utc>> {
        match event {
            StateEvent::Start => &mut self.start,
            StateEvent::Finish => &mut self.finish,
            StateEvent::CancelRequested => &mut self.cancel_requested,
            StateEvent::CancelCompleted => &mut self.cancel_completed,
        }
    }

    /// Record `event` now unless it was already recorded.
    fn record(&mut self, event: StateEvent) {
        let slot = self.slot(event);
        if slot.is_none() {
            *slot = Some(Utc::now());
        }
    }

    /// Time at which `event` was recorded.
    pub fn get(&self, event: StateEvent) -> Option<DateTime<Utc>> {
        match event {
            StateEvent::Start => self.start,
            StateEvent::Finish => self.finish,
            StateEvent::CancelRequested => self.cancel_requested,
            StateEvent::CancelCompleted => self.cancel_completed,
        }
    }
}

/// The work a state performs.
///
/// `start` receives the handle the work must eventually finish through,
/// exactly once, from any thread. `cancel` is a cooperative request: the work
/// should wind down and still report a terminal event.
pub trait StateWork: Send + Sync {
    fn start(&self, handle: StateHandle);

    fn cancel(&self, _state: &State) {}
}

/// Work of a terminal state: completes as soon as it is entered.
#[derive(Clone, Copy, Debug, Default)]
pub struct FinalState;

impl StateWork for FinalState {
    fn start(&self, handle: StateHandle) {
        handle.report_started();
        handle.report_finished(FINAL_STATE_COMPLETED_EVENT, None);
    }
}

struct FnWork<F>(F);

impl<F> StateWork for FnWork<F>
where
    F: Fn(StateHandle) + Send + Sync,
{
    fn start(&self, handle: StateHandle) {
        (self.0)(handle)
    }
}

/// A named unit of work hosted by a [`StateMachine`](crate::machine::StateMachine).
///
/// `running` and `cancelled` are atomics so observers on other threads can
/// read them while the machine drives the state.
///
/// # Example
///
/// ```rust
/// use relay_fsm::core::{State, StateLifecycle};
///
/// let state = State::from_fn("fetch", |handle| {
///     handle.report_finished("done", None);
/// })
/// .with_hook(StateLifecycle::DidEnter, |state| {
///     println!("entered {}", state.name());
/// });
///
/// assert_eq!(state.name(), "fetch");
/// assert!(!state.is_running());
/// ```
pub struct State {
    name: String,
    running: AtomicBool,
    cancelled: AtomicBool,
    input: Mutex<Option<Payload>>,
    output: Mutex<Option<Payload>>,
    times: Mutex<StateTimes>,
    hooks: HookSet<StateLifecycle, State>,
    work: Box<dyn StateWork>,
}

impl State {
    /// State performing `work`.
    pub fn new<W: StateWork + 'static>(name: impl Into<String>, work: W) -> Self {
        Self {
            name: name.into(),
            running: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            input: Mutex::new(None),
            output: Mutex::new(None),
            times: Mutex::new(StateTimes::default()),
            hooks: HookSet::new(),
            work: Box::new(work),
        }
    }

    /// State whose work is a closure receiving the handle.
    pub fn from_fn<F>(name: impl Into<String>, work: F) -> Self
    where
        F: Fn(StateHandle) + Send + Sync + 'static,
    {
        Self::new(name, FnWork(work))
    }

    /// Terminal state that completes immediately.
    pub fn terminal(name: impl Into<String>) -> Self {
        Self::new(name, FinalState)
    }

    /// Register a lifecycle hook.
    pub fn on<F>(&mut self, point: StateLifecycle, hook: F)
    where
        F: Fn(&State) + Send + Sync + 'static,
    {
        self.hooks.register(point, hook);
    }

    /// Builder form of [`State::on`].
    pub fn with_hook<F>(mut self, point: StateLifecycle, hook: F) -> Self
    where
        F: Fn(&State) + Send + Sync + 'static,
    {
        self.on(point, hook);
        self
    }

    /// Name of the state; need not be unique, validation reports duplicates.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True between entering and leaving.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Whether cancellation was requested during the current activation.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Input handed over by the previous state.
    pub fn input(&self) -> Option<Payload> {
        lock(&self.input).clone()
    }

    /// Output the state produced for its successor.
    pub fn output(&self) -> Option<Payload> {
        lock(&self.output).clone()
    }

    /// Timestamp of `event` during the most recent activation.
    pub fn timestamp(&self, event: StateEvent) -> Option<DateTime<Utc>> {
        lock(&self.times).get(event)
    }

    /// Snapshot of all lifecycle timestamps.
    pub fn times(&self) -> StateTimes {
        lock(&self.times).clone()
    }

    /// Time the most recent activation took, once it has finished.
    pub fn elapsed(&self) -> Option<Duration> {
        let times = lock(&self.times);
        let (start, finish) = (times.start?, times.finish?);
        finish.signed_duration_since(start).to_std().ok()
    }

    pub(crate) fn set_output(&self, payload: Option<Payload>) {
        *lock(&self.output) = payload;
    }

    pub(crate) fn take_output(&self) -> Option<Payload> {
        lock(&self.output).take()
    }

    /// Activate the state with `input`, running the enter hooks.
    pub(crate) fn enter(&self, input: Option<Payload>) -> Result<(), MachineError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(MachineError::StateAlreadyRunning {
                state: self.name.clone(),
            });
        }

        self.cancelled.store(false, Ordering::SeqCst);
        *lock(&self.input) = input;
        *lock(&self.output) = None;
        {
            let mut times = lock(&self.times);
            *times = StateTimes::default();
            times.record(StateEvent::Start);
        }

        self.hooks.invoke(StateLifecycle::WillEnter, self);
        self.hooks.invoke(StateLifecycle::DidEnter, self);
        Ok(())
    }

    /// Hand control to the state's work.
    pub(crate) fn run(&self, handle: StateHandle) {
        self.work.start(handle);
    }

    /// Request cancellation. Returns false if the state is idle or a request
    /// is already pending.
    pub(crate) fn cancel(&self) -> bool {
        if !self.is_running() || self.cancelled.swap(true, Ordering::SeqCst) {
            return false;
        }
        lock(&self.times).record(StateEvent::CancelRequested);
        self.work.cancel(self);
        true
    }

    /// Deactivate after the terminal event, running the leave hooks.
    pub(crate) fn leave(&self) {
        self.running.store(false, Ordering::SeqCst);
        {
            let mut times = lock(&self.times);
            times.record(StateEvent::Finish);
            if self.is_cancelled() {
                times.record(StateEvent::CancelCompleted);
            }
        }

        self.hooks.invoke(StateLifecycle::WillLeave, self);
        self.hooks.invoke(StateLifecycle::DidLeave, self);
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .field("cancelled", &self.is_cancelled())
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}
