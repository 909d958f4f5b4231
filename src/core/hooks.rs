//! Lifecycle hook registry.
//!
//! Hooks are plain closures grouped by lifecycle point. Registration and
//! invocation are separate so a hook set can be exercised without running a
//! state machine.

use std::fmt;

/// Boxed lifecycle callback receiving the entity it is attached to.
pub type Hook<T> = Box<dyn Fn(&T) + Send + Sync>;

/// Ordered collection of hooks keyed by lifecycle point.
///
/// # Example
///
/// ```rust
/// use relay_fsm::core::{HookSet, StateLifecycle};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let calls = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&calls);
///
/// let mut hooks: HookSet<StateLifecycle, str> = HookSet::new();
/// hooks.register(StateLifecycle::DidEnter, move |_name: &str| {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// hooks.invoke(StateLifecycle::WillEnter, "idle");
/// hooks.invoke(StateLifecycle::DidEnter, "idle");
/// assert_eq!(calls.load(Ordering::SeqCst), 1);
/// ```
pub struct HookSet<P, T: ?Sized> {
    hooks: Vec<(P, Hook<T>)>,
}

impl<P: Copy + PartialEq, T: ?Sized> HookSet<P, T> {
    /// Create an empty hook set.
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Register a hook for a lifecycle point.
    ///
    /// Hooks registered for the same point run in registration order.
    pub fn register<F>(&mut self, point: P, hook: F)
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.hooks.push((point, Box::new(hook)));
    }

    /// Run every hook registered for `point`.
    pub fn invoke(&self, point: P, target: &T) {
        for (_, hook) in self.hooks.iter().filter(|(p, _)| *p == point) {
            hook(target);
        }
    }

    /// Number of hooks registered for `point`.
    pub fn count(&self, point: P) -> usize {
        self.hooks.iter().filter(|(p, _)| *p == point).count()
    }

    /// Whether no hook is registered at any point.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl<P: Copy + PartialEq, T: ?Sized> Default for HookSet<P, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: fmt::Debug, T: ?Sized> fmt::Debug for HookSet<P, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.hooks.iter().map(|(point, _)| point))
            .finish()
    }
}
