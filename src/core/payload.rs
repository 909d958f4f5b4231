//! Type-erased values handed from one state to the next.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Opaque value passed between states.
///
/// The machine never looks inside a payload; it only moves the output of a
/// finished state into the input slot of the state it activates next. Concrete
/// states agree on the shape and recover it with [`Payload::downcast_ref`].
///
/// # Example
///
/// ```rust
/// use relay_fsm::core::Payload;
///
/// let payload = Payload::new(vec![1u8, 2, 3]);
/// assert_eq!(payload.downcast_ref::<Vec<u8>>(), Some(&vec![1, 2, 3]));
/// assert!(payload.downcast_ref::<String>().is_none());
/// ```
#[derive(Clone)]
pub struct Payload(Arc<dyn Any + Send + Sync>);

impl Payload {
    /// Wrap `value`.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Borrow the value if it has type `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Whether the value has type `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.0.is::<T>()
    }

    /// True when both payloads share the same allocation.
    pub fn ptr_eq(&self, other: &Payload) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload").finish_non_exhaustive()
    }
}
