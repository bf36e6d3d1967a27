#![forbid(unsafe_code)]

//! RAII subscription guards.

use std::fmt;

/// Guard returned by every `subscribe` call.
///
/// Dropping the guard removes exactly the subscriber record it was created
/// for. For a [`Computable`](crate::Computable) the drop path is also where
/// the last unsubscribe releases the computable's upstream subscriptions.
///
/// A [`BoundValue`](crate::BoundValue) guard holds only a weak reference, so
/// dropping it after the cell is gone is a no-op. A `Computable` guard holds
/// a strong one: while it lives, the computable stays alive and warm even if
/// every handle to it has been dropped.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Create a guard that runs `release` exactly once when dropped.
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A guard that is not attached to anything.
    ///
    /// Used for bindings to plain values, which never change.
    pub fn inert() -> Self {
        Self { release: None }
    }

    /// Whether dropping this guard will release anything.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }

    /// Unsubscribe now. Equivalent to dropping the guard.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
