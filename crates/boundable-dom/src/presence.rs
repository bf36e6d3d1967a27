#![forbid(unsafe_code)]

//! Node presence capability.
//!
//! A host UI layer implements [`NodePresenceWatcher`] to tell bindings when a
//! node is inserted into, or removed from, the live tree. Any native
//! "mounted/unmounted" hook fits the contract:
//!
//! - a callback fires at most once, on the first matching transition after
//!   it was registered;
//! - a transition that is undone within the same batch (insert then remove,
//!   or remove then insert, of the same node) fires nothing;
//! - dropping the returned [`PresenceHandle`] cancels a callback that has not
//!   fired yet.

use std::fmt;

/// One-shot presence callback.
pub type PresenceCallback = Box<dyn FnOnce()>;

/// Observes attach/detach transitions of host nodes.
pub trait NodePresenceWatcher: Clone + 'static {
    /// Host node handle.
    type Node: HostNode;

    /// Whether `node` is currently part of the live tree.
    fn is_attached(&self, node: &Self::Node) -> bool;

    /// Call `callback` once, when `node` is next inserted into the live tree.
    fn on_inserted(&self, node: &Self::Node, callback: PresenceCallback) -> PresenceHandle;

    /// Call `callback` once, when `node` is next removed from the live tree.
    fn on_removed(&self, node: &Self::Node, callback: PresenceCallback) -> PresenceHandle;
}

/// The part of a host node the watcher touches directly.
pub trait HostNode: Clone + 'static {
    /// Show or hide the node without detaching it.
    fn set_displayed(&self, displayed: bool);
}

/// Cancels a pending presence callback when dropped.
#[must_use = "dropping a PresenceHandle cancels the callback"]
pub struct PresenceHandle {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl PresenceHandle {
    /// Handle whose drop runs `cancel`.
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Cancel now.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for PresenceHandle {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for PresenceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresenceHandle")
            .field("pending", &self.cancel.is_some())
            .finish()
    }
}
