#![forbid(unsafe_code)]

//! Lifecycle-gated bindings.
//!
//! A [`NodeBoundWatcher`] ties cell subscriptions to the presence of one host
//! node. While the node is attached every binding is subscribed; while it is
//! detached none is, and changes made in the meantime are delivered as a
//! single value on the next attach.
//!
//! # Invariants
//!
//! 1. A binding created while detached starts with no delivered value, so the
//!    first attach always delivers.
//! 2. On detach each binding resyncs its last delivered value to the cell's
//!    current value without calling the handler.
//! 3. On attach each binding is subscribed first, then delivered the current
//!    value if it can differ from the last delivered one.
//!
//! Together these make any sequence of attach/detach cycles look to a
//! handler like one continuous attachment, with detached periods collapsed
//! into one delivery.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use boundable_core::{Boundable, Content, MaybeBound, Subscription};

use crate::presence::{HostNode, NodePresenceWatcher, PresenceHandle};

/// Watcher configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatcherOptions {
    /// Leave the node's display flag alone across attach/detach.
    pub prevent_display_change: bool,
}

impl WatcherOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether the watcher must not touch the node's display flag.
    #[must_use]
    pub fn with_prevent_display_change(mut self, prevent: bool) -> Self {
        self.prevent_display_change = prevent;
        self
    }
}

// ─── Bindings ────────────────────────────────────────────────────────────────

trait BindingSlot {
    fn id(&self) -> u64;
    fn attach(&self);
    fn detach(&self);
    fn release(&self);
    fn is_subscribed(&self) -> bool;
}

struct BindingEntry<T: Content> {
    id: u64,
    source: Rc<dyn Boundable<T>>,
    handler: Rc<dyn Fn(&T)>,
    last: RefCell<Option<T>>,
    live: RefCell<Option<Subscription>>,
    bound: Cell<bool>,
    this: Weak<Self>,
}

impl<T: Content> BindingEntry<T> {
    fn deliver(&self, value: &T) {
        *self.last.borrow_mut() = Some(value.clone());
        (self.handler)(value);
    }
}

impl<T: Content> BindingSlot for BindingEntry<T> {
    fn id(&self) -> u64 {
        self.id
    }

    fn attach(&self) {
        if !self.bound.get() || self.live.borrow().is_some() {
            return;
        }
        let this = self.this.clone();
        let subscription = self.source.subscribe_rc(Rc::new(move |value: &T| {
            if let Some(entry) = this.upgrade() {
                entry.deliver(value);
            }
        }));
        *self.live.borrow_mut() = Some(subscription);

        let current = self.source.peek();
        let differs = match &*self.last.borrow() {
            None => true,
            Some(previous) => previous.can_differ(&current),
        };
        if differs {
            self.deliver(&current);
        }
    }

    fn detach(&self) {
        let subscription = self.live.borrow_mut().take();
        drop(subscription);
        if self.bound.get() {
            *self.last.borrow_mut() = Some(self.source.peek());
        }
    }

    fn release(&self) {
        self.bound.set(false);
        let subscription = self.live.borrow_mut().take();
        drop(subscription);
    }

    fn is_subscribed(&self) -> bool {
        self.live.borrow().is_some()
    }
}

// ─── Watcher state ───────────────────────────────────────────────────────────

struct WatcherState<P: NodePresenceWatcher> {
    node: P::Node,
    presence: P,
    options: WatcherOptions,
    attached: Cell<bool>,
    bindings: RefCell<Vec<Rc<dyn BindingSlot>>>,
    pending: RefCell<Option<PresenceHandle>>,
    next_binding: Cell<u64>,
    this: Weak<Self>,
}

impl<P: NodePresenceWatcher> WatcherState<P> {
    fn replace_pending(&self, handle: PresenceHandle) {
        let previous = self.pending.borrow_mut().replace(handle);
        drop(previous);
    }

    fn enter_attached(&self) {
        self.attached.set(true);
        let this = self.this.clone();
        let handle = self.presence.on_removed(
            &self.node,
            Box::new(move || {
                if let Some(state) = this.upgrade() {
                    state.enter_detached();
                }
            }),
        );
        self.replace_pending(handle);

        let bindings = self.bindings.borrow().clone();
        tracing::debug!(
            target: "boundable::watcher",
            bindings = bindings.len(),
            "node attached"
        );
        for binding in &bindings {
            binding.attach();
        }
        if !self.options.prevent_display_change {
            self.node.set_displayed(true);
        }
    }

    fn enter_detached(&self) {
        self.attached.set(false);
        let this = self.this.clone();
        let handle = self.presence.on_inserted(
            &self.node,
            Box::new(move || {
                if let Some(state) = this.upgrade() {
                    state.enter_attached();
                }
            }),
        );
        self.replace_pending(handle);

        if !self.options.prevent_display_change {
            self.node.set_displayed(false);
        }
        let bindings = self.bindings.borrow().clone();
        tracing::debug!(
            target: "boundable::watcher",
            bindings = bindings.len(),
            "node detached"
        );
        for binding in &bindings {
            binding.detach();
        }
    }

    fn unbind(&self, id: u64) {
        let removed = {
            let mut bindings = self.bindings.borrow_mut();
            bindings
                .iter()
                .position(|b| b.id() == id)
                .map(|index| bindings.remove(index))
        };
        if let Some(binding) = removed {
            binding.release();
        }
    }
}

// ─── Public API ──────────────────────────────────────────────────────────────

/// Binds handlers to cells for as long as a host node is attached.
///
/// Cloning shares the watcher. When the last clone is dropped the pending
/// presence callback is cancelled and every live subscription released.
pub struct NodeBoundWatcher<P: NodePresenceWatcher> {
    state: Rc<WatcherState<P>>,
}

impl<P: NodePresenceWatcher> Clone for NodeBoundWatcher<P> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<P: NodePresenceWatcher> NodeBoundWatcher<P> {
    /// Watch `node` with default options.
    pub fn new(presence: P, node: P::Node) -> Self {
        Self::with_options(presence, node, WatcherOptions::default())
    }

    pub fn with_options(presence: P, node: P::Node, options: WatcherOptions) -> Self {
        let attached = presence.is_attached(&node);
        let state = Rc::new_cyclic(|this| WatcherState {
            node,
            presence,
            options,
            attached: Cell::new(attached),
            bindings: RefCell::new(Vec::new()),
            pending: RefCell::new(None),
            next_binding: Cell::new(0),
            this: this.clone(),
        });
        if attached {
            state.enter_attached();
        } else {
            state.enter_detached();
        }
        Self { state }
    }

    /// Bind `handler` to `source`.
    ///
    /// A plain value is delivered once, immediately, and nothing is bound. A
    /// cell is delivered immediately when the node is attached, otherwise on
    /// the next attach.
    pub fn watch<T: Content>(
        &self,
        source: impl Into<MaybeBound<T>>,
        handler: impl Fn(&T) + 'static,
    ) -> WatchHandle {
        let source = match source.into() {
            MaybeBound::Plain(value) => {
                handler(&value);
                return WatchHandle::inert();
            }
            MaybeBound::Bound(cell) => cell,
        };

        let state = &self.state;
        let id = state.next_binding.get();
        state.next_binding.set(id + 1);
        let entry = Rc::new_cyclic(|this| BindingEntry {
            id,
            source,
            handler: Rc::new(handler),
            last: RefCell::new(None),
            live: RefCell::new(None),
            bound: Cell::new(true),
            this: this.clone(),
        });
        let slot: Rc<dyn BindingSlot> = entry;
        state.bindings.borrow_mut().push(Rc::clone(&slot));
        if state.attached.get() {
            slot.attach();
        }

        let weak = Rc::downgrade(state);
        WatchHandle::new(move || {
            if let Some(state) = weak.upgrade() {
                state.unbind(id);
            }
        })
    }

    #[must_use]
    pub fn node(&self) -> &P::Node {
        &self.state.node
    }

    #[must_use]
    pub fn options(&self) -> WatcherOptions {
        self.state.options
    }

    /// Whether the watcher currently considers its node attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.state.attached.get()
    }

    /// Number of cell bindings, subscribed or not.
    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.state.bindings.borrow().len()
    }

    /// Number of bindings holding a live subscription.
    #[must_use]
    pub fn subscribed_count(&self) -> usize {
        self.state
            .bindings
            .borrow()
            .iter()
            .filter(|b| b.is_subscribed())
            .count()
    }
}

impl<P: NodePresenceWatcher> fmt::Debug for NodeBoundWatcher<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeBoundWatcher")
            .field("attached", &self.is_attached())
            .field("bindings", &self.binding_count())
            .field("options", &self.state.options)
            .finish()
    }
}

/// Token for one binding made by [`NodeBoundWatcher::watch`].
///
/// Dropping the handle keeps the binding for the watcher's lifetime; call
/// [`unbind`](Self::unbind) to remove it.
pub struct WatchHandle {
    release: Option<Box<dyn FnOnce()>>,
}

impl WatchHandle {
    fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Handle for a plain value; unbinding does nothing.
    #[must_use]
    pub fn inert() -> Self {
        Self { release: None }
    }

    #[must_use]
    pub fn is_inert(&self) -> bool {
        self.release.is_none()
    }

    /// Remove the binding and release its subscription.
    pub fn unbind(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("inert", &self.is_inert())
            .finish()
    }
}
