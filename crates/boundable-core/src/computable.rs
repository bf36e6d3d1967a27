#![forbid(unsafe_code)]

//! Values derived from other cells, with automatic dependency discovery.
//!
//! # Design
//!
//! [`Computable<T>`] wraps a compute function. It has two states:
//!
//! - **Cold** (no subscribers): no cached value and no upstream
//!   subscriptions. Every [`read()`](Computable::read) runs the compute
//!   function. The computable reports *itself* to an enclosing recording
//!   scope and hides the reads made by its compute function.
//! - **Warm** (one or more subscribers): the value is cached and the
//!   computable is subscribed to every cell its last computation read. When
//!   one of them changes, the computable recomputes under a fresh recording
//!   scope (the dependency set may change between runs), swaps its upstream
//!   subscriptions and notifies its own subscribers if the new value can
//!   differ from the cached one.
//!
//! The first subscriber warms the computable up; dropping the last
//! [`Subscription`] cools it down, dropping the cache and every upstream
//! subscription. A computable nobody observes therefore holds no listener on
//! its inputs and never keeps unrelated upstream cells busy.
//!
//! # Invariants
//!
//! 1. `cached.is_some()` and `!upstream.is_empty()` only while subscribed.
//! 2. A warm read returns the cached value without recomputing.
//! 3. Subscribers are notified only when the recomputed value can differ from
//!    the previous cached value.
//! 4. The compute function is called at most once per upstream change while
//!    warm.
//!
//! # Failure Modes
//!
//! - **Compute function panics**: the panic propagates to whoever triggered
//!   the computation (`read`, `subscribe`, or the `write` upstream). The
//!   recording scope is popped during unwinding and the cache and upstream
//!   subscriptions are left exactly as they were before the attempt.
//! - **Cycles**: a computable whose compute function (directly or through
//!   other cells) writes one of its own inputs recurses without bound. This is
//!   a caller error and is not detected.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::bound::Boundable;
use crate::content::Content;
use crate::registry::{Handler, SubscriberSet};
use crate::subscription::Subscription;
use crate::tracking::{self, CellId, Dependency, Trackable};

/// Shared interior for [`Computable<T>`].
struct ComputableInner<T> {
    id: CellId,
    /// The computation function.
    compute: Box<dyn Fn() -> T>,
    /// Cached result; `None` while cold.
    cached: RefCell<Option<T>>,
    /// One guard per dependency discovered by the last tracked computation.
    upstream: RefCell<Vec<Subscription>>,
    subscribers: SubscriberSet<T>,
    /// Number of tracked recomputations, for diagnostics.
    recomputes: Cell<u64>,
    this: Weak<Self>,
}

impl<T: Content> ComputableInner<T> {
    /// Run the compute function in a fresh recording scope, resubscribe to
    /// whatever it read, cache the result and notify if it changed.
    fn compute_and_subscribe(&self) -> T {
        let (next, deps) = tracking::collect(|| (self.compute)());

        let weak = self.this.clone();
        let on_change: Rc<dyn Fn()> = Rc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.invalidate();
            }
        });
        let fresh: Vec<Subscription> = deps
            .iter()
            .map(|dep| dep.subscribe(Rc::clone(&on_change)))
            .collect();
        let stale = self.upstream.replace(fresh);
        drop(stale);

        self.recomputes.set(self.recomputes.get() + 1);
        let differs = match &*self.cached.borrow() {
            Some(prev) => prev.can_differ(&next),
            None => true,
        };
        self.cached.replace(Some(next.clone()));
        tracing::trace!(
            target: "boundable::computable",
            cell = %self.id,
            dependencies = deps.len(),
            differs,
            "recomputed"
        );
        if differs {
            self.notify();
        }
        next
    }

    /// Upstream change: recompute if anyone is still listening.
    fn invalidate(&self) {
        if self.subscribers.is_empty() {
            return;
        }
        self.compute_and_subscribe();
    }

    fn current(&self) -> T {
        let cached = self.cached.borrow().clone();
        match cached {
            Some(value) => value,
            None => tracking::untracked(|| (self.compute)()),
        }
    }

    fn notify(&self) -> usize {
        self.subscribers.notify(&|| self.current())
    }

    /// The returned guard keeps the computable alive: holding a subscription
    /// is enough to keep receiving changes after every handle is dropped.
    fn subscribe(self: &Rc<Self>, handler: Handler<T>) -> Subscription {
        let seed = {
            let cached = self.cached.borrow().clone();
            match cached {
                Some(value) => value,
                None => {
                    let value = self.compute_and_subscribe();
                    tracing::debug!(target: "boundable::computable", cell = %self.id, "warm");
                    value
                }
            }
        };
        let id = self.subscribers.insert(handler, seed);
        let inner = Rc::clone(self);
        Subscription::new(move || {
            inner.subscribers.remove(id);
            inner.cool_if_unobserved();
        })
    }

    /// Warm → Cold once the last subscriber is gone.
    fn cool_if_unobserved(&self) {
        if !self.subscribers.is_empty() {
            return;
        }
        self.cached.replace(None);
        let stale = self.upstream.take();
        let released = stale.len();
        drop(stale);
        tracing::debug!(target: "boundable::computable", cell = %self.id, released, "cold");
    }
}

impl<T: Content> Trackable for ComputableInner<T> {
    fn cell_id(&self) -> CellId {
        self.id
    }

    fn subscribe_change(self: Rc<Self>, on_change: Rc<dyn Fn()>) -> Subscription {
        self.subscribe(Rc::new(move |_: &T| on_change()))
    }
}

/// A value derived from other cells by a compute function.
///
/// Cloning a `Computable` creates a new handle to the **same** inner state.
pub struct Computable<T> {
    inner: Rc<ComputableInner<T>>,
}

impl<T> Clone for Computable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Computable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computable")
            .field("id", &self.inner.id)
            .field("cached", &*self.inner.cached.borrow())
            .field("dependencies", &self.inner.upstream.borrow().len())
            .field("subscribers", &self.inner.subscribers)
            .finish()
    }
}

impl<T: Content> Computable<T> {
    /// Create a cold computable around `compute`.
    ///
    /// Nothing runs until the first read or subscribe.
    pub fn new(compute: impl Fn() -> T + 'static) -> Self {
        Self {
            inner: Rc::new_cyclic(|this| ComputableInner {
                id: CellId::next(),
                compute: Box::new(compute),
                cached: RefCell::new(None),
                upstream: RefCell::new(Vec::new()),
                subscribers: SubscriberSet::new(),
                recomputes: Cell::new(0),
                this: this.clone(),
            }),
        }
    }

    /// Identity of this cell.
    #[must_use]
    pub fn id(&self) -> CellId {
        self.inner.id
    }

    /// Current value.
    ///
    /// Cold: runs the compute function, with its reads hidden from enclosing
    /// scopes. Warm: returns the cached value. In both cases this computable
    /// reports itself to the innermost recording scope.
    #[must_use]
    pub fn read(&self) -> T {
        tracking::report_read(|| Dependency::new(Rc::clone(&self.inner) as Rc<dyn Trackable>));
        if self.inner.subscribers.is_empty() {
            return tracking::untracked(|| (self.inner.compute)());
        }
        let cached = self.inner.cached.borrow().clone();
        match cached {
            Some(value) => value,
            None => self.inner.compute_and_subscribe(),
        }
    }

    /// Like [`read`](Self::read) but invisible to dependency discovery.
    #[must_use]
    pub fn peek(&self) -> T {
        self.inner.current()
    }

    /// Call `handler` with every future change of the derived value.
    ///
    /// The first subscriber warms the computable up.
    pub fn subscribe(&self, handler: impl Fn(&T) + 'static) -> Subscription {
        self.inner.subscribe(Rc::new(handler))
    }

    /// Run a notification pass with the current value.
    pub fn notify(&self) {
        self.inner.notify();
    }

    /// Whether the computable holds a cache and upstream subscriptions.
    #[must_use]
    pub fn is_warm(&self) -> bool {
        self.inner.cached.borrow().is_some()
    }

    /// Number of live subscriber records.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Number of upstream subscriptions currently held.
    #[must_use]
    pub fn dependency_count(&self) -> usize {
        self.inner.upstream.borrow().len()
    }

    /// Number of tracked (warm) recomputations so far. Cold reads are not
    /// counted.
    #[must_use]
    pub fn recompute_count(&self) -> u64 {
        self.inner.recomputes.get()
    }
}

impl<T: Content> Boundable<T> for Computable<T> {
    fn read(&self) -> T {
        Computable::read(self)
    }

    fn peek(&self) -> T {
        Computable::peek(self)
    }

    fn subscribe_rc(&self, handler: Handler<T>) -> Subscription {
        self.inner.subscribe(handler)
    }

    fn notify(&self) {
        Computable::notify(self);
    }

    fn cell_id(&self) -> CellId {
        self.inner.id
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
