#![forbid(unsafe_code)]

//! Readable/writable reactive cells.
//!
//! # Invariants
//!
//! 1. `read()` returns the latest written value.
//! 2. `write(v)` is a no-op when `v` cannot differ from the current value
//!    (see [`Content`]); otherwise it stores `v` and runs one notification pass.
//! 3. `read()` and `with()` report the cell to the innermost recording scope;
//!    `peek()` does not.
//!
//! # Failure Modes
//!
//! - **Writing from inside `with()`**: `with` holds a shared borrow of the
//!   value while its closure runs, so writing the same cell from that closure
//!   panics with a borrow error. Handlers are never called under a borrow.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::bound::Boundable;
use crate::content::Content;
use crate::registry::{Handler, SubscriberSet};
use crate::subscription::Subscription;
use crate::tracking::{self, CellId, Dependency, Trackable};

struct ValueInner<T> {
    id: CellId,
    value: RefCell<T>,
    subscribers: SubscriberSet<T>,
}

impl<T: Content> ValueInner<T> {
    fn current(&self) -> T {
        self.value.borrow().clone()
    }

    fn notify(&self) -> usize {
        self.subscribers.notify(&|| self.current())
    }

    fn subscribe(self: &Rc<Self>, handler: Handler<T>) -> Subscription {
        let id = self.subscribers.insert(handler, self.current());
        let weak: Weak<Self> = Rc::downgrade(self);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.subscribers.remove(id);
            }
        })
    }
}

impl<T: Content> Trackable for ValueInner<T> {
    fn cell_id(&self) -> CellId {
        self.id
    }

    fn subscribe_change(self: Rc<Self>, on_change: Rc<dyn Fn()>) -> Subscription {
        self.subscribe(Rc::new(move |_: &T| on_change()))
    }
}

/// A shared, readable/writable reactive value.
///
/// Cloning a `BoundValue` creates a new handle to the **same** cell. The cell
/// lives as long as any handle (or any closure capturing one) does; there is
/// no explicit dispose.
pub struct BoundValue<T> {
    inner: Rc<ValueInner<T>>,
}

impl<T> Clone for BoundValue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for BoundValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundValue")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .field("subscribers", &self.inner.subscribers)
            .finish()
    }
}

impl<T: Content + Default> Default for BoundValue<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Content> BoundValue<T> {
    /// Create a cell holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(ValueInner {
                id: CellId::next(),
                value: RefCell::new(value),
                subscribers: SubscriberSet::new(),
            }),
        }
    }

    /// Identity of this cell.
    #[must_use]
    pub fn id(&self) -> CellId {
        self.inner.id
    }

    /// Whether both handles point at the same cell.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn report(&self) {
        tracking::report_read(|| Dependency::new(Rc::clone(&self.inner) as Rc<dyn Trackable>));
    }

    /// Current value. Registers this cell with the innermost recording scope.
    #[must_use]
    pub fn read(&self) -> T {
        self.report();
        self.inner.current()
    }

    /// Borrow the current value. Registers this cell like [`read`](Self::read).
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.report();
        f(&self.inner.value.borrow())
    }

    /// Current value, invisible to dependency discovery.
    #[must_use]
    pub fn peek(&self) -> T {
        self.inner.current()
    }

    /// Store `value` and notify subscribers, unless it cannot differ from the
    /// current value.
    pub fn write(&self, value: T) {
        let changed = self.inner.value.borrow().can_differ(&value);
        if !changed {
            return;
        }
        *self.inner.value.borrow_mut() = value;
        self.inner.notify();
    }

    /// Mutate the value in place, then notify if the result can differ from
    /// the value before the mutation.
    ///
    /// Structured values always notify, which is the intended way to publish
    /// an in-place edit of a shared structure.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let before = self.inner.current();
        let result = f(&mut self.inner.value.borrow_mut());
        if before.can_differ(&self.inner.value.borrow()) {
            self.inner.notify();
        }
        result
    }

    /// Call `handler` with every future content change.
    ///
    /// The record is seeded with the current value, so subscribing never
    /// replays the present state as a change.
    pub fn subscribe(&self, handler: impl Fn(&T) + 'static) -> Subscription {
        self.inner.subscribe(Rc::new(handler))
    }

    /// Run a notification pass with the current value.
    pub fn notify(&self) {
        self.inner.notify();
    }

    /// Number of live subscriber records.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }
}

impl<T: Content> Boundable<T> for BoundValue<T> {
    fn read(&self) -> T {
        BoundValue::read(self)
    }

    fn peek(&self) -> T {
        BoundValue::peek(self)
    }

    fn subscribe_rc(&self, handler: Handler<T>) -> Subscription {
        self.inner.subscribe(handler)
    }

    fn notify(&self) {
        BoundValue::notify(self);
    }

    fn cell_id(&self) -> CellId {
        self.inner.id
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
