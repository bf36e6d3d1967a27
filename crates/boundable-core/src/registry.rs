#![forbid(unsafe_code)]

//! Per-cell subscriber registry and the notification pass.
//!
//! # Notification algorithm
//!
//! [`SubscriberSet::notify`] snapshots the live records in subscription order,
//! then for each record:
//!
//! 1. skips it if it was removed since the snapshot was taken;
//! 2. re-reads the authoritative current value (not a value captured when the
//!    pass started);
//! 3. compares it with the value that record last delivered and invokes the
//!    handler only if the two can differ, updating the record first.
//!
//! Re-reading per record is what makes re-entrant writes converge. If the
//! first handler writes the cell again, the nested pass delivers the newest
//! value to every record; when the outer pass resumes, later records already
//! hold that value and are not invoked a second time.
//!
//! Handlers are `Fn`, not `FnMut`: a handler may be re-entered while one of its
//! own invocations is still on the stack.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::content::Content;

/// Identifies one record inside a [`SubscriberSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Shared subscriber callback.
pub type Handler<T> = Rc<dyn Fn(&T)>;

struct Record<T> {
    id: SubscriberId,
    handler: Handler<T>,
    /// Last value handed to (or seeded for) this subscriber.
    last: RefCell<T>,
    live: Cell<bool>,
}

/// Ordered set of subscriber records for one cell.
pub struct SubscriberSet<T> {
    records: RefCell<Vec<Rc<Record<T>>>>,
    next_id: Cell<u64>,
}

impl<T> Default for SubscriberSet<T> {
    fn default() -> Self {
        Self {
            records: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }
    }
}

impl<T> fmt::Debug for SubscriberSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberSet")
            .field("len", &self.records.borrow().len())
            .finish()
    }
}

impl<T: Content> SubscriberSet<T> {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record seeded with `seed`, the value current at subscribe time.
    ///
    /// Seeding means the first *change* triggers the handler, not the value
    /// the cell already held.
    pub fn insert(&self, handler: Handler<T>, seed: T) -> SubscriberId {
        let id = SubscriberId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.records.borrow_mut().push(Rc::new(Record {
            id,
            handler,
            last: RefCell::new(seed),
            live: Cell::new(true),
        }));
        id
    }

    /// Remove the record `id`. Returns `false` if it was already gone.
    pub fn remove(&self, id: SubscriberId) -> bool {
        let mut records = self.records.borrow_mut();
        match records.iter().position(|r| r.id == id) {
            Some(index) => {
                let record = records.remove(index);
                record.live.set(false);
                true
            }
            None => false,
        }
    }

    /// Number of live records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    /// Whether no record is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    /// Run one notification pass. `current` yields the authoritative value
    /// and is called once per visited record.
    ///
    /// Returns the number of handler invocations made by this pass (nested
    /// passes triggered by handlers count separately).
    pub fn notify(&self, current: &dyn Fn() -> T) -> usize {
        let snapshot: Vec<Rc<Record<T>>> = self.records.borrow().clone();
        let mut delivered = 0;
        for record in snapshot {
            if !record.live.get() {
                continue;
            }
            let value = current();
            let differs = record.last.borrow().can_differ(&value);
            if !differs {
                continue;
            }
            *record.last.borrow_mut() = value.clone();
            delivered += 1;
            (record.handler)(&value);
        }
        tracing::trace!(target: "boundable::notify", delivered, "notification pass");
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Rc<RefCell<Vec<i32>>>, Handler<i32>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        (log, Rc::new(move |v: &i32| sink.borrow_mut().push(*v)))
    }

    #[test]
    fn seeded_value_is_not_delivered() {
        let set = SubscriberSet::new();
        let (log, handler) = recorder();
        set.insert(handler, 5);
        assert_eq!(set.notify(&|| 5), 0);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn changes_are_delivered_once() {
        let set = SubscriberSet::new();
        let (log, handler) = recorder();
        set.insert(handler, 0);
        assert_eq!(set.notify(&|| 1), 1);
        assert_eq!(set.notify(&|| 1), 0);
        assert_eq!(*log.borrow(), vec![1]);
    }

    #[test]
    fn insertion_order_is_delivery_order() {
        let set: SubscriberSet<i32> = SubscriberSet::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for tag in 0..4 {
            let order = Rc::clone(&order);
            set.insert(Rc::new(move |_: &i32| order.borrow_mut().push(tag)), 0);
        }
        set.notify(&|| 1);
        assert_eq!(*order.borrow(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn remove_is_idempotent() {
        let set = SubscriberSet::new();
        let (_, handler) = recorder();
        let id = set.insert(handler, 0);
        assert_eq!(set.len(), 1);
        assert!(set.remove(id));
        assert!(!set.remove(id));
        assert!(set.is_empty());
    }

    #[test]
    fn record_removed_mid_pass_is_skipped() {
        let set = Rc::new(SubscriberSet::<i32>::new());
        let (log, second) = recorder();
        let victim = Rc::new(Cell::new(None));

        let set_ref = Rc::downgrade(&set);
        let victim_ref = Rc::clone(&victim);
        set.insert(
            Rc::new(move |_: &i32| {
                if let (Some(set), Some(id)) = (set_ref.upgrade(), victim_ref.get()) {
                    set.remove(id);
                }
            }),
            0,
        );
        victim.set(Some(set.insert(second, 0)));

        assert_eq!(set.notify(&|| 1), 1);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn record_added_mid_pass_waits_for_next_pass() {
        let set = Rc::new(SubscriberSet::<i32>::new());
        let (log, late) = recorder();
        let late = RefCell::new(Some(late));

        let set_ref = Rc::downgrade(&set);
        set.insert(
            Rc::new(move |_: &i32| {
                if let (Some(set), Some(handler)) = (set_ref.upgrade(), late.borrow_mut().take()) {
                    set.insert(handler, 0);
                }
            }),
            0,
        );

        set.notify(&|| 1);
        assert!(log.borrow().is_empty());
        set.notify(&|| 2);
        assert_eq!(*log.borrow(), vec![2]);
    }
}
