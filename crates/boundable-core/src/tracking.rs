#![forbid(unsafe_code)]

//! Dependency discovery.
//!
//! A computation "listens" for the cells it reads by running inside a
//! recording scope. Scopes nest: every [`with_recorder`] call pushes a
//! recorder onto a stack and pops it when the call returns or unwinds. A cell
//! read reports itself to the **top** recorder only, so a computable that
//! reads another computable discovers the computable, never that
//! computable's own inputs.
//!
//! The stack is thread-local. Recording sessions on different threads never
//! share a stack, and cells are `!Send`, so a session can only ever observe
//! reads made on its own thread.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashSet;

use crate::subscription::Subscription;

// ─── Cell ID generation ──────────────────────────────────────────────────────

static NEXT_CELL_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(u64);

impl CellId {
    pub(crate) fn next() -> Self {
        Self(NEXT_CELL_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value, for logs.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell#{}", self.0)
    }
}

// ─── Trackable cells ─────────────────────────────────────────────────────────

/// Type-erased view of a cell that can be depended upon.
pub trait Trackable {
    /// Identity used to de-duplicate repeated reads.
    fn cell_id(&self) -> CellId;

    /// Call `on_change` whenever this cell's content changes, until the
    /// returned guard is dropped.
    fn subscribe_change(self: Rc<Self>, on_change: Rc<dyn Fn()>) -> Subscription;
}

/// A cell discovered while recording.
#[derive(Clone)]
pub struct Dependency(Rc<dyn Trackable>);

impl Dependency {
    /// Wrap a trackable cell.
    pub fn new(cell: Rc<dyn Trackable>) -> Self {
        Self(cell)
    }

    /// Identity of the underlying cell.
    #[must_use]
    pub fn id(&self) -> CellId {
        self.0.cell_id()
    }

    /// Subscribe `on_change` to the underlying cell.
    pub fn subscribe(&self, on_change: Rc<dyn Fn()>) -> Subscription {
        Rc::clone(&self.0).subscribe_change(on_change)
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Dependency").field(&self.id()).finish()
    }
}

// ─── Recorder stack ──────────────────────────────────────────────────────────

type Recorder = Rc<dyn Fn(&Dependency)>;

thread_local! {
    static RECORDERS: RefCell<Vec<Recorder>> = const { RefCell::new(Vec::new()) };
}

/// Pops the recorder it pushed, on return and on unwind.
struct ScopeGuard {
    depth: usize,
}

impl ScopeGuard {
    fn push(recorder: Recorder) -> Self {
        let depth = RECORDERS.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(recorder);
            stack.len()
        });
        tracing::trace!(target: "boundable::tracking", depth, "recorder pushed");
        Self { depth }
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        RECORDERS.with(|stack| {
            let mut stack = stack.borrow_mut();
            debug_assert_eq!(stack.len(), self.depth, "recorder stack out of balance");
            stack.pop();
        });
    }
}

/// Run `action` with `on_read` receiving every cell read directly inside it.
///
/// Reads made inside a nested scope go to the nested recorder instead.
pub fn with_recorder<R>(on_read: impl Fn(&Dependency) + 'static, action: impl FnOnce() -> R) -> R {
    let _guard = ScopeGuard::push(Rc::new(on_read));
    action()
}

/// Run `action` so that none of its reads are visible to enclosing scopes.
pub fn untracked<R>(action: impl FnOnce() -> R) -> R {
    with_recorder(|_| {}, action)
}

/// Run `action` and return the cells it read, de-duplicated, in first-read
/// order.
pub fn collect<R>(action: impl FnOnce() -> R) -> (R, Vec<Dependency>) {
    #[derive(Default)]
    struct Seen {
        ids: AHashSet<CellId>,
        deps: Vec<Dependency>,
    }

    let seen = Rc::new(RefCell::new(Seen::default()));
    let sink = Rc::clone(&seen);
    let result = with_recorder(
        move |dep| {
            let mut seen = sink.borrow_mut();
            if seen.ids.insert(dep.id()) {
                seen.deps.push(dep.clone());
            }
        },
        action,
    );
    let deps = std::mem::take(&mut seen.borrow_mut().deps);
    (result, deps)
}

/// Report a read to the innermost recorder, if any.
///
/// `dependency` is only evaluated when a recorder is listening.
pub fn report_read(dependency: impl FnOnce() -> Dependency) {
    let top = RECORDERS.with(|stack| stack.borrow().last().cloned());
    if let Some(recorder) = top {
        recorder(&dependency());
    }
}

/// Whether a recorder is currently listening on this thread.
#[must_use]
pub fn is_recording() -> bool {
    depth() > 0
}

/// Number of nested recording scopes on this thread.
#[must_use]
pub fn depth() -> usize {
    RECORDERS.with(|stack| stack.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Probe {
        id: CellId,
    }

    impl Trackable for Probe {
        fn cell_id(&self) -> CellId {
            self.id
        }

        fn subscribe_change(self: Rc<Self>, _on_change: Rc<dyn Fn()>) -> Subscription {
            Subscription::inert()
        }
    }

    fn probe() -> Dependency {
        Dependency::new(Rc::new(Probe { id: CellId::next() }))
    }

    #[test]
    fn reads_outside_scope_are_ignored() {
        assert!(!is_recording());
        report_read(|| panic!("must not build a dependency without a recorder"));
    }

    #[test]
    fn collect_deduplicates_in_first_read_order() {
        let a = probe();
        let b = probe();
        let ((), deps) = collect(|| {
            report_read(|| b.clone());
            report_read(|| a.clone());
            report_read(|| b.clone());
        });
        let ids: Vec<_> = deps.iter().map(Dependency::id).collect();
        assert_eq!(ids, vec![b.id(), a.id()]);
    }

    #[test]
    fn only_top_recorder_is_notified() {
        let outer_hits = Rc::new(Cell::new(0));
        let hits = Rc::clone(&outer_hits);
        let dep = probe();
        with_recorder(
            move |_| hits.set(hits.get() + 1),
            || {
                assert_eq!(depth(), 1);
                let ((), inner) = collect(|| report_read(|| dep.clone()));
                assert_eq!(inner.len(), 1);
            },
        );
        assert_eq!(outer_hits.get(), 0);
    }

    #[test]
    fn untracked_hides_reads() {
        let dep = probe();
        let ((), deps) = collect(|| untracked(|| report_read(|| dep.clone())));
        assert!(deps.is_empty());
    }

    #[test]
    fn stack_is_restored_after_panic() {
        let result = std::panic::catch_unwind(|| {
            with_recorder(|_| {}, || panic!("boom"));
        });
        assert!(result.is_err());
        assert_eq!(depth(), 0);
    }

    #[test]
    fn cell_ids_are_unique() {
        assert_ne!(CellId::next(), CellId::next());
        assert!(CellId::next().to_string().starts_with("cell#"));
    }
}
