#![forbid(unsafe_code)]

//! In-memory host tree with batched presence notifications.
//!
//! # Design
//!
//! [`NodeTree`] owns a permanently attached root. A node is *attached* when
//! its topmost ancestor is that root. Structural operations go through the
//! tree so that every mutation touching the attached part of the tree queues
//! a mutation record holding a snapshot of the affected subtree.
//!
//! Every listener carries a *baseline*: the attach state of its node when
//! the listener was registered, refreshed at each flush the listener
//! survives. [`NodeTree::flush`] delivers queued records as one batch, the
//! way a mutation observer delivers a microtask's worth of records. For each
//! recorded node it compares the attach state *now* with each listener's
//! baseline:
//!
//! 1. removal callbacks fire when the baseline is attached and the node is
//!    detached now;
//! 2. insertion callbacks fire when the baseline is detached and the node is
//!    attached now.
//!
//! A same-batch insert then remove (or remove then insert) of one node ends
//! where it started relative to the baseline, so neither fires. Snapshotting
//! the subtree at mutation time makes sure a node that is moved again before
//! the flush is still considered.
//!
//! Callbacks may mutate the tree. Records they queue are delivered by further
//! rounds of the same `flush`; a `flush` called from inside a callback
//! returns immediately.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::{AHashMap, AHashSet};

use crate::error::{Result, TreeError};
use crate::presence::{HostNode, NodePresenceWatcher, PresenceCallback, PresenceHandle};

// ─── Node ID generation ──────────────────────────────────────────────────────

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a host node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value, for logs.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

// ─── Nodes ───────────────────────────────────────────────────────────────────

struct NodeData {
    id: NodeId,
    tag: String,
    parent: RefCell<Weak<NodeData>>,
    children: RefCell<Vec<TreeNode>>,
    displayed: Cell<bool>,
}

/// Shared handle to a host node.
///
/// Cloning the handle does not clone the node. Equality is identity.
#[derive(Clone)]
pub struct TreeNode {
    data: Rc<NodeData>,
}

impl TreeNode {
    /// Create a detached node.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            data: Rc::new(NodeData {
                id: NodeId::next(),
                tag: tag.into(),
                parent: RefCell::new(Weak::new()),
                children: RefCell::new(Vec::new()),
                displayed: Cell::new(true),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> NodeId {
        self.data.id
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.data.tag
    }

    #[must_use]
    pub fn parent(&self) -> Option<TreeNode> {
        self.data
            .parent
            .borrow()
            .upgrade()
            .map(|data| TreeNode { data })
    }

    #[must_use]
    pub fn children(&self) -> Vec<TreeNode> {
        self.data.children.borrow().clone()
    }

    #[must_use]
    pub fn child_count(&self) -> usize {
        self.data.children.borrow().len()
    }

    /// Whether the display-suppression policy currently shows this node.
    #[must_use]
    pub fn is_displayed(&self) -> bool {
        self.data.displayed.get()
    }

    /// Whether `other` is this node or one of its descendants.
    #[must_use]
    pub fn contains(&self, other: &TreeNode) -> bool {
        let mut cursor = Some(other.clone());
        while let Some(node) = cursor {
            if node == *self {
                return true;
            }
            cursor = node.parent();
        }
        false
    }

    /// Topmost ancestor (the node itself when it has no parent).
    #[must_use]
    pub fn top(&self) -> TreeNode {
        let mut node = self.clone();
        while let Some(parent) = node.parent() {
            node = parent;
        }
        node
    }

    /// This node and all of its descendants, in pre-order.
    #[must_use]
    pub fn subtree(&self) -> Vec<TreeNode> {
        let mut out = Vec::new();
        let mut stack = vec![self.clone()];
        while let Some(node) = stack.pop() {
            stack.extend(node.children().into_iter().rev());
            out.push(node);
        }
        out
    }

    fn index_in_parent(&self, parent: &TreeNode) -> Option<usize> {
        parent
            .data
            .children
            .borrow()
            .iter()
            .position(|child| child == self)
    }
}

impl PartialEq for TreeNode {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}

impl Eq for TreeNode {}

impl fmt::Debug for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeNode")
            .field("id", &self.data.id)
            .field("tag", &self.data.tag)
            .field("children", &self.child_count())
            .field("displayed", &self.is_displayed())
            .finish()
    }
}

impl HostNode for TreeNode {
    fn set_displayed(&self, displayed: bool) {
        self.data.displayed.set(displayed);
    }
}

// ─── Mutation records ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Inserted,
    Removed,
}

impl Transition {
    /// Whether going from `baseline` to `now` completes this transition.
    fn completed(self, baseline: bool, now: bool) -> bool {
        match self {
            Self::Inserted => !baseline && now,
            Self::Removed => baseline && !now,
        }
    }
}

struct MutationRecord {
    nodes: Vec<TreeNode>,
}

struct Listener {
    token: u64,
    /// Attach state of the node as of registration or the last flush.
    baseline: bool,
    callback: PresenceCallback,
}

type ListenerTable = RefCell<AHashMap<NodeId, Vec<Listener>>>;

/// Outcome of one [`NodeTree::flush`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Batches processed, including those queued by callbacks.
    pub rounds: usize,
    /// Insertion callbacks invoked.
    pub inserted: usize,
    /// Removal callbacks invoked.
    pub removed: usize,
}

struct TreeInner {
    root: TreeNode,
    records: RefCell<Vec<MutationRecord>>,
    on_inserted: ListenerTable,
    on_removed: ListenerTable,
    next_token: Cell<u64>,
    flushing: Cell<bool>,
}

impl TreeInner {
    fn table(&self, transition: Transition) -> &ListenerTable {
        match transition {
            Transition::Inserted => &self.on_inserted,
            Transition::Removed => &self.on_removed,
        }
    }

    fn cancel(&self, transition: Transition, node: NodeId, token: u64) {
        let cancelled = {
            let mut table = self.table(transition).borrow_mut();
            let Some(listeners) = table.get_mut(&node) else {
                return;
            };
            let cancelled = listeners
                .iter()
                .position(|l| l.token == token)
                .map(|index| listeners.remove(index));
            if listeners.is_empty() {
                table.remove(&node);
            }
            cancelled
        };
        drop(cancelled);
    }

    /// Take the listeners on `node` whose transition completed, and move the
    /// baseline of the others to `now`.
    fn take_due(&self, transition: Transition, node: NodeId, now: bool) -> Vec<Listener> {
        let mut table = self.table(transition).borrow_mut();
        let Some(listeners) = table.remove(&node) else {
            return Vec::new();
        };
        let (due, mut kept): (Vec<Listener>, Vec<Listener>) = listeners
            .into_iter()
            .partition(|l| transition.completed(l.baseline, now));
        if !kept.is_empty() {
            for listener in &mut kept {
                listener.baseline = now;
            }
            table.insert(node, kept);
        }
        due
    }
}

struct FlushGuard<'a>(&'a Cell<bool>);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

// ─── Tree ────────────────────────────────────────────────────────────────────

/// A host tree with an always-attached root.
///
/// Cloning a `NodeTree` creates a new handle to the **same** tree.
#[derive(Clone)]
pub struct NodeTree {
    inner: Rc<TreeInner>,
}

impl Default for NodeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NodeTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeTree")
            .field("root", &self.inner.root)
            .field("pending_records", &self.pending_records())
            .finish()
    }
}

impl NodeTree {
    /// Create a tree containing only its root.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(TreeInner {
                root: TreeNode::new("root"),
                records: RefCell::new(Vec::new()),
                on_inserted: RefCell::new(AHashMap::new()),
                on_removed: RefCell::new(AHashMap::new()),
                next_token: Cell::new(0),
                flushing: Cell::new(false),
            }),
        }
    }

    #[must_use]
    pub fn root(&self) -> TreeNode {
        self.inner.root.clone()
    }

    /// Whether `node` hangs off this tree's root.
    #[must_use]
    pub fn is_attached(&self, node: &TreeNode) -> bool {
        node.top() == self.inner.root
    }

    /// Append `child` as the last child of `parent`, moving it if it already
    /// has a parent.
    pub fn append_child(&self, parent: &TreeNode, child: &TreeNode) -> Result<()> {
        let len = parent.child_count();
        let index = match child.parent() {
            Some(old) if old == *parent => len - 1,
            _ => len,
        };
        self.insert_child(parent, index, child)
    }

    /// Insert `child` at `index` among `parent`'s children, moving it if it
    /// already has a parent. `index` is interpreted after the move-out.
    pub fn insert_child(&self, parent: &TreeNode, index: usize, child: &TreeNode) -> Result<()> {
        if *child == self.inner.root {
            return Err(TreeError::RootImmovable);
        }
        if child.contains(parent) {
            return Err(TreeError::Cycle {
                parent: parent.id(),
                child: child.id(),
            });
        }
        let len = match child.parent() {
            Some(old) if old == *parent => parent.child_count() - 1,
            _ => parent.child_count(),
        };
        if index > len {
            return Err(TreeError::IndexOutOfBounds { index, len });
        }

        if child.parent().is_some() {
            self.detach(child);
        }
        parent
            .data
            .children
            .borrow_mut()
            .insert(index, child.clone());
        *child.data.parent.borrow_mut() = Rc::downgrade(&parent.data);

        if self.is_attached(parent) {
            self.record(Transition::Inserted, child);
        }
        Ok(())
    }

    /// Detach `node` (with its subtree) from its parent.
    pub fn remove(&self, node: &TreeNode) -> Result<()> {
        if *node == self.inner.root {
            return Err(TreeError::RootImmovable);
        }
        if node.parent().is_none() {
            return Err(TreeError::NoParent { node: node.id() });
        }
        self.detach(node);
        Ok(())
    }

    fn detach(&self, node: &TreeNode) {
        let Some(parent) = node.parent() else {
            return;
        };
        let was_attached = self.is_attached(node);
        if let Some(index) = node.index_in_parent(&parent) {
            parent.data.children.borrow_mut().remove(index);
        }
        *node.data.parent.borrow_mut() = Weak::new();
        if was_attached {
            self.record(Transition::Removed, node);
        }
    }

    fn record(&self, transition: Transition, node: &TreeNode) {
        tracing::trace!(
            target: "boundable::tree",
            node = %node.id(),
            ?transition,
            "mutation recorded"
        );
        self.inner.records.borrow_mut().push(MutationRecord {
            nodes: node.subtree(),
        });
    }

    /// Number of mutation records waiting for [`flush`](Self::flush).
    #[must_use]
    pub fn pending_records(&self) -> usize {
        self.inner.records.borrow().len()
    }

    /// Deliver every queued mutation record.
    pub fn flush(&self) -> FlushReport {
        let mut report = FlushReport::default();
        if self.inner.flushing.replace(true) {
            return report;
        }
        let _guard = FlushGuard(&self.inner.flushing);

        loop {
            let batch = std::mem::take(&mut *self.inner.records.borrow_mut());
            if batch.is_empty() {
                break;
            }
            report.rounds += 1;

            let mut seen = AHashSet::new();
            let candidates: Vec<TreeNode> = batch
                .into_iter()
                .flat_map(|record| record.nodes)
                .filter(|node| seen.insert(node.id()))
                .collect();

            for node in candidates {
                let (removed, inserted) = self.settle(&node);
                report.removed += removed;
                report.inserted += inserted;
            }
            tracing::debug!(
                target: "boundable::tree",
                round = report.rounds,
                inserted = report.inserted,
                removed = report.removed,
                "flush round"
            );
        }
        report
    }

    /// Fire the listeners on `node` whose transition completed since their
    /// baseline. Removals fire before insertions.
    fn settle(&self, node: &TreeNode) -> (usize, usize) {
        let now = self.is_attached(node);
        let id = node.id();
        let removed = self.inner.take_due(Transition::Removed, id, now);
        let inserted = self.inner.take_due(Transition::Inserted, id, now);
        let counts = (removed.len(), inserted.len());
        for listener in removed.into_iter().chain(inserted) {
            (listener.callback)();
        }
        counts
    }

    fn listen(
        &self,
        transition: Transition,
        node: &TreeNode,
        callback: PresenceCallback,
    ) -> PresenceHandle {
        let token = self.inner.next_token.get();
        self.inner.next_token.set(token + 1);
        let id = node.id();
        self.inner
            .table(transition)
            .borrow_mut()
            .entry(id)
            .or_default()
            .push(Listener {
                token,
                baseline: self.is_attached(node),
                callback,
            });

        let weak = Rc::downgrade(&self.inner);
        PresenceHandle::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.cancel(transition, id, token);
            }
        })
    }

    /// Number of callbacks waiting on `node`, across both transitions.
    #[must_use]
    pub fn listener_count(&self, node: &TreeNode) -> usize {
        let count = |table: &ListenerTable| table.borrow().get(&node.id()).map_or(0, Vec::len);
        count(&self.inner.on_inserted) + count(&self.inner.on_removed)
    }
}

impl NodePresenceWatcher for NodeTree {
    type Node = TreeNode;

    fn is_attached(&self, node: &TreeNode) -> bool {
        NodeTree::is_attached(self, node)
    }

    fn on_inserted(&self, node: &TreeNode, callback: PresenceCallback) -> PresenceHandle {
        self.listen(Transition::Inserted, node, callback)
    }

    fn on_removed(&self, node: &TreeNode, callback: PresenceCallback) -> PresenceHandle {
        self.listen(Transition::Removed, node, callback)
    }
}
