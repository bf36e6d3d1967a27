#![no_main]

use std::cell::Cell;
use std::rc::Rc;

use arbitrary::Arbitrary;
use boundable_core::BoundValue;
use boundable_dom::{NodeBoundWatcher, NodeTree, TreeNode, WatchHandle};
use libfuzzer_sys::fuzz_target;

const NODES: usize = 8;

#[derive(Arbitrary, Debug)]
enum TreeOp {
    Append { parent: u8, child: u8 },
    Insert { parent: u8, index: u8, child: u8 },
    Remove(u8),
    Write(u8),
    Flush,
}

/// `NODES` maps to the root.
fn pick(tree: &NodeTree, nodes: &[TreeNode], raw: u8) -> TreeNode {
    let index = usize::from(raw) % (NODES + 1);
    nodes.get(index).cloned().unwrap_or_else(|| tree.root())
}

fuzz_target!(|ops: Vec<TreeOp>| {
    let tree = NodeTree::new();
    let cell = BoundValue::new(0u8);
    let nodes: Vec<TreeNode> = (0..NODES).map(|i| TreeNode::new(format!("n{i}"))).collect();
    let last_seen: Vec<Rc<Cell<Option<u8>>>> = (0..NODES).map(|_| Rc::new(Cell::new(None))).collect();
    let mut handles: Vec<WatchHandle> = Vec::new();
    let watchers: Vec<_> = nodes
        .iter()
        .zip(&last_seen)
        .map(|(node, seen)| {
            let watcher = NodeBoundWatcher::new(tree.clone(), node.clone());
            let seen = Rc::clone(seen);
            handles.push(watcher.watch(&cell, move |v: &u8| seen.set(Some(*v))));
            watcher
        })
        .collect();

    for op in ops.into_iter().take(256) {
        match op {
            TreeOp::Append { parent, child } => {
                let _ = tree.append_child(&pick(&tree, &nodes, parent), &pick(&tree, &nodes, child));
            }
            TreeOp::Insert { parent, index, child } => {
                let _ = tree.insert_child(
                    &pick(&tree, &nodes, parent),
                    usize::from(index % 8),
                    &pick(&tree, &nodes, child),
                );
            }
            TreeOp::Remove(raw) => {
                let _ = tree.remove(&pick(&tree, &nodes, raw));
            }
            TreeOp::Write(v) => cell.write(v),
            TreeOp::Flush => {
                tree.flush();
                for (i, node) in nodes.iter().enumerate() {
                    let attached = tree.is_attached(node);
                    assert_eq!(watchers[i].is_attached(), attached);
                    if attached {
                        assert_eq!(last_seen[i].get(), Some(cell.peek()));
                    }
                }
            }
        }
    }
});
