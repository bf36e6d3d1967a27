#![forbid(unsafe_code)]

//! Host-tree side of the reactive engine.
//!
//! - [`presence`]: the capability a host UI layer must provide to report when
//!   a node enters or leaves the live tree.
//! - [`tree`]: an in-memory host tree implementing that capability with
//!   batched mutation records.
//! - [`watcher`]: [`NodeBoundWatcher`], which keeps cell subscriptions alive
//!   only while its host node is attached.

pub mod error;
pub mod presence;
pub mod tree;
pub mod watcher;

pub use error::{Result, TreeError};
pub use presence::{HostNode, NodePresenceWatcher, PresenceCallback, PresenceHandle};
pub use tree::{FlushReport, NodeId, NodeTree, TreeNode};
pub use watcher::{NodeBoundWatcher, WatchHandle, WatcherOptions};
