#![forbid(unsafe_code)]

//! Boundable public facade crate.
//!
//! Re-exports the reactive core and, with the default `dom` feature, the
//! host-tree bindings.

pub use boundable_core as core;
#[cfg(feature = "dom")]
pub use boundable_dom as dom;

pub use boundable_core::{content_always_differs, content_by_eq};

pub mod prelude {
    pub use boundable_core::{
        Boundable, BoundValue, Computable, Content, MaybeBound, Subscription, tracking,
    };
    #[cfg(feature = "dom")]
    pub use boundable_dom::{
        HostNode, NodeBoundWatcher, NodePresenceWatcher, NodeTree, TreeNode, WatchHandle,
        WatcherOptions,
    };
}
