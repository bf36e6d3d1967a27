#![forbid(unsafe_code)]

//! Reactive values with automatic dependency discovery.
//!
//! This crate provides the change-tracking primitives that drive UI updates
//! without a diffing pass:
//!
//! - [`BoundValue`]: a shared, readable/writable cell that notifies its
//!   subscribers when its content changes.
//! - [`Computable`]: a value derived from other cells. Dependencies are
//!   discovered automatically by recording which cells are read while the
//!   compute function runs.
//! - [`Subscription`]: RAII guard that unsubscribes on drop.
//! - [`SubscriberSet`]: the per-cell subscriber registry and its
//!   re-entrancy-safe notification pass.
//! - [`tracking`]: the thread-local dependency-discovery stack.
//!
//! # Architecture
//!
//! Every cell is an `Rc` handle around shared interior state, so cloning a
//! cell clones the handle, not the value. The whole engine is single-threaded
//! and synchronous: `write` → `notify` → handlers → (possibly) more `write`
//! calls all run on one call stack. "Concurrent" access means re-entrant
//! access, which the notification algorithm is built to tolerate.
//!
//! A [`Computable`] is *cold* while nobody subscribes to it: it holds no cache
//! and no upstream subscriptions, and every read recomputes. The first
//! subscriber warms it up (tracked recomputation, upstream subscriptions,
//! cached value); the last unsubscribe cools it down again and releases every
//! upstream subscription.
//!
//! # Invariants
//!
//! 1. Writing a value that cannot differ from the current one (see
//!    [`Content`]) is a no-op.
//! 2. Subscribers are notified in subscription order; a subscriber added
//!    during a pass is not invoked by that pass, a subscriber removed during a
//!    pass is skipped for the rest of it.
//! 3. A subscriber is never handed two values in a row that cannot differ.
//! 4. Dependency discovery is not transitive: reading a [`Computable`] inside
//!    a recording scope registers the computable, never its own inputs.
//! 5. A cold [`Computable`] owns no upstream subscriptions.
//!
//! # Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use boundable_core::{BoundValue, Computable};
//!
//! let width = BoundValue::new(3);
//! let height = BoundValue::new(4);
//! let area = Computable::new({
//!     let (w, h) = (width.clone(), height.clone());
//!     move || w.read() * h.read()
//! });
//!
//! let seen = Rc::new(Cell::new(0));
//! let sink = Rc::clone(&seen);
//! let _sub = area.subscribe(move |v| sink.set(*v));
//!
//! width.write(5);
//! assert_eq!(seen.get(), 20);
//! ```

pub mod bound;
pub mod computable;
pub mod content;
pub mod registry;
pub mod subscription;
pub mod tracking;
pub mod value;

pub use bound::{Boundable, MaybeBound};
pub use computable::Computable;
pub use content::Content;
pub use registry::{SubscriberId, SubscriberSet};
pub use subscription::Subscription;
pub use tracking::{CellId, Dependency};
pub use value::BoundValue;
