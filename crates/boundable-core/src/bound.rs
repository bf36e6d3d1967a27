#![forbid(unsafe_code)]

//! The read side shared by every cell kind, and "maybe bound" inputs.
//!
//! UI code usually accepts either a live cell or a plain value for each
//! property ("disabled", "label", ...). [`MaybeBound`] carries that choice;
//! [`MaybeBound::get`] reads through it without caring which one it got.

use std::fmt;
use std::rc::Rc;

use crate::computable::Computable;
use crate::content::Content;
use crate::registry::Handler;
use crate::subscription::Subscription;
use crate::tracking::CellId;
use crate::value::BoundValue;

/// Object-safe read/subscribe interface of a reactive cell.
pub trait Boundable<T: Content> {
    /// Current value, reported to the innermost recording scope.
    fn read(&self) -> T;

    /// Current value, invisible to dependency discovery.
    fn peek(&self) -> T;

    /// Subscribe a shared handler; see the cell's own `subscribe`.
    fn subscribe_rc(&self, handler: Handler<T>) -> Subscription;

    /// Run a notification pass with the current value.
    fn notify(&self);

    /// Identity of the underlying cell.
    fn cell_id(&self) -> CellId;
}

/// Either a plain value or a live cell.
pub enum MaybeBound<T: Content> {
    /// A value that never changes.
    Plain(T),
    /// A cell to follow.
    Bound(Rc<dyn Boundable<T>>),
}

impl<T: Content> MaybeBound<T> {
    /// Wrap a plain value.
    pub fn plain(value: T) -> Self {
        Self::Plain(value)
    }

    /// Wrap any cell.
    pub fn bound(cell: impl Boundable<T> + 'static) -> Self {
        Self::Bound(Rc::new(cell))
    }

    /// Whether this is a live cell.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        matches!(self, Self::Bound(_))
    }

    /// Current value; reading a cell registers it as a dependency.
    #[must_use]
    pub fn get(&self) -> T {
        match self {
            Self::Plain(value) => value.clone(),
            Self::Bound(cell) => cell.read(),
        }
    }
}

impl<T: Content> Clone for MaybeBound<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Plain(value) => Self::Plain(value.clone()),
            Self::Bound(cell) => Self::Bound(Rc::clone(cell)),
        }
    }
}

impl<T: Content + fmt::Debug> fmt::Debug for MaybeBound<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(value) => f.debug_tuple("Plain").field(value).finish(),
            Self::Bound(cell) => f.debug_tuple("Bound").field(&cell.cell_id()).finish(),
        }
    }
}

impl<T: Content> From<BoundValue<T>> for MaybeBound<T> {
    fn from(cell: BoundValue<T>) -> Self {
        Self::bound(cell)
    }
}

impl<T: Content> From<&BoundValue<T>> for MaybeBound<T> {
    fn from(cell: &BoundValue<T>) -> Self {
        Self::bound(cell.clone())
    }
}

impl<T: Content> From<Computable<T>> for MaybeBound<T> {
    fn from(cell: Computable<T>) -> Self {
        Self::bound(cell)
    }
}

impl<T: Content> From<&Computable<T>> for MaybeBound<T> {
    fn from(cell: &Computable<T>) -> Self {
        Self::bound(cell.clone())
    }
}
