#![forbid(unsafe_code)]

//! The content-can-differ rule.
//!
//! A cell cannot assume that values reachable through it are immutable: a
//! structured value may have been mutated in place and still look "equal" to
//! what the cell holds. [`Content::can_differ`] therefore answers a weaker
//! question than `PartialEq`: *could* replacing `self` with `next` change what
//! an observer sees?
//!
//! - Primitive, immutable values compare with `!=`.
//! - Structured values always report `true`. This is the default method, so
//!   `impl Content for MyPlan {}` opts a type into the structured rule.
//! - `None` is a primitive: `None` against `None` cannot differ.
//!
//! Use [`content_by_eq!`](crate::content_by_eq) for your own immutable
//! `PartialEq` types (plain enums, ids) and
//! [`content_always_differs!`](crate::content_always_differs) to spell out the
//! structured rule for several types at once.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::Rc;

/// A value that can live inside a reactive cell.
pub trait Content: Clone + 'static {
    /// Whether replacing `self` with `next` may change observable content.
    ///
    /// Must return `true` whenever `self` and `next` are not provably the same
    /// immutable value.
    fn can_differ(&self, next: &Self) -> bool {
        let _ = next;
        true
    }
}

/// Implement [`Content`] for immutable `PartialEq` types using `!=`.
#[macro_export]
macro_rules! content_by_eq {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::Content for $ty {
                #[inline]
                fn can_differ(&self, next: &Self) -> bool {
                    self != next
                }
            }
        )+
    };
}

/// Implement [`Content`] with the structured rule (always differs).
#[macro_export]
macro_rules! content_always_differs {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::Content for $ty {}
        )+
    };
}

content_by_eq!(
    u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64, bool, char, (),
    String, &'static str, Rc<str>,
);

impl<T: Content> Content for Option<T> {
    fn can_differ(&self, next: &Self) -> bool {
        match (self, next) {
            (None, None) => false,
            (Some(prev), Some(next)) => prev.can_differ(next),
            _ => true,
        }
    }
}

impl<T: Content, E: Content> Content for Result<T, E> {
    fn can_differ(&self, next: &Self) -> bool {
        match (self, next) {
            (Ok(prev), Ok(next)) => prev.can_differ(next),
            (Err(prev), Err(next)) => prev.can_differ(next),
            _ => true,
        }
    }
}

impl<T: Clone + 'static> Content for Vec<T> {}
impl<T: Clone + 'static> Content for VecDeque<T> {}
impl<T: Clone + 'static> Content for Box<T> {}
impl<K: Clone + 'static, V: Clone + 'static, S: Clone + 'static> Content for HashMap<K, V, S> {}
impl<K: Clone + 'static, V: Clone + 'static> Content for BTreeMap<K, V> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Mode {
        View,
        Edit,
    }
    content_by_eq!(Mode);

    #[derive(Debug, Clone, PartialEq)]
    struct Floor {
        label: String,
    }
    content_always_differs!(Floor);

    #[test]
    fn primitives_compare_by_value() {
        assert!(!5.can_differ(&5));
        assert!(5.can_differ(&6));
        assert!(!"a".can_differ(&"a"));
        assert!(!String::from("x").can_differ(&String::from("x")));
        assert!(!().can_differ(&()));
    }

    #[test]
    fn nan_always_differs() {
        assert!(f64::NAN.can_differ(&f64::NAN));
    }

    #[test]
    fn structured_values_always_differ() {
        let floor = Floor {
            label: "ground".into(),
        };
        assert!(floor.can_differ(&floor.clone()));
        assert!(vec![1, 2].can_differ(&vec![1, 2]));
        let empty: HashMap<u8, u8> = HashMap::new();
        assert!(empty.can_differ(&HashMap::new()));
    }

    #[test]
    fn none_is_primitive() {
        let none: Option<Vec<u8>> = None;
        assert!(!none.can_differ(&None));
        assert!(none.can_differ(&Some(vec![])));
        assert!(Some(vec![1]).can_differ(&Some(vec![1])));
        assert!(!Some(3).can_differ(&Some(3)));
    }

    #[test]
    fn results_delegate_per_variant() {
        let ok: Result<u8, String> = Ok(1);
        assert!(!ok.can_differ(&Ok(1)));
        assert!(ok.can_differ(&Err("boom".into())));
        let err: Result<u8, String> = Err("boom".into());
        assert!(!err.can_differ(&Err("boom".into())));
    }

    #[test]
    fn user_enums_opt_into_equality() {
        assert!(!Mode::Edit.can_differ(&Mode::Edit));
        assert!(Mode::Edit.can_differ(&Mode::View));
    }
}
