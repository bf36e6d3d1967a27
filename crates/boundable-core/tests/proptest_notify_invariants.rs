//! Property-based invariant tests for notification and computable lifecycles.
//!
//! 1. A subscriber never receives two values in a row that cannot differ.
//! 2. After every write, each subscriber's last observed value is the cell's.
//! 3. A clamping subscriber shields every later subscriber from unclamped
//!    values, and the pass converges on the clamped value.
//! 4. A warm computable always agrees with a cold recomputation.
//! 5. Warm ⇔ subscribed, and upstream subscriptions exist only while warm.

use std::cell::RefCell;
use std::rc::Rc;

use boundable_core::{BoundValue, Computable, Subscription};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    WriteA(u8),
    WriteB(u8),
    Subscribe,
    Unsubscribe,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => any::<u8>().prop_map(Op::WriteA),
        3 => any::<u8>().prop_map(Op::WriteB),
        1 => Just(Op::Subscribe),
        1 => Just(Op::Unsubscribe),
    ]
}

fn derive(a: u8, b: u8) -> u16 {
    u16::from(a.max(b)) + u16::from(a % 4)
}

// ═════════════════════════════════════════════════════════════════════════
// 1 + 2. Delivery is change-only and settles on the current value
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn deliveries_are_changes_and_settle(
        initial in 0u8..8,
        writes in proptest::collection::vec(0u8..8, 0..64),
        subscribers in 1usize..5,
    ) {
        let cell = BoundValue::new(initial);
        let logs: Vec<Rc<RefCell<Vec<u8>>>> =
            (0..subscribers).map(|_| Rc::new(RefCell::new(Vec::new()))).collect();
        let _subs: Vec<Subscription> = logs
            .iter()
            .map(|log| {
                let log = Rc::clone(log);
                cell.subscribe(move |v| log.borrow_mut().push(*v))
            })
            .collect();

        for value in writes {
            cell.write(value);
            for log in &logs {
                let log = log.borrow();
                let last = log.last().copied().unwrap_or(initial);
                prop_assert_eq!(last, cell.peek());
            }
        }

        for log in &logs {
            let log = log.borrow();
            let mut previous = initial;
            for &v in log.iter() {
                prop_assert_ne!(v, previous, "duplicate delivery in {:?}", log);
                previous = v;
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Re-entrant clamp converges
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn clamping_subscriber_shields_later_ones(
        limit in 1u8..200,
        writes in proptest::collection::vec(any::<u8>(), 1..32),
        later in 1usize..4,
    ) {
        let cell = BoundValue::new(0u8);
        let _clamp = cell.subscribe({
            let cell = cell.clone();
            move |v| {
                if *v > limit {
                    cell.write(limit);
                }
            }
        });
        let logs: Vec<Rc<RefCell<Vec<u8>>>> =
            (0..later).map(|_| Rc::new(RefCell::new(Vec::new()))).collect();
        let _subs: Vec<Subscription> = logs
            .iter()
            .map(|log| {
                let log = Rc::clone(log);
                cell.subscribe(move |v| log.borrow_mut().push(*v))
            })
            .collect();

        for value in writes {
            cell.write(value);
            prop_assert!(cell.peek() <= limit);
        }
        for log in &logs {
            prop_assert!(log.borrow().iter().all(|v| *v <= limit));
            prop_assert_eq!(log.borrow().last().copied().unwrap_or(0), cell.peek());
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4 + 5. Computable lifecycle under arbitrary op sequences
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn computable_lifecycle_invariants(ops in proptest::collection::vec(op_strategy(), 0..96)) {
        let a = BoundValue::new(0u8);
        let b = BoundValue::new(0u8);
        let derived = Computable::new({
            let (a, b) = (a.clone(), b.clone());
            move || derive(a.read(), b.read())
        });
        let observed = Rc::new(RefCell::new(Vec::new()));
        let mut subs: Vec<Subscription> = Vec::new();

        for op in ops {
            match op {
                Op::WriteA(v) => a.write(v),
                Op::WriteB(v) => b.write(v),
                Op::Subscribe => {
                    let observed = Rc::clone(&observed);
                    subs.push(derived.subscribe(move |v| observed.borrow_mut().push(*v)));
                }
                Op::Unsubscribe => {
                    subs.pop();
                    if subs.is_empty() {
                        observed.borrow_mut().clear();
                    }
                }
            }

            let expected = derive(a.peek(), b.peek());
            prop_assert_eq!(derived.read(), expected);
            prop_assert_eq!(derived.peek(), expected);

            let warm = !subs.is_empty();
            prop_assert_eq!(derived.is_warm(), warm);
            prop_assert_eq!(derived.subscriber_count(), subs.len());
            prop_assert_eq!(a.subscriber_count(), usize::from(warm));
            prop_assert_eq!(b.subscriber_count(), usize::from(warm));
            if warm {
                prop_assert_eq!(observed.borrow().last().copied().unwrap_or(expected), expected);
            }
        }
    }
}
