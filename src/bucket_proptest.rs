#![cfg(test)]

// Property tests for Bucket kept inside the crate next to the slot core.

use crate::bucket::{Bucket, UpdateOutcome};
use proptest::prelude::*;

// Values are `Option<i32>` so that a stored `None` must stay distinct from
// an empty slot throughout.
type Value = Option<i32>;

#[derive(Clone, Debug)]
enum Op {
    Insert(usize, Value),
    TryInsert(usize, Value),
    GetOrInsert(usize, Value),
    Exchange(usize, Value),
    Set(usize, Value),
    RemoveAt(usize),
    TakeAt(usize),
    RemoveAtIf(usize, i32),
    Update(usize, i32, i32),
    TryGet(usize),
    Iterate,
    Clear,
}

fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![1 => Just(None), 4 => (-50i32..50).prop_map(Some)]
}

// Capacities straddle a segment boundary; indices run slightly past the
// capacity to exercise the out-of-range path.
fn arb_scenario() -> impl Strategy<Value = (usize, Vec<Op>)> {
    (1usize..=40).prop_flat_map(|cap| {
        let idx = 0..cap + 2;
        let fill = prop_oneof![
            (idx.clone(), arb_value()).prop_map(|(i, v)| Op::Insert(i, v)),
            (idx.clone(), arb_value()).prop_map(|(i, v)| Op::TryInsert(i, v)),
            (idx.clone(), arb_value()).prop_map(|(i, v)| Op::GetOrInsert(i, v)),
            (idx.clone(), arb_value()).prop_map(|(i, v)| Op::Exchange(i, v)),
            (idx.clone(), arb_value()).prop_map(|(i, v)| Op::Set(i, v)),
        ];
        let other = prop_oneof![
            idx.clone().prop_map(Op::RemoveAt),
            idx.clone().prop_map(Op::TakeAt),
            (idx.clone(), -50i32..50).prop_map(|(i, t)| Op::RemoveAtIf(i, t)),
            (idx.clone(), -50i32..50, -5i32..5).prop_map(|(i, t, d)| Op::Update(i, t, d)),
            idx.clone().prop_map(Op::TryGet),
            Just(Op::Iterate),
            Just(Op::Clear),
        ];
        let op = prop_oneof![fill, other];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (cap, ops))
    })
}

// Conditional ops key off a threshold; `None` never passes.
fn passes(v: &Value, threshold: i32) -> bool {
    v.is_some_and(|x| x >= threshold)
}

// Property: single-threaded equivalence against a `Vec<Option<Value>>` model.
// Invariants exercised across random operation sequences:
// - insert/try_insert/get_or_insert only fill empty slots.
// - exchange/set replace in place and report the prior occupant.
// - remove/take/remove_at_if empty a slot exactly once.
// - update reports Empty/Declined/Updated in line with the model.
// - iteration yields occupied slots in index order.
// - `len` equals the number of occupied model slots after every op.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((cap, ops) in arb_scenario()) {
        let sut: Bucket<Value> = Bucket::with_capacity(cap);
        let mut model: Vec<Option<Value>> = vec![None; cap];

        for op in ops {
            match op {
                Op::Insert(i, v) => {
                    let expect = i < cap && model[i].is_none();
                    prop_assert_eq!(sut.insert(i, v), expect);
                    if expect { model[i] = Some(v); }
                }
                Op::TryInsert(i, v) => {
                    let res = sut.try_insert(i, v);
                    if i >= cap {
                        prop_assert_eq!(res, Err(None));
                    } else if let Some(existing) = model[i] {
                        prop_assert_eq!(res, Err(Some(existing)));
                    } else {
                        prop_assert_eq!(res, Ok(()));
                        model[i] = Some(v);
                    }
                }
                Op::GetOrInsert(i, v) => {
                    let got = sut.get_or_insert(i, v);
                    if i >= cap {
                        prop_assert_eq!(got, None);
                    } else {
                        let stored = *model[i].get_or_insert(v);
                        prop_assert_eq!(got, Some(stored));
                    }
                }
                Op::Exchange(i, v) => {
                    let prev = sut.exchange(i, v);
                    if i >= cap {
                        prop_assert_eq!(prev, Err(v));
                    } else {
                        prop_assert_eq!(prev, Ok(model[i].replace(v)));
                    }
                }
                Op::Set(i, v) => {
                    let is_new = sut.set(i, v);
                    if i >= cap {
                        prop_assert!(!is_new);
                    } else {
                        prop_assert_eq!(is_new, model[i].replace(v).is_none());
                    }
                }
                Op::RemoveAt(i) => {
                    let expect = i < cap && model[i].take().is_some();
                    prop_assert_eq!(sut.remove_at(i), expect);
                }
                Op::TakeAt(i) => {
                    let expect = if i < cap { model[i].take() } else { None };
                    prop_assert_eq!(sut.take_at(i), expect);
                }
                Op::RemoveAtIf(i, t) => {
                    let expect = i < cap && model[i].as_ref().is_some_and(|v| passes(v, t));
                    prop_assert_eq!(sut.remove_at_if(i, |v| passes(v, t)), expect);
                    if expect { model[i] = None; }
                }
                Op::Update(i, t, d) => {
                    let outcome = sut.update(i, |v| v.map(|x| x + d), |v| passes(v, t));
                    let current = if i < cap { model[i] } else { None };
                    match current {
                        None => prop_assert_eq!(outcome, UpdateOutcome::Empty),
                        Some(v) if passes(&v, t) => {
                            prop_assert_eq!(outcome, UpdateOutcome::Updated);
                            model[i] = Some(v.map(|x| x + d));
                        }
                        Some(_) => prop_assert_eq!(outcome, UpdateOutcome::Declined),
                    }
                }
                Op::TryGet(i) => {
                    let expect = if i < cap { model[i] } else { None };
                    prop_assert_eq!(sut.try_get(i), expect);
                    prop_assert_eq!(sut.contains_index(i), expect.is_some());
                }
                Op::Iterate => {
                    let got: Vec<(usize, Value)> = sut.iter_indexed().collect();
                    let want: Vec<(usize, Value)> = model
                        .iter()
                        .enumerate()
                        .filter_map(|(i, v)| v.map(|v| (i, v)))
                        .collect();
                    prop_assert_eq!(got, want);
                }
                Op::Clear => {
                    sut.clear();
                    model.iter_mut().for_each(|v| *v = None);
                }
            }

            let occupied = model.iter().filter(|v| v.is_some()).count();
            prop_assert_eq!(sut.len(), occupied);
            prop_assert_eq!(sut.is_empty(), occupied == 0);
        }
    }
}
