// Bucket integration test suite.
//
// Each test documents what behavior is being verified and which
// invariants are assumed or asserted. The core invariants exercised:
// - Occupancy: a slot holds at most one value; insert only fills empty slots.
// - Count: len changes exactly once per empty/occupied transition.
// - In-place replacement: exchange/set/update never move a value to
//   another index.
// - Null round-trip: a stored `None` reads back as occupied.
use slot_bucket::{Bucket, CopyError, UpdateOutcome};
use std::sync::Arc;

// Test: full-capacity fill, reject, and drain.
// Assumes: capacity 64 spans two storage segments.
// Verifies: every insert succeeds once, duplicates fail, removal yields the
// original values and leaves len at zero.
#[test]
fn fill_reject_drain_64() {
    let b: Bucket<i32> = Bucket::with_capacity(64);
    for i in 0..64 {
        assert!(b.insert(i, i as i32), "insert {i}");
    }
    assert_eq!(b.len(), 64);
    assert!(!b.insert(0, 999));
    assert_eq!(b.try_get(0), Some(0));

    for i in 0..64 {
        assert_eq!(b.take_at(i), Some(i as i32));
    }
    assert_eq!(b.len(), 0);
    assert!(b.is_empty());
}

// Test: insert then read back.
// Verifies: try_get returns exactly what insert stored.
#[test]
fn insert_then_try_get() {
    let b: Bucket<String> = Bucket::with_capacity(16);
    for i in (0..16).step_by(3) {
        let v = format!("v{i}");
        assert!(b.insert(i, v.clone()));
        assert_eq!(b.try_get(i), Some(v));
    }
    assert_eq!(b.try_get(1), None);
}

// Test: exchange over an occupied slot.
// Verifies: previous value returned, new value stored, len unchanged.
#[test]
fn exchange_over_occupied() {
    let b: Bucket<&'static str> = Bucket::with_capacity(4);
    assert!(b.insert(2, "v1"));
    assert_eq!(b.exchange(2, "v2"), Ok(Some("v1")));
    assert_eq!(b.try_get(2), Some("v2"));
    assert_eq!(b.len(), 1);
}

// Test: removal bookkeeping.
// Verifies: after a successful remove the slot reads empty and len dropped by
// exactly one.
#[test]
fn remove_decrements_once() {
    let b: Bucket<u64> = Bucket::with_capacity(8);
    for i in 0..8 {
        b.insert(i, i as u64);
    }
    let before = b.len();
    assert!(b.remove_at(5));
    assert_eq!(b.try_get(5), None);
    assert_eq!(b.len(), before - 1);
    assert!(!b.remove_at(5));
    assert_eq!(b.len(), before - 1);
}

// Test: default-valued round trip.
// Assumes: `Option::None` and `0` are ordinary stored values.
// Verifies: insert/exchange/set of the default value all read back occupied.
#[test]
fn default_values_round_trip() {
    let b: Bucket<Option<Arc<str>>> = Bucket::with_capacity(3);
    assert!(b.insert(0, None));
    assert_eq!(b.exchange(1, None), Ok(None));
    assert!(b.set(2, None));
    for i in 0..3 {
        assert_eq!(b.try_get(i), Some(None), "slot {i}");
        assert!(b.contains_index(i));
    }
    assert_eq!(b.len(), 3);

    let zeros: Bucket<i32> = Bucket::with_capacity(1);
    assert!(zeros.insert(0, 0));
    assert_eq!(zeros.try_get(0), Some(0));
    assert_eq!(zeros.len(), 1);
}

// Test: update on empty and on rejected slots.
// Verifies: empty slot reports Empty; failing predicate reports Declined and
// leaves the value untouched.
#[test]
fn update_empty_and_declined() {
    let b: Bucket<i32> = Bucket::with_capacity(2);
    let outcome = b.update(0, |v| v * 2, |_| true);
    assert_eq!(outcome, UpdateOutcome::Empty);
    assert!(!outcome.is_updated());

    b.insert(1, 21);
    let outcome = b.update(1, |v| v * 2, |v| *v > 100);
    assert_eq!(outcome, UpdateOutcome::Declined);
    assert!(!outcome.is_empty());
    assert_eq!(b.try_get(1), Some(21));

    assert_eq!(b.update(1, |v| v * 2, |_| true), UpdateOutcome::Updated);
    assert_eq!(b.try_get(1), Some(42));
}

// Test: filtering iterators over a sparse bucket.
// Verifies: value and index filters both preserve index order.
#[test]
fn filtered_iteration() {
    let b: Bucket<u32> = (0..200u32).collect();
    for i in (0..200).filter(|i| i % 7 != 0) {
        b.remove_at(i);
    }
    let kept: Vec<u32> = b.iter().collect();
    assert_eq!(kept, (0..200).filter(|i| i % 7 == 0).collect::<Vec<_>>());

    let big: Vec<u32> = b.iter_where(|v| *v >= 150).collect();
    assert_eq!(big, vec![154, 161, 168, 175, 182, 189, 196]);

    let low_index: Vec<u32> = b.iter_where_index(|i| i < 30).collect();
    assert_eq!(low_index, vec![0, 7, 14, 21, 28]);

    // Restartable: a fresh iterator sees the same contents.
    assert_eq!(b.iter().count(), kept.len());
}

// Test: copy_to contract.
// Verifies: room is checked against len; values land in index order after
// the offset; errors carry the sizes involved.
#[test]
fn copy_to_contract() {
    let b: Bucket<char> = Bucket::with_capacity(10);
    b.insert(9, 'c');
    b.insert(0, 'a');
    b.insert(4, 'b');

    let mut dest = ['-'; 5];
    assert_eq!(b.copy_to(&mut dest, 2), Ok(3));
    assert_eq!(dest, ['-', '-', 'a', 'b', 'c']);

    let err = b.copy_to(&mut dest, 3).unwrap_err();
    assert_eq!(
        err,
        CopyError::InsufficientSpace {
            needed: 3,
            available: 2
        }
    );
    assert!(err.to_string().contains("holds 3"));
    assert!(matches!(
        b.copy_to(&mut dest, 6),
        Err(CopyError::OffsetOutOfRange { offset: 6, len: 5 })
    ));
}

// Test: zero-capacity bucket.
// Verifies: every operation is a harmless no-op.
#[test]
fn zero_capacity() {
    let b: Bucket<i32> = Bucket::with_capacity(0);
    assert_eq!(b.capacity(), 0);
    assert!(!b.insert(0, 1));
    assert!(!b.set(0, 1));
    assert_eq!(b.exchange(0, 1), Err(1));
    assert_eq!(b.get_or_insert(0, 1), None);
    assert_eq!(b.iter().next(), None);
    let mut dest: [i32; 0] = [];
    assert_eq!(b.copy_to(&mut dest, 0), Ok(0));
    assert!(b.is_empty());
}
