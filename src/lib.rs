//! slot-bucket: a fixed-capacity, lock-free store of atomically replaceable
//! slots, addressed by integer index.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: give concurrent sets, queues and dictionaries a slot store where
//!   every mutation is one atomic instruction on one slot, so callers can map
//!   their own keys onto indices and never take a lock.
//! - Layers:
//!   - BucketCore<T>: segmented storage. Resolves an index to an atomic
//!     cell, allocates segments lazily, and runs caller-supplied mutators
//!     against a cell (`do_with`, `do_may_increment`, `do_may_decrement`).
//!   - Bucket<T>: public API. Expresses insert, exchange, set, remove,
//!     conditional remove and update as single CAS/swap mutators, and keeps
//!     the occupied-slot count.
//!
//! Slot representation
//! - A cell is a `crossbeam_epoch::Atomic<T>`: null is `Empty`, non-null is
//!   `Occupied(T)`. Because `T` itself may be `Option<U>`, storing `None` is
//!   still an occupied slot.
//! - Replaced and removed values are retired with `defer_destroy`, so a
//!   reader pinned before the swap can still clone what it loaded.
//! - Conditional operations compare against the exact pointer they read.
//!   Retirement through the epoch rules out ABA on that pointer while the
//!   operation is pinned.
//!
//! Progress
//! - `insert`, `try_insert`, `exchange`, `set`, `remove_at`, `take_at` and
//!   `try_get` are wait-free: a bounded number of atomic steps.
//! - `remove_at_if` and `update` make exactly one CAS attempt and report
//!   losing a race instead of retrying. A caller that needs the operation to
//!   take effect loops around it.
//! - Iteration is live, not a snapshot: each slot is read when the cursor
//!   reaches it.
//!
//! Counting
//! - The count changes only on empty/occupied transitions and only by the
//!   thread whose atomic instruction made the transition. While mutations
//!   are in flight `len()` may lag; at quiescence it is exact.
//!
//! Notes and non-goals
//! - Fixed capacity; growth policies belong to the collections built on top.
//! - No multi-slot transactions: invariants spanning several indices are the
//!   caller's to coordinate.
//! - Segments are kept until the bucket is dropped. Dropping the bucket frees
//!   segment storage and every value still stored, deterministically.

pub mod bucket;
#[cfg(feature = "bench_internal")]
pub mod bucket_core;
#[cfg(not(feature = "bench_internal"))]
mod bucket_core;
mod bucket_proptest;
mod error;
pub mod iter;

// Public surface
pub use bucket::{Bucket, UpdateOutcome, DEFAULT_CAPACITY};
pub use error::CopyError;
