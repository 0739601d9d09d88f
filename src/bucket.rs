//! Bucket: a fixed-capacity, lock-free store holding at most one value per index.

use crate::bucket_core::BucketCore;
use crate::error::CopyError;
use crate::iter::{Iter, IterIndexed, Where, WhereIndex};
use core::fmt;
use core::sync::atomic::{AtomicIsize, Ordering};
use crossbeam_epoch::{self as epoch, Guard, Owned, Shared};

/// Capacity used by [`Bucket::new`].
pub const DEFAULT_CAPACITY: usize = 64;

/// Result of [`Bucket::update`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UpdateOutcome {
    /// The slot now holds the value produced by the update factory.
    Updated,
    /// The slot is occupied but was left alone: the predicate rejected the
    /// current value, or another thread replaced it first.
    Declined,
    /// The slot was empty, became empty before the swap, or the index is out
    /// of range.
    Empty,
}

impl UpdateOutcome {
    #[inline]
    pub fn is_updated(self) -> bool {
        self == UpdateOutcome::Updated
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self == UpdateOutcome::Empty
    }
}

/// A fixed-capacity map from `[0, capacity)` to at most one `T` per index.
///
/// Every mutation is a single atomic compare-and-swap or swap on one slot, so
/// operations on different indices never contend and operations on the same
/// index are ordered by that one instruction. `len` is maintained by the
/// thread that wins each empty/occupied transition.
///
/// Values are handed out as clones because a slot may be vacated while the
/// caller still holds what it read. Store `Arc<U>` to share payloads.
///
/// Indices at or past `capacity()` are ignored: mutators report failure and
/// readers report an empty slot.
///
/// ```
/// use slot_bucket::Bucket;
///
/// let bucket = Bucket::with_capacity(8);
/// assert!(bucket.insert(3, "a"));
/// assert!(!bucket.insert(3, "b"));
/// assert_eq!(bucket.exchange(3, "c"), Ok(Some("a")));
/// assert_eq!(bucket.take_at(3), Some("c"));
/// assert!(bucket.is_empty());
/// ```
///
/// Replaced and removed values are destroyed once no pinned thread can still
/// see them, which may be after the bucket itself is gone. Stored values must
/// therefore be `'static`; a value borrowing a local is rejected:
///
/// ```compile_fail
/// use slot_bucket::Bucket;
///
/// let local = String::from("short-lived");
/// let bucket = Bucket::with_capacity(1);
/// bucket.insert(0, local.as_str());
/// ```
pub struct Bucket<T> {
    core: BucketCore<T>,
    // Signed: a removal may be counted before the insert it undoes.
    count: AtomicIsize,
}

impl<T> Bucket<T> {
    /// Create an empty bucket with [`DEFAULT_CAPACITY`] slots.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create an empty bucket with `capacity` slots. Storage for a run of
    /// slots is allocated on first write into that run.
    pub fn with_capacity(capacity: usize) -> Self {
        let core = BucketCore::with_capacity(capacity);
        tracing::debug!(capacity, segments = core.segment_count(), "created bucket");
        Self {
            core,
            count: AtomicIsize::new(0),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.core.capacity()
    }

    /// Number of occupied slots. Exact whenever no mutation is in flight.
    #[inline]
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Acquire).max(0) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    fn occupied(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    #[inline]
    fn vacated(&self) {
        self.count.fetch_sub(1, Ordering::AcqRel);
    }
}

impl<T> Default for Bucket<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Bucket<T> {
    /// Stores the value produced by `make` if the slot is empty.
    ///
    /// `Ok` carries the stored value; `Err(Some(_))` the value already there;
    /// `Err(None)` means the index is out of range. `make` only runs when the
    /// slot was observed empty.
    fn insert_in<'g, F>(
        &'g self,
        index: usize,
        make: F,
        guard: &'g Guard,
    ) -> Result<&'g T, Option<&'g T>>
    where
        F: FnOnce() -> T,
    {
        let mut outcome = Err(None);
        let inserted = self.core.do_may_increment(index, guard, |cell| {
            let current = cell.load(Ordering::Acquire, guard);
            // Safety (all derefs below): values are retired with `defer_destroy`,
            // so anything loaded under `guard` stays valid for `'g`.
            if let Some(existing) = unsafe { current.as_ref() } {
                outcome = Err(Some(existing));
                return false;
            }
            match cell.compare_exchange(
                Shared::null(),
                Owned::new(make()),
                Ordering::AcqRel,
                Ordering::Acquire,
                guard,
            ) {
                Ok(stored) => {
                    outcome = Ok(unsafe { stored.deref() });
                    true
                }
                Err(lost) => {
                    outcome = Err(unsafe { lost.current.as_ref() });
                    false
                }
            }
        });
        if inserted {
            self.occupied();
        }
        outcome
    }

    /// Swaps `item` into the slot. Returns whether the slot was empty and the
    /// value it held otherwise.
    fn swap_in<'g>(&'g self, index: usize, item: T, guard: &'g Guard) -> (bool, Option<&'g T>) {
        let mut previous = None;
        let is_new = self.core.do_may_increment(index, guard, |cell| {
            let old = cell.swap(Owned::new(item), Ordering::AcqRel, guard);
            if old.is_null() {
                return true;
            }
            // Safety: the swap unlinked `old`; pinned readers keep it alive.
            unsafe {
                guard.defer_destroy(old);
                previous = old.as_ref();
            }
            false
        });
        if is_new {
            self.occupied();
        }
        (is_new, previous)
    }

    /// Empties the slot, returning the value it held.
    fn vacate<'g>(&'g self, index: usize, guard: &'g Guard) -> Option<&'g T> {
        let mut removed = None;
        let was_occupied = self.core.do_may_decrement(index, guard, |cell| {
            let old = cell.swap(Shared::null(), Ordering::AcqRel, guard);
            if old.is_null() {
                return false;
            }
            // Safety: the swap unlinked `old`; pinned readers keep it alive.
            unsafe {
                guard.defer_destroy(old);
                removed = old.as_ref();
            }
            true
        });
        if was_occupied {
            self.vacated();
        }
        removed
    }

    /// Stores `item` at `index` if the slot is empty. Returns `false`, leaving
    /// the slot untouched, if it is occupied.
    pub fn insert(&self, index: usize, item: T) -> bool {
        let guard = &epoch::pin();
        self.insert_in(index, move || item, guard).is_ok()
    }

    /// Like [`insert`](Self::insert), but a failed insert hands back a clone of
    /// the value already stored. `Err(None)` only for an out-of-range index.
    pub fn try_insert(&self, index: usize, item: T) -> Result<(), Option<T>> {
        let guard = &epoch::pin();
        match self.insert_in(index, move || item, guard) {
            Ok(_) => Ok(()),
            Err(existing) => Err(existing.cloned()),
        }
    }

    /// Returns the value stored at `index`, storing `item` first if the slot
    /// is empty. `None` only for an out-of-range index.
    pub fn get_or_insert(&self, index: usize, item: T) -> Option<T> {
        self.get_or_insert_with(index, move || item)
    }

    /// Returns the value stored at `index`, storing `factory()` first if the
    /// slot is empty. If another thread fills the slot between the check and
    /// the swap, the produced value is discarded and the winner's returned.
    pub fn get_or_insert_with<F>(&self, index: usize, factory: F) -> Option<T>
    where
        F: FnOnce() -> T,
    {
        let guard = &epoch::pin();
        match self.insert_in(index, factory, guard) {
            Ok(stored) => Some(stored.clone()),
            Err(existing) => existing.cloned(),
        }
    }

    /// Stores `item` unconditionally. Returns `Ok` with the value it replaced,
    /// or `Ok(None)` if the slot was empty.
    ///
    /// An out-of-range index stores nothing and hands `item` back as `Err`.
    pub fn exchange(&self, index: usize, item: T) -> Result<Option<T>, T> {
        if index >= self.capacity() {
            return Err(item);
        }
        let guard = &epoch::pin();
        Ok(self.swap_in(index, item, guard).1.cloned())
    }

    /// Stores `item` unconditionally. Returns `true` if the slot was empty.
    pub fn set(&self, index: usize, item: T) -> bool {
        let guard = &epoch::pin();
        self.swap_in(index, item, guard).0
    }

    /// Empties the slot. Returns `false` if it was already empty.
    pub fn remove_at(&self, index: usize) -> bool {
        let guard = &epoch::pin();
        self.vacate(index, guard).is_some()
    }

    /// Empties the slot and returns the value it held.
    pub fn take_at(&self, index: usize) -> Option<T> {
        let guard = &epoch::pin();
        self.vacate(index, guard).cloned()
    }

    /// Empties the slot if `predicate` holds for its current value.
    ///
    /// Makes a single compare-and-swap attempt against the value the predicate
    /// saw. If another thread replaces or removes it in between, this returns
    /// `false` without retrying. Callers that need the removal to stick must
    /// loop:
    ///
    /// ```
    /// # use slot_bucket::Bucket;
    /// let bucket = Bucket::with_capacity(1);
    /// bucket.insert(0, 10u32);
    /// while bucket.try_get(0).is_some_and(|v| v > 5) {
    ///     if bucket.remove_at_if(0, |v| *v > 5) {
    ///         break;
    ///     }
    /// }
    /// assert!(bucket.is_empty());
    /// ```
    pub fn remove_at_if<P>(&self, index: usize, predicate: P) -> bool
    where
        P: FnOnce(&T) -> bool,
    {
        let guard = &epoch::pin();
        let removed = self.core.do_may_decrement(index, guard, |cell| {
            let current = cell.load(Ordering::Acquire, guard);
            // Safety: loaded under `guard`; retired values outlive it.
            let Some(value) = (unsafe { current.as_ref() }) else {
                return false;
            };
            if !predicate(value) {
                return false;
            }
            match cell.compare_exchange(
                current,
                Shared::null(),
                Ordering::AcqRel,
                Ordering::Acquire,
                guard,
            ) {
                Ok(_) => {
                    // Safety: the CAS unlinked `current`.
                    unsafe { guard.defer_destroy(current) };
                    true
                }
                Err(_) => false,
            }
        });
        if removed {
            self.vacated();
        }
        removed
    }

    /// Returns a clone of the value at `index`, if any.
    pub fn try_get(&self, index: usize) -> Option<T> {
        let guard = &epoch::pin();
        let mut found = None;
        self.core.do_with(index, guard, |cell| {
            // Safety: loaded under `guard`; retired values outlive it.
            found = unsafe { cell.load(Ordering::Acquire, guard).as_ref() }.cloned();
            false
        });
        found
    }

    /// Whether the slot at `index` is occupied.
    pub fn contains_index(&self, index: usize) -> bool {
        let guard = &epoch::pin();
        self.core.do_with(index, guard, |cell| {
            !cell.load(Ordering::Acquire, guard).is_null()
        })
    }

    /// Replaces the value at `index` with `factory(current)` if `predicate`
    /// holds for it.
    ///
    /// Like [`remove_at_if`](Self::remove_at_if) this is one compare-and-swap
    /// attempt. Losing that race to a replacement yields
    /// [`UpdateOutcome::Declined`]; losing it to a removal yields
    /// [`UpdateOutcome::Empty`]. Retrying is up to the caller.
    pub fn update<F, P>(&self, index: usize, factory: F, predicate: P) -> UpdateOutcome
    where
        F: FnOnce(&T) -> T,
        P: FnOnce(&T) -> bool,
    {
        let guard = &epoch::pin();
        let mut outcome = UpdateOutcome::Empty;
        self.core.do_with(index, guard, |cell| {
            let current = cell.load(Ordering::Acquire, guard);
            // Safety: loaded under `guard`; retired values outlive it.
            let Some(value) = (unsafe { current.as_ref() }) else {
                return false;
            };
            if !predicate(value) {
                outcome = UpdateOutcome::Declined;
                return false;
            }
            let replacement = Owned::new(factory(value));
            outcome = match cell.compare_exchange(
                current,
                replacement,
                Ordering::AcqRel,
                Ordering::Acquire,
                guard,
            ) {
                Ok(_) => {
                    // Safety: the CAS unlinked `current`.
                    unsafe { guard.defer_destroy(current) };
                    UpdateOutcome::Updated
                }
                Err(lost) if lost.current.is_null() => UpdateOutcome::Empty,
                Err(_) => UpdateOutcome::Declined,
            };
            false
        });
        outcome
    }

    /// Empties every slot. Not atomic: values inserted concurrently behind the
    /// sweep survive it.
    pub fn clear(&self) {
        let guard = &epoch::pin();
        let mut from = 0;
        while let Some((index, _)) = self.core.next_occupied(from, guard) {
            self.vacate(index, guard);
            from = index + 1;
        }
    }

    /// Copies the current values, in index order, into `dest[offset..]`.
    ///
    /// Fails if the space after `offset` is smaller than `len()` at the time
    /// of the call. Copying reads live slots, so the number copied (returned)
    /// can differ from that `len()` under concurrent mutation; it never
    /// writes past the end of `dest`.
    pub fn copy_to(&self, dest: &mut [T], offset: usize) -> Result<usize, CopyError> {
        let len = dest.len();
        if offset > len {
            return Err(CopyError::OffsetOutOfRange { offset, len });
        }
        let available = len - offset;
        let needed = self.len();
        if needed > available {
            return Err(CopyError::InsufficientSpace { needed, available });
        }
        let mut copied = 0;
        for (slot, value) in dest[offset..].iter_mut().zip(self.iter()) {
            *slot = value;
            copied += 1;
        }
        Ok(copied)
    }

    /// Live iterator over stored values in index order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(&self.core)
    }

    /// Live iterator over `(index, value)` pairs.
    pub fn iter_indexed(&self) -> IterIndexed<'_, T> {
        IterIndexed::new(&self.core)
    }

    /// Live iterator over stored values for which `predicate` holds.
    pub fn iter_where<P>(&self, predicate: P) -> Where<'_, T, P>
    where
        P: FnMut(&T) -> bool,
    {
        Where::new(&self.core, predicate)
    }

    /// Live iterator over stored values whose index satisfies `predicate`.
    pub fn iter_where_index<P>(&self, predicate: P) -> WhereIndex<'_, T, P>
    where
        P: FnMut(usize) -> bool,
    {
        WhereIndex::new(&self.core, predicate)
    }
}

impl<'a, T: Clone + Send + 'static> IntoIterator for &'a Bucket<T> {
    type Item = T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

impl<T: Clone + Send + 'static> FromIterator<T> for Bucket<T> {
    /// Places the `i`-th item at index `i`; capacity equals the item count.
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let items: Vec<T> = iter.into_iter().collect();
        let bucket = Bucket::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            bucket.insert(index, item);
        }
        bucket
    }
}

impl<T> Drop for Bucket<T> {
    fn drop(&mut self) {
        tracing::debug!(capacity = self.capacity(), len = self.len(), "dropping bucket");
    }
}

impl<T> fmt::Debug for Bucket<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bucket")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}
