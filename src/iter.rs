//! Live iterators over a `Bucket`.
//!
//! None of these take a snapshot. Each call to `next` pins the current
//! epoch, reads forward from the last visited index and clones the value it
//! finds, so writes made by other threads while iterating are visible from
//! the point the cursor reaches them. An iterator that returned `None` can
//! yield again if a later index is filled in the meantime; it is not fused.

use crate::bucket_core::BucketCore;
use crossbeam_epoch as epoch;

/// Iterator over the values of a bucket, in index order.
pub struct Iter<'a, T> {
    core: &'a BucketCore<T>,
    next: usize,
}

impl<'a, T> Iter<'a, T> {
    pub(crate) fn new(core: &'a BucketCore<T>) -> Self {
        Self { core, next: 0 }
    }
}

impl<T: Clone> Iterator for Iter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let guard = &epoch::pin();
        let (index, value) = self.core.next_occupied(self.next, guard)?;
        self.next = index + 1;
        Some(value.clone())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.core.capacity().saturating_sub(self.next)))
    }
}

/// Iterator over `(index, value)` pairs of a bucket.
pub struct IterIndexed<'a, T> {
    core: &'a BucketCore<T>,
    next: usize,
}

impl<'a, T> IterIndexed<'a, T> {
    pub(crate) fn new(core: &'a BucketCore<T>) -> Self {
        Self { core, next: 0 }
    }
}

impl<T: Clone> Iterator for IterIndexed<'_, T> {
    type Item = (usize, T);

    fn next(&mut self) -> Option<(usize, T)> {
        let guard = &epoch::pin();
        let (index, value) = self.core.next_occupied(self.next, guard)?;
        self.next = index + 1;
        Some((index, value.clone()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.core.capacity().saturating_sub(self.next)))
    }
}

/// Values for which a predicate holds. The predicate sees the stored value
/// before it is cloned.
pub struct Where<'a, T, P> {
    core: &'a BucketCore<T>,
    next: usize,
    predicate: P,
}

impl<'a, T, P> Where<'a, T, P> {
    pub(crate) fn new(core: &'a BucketCore<T>, predicate: P) -> Self {
        Self {
            core,
            next: 0,
            predicate,
        }
    }
}

impl<T, P> Iterator for Where<'_, T, P>
where
    T: Clone,
    P: FnMut(&T) -> bool,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let guard = &epoch::pin();
        loop {
            let (index, value) = self.core.next_occupied(self.next, guard)?;
            self.next = index + 1;
            if (self.predicate)(value) {
                return Some(value.clone());
            }
        }
    }
}

/// Values whose slot index satisfies a predicate.
pub struct WhereIndex<'a, T, P> {
    core: &'a BucketCore<T>,
    next: usize,
    predicate: P,
}

impl<'a, T, P> WhereIndex<'a, T, P> {
    pub(crate) fn new(core: &'a BucketCore<T>, predicate: P) -> Self {
        Self {
            core,
            next: 0,
            predicate,
        }
    }
}

impl<T, P> Iterator for WhereIndex<'_, T, P>
where
    T: Clone,
    P: FnMut(usize) -> bool,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let guard = &epoch::pin();
        loop {
            let (index, value) = self.core.next_occupied(self.next, guard)?;
            self.next = index + 1;
            if (self.predicate)(index) {
                return Some(value.clone());
            }
        }
    }
}
