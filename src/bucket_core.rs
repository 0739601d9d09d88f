//! BucketCore: segmented slot storage with per-cell atomic pointers.
//!
//! Layout
//! - A fixed top-level table of segment pointers, sized once from the
//!   requested capacity.
//! - Each segment holds `SEGMENT_LEN` cells. A cell is a
//!   `crossbeam_epoch::Atomic<T>`: null means empty, non-null means the
//!   slot is occupied by the boxed value it points at.
//! - Segments are allocated on the first write that may occupy one of
//!   their cells and stay allocated until the core is dropped.
//!
//! Primitives
//! - `do_with` runs a mutator against an existing cell and never allocates.
//! - `do_may_increment` allocates the owning segment first, so a write can
//!   always land.
//! - `do_may_decrement` never allocates: a missing segment has no occupied
//!   cells to vacate.
//!
//! Every primitive returns the mutator's "occupancy changed" flag, or
//! `false` when the index is out of range or the cell does not exist.
//! Callers update their counts only from that return value.

use core::sync::atomic::Ordering;
use crossbeam_epoch::{self as epoch, Atomic, Guard, Owned, Shared};

/// log2 of the number of cells per segment.
pub const SEGMENT_SHIFT: u32 = 5;

/// Number of cells per segment.
pub const SEGMENT_LEN: usize = 1 << SEGMENT_SHIFT;

const SEGMENT_MASK: usize = SEGMENT_LEN - 1;

struct Segment<T> {
    cells: Box<[Atomic<T>]>,
}

impl<T> Segment<T> {
    fn new() -> Self {
        Self {
            cells: (0..SEGMENT_LEN).map(|_| Atomic::null()).collect(),
        }
    }
}

pub struct BucketCore<T> {
    segments: Box<[Atomic<Segment<T>>]>,
    capacity: usize,
}

impl<T> BucketCore<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        let segment_count = capacity.div_ceil(SEGMENT_LEN);
        Self {
            segments: (0..segment_count).map(|_| Atomic::null()).collect(),
            capacity,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of segment pointers in the top-level table.
    #[inline]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Number of segments that currently have storage behind them.
    #[cfg(any(test, feature = "bench_internal"))]
    pub fn allocated_segments(&self) -> usize {
        let guard = &epoch::pin();
        self.segments
            .iter()
            .filter(|s| !s.load(Ordering::Acquire, guard).is_null())
            .count()
    }

    #[inline]
    fn locate(&self, index: usize) -> Option<(usize, usize)> {
        if index < self.capacity {
            Some((index >> SEGMENT_SHIFT, index & SEGMENT_MASK))
        } else {
            None
        }
    }

    fn segment<'g>(&'g self, segment: usize, guard: &'g Guard) -> Option<&'g Segment<T>> {
        let ptr = self.segments[segment].load(Ordering::Acquire, guard);
        // Safety: segments are only freed in `Drop`, which has exclusive access.
        unsafe { ptr.as_ref() }
    }

    fn segment_or_alloc<'g>(&'g self, segment: usize, guard: &'g Guard) -> &'g Segment<T> {
        if let Some(existing) = self.segment(segment, guard) {
            return existing;
        }

        let slot = &self.segments[segment];
        let fresh = Owned::new(Segment::new());
        match slot.compare_exchange(
            Shared::null(),
            fresh,
            Ordering::AcqRel,
            Ordering::Acquire,
            guard,
        ) {
            Ok(published) => {
                tracing::trace!(segment, "allocated bucket segment");
                // Safety: just published, non-null, freed only in `Drop`.
                unsafe { published.deref() }
            }
            Err(lost) => {
                // Our segment is still owned by `lost.new` and is freed with it.
                tracing::trace!(segment, "lost bucket segment allocation race");
                // Safety: the CAS failed against null, so `current` is non-null.
                unsafe { lost.current.deref() }
            }
        }
    }

    /// Runs `f` against the cell at `index` if its segment exists.
    pub fn do_with<'g, F>(&'g self, index: usize, guard: &'g Guard, f: F) -> bool
    where
        F: FnOnce(&'g Atomic<T>) -> bool,
    {
        let Some((segment, offset)) = self.locate(index) else {
            return false;
        };
        match self.segment(segment, guard) {
            Some(seg) => f(&seg.cells[offset]),
            None => false,
        }
    }

    /// Runs `f` against the cell at `index`, allocating its segment first.
    /// `f` returns `true` when it moved the cell from empty to occupied.
    pub fn do_may_increment<'g, F>(&'g self, index: usize, guard: &'g Guard, f: F) -> bool
    where
        F: FnOnce(&'g Atomic<T>) -> bool,
    {
        let Some((segment, offset)) = self.locate(index) else {
            return false;
        };
        let seg = self.segment_or_alloc(segment, guard);
        f(&seg.cells[offset])
    }

    /// Runs `f` against the cell at `index` if its segment exists.
    /// `f` returns `true` when it moved the cell from occupied to empty.
    pub fn do_may_decrement<'g, F>(&'g self, index: usize, guard: &'g Guard, f: F) -> bool
    where
        F: FnOnce(&'g Atomic<T>) -> bool,
    {
        // A missing segment has nothing to vacate; never allocate here.
        self.do_with(index, guard, f)
    }

    /// Finds the first occupied cell at or after `from`, in index order.
    ///
    /// Each cell is read independently; there is no snapshot across cells.
    pub fn next_occupied<'g>(&'g self, from: usize, guard: &'g Guard) -> Option<(usize, &'g T)> {
        let mut index = from;
        while index < self.capacity {
            let segment = index >> SEGMENT_SHIFT;
            let base = segment << SEGMENT_SHIFT;
            if let Some(seg) = self.segment(segment, guard) {
                let end = SEGMENT_LEN.min(self.capacity - base);
                for offset in (index - base)..end {
                    let ptr = seg.cells[offset].load(Ordering::Acquire, guard);
                    // Safety: values are retired with `defer_destroy`, so a pointer
                    // loaded under `guard` stays valid for `'g`.
                    if let Some(value) = unsafe { ptr.as_ref() } {
                        return Some((base + offset, value));
                    }
                }
            }
            index = base + SEGMENT_LEN;
        }
        None
    }
}

impl<T> Drop for BucketCore<T> {
    fn drop(&mut self) {
        // Safety: `&mut self` guarantees no other thread can reach these cells.
        let guard = unsafe { epoch::unprotected() };
        let mut freed = 0usize;
        for slot in self.segments.iter() {
            let seg = slot.load(Ordering::Relaxed, guard);
            if seg.is_null() {
                continue;
            }
            // Safety: exclusive access; the segment was allocated with `Owned::new`.
            let seg = unsafe { seg.into_owned() };
            for cell in seg.cells.iter() {
                let value = cell.load(Ordering::Relaxed, guard);
                if !value.is_null() {
                    // Safety: live values are uniquely owned by their cell.
                    drop(unsafe { value.into_owned() });
                    freed += 1;
                }
            }
        }
        tracing::trace!(capacity = self.capacity, freed, "released bucket storage");
    }
}
