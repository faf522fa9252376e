//! Segmented node storage.
//!
//! Nodes live in fixed slots addressed by a `u32` index, so neighbor links are
//! plain indices and the boundary sentinel is "link equals own index".
//!
//! ```text
//!   segment 0: F slots        indices 0 .. F
//!   segment 1: 2F slots       indices F .. 3F
//!   segment 2: 4F slots       indices 3F .. 7F
//!   ...
//! ```
//!
//! Segments are allocated lazily and never move or shrink while the arena is
//! alive, so a slot reference stays valid for the arena's lifetime. Vacated
//! slots go to a lock-free free list and are handed out again by `allocate`.
//! Each slot's mutex is the node lock.
//!

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError, TryLockError};

use crossbeam::queue::SegQueue;

use super::node::{Node, NodeIndex};
use crate::preemptive_synchronization::lock_order::{self, Acquisition, LockId};

type Segment<T> = Box<[Mutex<Node<T>>]>;

pub(crate) struct NodeArena<T> {
    queue_id: usize,
    segments: Box<[OnceLock<Segment<T>>]>,
    first_shift: u32,
    capacity: u64,
    next_index: AtomicUsize,
    free: SegQueue<NodeIndex>,
}

impl<T> NodeArena<T> {
    pub(crate) fn new(queue_id: usize, first_segment_len: usize) -> Self {
        debug_assert!(first_segment_len.is_power_of_two());

        let first_shift = first_segment_len.trailing_zeros();
        let segment_count = (NodeIndex::BITS - first_shift) as usize;
        let capacity = (1u64 << NodeIndex::BITS) - first_segment_len as u64;

        NodeArena {
            queue_id,
            segments: (0..segment_count).map(|_| OnceLock::new()).collect(),
            first_shift,
            capacity,
            next_index: AtomicUsize::new(0),
            free: SegQueue::new(),
        }
    }

    /// Maps a slot index to (segment, offset within segment).
    #[inline]
    fn locate(&self, index: NodeIndex) -> (usize, usize) {
        let biased = index as u64 + (1u64 << self.first_shift);
        let level = u64::BITS - 1 - biased.leading_zeros();
        let segment = level - self.first_shift;
        let offset = biased - (1u64 << level);
        (segment as usize, offset as usize)
    }

    fn segment(&self, segment: usize) -> &[Mutex<Node<T>>] {
        self.segments[segment].get_or_init(|| {
            let first = 1usize << self.first_shift;
            let base = (first << segment) - first;
            let len = first << segment;
            (0..len)
                .map(|offset| Mutex::new(Node::vacant((base + offset) as NodeIndex)))
                .collect()
        })
    }

    #[inline]
    fn slot(&self, index: NodeIndex) -> &Mutex<Node<T>> {
        let (segment, offset) = self.locate(index);
        &self.segment(segment)[offset]
    }

    #[inline]
    fn lock_id(&self, index: NodeIndex) -> LockId {
        LockId::Node {
            queue: self.queue_id,
            index,
        }
    }

    // =========================================================================
    // Slot allocation
    // =========================================================================

    /// Returns the index of a vacant slot, recycling released slots first.
    ///
    /// # Panics
    ///
    /// Panics when all `u32` indices are in use.
    ///
    pub(crate) fn allocate(&self) -> NodeIndex {
        if let Some(index) = self.free.pop() {
            return index;
        }

        let index = self.next_index.fetch_add(1, Ordering::Relaxed);
        assert!((index as u64) < self.capacity, "Node arena exhausted");

        let index = index as NodeIndex;
        let (segment, _) = self.locate(index);
        self.segment(segment);
        index
    }

    /// Returns a detached slot to the free list. The caller must not hold its lock.
    pub(crate) fn release(&self, index: NodeIndex) {
        self.free.push(index);
    }

    /// Number of slots ever handed out by `allocate` (excluding reuse).
    pub(crate) fn allocated_slots(&self) -> usize {
        self.next_index.load(Ordering::Relaxed)
    }

    /// Number of vacant slots waiting for reuse.
    pub(crate) fn recycled_slots(&self) -> usize {
        self.free.len()
    }

    // =========================================================================
    // Node locks
    // =========================================================================

    /// Blocks until the node lock of `index` is held.
    pub(crate) fn lock(&self, index: NodeIndex, acquisition: Acquisition) -> NodeGuard<'_, T> {
        let id = self.lock_id(index);
        lock_order::check(id, acquisition);

        let guard = self
            .slot(index)
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        lock_order::acquired(id, acquisition);
        NodeGuard { guard, id }
    }

    /// Attempts the node lock of `index` without waiting.
    pub(crate) fn try_lock(&self, index: NodeIndex) -> Option<NodeGuard<'_, T>> {
        let id = self.lock_id(index);
        let guard = match self.slot(index).try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return None,
        };

        lock_order::acquired(id, Acquisition::Try);
        Some(NodeGuard { guard, id })
    }
}

/// Held node lock. Dereferences to the node.
pub(crate) struct NodeGuard<'a, T> {
    guard: MutexGuard<'a, Node<T>>,
    id: LockId,
}

impl<T> NodeGuard<'_, T> {
    /// Marks a freshly allocated node as reachable from the chain.
    pub(crate) fn publish(&self) {
        lock_order::published(self.id);
    }
}

impl<T> Deref for NodeGuard<'_, T> {
    type Target = Node<T>;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<T> DerefMut for NodeGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

impl<T> Drop for NodeGuard<'_, T> {
    fn drop(&mut self) {
        lock_order::released(self.id);
    }
}
