use std::fmt;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

use super::cursor::Cursor;
use super::node::{Direction, NodeIndex};
use super::node_arena::{NodeArena, NodeGuard};
use super::options::ReversibleQueueOptions;
use crate::error::QueueError;
use crate::preemptive_synchronization::contention_backoff::ContentionBackoff;
use crate::preemptive_synchronization::lock_order::{self, Acquisition, LockId};

///
/// Concurrent doubly-linked deque with per-node locks, caller-owned cursors and
/// in-place reversal.
///
// =============================================================================
// LOCKING PROTOCOL
// =============================================================================
//
// Locks:
//   S        structure lock, guards `front`, `back` and `direction`
//   N(i)     node lock of slot i, guards the node's links and orientation
//
// Chain order: S first, then nodes from front to back (each node's own
// orientation decides what "back" means). Every *blocking* acquisition
// follows chain order; every acquisition against it is a try-lock that, on
// failure, releases everything the thread holds and retries after a backoff.
//
// Operation          blocking                              try-lock
// ─────────────────  ────────────────────────────────────  ─────────────────
// push_front/back    S → new → boundary                    -
// pop_front          S → front → behind(front)             -
// pop_back           S → back                              ahead(back)
// go_to_front/back   S → boundary (S released after)       -
// move_forward       cursor → behind(cursor)               -
// move_backward      -                                     ahead(cursor)
// insert             cursor → new → behind(cursor)         -
// erase              cursor → victim → behind(victim)      S (victim = back)
// reverse            S → front → ... → back (coupled)      -
//
// A thread holding a cursor must not take S (push, pop, reverse, go_to_*
// without clearing first). Debug builds verify all of this at run time, see
// `preemptive_synchronization::lock_order`.
//
// =============================================================================
// REVERSAL
// =============================================================================
//
// Before:   front ► A ⇄ B ⇄ C ◄ back        all orientations Forward
//
// reverse() holds S for the whole walk and lock-couples A → B → C, flipping
// each node after the next one is locked:
//
//   step 1:  [A] [B]  C      flip A, release A
//   step 2:   A  [B] [C]     flip B, release B
//   step 3:   A   B  [C]     C is the back sentinel, flip C
//
// After:    front ► C ⇄ B ⇄ A ◄ back        all orientations Reversed
//
// No link is rewritten. A cursor parked on a node keeps its lock; reversal
// waits for it, and the cursor's next move reads the flipped orientation.
//
pub struct ReversibleQueue<T> {
    id: usize,
    ends: Mutex<Ends>,
    arena: NodeArena<T>,
    len: AtomicUsize,
    contention_retries: AtomicU64,
    options: ReversibleQueueOptions,
}

#[derive(Debug)]
pub(super) struct Ends {
    pub(super) front: Option<NodeIndex>,
    pub(super) back: Option<NodeIndex>,
    pub(super) direction: Direction,
}

/// Which boundary a cursor jumps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Side {
    Front,
    Back,
}

/// Held structure lock.
pub(super) struct EndsGuard<'a> {
    guard: MutexGuard<'a, Ends>,
    id: LockId,
}

impl Deref for EndsGuard<'_> {
    type Target = Ends;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl DerefMut for EndsGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

impl Drop for EndsGuard<'_> {
    fn drop(&mut self) {
        lock_order::released(self.id);
    }
}

/// Logs and builds a structural violation.
pub(super) fn structural(message: &'static str) -> QueueError {
    tracing::error!(message, "structural invariant violated");
    QueueError::StructuralViolation(message)
}

impl<T> ReversibleQueue<T> {
    pub fn new() -> Self {
        Self::with_options(ReversibleQueueOptions::default())
    }

    pub fn with_options(options: ReversibleQueueOptions) -> Self {
        let id = lock_order::next_queue_id();
        ReversibleQueue {
            id,
            ends: Mutex::new(Ends {
                front: None,
                back: None,
                direction: Direction::Forward,
            }),
            arena: NodeArena::new(id, options.first_segment_len()),
            len: AtomicUsize::new(0),
            contention_retries: AtomicU64::new(0),
            options,
        }
    }

    pub fn options(&self) -> &ReversibleQueueOptions {
        &self.options
    }

    /// Approximate number of elements. Exact only while no other thread mutates.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// Approximate emptiness, see [`len`](Self::len).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of try-lock retries performed on this queue.
    pub fn contention_retries(&self) -> u64 {
        self.contention_retries.load(Ordering::Relaxed)
    }

    /// Current global orientation. Flips with every [`reverse`](Self::reverse).
    ///
    /// Takes the structure lock: the calling thread must not hold a cursor.
    ///
    pub fn direction(&self) -> Direction {
        self.lock_ends().direction
    }

    /// Creates an inactive cursor for the calling thread.
    pub fn cursor(&self) -> Cursor<'_, T> {
        Cursor::new(self)
    }

    // =========================================================================
    // Lock helpers (shared with Cursor)
    // =========================================================================

    fn lock_ends(&self) -> EndsGuard<'_> {
        let id = LockId::Structure { queue: self.id };
        lock_order::check(id, Acquisition::Unordered);

        let guard = self.ends.lock().unwrap_or_else(PoisonError::into_inner);

        lock_order::acquired(id, Acquisition::Unordered);
        EndsGuard { guard, id }
    }

    pub(super) fn try_lock_ends(&self) -> Option<EndsGuard<'_>> {
        let id = LockId::Structure { queue: self.id };
        let guard = match self.ends.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return None,
        };

        lock_order::acquired(id, Acquisition::Try);
        Some(EndsGuard { guard, id })
    }

    pub(super) fn lock_node(&self, index: NodeIndex, acquisition: Acquisition) -> NodeGuard<'_, T> {
        self.arena.lock(index, acquisition)
    }

    pub(super) fn try_lock_node(&self, index: NodeIndex) -> Option<NodeGuard<'_, T>> {
        self.arena.try_lock(index)
    }

    pub(super) fn allocate_node(&self) -> NodeIndex {
        self.arena.allocate()
    }

    pub(super) fn backoff(&self) -> ContentionBackoff<'_> {
        ContentionBackoff::new(self.options.yield_after(), &self.contention_retries)
    }

    pub(super) fn node_linked(&self) {
        self.len.fetch_add(1, Ordering::Release);
    }

    /// Recycles the slot of a detached node. Its lock must already be released.
    pub(super) fn retire(&self, index: NodeIndex) {
        self.arena.release(index);
        self.len.fetch_sub(1, Ordering::Release);
    }

    /// Locks the requested boundary node under the structure lock.
    pub(super) fn lock_boundary(&self, side: Side) -> Result<NodeGuard<'_, T>, QueueError> {
        let ends = self.lock_ends();
        let index = match side {
            Side::Front => ends.front,
            Side::Back => ends.back,
        }
        .ok_or(QueueError::EmptyQueue)?;

        Ok(self.arena.lock(index, Acquisition::Unordered))
    }

    // =========================================================================
    // Boundary operations
    // =========================================================================

    pub fn push_front(&self, item: T) {
        let mut ends = self.lock_ends();
        let index = self.arena.allocate();
        let mut node = self.arena.lock(index, Acquisition::Fresh);

        match ends.front {
            None => {
                node.occupy(item, ends.direction, None, None);
                ends.back = Some(index);
            }
            Some(front) => {
                let mut first = self.arena.lock(front, Acquisition::Unordered);
                node.occupy(item, ends.direction, None, Some(front));
                first.set_ahead(Some(index));
            }
        }

        node.publish();
        ends.front = Some(index);
        self.node_linked();
    }

    pub fn push_back(&self, item: T) {
        let mut ends = self.lock_ends();
        let index = self.arena.allocate();
        let mut node = self.arena.lock(index, Acquisition::Fresh);

        match ends.back {
            None => {
                node.occupy(item, ends.direction, None, None);
                ends.front = Some(index);
            }
            Some(back) => {
                let mut last = self.arena.lock(back, Acquisition::Unordered);
                node.occupy(item, ends.direction, Some(back), None);
                last.set_behind(Some(index));
            }
        }

        node.publish();
        ends.back = Some(index);
        self.node_linked();
    }

    /// Removes and returns the front element.
    pub fn pop_front(&self) -> Result<T, QueueError> {
        let mut ends = self.lock_ends();
        let front = ends.front.ok_or(QueueError::EmptyQueue)?;
        let mut node = self.arena.lock(front, Acquisition::Unordered);
        let behind = node
            .behind()
            .ok_or_else(|| structural("front node is detached"))?;

        if behind == front {
            debug_assert_eq!(ends.back, Some(front));
            ends.front = None;
            ends.back = None;
        } else {
            let mut next = self.arena.lock(behind, Acquisition::Behind { of: front });
            next.set_ahead(Some(behind));
            ends.front = Some(behind);
        }

        let item = node
            .detach()
            .ok_or_else(|| structural("front node has no payload"))?;

        drop(node);
        drop(ends);
        self.retire(front);
        Ok(item)
    }

    /// Removes and returns the back element in O(1).
    ///
    /// The neighbor ahead of the back node is against chain order, so it is
    /// only try-locked; on failure every lock is released before retrying.
    ///
    pub fn pop_back(&self) -> Result<T, QueueError> {
        let mut backoff = self.backoff();

        loop {
            let mut ends = self.lock_ends();
            let back = ends.back.ok_or(QueueError::EmptyQueue)?;
            let mut node = self.arena.lock(back, Acquisition::Unordered);
            let ahead = node
                .ahead()
                .ok_or_else(|| structural("back node is detached"))?;

            if ahead == back {
                debug_assert_eq!(ends.front, Some(back));
                ends.front = None;
                ends.back = None;
            } else {
                let Some(mut prev) = self.arena.try_lock(ahead) else {
                    drop(node);
                    drop(ends);
                    backoff.snooze();
                    continue;
                };
                prev.set_behind(Some(ahead));
                ends.back = Some(ahead);
            }

            let item = node
                .detach()
                .ok_or_else(|| structural("back node has no payload"))?;

            drop(node);
            drop(ends);
            self.retire(back);

            if backoff.attempts() > 0 {
                tracing::trace!(attempts = backoff.attempts(), "pop_back finished after retries");
            }
            return Ok(item);
        }
    }

    // =========================================================================
    // Reversal
    // =========================================================================

    /// Flips the traversal direction of the whole queue in place.
    ///
    /// Holds the structure lock for the full O(n) walk and waits for every
    /// cursor it meets on the way.
    ///
    pub fn reverse(&self) -> Result<(), QueueError> {
        let mut ends = self.lock_ends();

        if let Some(front) = ends.front {
            let mut node = self.arena.lock(front, Acquisition::Unordered);
            let mut visited = 1usize;

            loop {
                let behind = node
                    .behind()
                    .ok_or_else(|| structural("detached node reached during reversal"))?;

                if behind == node.index() {
                    debug_assert_eq!(ends.back, Some(behind));
                    node.flip_orientation();
                    break;
                }

                let next = self.arena.lock(behind, Acquisition::Behind { of: node.index() });
                node.flip_orientation();
                node = next;
                visited += 1;
            }

            drop(node);
            let ends = &mut *ends;
            mem::swap(&mut ends.front, &mut ends.back);
            tracing::trace!(visited, "orientation flipped on every node");
        }

        ends.direction = ends.direction.flipped();
        tracing::debug!(queue = self.id, direction = ?ends.direction, "queue reversed");
        Ok(())
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Collects the payloads from front to back through a temporary cursor.
    ///
    /// Concurrent mutations behind the moving cursor are observed, those
    /// already passed are not.
    ///
    pub fn to_vec(&self) -> Result<Vec<T>, QueueError>
    where
        T: Clone,
    {
        let mut items = Vec::with_capacity(self.len());
        let mut cursor = self.cursor();

        match cursor.go_to_front() {
            Ok(()) => {}
            Err(QueueError::EmptyQueue) => return Ok(items),
            Err(error) => return Err(error),
        }

        loop {
            items.push(cursor.data()?.clone());
            match cursor.move_forward() {
                Ok(()) => {}
                Err(QueueError::BoundaryReached) => return Ok(items),
                Err(error) => return Err(error),
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn id(&self) -> usize {
        self.id
    }

    #[cfg(test)]
    pub(crate) fn arena_slots(&self) -> (usize, usize) {
        (self.arena.allocated_slots(), self.arena.recycled_slots())
    }
}

impl<T> Default for ReversibleQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Extend<T> for ReversibleQueue<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.push_back(item);
        }
    }
}

impl<T> FromIterator<T> for ReversibleQueue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut queue = ReversibleQueue::new();
        queue.extend(iter);
        queue
    }
}

impl<T> fmt::Debug for ReversibleQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReversibleQueue")
            .field("id", &self.id)
            .field("len", &self.len())
            .field("contention_retries", &self.contention_retries())
            .field("allocated_slots", &self.arena.allocated_slots())
            .field("recycled_slots", &self.arena.recycled_slots())
            .finish_non_exhaustive()
    }
}
