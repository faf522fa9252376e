//! Lock acquisition order verification.
//!
//! Every lock of a [`ReversibleQueue`](crate::data_structures::ReversibleQueue) is
//! acquired through this module. In debug builds each thread records the locks
//! it holds and every *blocking* acquisition is checked against the queue's
//! ordering rules before the thread starts waiting, so a protocol bug panics
//! instead of deadlocking. Release builds compile the checks away.
//!
//! # Ordering Rules
//!
//! ```text
//!   structure lock ──► fresh node ──► boundary node ──► behind ──► behind ...
//!
//!   R1  structure lock (blocking)   no node lock of the same queue held
//!   R2  node lock (blocking)        either no published node of the queue held,
//!                                   or the node is the "behind" neighbor of a held node
//!   R3  any lock                    never re-acquired by the thread holding it
//! ```
//!
//! Fresh nodes (allocated, not yet reachable from the chain) and non-blocking
//! `try_lock` attempts are exempt from R2: nobody else can wait on the former
//! and the latter never wait at all.
//!

use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_QUEUE_ID: AtomicUsize = AtomicUsize::new(0);

/// Returns a process-unique id for a new queue instance.
pub(crate) fn next_queue_id() -> usize {
    NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(not(debug_assertions), allow(dead_code))]
pub(crate) enum LockId {
    Structure { queue: usize },
    Node { queue: usize, index: u32 },
}

#[cfg_attr(not(debug_assertions), allow(dead_code))]
impl LockId {
    fn queue(&self) -> usize {
        match *self {
            LockId::Structure { queue } => queue,
            LockId::Node { queue, .. } => queue,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(not(debug_assertions), allow(dead_code))]
pub(crate) enum Acquisition {
    /// Blocking, while holding no published node of the same queue.
    Unordered,
    /// Blocking, the node directly behind the held node `of`.
    Behind { of: u32 },
    /// Blocking, a node that is not reachable from the chain yet.
    Fresh,
    /// Non-blocking attempt.
    Try,
}

#[cfg(debug_assertions)]
mod tracking {
    use std::cell::RefCell;

    use super::{Acquisition, LockId};

    #[derive(Debug, Clone, Copy)]
    struct HeldLock {
        id: LockId,
        fresh: bool,
    }

    thread_local! {
        static HELD: RefCell<Vec<HeldLock>> = const { RefCell::new(Vec::new()) };
    }

    pub(crate) fn check(id: LockId, acquisition: Acquisition) {
        if acquisition == Acquisition::Try {
            return;
        }

        let violation = HELD.with(|held| {
            let held = held.borrow();
            let queue = id.queue();

            if held.iter().any(|lock| lock.id == id) {
                return Some(format!("{:?} is already held by this thread", id));
            }

            let published_nodes: Vec<u32> = held
                .iter()
                .filter(|lock| !lock.fresh)
                .filter_map(|lock| match lock.id {
                    LockId::Node { queue: q, index } if q == queue => Some(index),
                    _ => None,
                })
                .collect();

            match (id, acquisition) {
                (LockId::Structure { .. }, _) if !published_nodes.is_empty() => Some(format!(
                    "structure lock of queue {} requested while holding nodes {:?}",
                    queue, published_nodes
                )),
                (LockId::Node { index, .. }, Acquisition::Unordered)
                    if !published_nodes.is_empty() =>
                {
                    Some(format!(
                        "node {} requested out of chain order while holding nodes {:?}",
                        index, published_nodes
                    ))
                }
                (LockId::Node { index, .. }, Acquisition::Behind { of })
                    if !published_nodes.contains(&of) =>
                {
                    Some(format!(
                        "node {} requested as the neighbor behind node {}, which is not held",
                        index, of
                    ))
                }
                _ => None,
            }
        });

        if let Some(message) = violation {
            tracing::error!(%message, "lock order violation");
            panic!("lock order violation: {}", message);
        }
    }

    pub(crate) fn acquired(id: LockId, acquisition: Acquisition) {
        HELD.with(|held| {
            held.borrow_mut().push(HeldLock {
                id,
                fresh: acquisition == Acquisition::Fresh,
            })
        });
    }

    pub(crate) fn published(id: LockId) {
        HELD.with(|held| {
            if let Some(lock) = held.borrow_mut().iter_mut().rev().find(|lock| lock.id == id) {
                lock.fresh = false;
            }
        });
    }

    pub(crate) fn released(id: LockId) {
        // Guards may be dropped while the thread-local is being torn down.
        //
        let _ = HELD.try_with(|held| {
            let mut held = held.borrow_mut();
            if let Some(position) = held.iter().rposition(|lock| lock.id == id) {
                held.remove(position);
            }
        });
    }

    #[cfg(test)]
    pub(crate) fn held_count(queue: usize) -> usize {
        HELD.with(|held| {
            held.borrow()
                .iter()
                .filter(|lock| lock.id.queue() == queue)
                .count()
        })
    }
}

#[cfg(not(debug_assertions))]
mod tracking {
    use super::{Acquisition, LockId};

    #[inline(always)]
    pub(crate) fn check(_id: LockId, _acquisition: Acquisition) {}

    #[inline(always)]
    pub(crate) fn acquired(_id: LockId, _acquisition: Acquisition) {}

    #[inline(always)]
    pub(crate) fn published(_id: LockId) {}

    #[inline(always)]
    pub(crate) fn released(_id: LockId) {}
}

pub(crate) use tracking::{acquired, check, published, released};

#[cfg(all(test, debug_assertions))]
pub(crate) use tracking::held_count;
