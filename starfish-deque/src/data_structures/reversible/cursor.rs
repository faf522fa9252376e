use std::fmt;

use super::node::NodeHandle;
use super::node_arena::NodeGuard;
use super::reversible_queue::{ReversibleQueue, Side, structural};
use crate::error::QueueError;
use crate::preemptive_synchronization::lock_order::Acquisition;

/// A thread's private position in a [`ReversibleQueue`].
///
/// An active cursor holds the lock of its node, so no other thread can unlink,
/// pass through or erase that node until the cursor moves or is cleared.
/// Dropping the cursor clears it.
///
/// Cursors are `!Send`: the lock they hold belongs to the creating thread.
///
/// # Direction
///
/// "Forward" walks from the front toward the back. Insert and erase act on
/// the neighbor *behind* the cursor, never on the cursor's own node.
///
/// # Example
///
/// ```
/// use starfish_deque::data_structures::ReversibleQueue;
/// use starfish_deque::QueueError;
///
/// let queue: ReversibleQueue<u32> = (1..=3).collect();
/// let mut cursor = queue.cursor();
///
/// cursor.go_to_front()?;
/// assert_eq!(cursor.data()?, &1);
///
/// cursor.insert(10).map_err(|rejected| rejected.error())?;
/// cursor.move_forward()?;
/// assert_eq!(cursor.data()?, &10);
///
/// assert_eq!(cursor.erase()?, 2);
/// cursor.clear();
///
/// assert_eq!(queue.to_vec()?, vec![1, 10, 3]);
/// # Ok::<(), QueueError>(())
/// ```
///
pub struct Cursor<'q, T> {
    queue: &'q ReversibleQueue<T>,
    position: Option<NodeGuard<'q, T>>,
}

impl<'q, T> Cursor<'q, T> {
    pub(super) fn new(queue: &'q ReversibleQueue<T>) -> Self {
        Cursor {
            queue,
            position: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.position.is_some()
    }

    /// Payload of the node under the cursor.
    pub fn data(&self) -> Result<&T, QueueError> {
        self.position
            .as_ref()
            .ok_or(QueueError::NoActiveCursor)?
            .data()
            .ok_or_else(|| structural("cursor node has no payload"))
    }

    /// Whether nothing is ahead of the cursor. Stable while the cursor holds its node.
    pub fn is_at_front(&self) -> Result<bool, QueueError> {
        let current = self.position.as_ref().ok_or(QueueError::NoActiveCursor)?;
        Ok(current.is_front())
    }

    /// Whether nothing is behind the cursor. Stable while the cursor holds its node.
    pub fn is_at_back(&self) -> Result<bool, QueueError> {
        let current = self.position.as_ref().ok_or(QueueError::NoActiveCursor)?;
        Ok(current.is_back())
    }

    /// Releases the held node and deactivates the cursor.
    pub fn clear(&mut self) {
        self.position = None;
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    pub fn go_to_front(&mut self) -> Result<(), QueueError> {
        self.go_to(Side::Front)
    }

    pub fn go_to_back(&mut self) -> Result<(), QueueError> {
        self.go_to(Side::Back)
    }

    fn go_to(&mut self, side: Side) -> Result<(), QueueError> {
        // The structure lock is taken next, nothing may be held.
        //
        self.position = None;
        self.position = Some(self.queue.lock_boundary(side)?);
        Ok(())
    }

    /// Moves one node toward the back.
    ///
    /// The next node is locked before the current one is released. At the
    /// back the cursor is cleared and `BoundaryReached` is returned.
    ///
    pub fn move_forward(&mut self) -> Result<(), QueueError> {
        let queue = self.queue;
        let current = self.position.as_ref().ok_or(QueueError::NoActiveCursor)?;
        let index = current.index();
        let behind = current
            .behind()
            .ok_or_else(|| structural("cursor node is detached"))?;

        if behind == index {
            self.position = None;
            return Err(QueueError::BoundaryReached);
        }

        let next = queue.lock_node(behind, Acquisition::Behind { of: index });
        self.position = Some(next);
        Ok(())
    }

    /// Moves one node toward the front.
    ///
    /// This is against chain order, so the node ahead is only try-locked. On
    /// failure the cursor releases its own node, backs off and re-locks it.
    /// If its node was removed in that window the cursor is cleared and
    /// `DetachedCursor` is returned.
    ///
    pub fn move_backward(&mut self) -> Result<(), QueueError> {
        let queue = self.queue;
        let mut backoff = queue.backoff();

        loop {
            let current = self.position.as_ref().ok_or(QueueError::NoActiveCursor)?;
            let index = current.index();
            let ahead = current
                .ahead()
                .ok_or_else(|| structural("cursor node is detached"))?;

            if ahead == index {
                self.position = None;
                return Err(QueueError::BoundaryReached);
            }

            if let Some(prev) = queue.try_lock_node(ahead) {
                self.position = Some(prev);
                return Ok(());
            }

            let handle = current.handle();
            self.position = None;
            backoff.snooze();
            self.reattach(handle)?;
        }
    }

    /// Re-locks the node the cursor released during a backoff.
    fn reattach(&mut self, handle: NodeHandle) -> Result<(), QueueError> {
        let node = self
            .queue
            .lock_node(handle.index, Acquisition::Unordered);

        if node.handle() != handle {
            tracing::debug!(index = handle.index, "cursor node removed during backoff");
            return Err(QueueError::DetachedCursor);
        }

        self.position = Some(node);
        Ok(())
    }

    // =========================================================================
    // Cursor-relative mutation
    // =========================================================================

    /// Inserts `item` directly behind the cursor. The cursor does not move.
    ///
    /// At the back boundary the item is handed back with `AtBoundary`; use
    /// [`ReversibleQueue::push_back`] after clearing the cursor instead.
    ///
    pub fn insert(&mut self, item: T) -> Result<(), InsertError<T>> {
        let queue = self.queue;
        let Some(current) = self.position.as_mut() else {
            return Err(InsertError::new(QueueError::NoActiveCursor, item));
        };
        let index = current.index();
        let Some(behind) = current.behind() else {
            return Err(InsertError::new(structural("cursor node is detached"), item));
        };

        if behind == index {
            return Err(InsertError::new(QueueError::AtBoundary, item));
        }

        let new_index = queue.allocate_node();
        let mut node = queue.lock_node(new_index, Acquisition::Fresh);
        let mut next = queue.lock_node(behind, Acquisition::Behind { of: index });

        node.occupy(item, current.orientation(), Some(index), Some(behind));
        current.set_behind(Some(new_index));
        next.set_ahead(Some(new_index));
        node.publish();

        queue.node_linked();
        Ok(())
    }

    /// Removes and returns the element directly behind the cursor.
    ///
    /// Holds the cursor node, the victim and the victim's successor, acquired
    /// in chain order. When the victim is the back boundary the structure lock
    /// is needed as well; it is only try-locked and on failure the cursor
    /// releases everything (its own node included), backs off and retries.
    ///
    pub fn erase(&mut self) -> Result<T, QueueError> {
        let queue = self.queue;
        let mut backoff = queue.backoff();

        loop {
            let current = self.position.as_mut().ok_or(QueueError::NoActiveCursor)?;
            let index = current.index();
            let target = current
                .behind()
                .ok_or_else(|| structural("cursor node is detached"))?;

            if target == index {
                return Err(QueueError::AtBoundary);
            }

            let mut victim = queue.lock_node(target, Acquisition::Behind { of: index });
            let after = victim
                .behind()
                .ok_or_else(|| structural("node behind cursor is detached"))?;

            if after != target {
                let mut successor = queue.lock_node(after, Acquisition::Behind { of: target });
                current.set_behind(Some(after));
                successor.set_ahead(Some(index));
            } else {
                let Some(mut ends) = queue.try_lock_ends() else {
                    let handle = current.handle();
                    drop(victim);
                    self.position = None;
                    backoff.snooze();
                    self.reattach(handle)?;
                    continue;
                };

                if ends.back != Some(target) {
                    return Err(structural("back boundary is not the tracked back node"));
                }
                current.set_behind(Some(index));
                ends.back = Some(index);
            }

            let item = victim
                .detach()
                .ok_or_else(|| structural("erased node has no payload"))?;

            drop(victim);
            queue.retire(target);
            return Ok(item);
        }
    }
}

impl<T> fmt::Debug for Cursor<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("node", &self.position.as_ref().map(|node| node.index()))
            .finish()
    }
}

/// Error returned by [`Cursor::insert`]. Carries the item that was not inserted.
#[derive(Clone, PartialEq, Eq)]
pub struct InsertError<T> {
    error: QueueError,
    item: T,
}

impl<T> InsertError<T> {
    fn new(error: QueueError, item: T) -> Self {
        InsertError { error, item }
    }

    pub fn error(&self) -> QueueError {
        self.error
    }

    /// Returns the item that couldn't be inserted.
    pub fn into_inner(self) -> T {
        self.item
    }
}

impl<T> From<InsertError<T>> for QueueError {
    fn from(rejected: InsertError<T>) -> Self {
        rejected.error
    }
}

impl<T> fmt::Display for InsertError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "insert rejected: {}", self.error)
    }
}

impl<T> fmt::Debug for InsertError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self, f)
    }
}

impl<T> std::error::Error for InsertError<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_error_keeps_item() {
        let queue: ReversibleQueue<String> = ReversibleQueue::new();
        let mut cursor = queue.cursor();

        let rejected = cursor.insert("kept".to_string()).unwrap_err();
        assert_eq!(rejected.error(), QueueError::NoActiveCursor);
        assert_eq!(format!("{:?}", rejected), "insert rejected: cursor has no active position");
        assert_eq!(rejected.into_inner(), "kept");
    }

    #[test]
    fn test_cursor_debug_shows_node() {
        let queue: ReversibleQueue<i32> = (0..2).collect();
        let mut cursor = queue.cursor();
        assert_eq!(format!("{:?}", cursor), "Cursor { node: None }");

        cursor.go_to_front().unwrap();
        assert!(format!("{:?}", cursor).contains("Some("));
    }

    #[cfg(debug_assertions)]
    #[test]
    fn test_cursor_holds_exactly_one_lock() {
        use crate::preemptive_synchronization::lock_order;

        let queue: ReversibleQueue<i32> = (0..4).collect();
        let mut cursor = queue.cursor();
        assert_eq!(lock_order::held_count(queue.id()), 0);

        cursor.go_to_front().unwrap();
        assert_eq!(lock_order::held_count(queue.id()), 1);

        cursor.insert(10).unwrap();
        cursor.move_forward().unwrap();
        assert_eq!(cursor.erase(), Ok(1));
        cursor.move_backward().unwrap();
        assert_eq!(lock_order::held_count(queue.id()), 1);

        cursor.clear();
        assert_eq!(lock_order::held_count(queue.id()), 0);
        assert_eq!(queue.to_vec(), Ok(vec![0, 10, 2, 3]));
    }
}
