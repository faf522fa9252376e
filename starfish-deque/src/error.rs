use thiserror::Error;

/// Outcome of a queue or cursor operation that did not complete normally.
///
/// Everything except `StructuralViolation` is an expected condition that
/// callers use as loop control: stop traversing, fall back to a boundary
/// operation, or restart from a boundary after `DetachedCursor` (the cursor
/// lost its node while it had to release its lock during a backoff).
/// `StructuralViolation` indicates a broken link invariant and must never be
/// retried.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// Pop or go-to-boundary on a queue without elements.
    #[error("queue is empty")]
    EmptyQueue,

    /// Navigation past the last element in the requested direction.
    /// The cursor has been cleared.
    #[error("cursor moved past the boundary")]
    BoundaryReached,

    /// The cursor has no current position.
    #[error("cursor has no active position")]
    NoActiveCursor,

    /// Cursor-relative insert or erase at the trailing boundary. Use the
    /// corresponding push or pop instead.
    #[error("cursor is at the trailing boundary")]
    AtBoundary,

    /// The cursor's node was removed while the cursor backed off.
    /// The cursor has been cleared.
    #[error("cursor node was removed during backoff")]
    DetachedCursor,

    /// A node reached through the chain has an impossible link state.
    #[error("structural invariant violated: {0}")]
    StructuralViolation(&'static str),
}

impl QueueError {
    /// Returns `true` for the conditions a correct caller is expected to handle.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::EmptyQueue
                | Self::BoundaryReached
                | Self::NoActiveCursor
                | Self::AtBoundary
                | Self::DetachedCursor
        )
    }

    /// Returns `true` if the operation ended because of an empty queue or a boundary.
    pub fn is_end_of_traversal(&self) -> bool {
        matches!(self, Self::EmptyQueue | Self::BoundaryReached)
    }
}
