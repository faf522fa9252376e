// =============================================================================
// NODE LAYOUT
// =============================================================================
//
// A node has two physical neighbor slots, `left` and `right`. Which one means
// "ahead" (toward the front) depends on the node's orientation:
//
//   Forward:   ahead = left,  behind = right
//   Reversed:  ahead = right, behind = left
//
//   front                                          back
//   ┌────┐  right  ┌────┐  right  ┌────┐  right  ┌────┐
//   │ A  │────────►│ B  │────────►│ C  │────────►│ D  │──┐
//   │    │◄────────│    │◄────────│    │◄────────│    │  │ self
//   └────┘  left   └────┘  left   └────┘  left   └────┘◄─┘
//    ▲  │ self
//    └──┘
//
// Link states of a slot:
//   Some(other) - neighbor
//   Some(self)  - boundary sentinel, nothing further in that direction
//   None        - detached (erased) or vacant slot
//
// Reversal flips every node's orientation, so the same physical links read
// back to front without touching them.
//

pub(crate) type NodeIndex = u32;

/// Which physical neighbor slot currently points toward the front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Reversed,
}

impl Direction {
    pub fn flipped(self) -> Self {
        match self {
            Direction::Forward => Direction::Reversed,
            Direction::Reversed => Direction::Forward,
        }
    }
}

/// Slot index plus the generation of the occupant it was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NodeHandle {
    pub(crate) index: NodeIndex,
    pub(crate) generation: u32,
}

/// A single queue element. Only reachable through the lock of its arena slot.
#[derive(Debug)]
pub(crate) struct Node<T> {
    index: NodeIndex,
    generation: u32,
    data: Option<T>,
    left: Option<NodeIndex>,
    right: Option<NodeIndex>,
    orientation: Direction,
}

impl<T> Node<T> {
    pub(crate) fn vacant(index: NodeIndex) -> Self {
        Node {
            index,
            generation: 0,
            data: None,
            left: None,
            right: None,
            orientation: Direction::Forward,
        }
    }

    #[inline]
    pub(crate) fn index(&self) -> NodeIndex {
        self.index
    }

    #[inline]
    pub(crate) fn handle(&self) -> NodeHandle {
        NodeHandle {
            index: self.index,
            generation: self.generation,
        }
    }

    #[inline]
    pub(crate) fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    #[inline]
    pub(crate) fn orientation(&self) -> Direction {
        self.orientation
    }

    // =========================================================================
    // Oriented link accessors
    // =========================================================================

    #[inline]
    pub(crate) fn ahead(&self) -> Option<NodeIndex> {
        match self.orientation {
            Direction::Forward => self.left,
            Direction::Reversed => self.right,
        }
    }

    #[inline]
    pub(crate) fn behind(&self) -> Option<NodeIndex> {
        match self.orientation {
            Direction::Forward => self.right,
            Direction::Reversed => self.left,
        }
    }

    #[inline]
    pub(crate) fn set_ahead(&mut self, link: Option<NodeIndex>) {
        match self.orientation {
            Direction::Forward => self.left = link,
            Direction::Reversed => self.right = link,
        }
    }

    #[inline]
    pub(crate) fn set_behind(&mut self, link: Option<NodeIndex>) {
        match self.orientation {
            Direction::Forward => self.right = link,
            Direction::Reversed => self.left = link,
        }
    }

    #[inline]
    pub(crate) fn flip_orientation(&mut self) {
        self.orientation = self.orientation.flipped();
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Nothing ahead: this node is the current front.
    #[inline]
    pub(crate) fn is_front(&self) -> bool {
        self.ahead() == Some(self.index)
    }

    /// Nothing behind: this node is the current back.
    #[inline]
    pub(crate) fn is_back(&self) -> bool {
        self.behind() == Some(self.index)
    }

    #[inline]
    pub(crate) fn is_linked(&self) -> bool {
        self.data.is_some()
    }

    /// Fills a vacant slot. `None` for a neighbor makes this node the
    /// boundary on that side.
    pub(crate) fn occupy(
        &mut self,
        data: T,
        orientation: Direction,
        ahead: Option<NodeIndex>,
        behind: Option<NodeIndex>,
    ) {
        debug_assert!(!self.is_linked(), "slot {} is already occupied", self.index);

        self.data = Some(data);
        self.orientation = orientation;
        self.set_ahead(Some(ahead.unwrap_or(self.index)));
        self.set_behind(Some(behind.unwrap_or(self.index)));
    }

    /// Clears both links and takes the payload. Bumps the generation so stale
    /// handles to this slot no longer match.
    pub(crate) fn detach(&mut self) -> Option<T> {
        self.left = None;
        self.right = None;
        self.generation = self.generation.wrapping_add(1);
        self.data.take()
    }
}
