//! Reversible doubly-linked deque with per-node locks.
//!
//! - [`ReversibleQueue`] - the shared queue, used through `&self` from any thread
//! - [`Cursor`] - a thread's private position inside the queue
//! - [`ReversibleQueueOptions`] - construction options

mod cursor;
mod node;
mod node_arena;
mod options;
mod reversible_queue;

pub use cursor::{Cursor, InsertError};
pub use node::Direction;
pub use options::{DEFAULT_FIRST_SEGMENT_LEN, DEFAULT_YIELD_AFTER, ReversibleQueueOptions};
pub use reversible_queue::ReversibleQueue;
