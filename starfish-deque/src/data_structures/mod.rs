//! Data structures for concurrent collections.
//!
//! # Organization
//!
//! - [`reversible`] - Reversible deque with per-node locks and cursors

pub mod reversible;

pub use reversible::{Cursor, Direction, InsertError, ReversibleQueue, ReversibleQueueOptions};
