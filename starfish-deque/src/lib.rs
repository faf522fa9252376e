//! Concurrent reversible deque.
//!
//! [`ReversibleQueue`](data_structures::ReversibleQueue) is a doubly-linked
//! deque where every node has its own lock. Any number of threads push and pop
//! at both ends, walk the chain with private [`Cursor`](data_structures::Cursor)s,
//! insert and erase next to their cursor, and reverse the whole queue in place.
//!
//! Lock acquisition follows a single chain order so that no set of operations
//! can deadlock; debug builds verify the order on every acquisition.

pub mod common_tests;
pub mod data_structures;
pub mod error;
pub(crate) mod preemptive_synchronization;

pub use error::QueueError;

/*

cargo llvm-cov --html

cargo bench --bench reversible_queue_benchmark

*/
