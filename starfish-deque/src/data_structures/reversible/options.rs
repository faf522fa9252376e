/// Default number of node slots in the first arena segment.
pub const DEFAULT_FIRST_SEGMENT_LEN: usize = 64;

/// Default number of spinning retries before a contended thread starts yielding.
pub const DEFAULT_YIELD_AFTER: u32 = 6;

/// Largest accepted first segment (keeps the segment table small).
const MAX_FIRST_SEGMENT_LEN: usize = 1 << 20;

/// Create options for a [`ReversibleQueue`](super::ReversibleQueue).
///
/// ```
/// use starfish_deque::data_structures::{ReversibleQueue, ReversibleQueueOptions};
///
/// let options = ReversibleQueueOptions::new()
///     .with_first_segment_len(16)
///     .with_yield_after(2);
/// let queue: ReversibleQueue<u32> = ReversibleQueue::with_options(options);
/// queue.push_back(1);
/// assert_eq!(queue.len(), 1);
/// ```
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReversibleQueueOptions {
    first_segment_len: usize,
    yield_after: u32,
}

impl ReversibleQueueOptions {
    pub fn new() -> Self {
        ReversibleQueueOptions {
            first_segment_len: DEFAULT_FIRST_SEGMENT_LEN,
            yield_after: DEFAULT_YIELD_AFTER,
        }
    }

    /// Sets the slot count of the first arena segment. Every following segment
    /// doubles in size.
    ///
    /// # Panics
    ///
    /// Panics if `len` is not a power of two or exceeds 2^20.
    ///
    pub fn with_first_segment_len(mut self, len: usize) -> Self {
        assert!(len.is_power_of_two(), "First segment length must be a power of two");
        assert!(
            len <= MAX_FIRST_SEGMENT_LEN,
            "First segment length must not exceed {}",
            MAX_FIRST_SEGMENT_LEN
        );
        self.first_segment_len = len;
        self
    }

    /// Sets how many failed try-lock attempts spin before the thread yields.
    pub fn with_yield_after(mut self, attempts: u32) -> Self {
        self.yield_after = attempts;
        self
    }

    pub fn first_segment_len(&self) -> usize {
        self.first_segment_len
    }

    pub fn yield_after(&self) -> u32 {
        self.yield_after
    }
}

impl Default for ReversibleQueueOptions {
    fn default() -> Self {
        Self::new()
    }
}
