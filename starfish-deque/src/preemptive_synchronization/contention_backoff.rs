use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam::utils::Backoff;

/// Retry helper for the try-lock paths of the queue.
///
/// A thread that fails a non-blocking acquisition releases its own locks and
/// calls [`snooze`](Self::snooze) before retrying the whole step. The first
/// `yield_after` retries spin with an exponentially growing (and bounded)
/// busy wait, later retries yield the time slice to the scheduler.
///
pub(crate) struct ContentionBackoff<'a> {
    backoff: Backoff,
    attempts: u32,
    yield_after: u32,
    retries: &'a AtomicU64,
}

impl<'a> ContentionBackoff<'a> {
    pub(crate) fn new(yield_after: u32, retries: &'a AtomicU64) -> Self {
        ContentionBackoff {
            backoff: Backoff::new(),
            attempts: 0,
            yield_after,
            retries,
        }
    }

    /// Waits before the next attempt.
    pub(crate) fn snooze(&mut self) {
        self.attempts += 1;
        self.retries.fetch_add(1, Ordering::Relaxed);

        if self.attempts <= self.yield_after {
            tracing::trace!(attempts = self.attempts, "lock contended, spinning");
            self.backoff.spin();
        } else {
            if self.attempts == self.yield_after + 1 {
                tracing::debug!(attempts = self.attempts, "lock still contended, yielding");
            }
            thread::yield_now();
        }
    }

    /// Number of retries performed by this helper.
    pub(crate) fn attempts(&self) -> u32 {
        self.attempts
    }
}
