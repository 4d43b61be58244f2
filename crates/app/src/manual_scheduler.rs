//! A [`ReversionScheduler`] driven by an explicit virtual clock.
//!
//! Nothing fires on its own: callers move time forward with
//! [`ManualScheduler::advance`] and every callback that became due runs, in
//! due order, on the caller's thread. Used by tests and simulations that
//! need deterministic timing.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::ports::{Expiry, ReversionScheduler};

/// Key of a scheduled callback: due time, then insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ManualHandle {
    due: Duration,
    seq: u64,
}

#[derive(Default)]
struct Clock {
    now: Duration,
    seq: u64,
    pending: BTreeMap<ManualHandle, Expiry>,
}

/// Scheduler whose time only moves when told to.
#[derive(Default)]
pub struct ManualScheduler {
    clock: Mutex<Clock>,
}

impl ManualScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since creation.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.lock().now
    }

    /// Number of callbacks waiting to fire.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    /// Virtual time at which the next callback fires.
    #[must_use]
    pub fn next_due(&self) -> Option<Duration> {
        self.lock().pending.keys().next().map(|handle| handle.due)
    }

    /// Move the clock forward by `by`, running every callback due on the way.
    ///
    /// The lock is released while a callback runs, so callbacks may schedule
    /// or cancel other callbacks.
    pub fn advance(&self, by: Duration) {
        let target = self.lock().now + by;
        loop {
            let due = {
                let mut clock = self.lock();
                let next = clock.pending.keys().next().copied();
                match next {
                    Some(handle) if handle.due <= target => {
                        clock.now = handle.due;
                        clock.pending.remove(&handle)
                    }
                    _ => None,
                }
            };
            match due {
                Some(callback) => callback(),
                None => break,
            }
        }
        self.lock().now = target;
    }

    fn lock(&self) -> MutexGuard<'_, Clock> {
        self.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ReversionScheduler for ManualScheduler {
    type Handle = ManualHandle;

    fn schedule(&self, delay: Duration, on_expiry: Expiry) -> ManualHandle {
        let mut clock = self.lock();
        clock.seq += 1;
        let handle = ManualHandle {
            due: clock.now + delay,
            seq: clock.seq,
        };
        clock.pending.insert(handle, on_expiry);
        handle
    }

    fn cancel(&self, handle: ManualHandle) {
        self.lock().pending.remove(&handle);
    }
}
