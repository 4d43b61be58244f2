//! # momentary-adapter-timer-tokio
//!
//! [`ReversionScheduler`] on top of the tokio timer.
//!
//! Each scheduled reversion is a spawned task that sleeps for the delay and
//! then runs the callback. Cancelling aborts the task; a callback that is
//! already running is left to finish (the switch ignores it by generation).
//!
//! ## Dependency rule
//! Depends on `momentary-app` (for the port trait) only.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use momentary_app::ports::{Expiry, ReversionScheduler};

/// Scheduler spawning one sleeping task per reversion.
#[derive(Clone)]
pub struct TokioScheduler {
    runtime: Handle,
}

impl TokioScheduler {
    /// Bind to the runtime of the calling task.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    #[must_use]
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    #[must_use]
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }
}

impl ReversionScheduler for TokioScheduler {
    type Handle = JoinHandle<()>;

    fn schedule(&self, delay: Duration, on_expiry: Expiry) -> JoinHandle<()> {
        tracing::trace!(?delay, "reversion scheduled");
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            on_expiry();
        })
    }

    fn cancel(&self, handle: JoinHandle<()>) {
        handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(count: &Arc<AtomicUsize>) -> Expiry {
        let count = Arc::clone(count);
        Box::new(move || {
            count.fetch_add(1, Ordering::SeqCst);
        })
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn should_fire_after_delay() {
        let scheduler = TokioScheduler::current();
        let count = Arc::new(AtomicUsize::new(0));
        scheduler.schedule(Duration::from_secs(5), counting(&count));

        tokio::time::advance(Duration::from_secs(4)).await;
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_not_fire_when_cancelled() {
        let scheduler = TokioScheduler::current();
        let count = Arc::new(AtomicUsize::new(0));
        let handle = scheduler.schedule(Duration::from_secs(5), counting(&count));

        tokio::time::advance(Duration::from_secs(2)).await;
        scheduler.cancel(handle);
        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn should_accept_cancel_after_firing() {
        let scheduler = TokioScheduler::current();
        let count = Arc::new(AtomicUsize::new(0));
        let handle = scheduler.schedule(Duration::from_millis(250), counting(&count));

        tokio::time::sleep(Duration::from_secs(1)).await;
        settle().await;
        scheduler.cancel(handle);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
