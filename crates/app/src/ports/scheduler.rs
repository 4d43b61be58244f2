//! Reversion scheduler port: the host's deferred-callback primitive.
//!
//! A momentary switch never sleeps. It asks the scheduler to run a callback
//! once the delay has elapsed and keeps the returned handle so the callback
//! can be cancelled when the switch is turned back early.

use std::time::Duration;

/// Callback run when a reversion is due.
pub type Expiry = Box<dyn FnOnce() + Send + 'static>;

/// Schedules and cancels deferred callbacks.
pub trait ReversionScheduler: Send + Sync {
    /// Token identifying a scheduled callback.
    type Handle: Send + 'static;

    /// Run `on_expiry` once `delay` has elapsed.
    fn schedule(&self, delay: Duration, on_expiry: Expiry) -> Self::Handle;

    /// Drop a callback that has not run yet. Cancelling a callback that
    /// already ran is a no-op.
    fn cancel(&self, handle: Self::Handle);
}

impl<T: ReversionScheduler> ReversionScheduler for std::sync::Arc<T> {
    type Handle = T::Handle;

    fn schedule(&self, delay: Duration, on_expiry: Expiry) -> Self::Handle {
        (**self).schedule(delay, on_expiry)
    }

    fn cancel(&self, handle: Self::Handle) {
        (**self).cancel(handle);
    }
}
