//! Switch event fan-out inside the daemon.
//!
//! Entities publish `Created`, `StateChanged` and `Removed` while holding
//! their own lock, often from a timer callback, so publishing must never
//! block or wait on a listener.

use tokio::sync::broadcast;

use momentary_domain::error::MomentaryError;
use momentary_domain::event::SwitchEvent;

use crate::ports::EventPublisher;

/// [`EventPublisher`] over a bounded [`broadcast`] channel.
///
/// With nobody listening a switch event is dropped. A listener that falls
/// more than `capacity` events behind loses the oldest ones and is told how
/// many through [`broadcast::error::RecvError::Lagged`].
pub struct InProcessEventBus {
    sender: broadcast::Sender<SwitchEvent>,
}

impl InProcessEventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Listen to switch events from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SwitchEvent> {
        self.sender.subscribe()
    }

    /// Number of live listeners.
    #[must_use]
    pub fn listeners(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventPublisher for InProcessEventBus {
    fn publish(&self, event: SwitchEvent) -> Result<(), MomentaryError> {
        // send only fails when nobody listens
        let _ = self.sender.send(event);
        Ok(())
    }
}
