//! Event bus port: publish/subscribe for switch events.

use momentary_domain::error::MomentaryError;
use momentary_domain::event::SwitchEvent;

/// Publishes switch events to interested subscribers.
///
/// Publishing is synchronous: it happens from timer callbacks as well as
/// from request handlers, while the switch is locked.
pub trait EventPublisher {
    /// Publish an event to all current subscribers.
    ///
    /// # Errors
    ///
    /// Returns an error if the event could not be handed over.
    fn publish(&self, event: SwitchEvent) -> Result<(), MomentaryError>;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(&self, event: SwitchEvent) -> Result<(), MomentaryError> {
        (**self).publish(event)
    }
}
