//! Runtime switch entity: binds a [`MomentarySwitch`] to a scheduler.
//!
//! All transitions run under the entity's lock, together with the timer
//! work they require. A reversion callback that loses the race against a
//! cancellation still runs, but finds a different (or no) pending
//! generation and leaves the switch alone.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use momentary_domain::error::{MomentaryError, RemovedError};
use momentary_domain::event::{SwitchEvent, SwitchEventKind};
use momentary_domain::id::UniqueId;
use momentary_domain::momentary::{
    Generation, MomentarySwitch, Outcome, Phase, Reversion, SwitchSnapshot,
};
use momentary_domain::service::Service;
use momentary_domain::switch::SwitchDefinition;
use momentary_domain::time::now;

use crate::ports::{EventPublisher, ReversionScheduler};

struct Inner<H> {
    machine: MomentarySwitch,
    timer: Option<(Generation, H)>,
    device_id: Option<UniqueId>,
}

/// One live momentary switch.
pub struct SwitchEntity<S: ReversionScheduler, P> {
    unique_id: UniqueId,
    entity_id: String,
    scheduler: Arc<S>,
    publisher: Arc<P>,
    inner: Mutex<Inner<S::Handle>>,
}

impl<S, P> SwitchEntity<S, P>
where
    S: ReversionScheduler + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    /// Create a resting entity and announce it.
    pub fn new(
        unique_id: UniqueId,
        entity_id: String,
        definition: SwitchDefinition,
        scheduler: Arc<S>,
        publisher: Arc<P>,
    ) -> Arc<Self> {
        let machine = MomentarySwitch::new(definition, now());
        tracing::info!(
            unique_id = %unique_id,
            entity_id = %entity_id,
            name = machine.definition().display_name(),
            "momentary switch created"
        );
        let entity = Arc::new(Self {
            unique_id,
            entity_id,
            scheduler,
            publisher,
            inner: Mutex::new(Inner {
                machine,
                timer: None,
                device_id: None,
            }),
        });
        let is_on = entity.lock().machine.is_on();
        entity.publish(SwitchEventKind::Created, is_on);
        entity
    }

    #[must_use]
    pub fn unique_id(&self) -> &UniqueId {
        &self.unique_id
    }

    #[must_use]
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Configured name, marker included.
    #[must_use]
    pub fn name(&self) -> String {
        self.lock().machine.definition().name.clone()
    }

    #[must_use]
    pub fn definition(&self) -> SwitchDefinition {
        self.lock().machine.definition().clone()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.lock().machine.phase()
    }

    #[must_use]
    pub fn is_on(&self) -> bool {
        self.lock().machine.is_on()
    }

    #[must_use]
    pub fn device_id(&self) -> Option<UniqueId> {
        self.lock().device_id.clone()
    }

    #[must_use]
    pub fn snapshot(&self) -> SwitchSnapshot {
        self.describe(&self.lock())
    }

    /// Enter the timed state and schedule the reversion.
    ///
    /// # Errors
    ///
    /// Returns [`MomentaryError::Removed`] once the entity has been removed.
    pub fn activate(self: &Arc<Self>) -> Result<SwitchSnapshot, MomentaryError> {
        self.transition("activate", |machine| machine.activate(now()))
    }

    /// Return to the resting state early, if the switch allows it.
    ///
    /// # Errors
    ///
    /// Returns [`MomentaryError::Removed`] once the entity has been removed.
    pub fn cancel(self: &Arc<Self>) -> Result<SwitchSnapshot, MomentaryError> {
        self.transition("cancel", |machine| machine.cancel(now()))
    }

    /// # Errors
    ///
    /// Returns [`MomentaryError::Removed`] once the entity has been removed.
    pub fn turn_on(self: &Arc<Self>) -> Result<SwitchSnapshot, MomentaryError> {
        self.call(Service::TurnOn)
    }

    /// # Errors
    ///
    /// Returns [`MomentaryError::Removed`] once the entity has been removed.
    pub fn turn_off(self: &Arc<Self>) -> Result<SwitchSnapshot, MomentaryError> {
        self.call(Service::TurnOff)
    }

    /// # Errors
    ///
    /// Returns [`MomentaryError::Removed`] once the entity has been removed.
    pub fn toggle(self: &Arc<Self>) -> Result<SwitchSnapshot, MomentaryError> {
        self.call(Service::Toggle)
    }

    /// Dispatch a service call.
    ///
    /// # Errors
    ///
    /// Returns [`MomentaryError::Removed`] once the entity has been removed.
    pub fn call(self: &Arc<Self>, service: Service) -> Result<SwitchSnapshot, MomentaryError> {
        match service {
            Service::TurnOn => self.transition("turn_on", |machine| machine.turn_on(now())),
            Service::TurnOff => self.transition("turn_off", |machine| machine.turn_off(now())),
            Service::Toggle => self.transition("toggle", |machine| machine.toggle(now())),
        }
    }

    /// Swap in a new definition after a reload.
    pub fn reconfigure(&self, definition: SwitchDefinition) {
        let mut inner = self.lock();
        if inner.machine.definition() != &definition {
            tracing::debug!(entity_id = %self.entity_id, "momentary switch reconfigured");
            inner.machine.reconfigure(definition);
        }
    }

    /// Attach the switch to a device.
    pub fn assign_device(&self, device_id: UniqueId) {
        self.lock().device_id = Some(device_id);
    }

    /// Terminal: drop any pending reversion and refuse further calls.
    pub fn remove(&self) {
        let mut inner = self.lock();
        if matches!(inner.machine.phase(), Phase::Removed) {
            return;
        }
        inner.machine.remove();
        if let Some((_, handle)) = inner.timer.take() {
            self.scheduler.cancel(handle);
        }
        let is_on = inner.machine.is_on();
        drop(inner);
        tracing::info!(unique_id = %self.unique_id, entity_id = %self.entity_id, "momentary switch removed");
        self.publish(SwitchEventKind::Removed, is_on);
    }

    fn expire(self: &Arc<Self>, generation: Generation) {
        let mut inner = self.lock();
        let outcome = inner.machine.expire(generation, now());
        if outcome == Outcome::Unchanged {
            tracing::debug!(entity_id = %self.entity_id, generation, "stale reversion ignored");
            return;
        }
        tracing::debug!(entity_id = %self.entity_id, "moving out of timed state");
        self.apply(&mut inner, outcome);
    }

    fn transition(
        self: &Arc<Self>,
        action: &'static str,
        step: impl FnOnce(&mut MomentarySwitch) -> Result<Outcome, RemovedError>,
    ) -> Result<SwitchSnapshot, MomentaryError> {
        let mut inner = self.lock();
        let outcome = step(&mut inner.machine)?;
        tracing::debug!(entity_id = %self.entity_id, action, ?outcome, "momentary switch transition");
        self.apply(&mut inner, outcome);
        Ok(self.describe(&inner))
    }

    fn describe(&self, inner: &Inner<S::Handle>) -> SwitchSnapshot {
        SwitchSnapshot {
            device_id: inner.device_id.clone(),
            ..inner.machine.snapshot(&self.unique_id, &self.entity_id)
        }
    }

    fn apply(self: &Arc<Self>, inner: &mut Inner<S::Handle>, outcome: Outcome) {
        match outcome {
            Outcome::Unchanged => return,
            Outcome::Activated(next) => {
                inner.timer = Some(self.schedule(next));
            }
            Outcome::Restarted { cancelled, next } => {
                self.drop_timer(inner, cancelled);
                inner.timer = Some(self.schedule(next));
            }
            Outcome::Reverted {
                cancelled: Some(cancelled),
            } => self.drop_timer(inner, cancelled),
            Outcome::Reverted { cancelled: None } => {
                // the callback that got us here already ran
                inner.timer = None;
            }
        }
        if outcome.changed_state() {
            self.publish(SwitchEventKind::StateChanged, inner.machine.is_on());
        }
    }

    fn schedule(self: &Arc<Self>, reversion: Reversion) -> (Generation, S::Handle) {
        let entity: Weak<Self> = Arc::downgrade(self);
        let generation = reversion.generation;
        let handle = self.scheduler.schedule(
            reversion.delay,
            Box::new(move || {
                if let Some(entity) = entity.upgrade() {
                    entity.expire(generation);
                }
            }),
        );
        (generation, handle)
    }

    fn drop_timer(&self, inner: &mut Inner<S::Handle>, generation: Generation) {
        match inner.timer.take() {
            Some((pending, handle)) if pending == generation => self.scheduler.cancel(handle),
            other => inner.timer = other,
        }
    }

    fn publish(&self, kind: SwitchEventKind, is_on: bool) {
        let event = SwitchEvent::new(kind, self.unique_id.clone(), self.entity_id.clone(), is_on);
        if let Err(err) = self.publisher.publish(event) {
            tracing::warn!(entity_id = %self.entity_id, error = %err, "failed to publish switch event");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<S::Handle>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
