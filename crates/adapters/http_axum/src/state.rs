//! Shared application state for axum handlers.

use std::sync::Arc;

use momentary_app::ports::{
    EventPublisher, IdentityRepository, LegacyConfigSource, ReversionScheduler, SwitchConfigStore,
};
use momentary_app::services::registry::SwitchRegistry;
use momentary_app::services::setup_service::SetupService;

/// Application state shared across all axum handlers.
///
/// Generic over the storage ports, the scheduler and the event publisher to
/// avoid dynamic dispatch. `Clone` is implemented manually so the underlying
/// types themselves do not need to be `Clone`; only the `Arc` wrappers are
/// cloned.
pub struct AppState<C, I, L, S: ReversionScheduler, P> {
    /// Live switches.
    pub registry: Arc<SwitchRegistry<S, P>>,
    /// Reloads the switches file.
    pub setup_service: Arc<SetupService<C, I, L, S, P>>,
}

impl<C, I, L, S: ReversionScheduler, P> Clone for AppState<C, I, L, S, P> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            setup_service: Arc::clone(&self.setup_service),
        }
    }
}

impl<C, I, L, S, P> AppState<C, I, L, S, P>
where
    C: SwitchConfigStore + Send + Sync + 'static,
    I: IdentityRepository + Send + Sync + 'static,
    L: LegacyConfigSource + Send + Sync + 'static,
    S: ReversionScheduler + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    /// Create the state from a setup service; the registry is taken from it.
    pub fn new(setup_service: SetupService<C, I, L, S, P>) -> Self {
        Self::from_arc(Arc::new(setup_service))
    }

    /// Create the state from a setup service already shared elsewhere.
    pub fn from_arc(setup_service: Arc<SetupService<C, I, L, S, P>>) -> Self {
        Self {
            registry: Arc::clone(setup_service.registry()),
            setup_service,
        }
    }
}
