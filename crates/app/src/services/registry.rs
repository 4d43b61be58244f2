//! Switch registry: the set of live switch entities.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

use momentary_domain::error::{MomentaryError, NotFoundError};
use momentary_domain::id::UniqueId;
use momentary_domain::identity::Reconciliation;
use momentary_domain::momentary::SwitchSnapshot;
use momentary_domain::service::Service;

use crate::ports::{EventPublisher, ReversionScheduler};
use crate::services::switch_entity::SwitchEntity;

/// What [`SwitchRegistry::apply`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub created: usize,
    pub removed: usize,
    pub reconfigured: usize,
}

/// Owns every live [`SwitchEntity`], in configuration order.
pub struct SwitchRegistry<S: ReversionScheduler, P> {
    scheduler: Arc<S>,
    publisher: Arc<P>,
    entities: RwLock<Vec<Arc<SwitchEntity<S, P>>>>,
}

impl<S, P> SwitchRegistry<S, P>
where
    S: ReversionScheduler + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    /// Create an empty registry.
    pub fn new(scheduler: Arc<S>, publisher: Arc<P>) -> Self {
        Self {
            scheduler,
            publisher,
            entities: RwLock::new(Vec::new()),
        }
    }

    /// Bring the live entities in line with a reconciliation.
    ///
    /// Entities whose unique id is still resolved are reconfigured in place
    /// and keep any pending reversion. The others are removed, and new ids
    /// get a fresh entity.
    pub fn apply(&self, reconciliation: &Reconciliation) -> ApplyReport {
        let mut report = ApplyReport::default();
        let mut entities = self.write();
        let mut previous = std::mem::take(&mut *entities);

        for resolved in &reconciliation.switches {
            let entity = match previous
                .iter()
                .position(|entity| entity.unique_id() == &resolved.unique_id)
            {
                Some(index) => {
                    let entity = previous.swap_remove(index);
                    if entity.definition() != resolved.definition {
                        entity.reconfigure(resolved.definition.clone());
                        report.reconfigured += 1;
                    }
                    entity
                }
                None => {
                    report.created += 1;
                    SwitchEntity::new(
                        resolved.unique_id.clone(),
                        resolved.entity_id.clone(),
                        resolved.definition.clone(),
                        Arc::clone(&self.scheduler),
                        Arc::clone(&self.publisher),
                    )
                }
            };
            entity.assign_device(resolved.device_id.clone());
            entities.push(entity);
        }

        for stale in previous {
            stale.remove();
            report.removed += 1;
        }

        tracing::info!(
            total = entities.len(),
            created = report.created,
            removed = report.removed,
            reconfigured = report.reconfigured,
            "switch registry updated"
        );
        report
    }

    /// Look up an entity by unique id.
    ///
    /// # Errors
    ///
    /// Returns [`MomentaryError::NotFound`] when no live switch has this id.
    pub fn get(&self, unique_id: &UniqueId) -> Result<Arc<SwitchEntity<S, P>>, MomentaryError> {
        self.read()
            .iter()
            .find(|entity| entity.unique_id() == unique_id)
            .cloned()
            .ok_or_else(|| {
                NotFoundError {
                    entity: "Switch",
                    id: unique_id.to_string(),
                }
                .into()
            })
    }

    /// Look up an entity by entity id.
    #[must_use]
    pub fn find_by_entity_id(&self, entity_id: &str) -> Option<Arc<SwitchEntity<S, P>>> {
        self.read()
            .iter()
            .find(|entity| entity.entity_id() == entity_id)
            .cloned()
    }

    /// Snapshots of every live switch.
    #[must_use]
    pub fn list(&self) -> Vec<SwitchSnapshot> {
        self.read().iter().map(|entity| entity.snapshot()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Run a service call against one switch.
    ///
    /// # Errors
    ///
    /// Returns [`MomentaryError::NotFound`] for an unknown id, or
    /// [`MomentaryError::Removed`] if the switch went away mid-call.
    pub fn call(
        &self,
        unique_id: &UniqueId,
        service: Service,
    ) -> Result<SwitchSnapshot, MomentaryError> {
        let entity = self.get(unique_id)?;
        entity.call(service)
    }

    /// Remove every entity, cancelling their pending reversions.
    pub fn clear(&self) -> usize {
        let removed = std::mem::take(&mut *self.write());
        for entity in &removed {
            entity.remove();
        }
        removed.len()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<SwitchEntity<S, P>>>> {
        self.entities.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Arc<SwitchEntity<S, P>>>> {
        self.entities.write().unwrap_or_else(PoisonError::into_inner)
    }
}
