//! Setup service: legacy migration, configuration load and identity
//! reconciliation.
//!
//! The switches file and the identity store are only written from here,
//! and only while the reload lock is held.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use momentary_domain::error::{ConfigError, MigrationError, MomentaryError};
use momentary_domain::id::UniqueId;
use momentary_domain::identity::{DeviceAction, IdentityAction, reconcile};
use momentary_domain::migration::{LegacySwitch, migrate};
use momentary_domain::switch::validate_switches;

use crate::ports::{
    EventPublisher, IdentityRepository, LegacyConfigSource, ReversionScheduler, SwitchConfigStore,
};
use crate::services::registry::SwitchRegistry;

/// Summary of a setup or reload pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SetupReport {
    /// Switches imported from the legacy configuration.
    pub migrated: usize,
    pub created: usize,
    pub removed: usize,
    pub reconfigured: usize,
    /// Entries rejected while loading the switches file.
    pub rejected: usize,
    /// Devices no switch refers to any more.
    pub orphaned_devices: usize,
}

/// Drives the storage ports and feeds the [`SwitchRegistry`].
pub struct SetupService<C, I, L, S: ReversionScheduler, P> {
    switches: C,
    identities: I,
    legacy: L,
    registry: Arc<SwitchRegistry<S, P>>,
    reload_lock: Mutex<()>,
}

impl<C, I, L, S, P> SetupService<C, I, L, S, P>
where
    C: SwitchConfigStore,
    I: IdentityRepository,
    L: LegacyConfigSource,
    S: ReversionScheduler + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    pub fn new(switches: C, identities: I, legacy: L, registry: Arc<SwitchRegistry<S, P>>) -> Self {
        Self {
            switches,
            identities,
            legacy,
            registry,
            reload_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<SwitchRegistry<S, P>> {
        &self.registry
    }

    /// First start: import the legacy configuration if needed, then load.
    ///
    /// A failed migration is logged and skipped; only a failed load is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the switches file or the identity store
    /// cannot be read or written.
    pub async fn setup(&self) -> Result<SetupReport, MomentaryError> {
        let _guard = self.reload_lock.lock().await;
        let migrated = match self.migrate_locked().await {
            Ok(count) => count,
            Err(MomentaryError::Migration(MigrationError::AlreadyMigrated)) => {
                tracing::debug!("switches file present, legacy migration skipped");
                0
            }
            Err(MomentaryError::Migration(err)) => {
                tracing::warn!(error = %err, "legacy migration skipped");
                0
            }
            Err(err) => {
                tracing::error!(error = %err, "legacy migration failed");
                0
            }
        };
        let report = self.reload_locked().await?;
        Ok(SetupReport { migrated, ..report })
    }

    /// Import the legacy configuration into the switches file and the
    /// identity store. Returns the number of imported switches.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::AlreadyMigrated`] when the switches file
    /// exists, [`MigrationError::Unreadable`] when the legacy configuration
    /// cannot be read, [`MigrationError::NoLegacySwitches`] when it holds no
    /// momentary switch, or a storage error from the ports.
    pub async fn migrate(&self) -> Result<usize, MomentaryError> {
        let _guard = self.reload_lock.lock().await;
        self.migrate_locked().await
    }

    /// Re-read the switches file and bring the live switches in line.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the switches file or the identity store
    /// cannot be read or written.
    pub async fn reload(&self) -> Result<SetupReport, MomentaryError> {
        let _guard = self.reload_lock.lock().await;
        self.reload_locked().await
    }

    async fn migrate_locked(&self) -> Result<usize, MomentaryError> {
        if self.switches.exists().await? {
            return Err(MigrationError::AlreadyMigrated.into());
        }
        let legacy = self
            .legacy
            .load()
            .await
            .map_err(|err| MigrationError::Unreadable(Box::new(err)))?;
        if !legacy.iter().any(LegacySwitch::is_momentary) {
            return Err(MigrationError::NoLegacySwitches.into());
        }

        let existing = self.identities.load().await?;
        let migration = migrate(&legacy, &existing);
        log_rejected(&migration.rejected);

        // identities first: an interrupted import is simply redone
        self.identities.save(&migration.store).await?;
        self.switches.save(&migration.file).await?;

        let count = migration.file.switches.len();
        tracing::info!(
            imported = count,
            identities = migration.actions.len(),
            "legacy momentary switches migrated"
        );
        Ok(count)
    }

    async fn reload_locked(&self) -> Result<SetupReport, MomentaryError> {
        let loaded = self.switches.load().await?;
        let validated = validate_switches(loaded.definitions);
        log_rejected(&loaded.rejected);
        log_rejected(&validated.rejected);

        let store = self.identities.load().await?;
        if !loaded.held.is_empty() {
            tracing::warn!(
                switches = ?loaded.held.switches,
                "identities of rejected switches kept until their entries load again"
            );
        }
        let reconciliation = reconcile(
            &validated.accepted,
            &loaded.held,
            &store,
            UniqueId::generate,
        );
        for action in &reconciliation.actions {
            match action {
                IdentityAction::Create { name, record } => tracing::info!(
                    name = %name,
                    unique_id = %record.unique_id,
                    entity_id = %record.entity_id,
                    "identity registered"
                ),
                IdentityAction::Delete { name, record } => tracing::info!(
                    name = %name,
                    unique_id = %record.unique_id,
                    entity_id = %record.entity_id,
                    "identity orphaned"
                ),
            }
        }
        for action in &reconciliation.device_actions {
            match action {
                DeviceAction::Create { name, record } => tracing::info!(
                    name = %name,
                    device_id = %record.device_id,
                    "device registered"
                ),
                DeviceAction::Orphan { name, record } => tracing::info!(
                    name = %name,
                    device_id = %record.device_id,
                    "device orphaned"
                ),
            }
        }
        if reconciliation.store_changed() {
            self.identities.save(&reconciliation.store).await?;
        }

        let applied = self.registry.apply(&reconciliation);
        Ok(SetupReport {
            migrated: 0,
            created: applied.created,
            removed: applied.removed,
            reconfigured: applied.reconfigured,
            rejected: loaded.rejected.len() + validated.rejected.len(),
            orphaned_devices: reconciliation.orphaned_devices().count(),
        })
    }
}

fn log_rejected(rejected: &[ConfigError]) {
    for err in rejected {
        tracing::warn!(error = %err, "switch definition rejected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::InProcessEventBus;
    use crate::manual_scheduler::ManualScheduler;
    use crate::ports::LoadedSwitches;
    use momentary_domain::duration::ToggleDuration;
    use momentary_domain::identity::IdentityStore;
    use momentary_domain::switch::{SwitchDefinition, SwitchMode, SwitchesFile};
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MemorySwitches {
        file: std::sync::Mutex<Option<SwitchesFile>>,
        rejected: Vec<ConfigError>,
        /// Names whose entries fail to load, as a typo would make them.
        broken: std::sync::Mutex<Vec<String>>,
    }

    impl MemorySwitches {
        fn with(definitions: Vec<SwitchDefinition>) -> Self {
            Self {
                file: std::sync::Mutex::new(Some(SwitchesFile::new(definitions))),
                ..Self::default()
            }
        }

        fn break_entry(&self, name: &str) {
            self.broken.lock().unwrap().push(name.to_string());
        }

        fn fix_entries(&self) {
            self.broken.lock().unwrap().clear();
        }

        fn names(&self) -> Vec<String> {
            self.file
                .lock()
                .unwrap()
                .as_ref()
                .map(|file| file.switches.iter().map(|d| d.name.clone()).collect())
                .unwrap_or_default()
        }
    }

    impl SwitchConfigStore for MemorySwitches {
        fn exists(&self) -> impl Future<Output = Result<bool, MomentaryError>> + Send {
            let exists = self.file.lock().unwrap().is_some();
            async move { Ok(exists) }
        }

        fn load(&self) -> impl Future<Output = Result<LoadedSwitches, MomentaryError>> + Send {
            let broken = self.broken.lock().unwrap().clone();
            let mut loaded = LoadedSwitches {
                rejected: self.rejected.clone(),
                ..LoadedSwitches::default()
            };
            let definitions = self
                .file
                .lock()
                .unwrap()
                .as_ref()
                .map(|file| file.switches.clone())
                .unwrap_or_default();
            for (index, definition) in definitions.into_iter().enumerate() {
                if broken.contains(&definition.name) {
                    loaded.rejected.push(ConfigError::MalformedEntry {
                        index,
                        reason: "invalid duration".to_string(),
                    });
                    loaded.held.devices.insert(definition.device_name().to_string());
                    loaded.held.switches.insert(definition.name);
                } else {
                    loaded.definitions.push(definition);
                }
            }
            async move { Ok(loaded) }
        }

        fn save(
            &self,
            file: &SwitchesFile,
        ) -> impl Future<Output = Result<(), MomentaryError>> + Send {
            *self.file.lock().unwrap() = Some(file.clone());
            async { Ok(()) }
        }
    }

    #[derive(Default)]
    struct MemoryIdentities {
        store: std::sync::Mutex<IdentityStore>,
        saves: AtomicUsize,
    }

    impl MemoryIdentities {
        fn snapshot(&self) -> IdentityStore {
            self.store.lock().unwrap().clone()
        }
    }

    impl IdentityRepository for MemoryIdentities {
        fn load(&self) -> impl Future<Output = Result<IdentityStore, MomentaryError>> + Send {
            let store = self.snapshot();
            async move { Ok(store) }
        }

        fn save(
            &self,
            store: &IdentityStore,
        ) -> impl Future<Output = Result<(), MomentaryError>> + Send {
            *self.store.lock().unwrap() = store.clone();
            self.saves.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        }
    }

    /// `None` behaves like an unreadable file.
    struct MemoryLegacy(Option<Vec<LegacySwitch>>);

    impl LegacyConfigSource for MemoryLegacy {
        fn load(&self) -> impl Future<Output = Result<Vec<LegacySwitch>, MomentaryError>> + Send {
            let entries = self.0.clone();
            async move { entries.ok_or_else(|| MomentaryError::Storage("unreadable".into())) }
        }
    }

    fn legacy_switch(name: &str) -> LegacySwitch {
        LegacySwitch {
            platform: "momentary".to_string(),
            name: name.to_string(),
            mode: None,
            toggle_for: None,
            on_for: ToggleDuration::from_millis(5_000).ok(),
            cancellable: None,
            allow_off: Some(true),
        }
    }

    type Service = SetupService<
        Arc<MemorySwitches>,
        Arc<MemoryIdentities>,
        MemoryLegacy,
        ManualScheduler,
        InProcessEventBus,
    >;

    fn service(
        switches: &Arc<MemorySwitches>,
        identities: &Arc<MemoryIdentities>,
        legacy: Option<Vec<LegacySwitch>>,
    ) -> Service {
        let registry = Arc::new(SwitchRegistry::new(
            Arc::new(ManualScheduler::new()),
            Arc::new(InProcessEventBus::new(64)),
        ));
        SetupService::new(
            Arc::clone(switches),
            Arc::clone(identities),
            MemoryLegacy(legacy),
            registry,
        )
    }

    #[tokio::test]
    async fn should_migrate_legacy_switches_when_switches_file_missing() {
        let switches = Arc::new(MemorySwitches::default());
        let identities = Arc::new(MemoryIdentities::default());
        let service = service(
            &switches,
            &identities,
            Some(vec![legacy_switch("Empty House Trigger"), legacy_switch("!Doorbell")]),
        );

        let report = service.setup().await.unwrap();
        assert_eq!(report.migrated, 2);
        assert_eq!(report.created, 2);
        assert_eq!(switches.names(), vec!["+Empty House Trigger", "Doorbell"]);

        let store = identities.snapshot();
        let record = store.get("+Empty House Trigger").unwrap();
        assert_eq!(record.unique_id, UniqueId::from_name("Empty House Trigger"));
        assert_eq!(record.entity_id, "switch.momentary_empty_house_trigger");

        let doorbell = service
            .registry()
            .find_by_entity_id("switch.doorbell")
            .unwrap();
        assert_eq!(doorbell.definition().mode, SwitchMode::On);
        assert!(doorbell.definition().cancellable);
    }

    #[tokio::test]
    async fn should_skip_migration_when_switches_file_exists() {
        let switches = Arc::new(MemorySwitches::with(vec![SwitchDefinition::new("Door")]));
        let identities = Arc::new(MemoryIdentities::default());
        let service = service(&switches, &identities, Some(vec![legacy_switch("Bell")]));

        let report = service.setup().await.unwrap();
        assert_eq!(report.migrated, 0);
        assert_eq!(report.created, 1);
        assert_eq!(switches.names(), vec!["Door"]);
        assert!(!identities.snapshot().get("Door").unwrap().unique_id.is_name_derived());

        assert!(matches!(
            service.migrate().await,
            Err(MomentaryError::Migration(MigrationError::AlreadyMigrated))
        ));
    }

    #[tokio::test]
    async fn should_continue_when_legacy_configuration_unreadable() {
        let switches = Arc::new(MemorySwitches::default());
        let identities = Arc::new(MemoryIdentities::default());
        let service = service(&switches, &identities, None);

        let report = service.setup().await.unwrap();
        assert_eq!(report, SetupReport::default());
        assert!(matches!(
            service.migrate().await,
            Err(MomentaryError::Migration(MigrationError::Unreadable(_)))
        ));
    }

    #[tokio::test]
    async fn should_report_no_legacy_switches_when_none_are_momentary() {
        let switches = Arc::new(MemorySwitches::default());
        let identities = Arc::new(MemoryIdentities::default());
        let mut other = legacy_switch("Lamp");
        other.platform = "template".to_string();
        let service = service(&switches, &identities, Some(vec![other]));

        assert!(matches!(
            service.migrate().await,
            Err(MomentaryError::Migration(MigrationError::NoLegacySwitches))
        ));
        assert!(switches.names().is_empty());
    }

    #[tokio::test]
    async fn should_produce_identical_store_when_setup_runs_twice() {
        let switches = Arc::new(MemorySwitches::default());
        let identities = Arc::new(MemoryIdentities::default());
        let legacy = Some(vec![legacy_switch("Empty House Trigger")]);

        service(&switches, &identities, legacy.clone())
            .setup()
            .await
            .unwrap();
        let first = identities.snapshot();

        let second_run = service(&switches, &identities, legacy);
        let report = second_run.setup().await.unwrap();
        assert_eq!(report.migrated, 0);
        assert_eq!(report.created, 1);
        assert_eq!(identities.snapshot(), first);
        assert_eq!(second_run.registry().len(), 1);
    }

    #[tokio::test]
    async fn should_replace_identity_when_switch_renamed() {
        let switches = Arc::new(MemorySwitches::with(vec![SwitchDefinition::new("Door")]));
        let identities = Arc::new(MemoryIdentities::default());
        let service = service(&switches, &identities, None);
        service.setup().await.unwrap();
        let old_id = identities.snapshot().get("Door").unwrap().unique_id.clone();

        *switches.file.lock().unwrap() = Some(SwitchesFile::new(vec![SwitchDefinition::new(
            "Front Door",
        )]));
        let report = service.reload().await.unwrap();

        assert_eq!(report.created, 1);
        assert_eq!(report.removed, 1);
        let store = identities.snapshot();
        assert!(store.get("Door").is_none());
        assert_ne!(store.get("Front Door").unwrap().unique_id, old_id);
        assert!(matches!(
            service.registry().get(&old_id),
            Err(MomentaryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn should_keep_migrated_identity_across_a_broken_reload() {
        let switches = Arc::new(MemorySwitches::default());
        let identities = Arc::new(MemoryIdentities::default());
        let service = service(
            &switches,
            &identities,
            Some(vec![legacy_switch("Empty House Trigger")]),
        );
        service.setup().await.unwrap();
        let migrated = identities.snapshot();
        let unique_id = UniqueId::from_name("Empty House Trigger");
        assert!(service.registry().get(&unique_id).is_ok());

        switches.break_entry("+Empty House Trigger");
        let report = service.reload().await.unwrap();
        assert_eq!(report.rejected, 1);
        assert_eq!(report.removed, 1);
        assert_eq!(report.orphaned_devices, 0);
        assert_eq!(identities.snapshot(), migrated);

        switches.fix_entries();
        let report = service.reload().await.unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(identities.snapshot(), migrated);
        let entity = service.registry().get(&unique_id).unwrap();
        assert_eq!(entity.entity_id(), "switch.momentary_empty_house_trigger");
    }

    #[tokio::test]
    async fn should_report_orphaned_device_when_group_emptied() {
        let switches = Arc::new(MemorySwitches::with(vec![
            SwitchDefinition::new("Door").with_device("Hallway"),
            SwitchDefinition::new("Bell").with_device("Hallway"),
        ]));
        let identities = Arc::new(MemoryIdentities::default());
        let service = service(&switches, &identities, None);
        service.setup().await.unwrap();
        assert_eq!(identities.snapshot().devices.len(), 1);

        *switches.file.lock().unwrap() = Some(SwitchesFile::new(vec![
            SwitchDefinition::new("Door"),
            SwitchDefinition::new("Bell"),
        ]));
        let report = service.reload().await.unwrap();
        assert_eq!(report.orphaned_devices, 1);
        assert_eq!(report.reconfigured, 2);
        let store = identities.snapshot();
        assert!(store.device("Hallway").is_none());
        assert!(store.device("Door").is_some());
    }

    #[tokio::test]
    async fn should_not_write_identity_store_when_nothing_changed() {
        let switches = Arc::new(MemorySwitches::with(vec![SwitchDefinition::new("Door")]));
        let identities = Arc::new(MemoryIdentities::default());
        let service = service(&switches, &identities, None);
        service.setup().await.unwrap();
        assert_eq!(identities.saves.load(Ordering::SeqCst), 1);

        let report = service.reload().await.unwrap();
        assert_eq!(report, SetupReport::default());
        assert_eq!(identities.saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn should_count_rejected_entries_and_load_the_rest() {
        let switches = Arc::new(MemorySwitches {
            file: std::sync::Mutex::new(Some(SwitchesFile::new(vec![
                SwitchDefinition::new("Door"),
                SwitchDefinition::new("Door"),
                SwitchDefinition::new("Bell"),
            ]))),
            rejected: vec![ConfigError::InvalidDuration("0".to_string())],
            ..MemorySwitches::default()
        });
        let identities = Arc::new(MemoryIdentities::default());
        let service = service(&switches, &identities, None);

        let report = service.setup().await.unwrap();
        assert_eq!(report.rejected, 2);
        assert_eq!(report.created, 2);
        assert_eq!(identities.snapshot().len(), 2);
    }
}
