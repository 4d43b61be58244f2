//! Identity records and reload reconciliation.
//!
//! The identity store maps each configured switch name to the unique id and
//! entity id it was registered with. It is read on every setup/reload and
//! only ever grows by creation or shrinks by deletion: a record is never
//! edited in place. Renaming a switch therefore deletes the old identity and
//! creates a new one.
//!
//! Devices are tracked the same way: every switch hangs off a device, either
//! the group it is listed under or one named after the switch itself. A
//! device no longer referenced by any switch is orphaned.
//!
//! A switch whose entry fails to load is not "gone": its name is held, and
//! its identity survives until the entry is fixed or deleted.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::id::UniqueId;
use crate::switch::SwitchDefinition;

/// Current version of the identity store layout.
pub const IDENTITY_STORE_VERSION: u32 = 1;

/// Identity of one switch as seen by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub unique_id: UniqueId,
    pub entity_id: String,
}

/// Identity of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub device_id: UniqueId,
}

/// Persisted mapping from configured name to identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityStore {
    pub version: u32,
    #[serde(default)]
    pub devices: BTreeMap<String, DeviceRecord>,
    #[serde(default)]
    pub switches: BTreeMap<String, IdentityRecord>,
}

impl Default for IdentityStore {
    fn default() -> Self {
        Self {
            version: IDENTITY_STORE_VERSION,
            devices: BTreeMap::new(),
            switches: BTreeMap::new(),
        }
    }
}

impl IdentityStore {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&IdentityRecord> {
        self.switches.get(name)
    }

    #[must_use]
    pub fn device(&self, name: &str) -> Option<&DeviceRecord> {
        self.devices.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.switches.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.switches.is_empty()
    }
}

/// A change to the set of registered identities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityAction {
    Create { name: String, record: IdentityRecord },
    Delete { name: String, record: IdentityRecord },
}

impl IdentityAction {
    #[must_use]
    pub fn record(&self) -> &IdentityRecord {
        match self {
            Self::Create { record, .. } | Self::Delete { record, .. } => record,
        }
    }
}

/// A change to the set of registered devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceAction {
    Create { name: String, record: DeviceRecord },
    Orphan { name: String, record: DeviceRecord },
}

/// Names still present in the switches file whose entries failed to load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeldNames {
    pub switches: BTreeSet<String>,
    pub devices: BTreeSet<String>,
}

impl HeldNames {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.switches.is_empty() && self.devices.is_empty()
    }
}

/// A definition paired with its identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSwitch {
    pub unique_id: UniqueId,
    pub entity_id: String,
    pub device_id: UniqueId,
    pub definition: SwitchDefinition,
}

/// Output of [`reconcile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Store to persist.
    pub store: IdentityStore,
    /// Every definition with its identity, in configuration order.
    pub switches: Vec<ResolvedSwitch>,
    /// Identities created or orphaned by this pass.
    pub actions: Vec<IdentityAction>,
    /// Devices created or orphaned by this pass.
    pub device_actions: Vec<DeviceAction>,
}

impl Reconciliation {
    /// Whether the store needs to be written back.
    #[must_use]
    pub fn store_changed(&self) -> bool {
        !self.actions.is_empty() || !self.device_actions.is_empty()
    }

    /// Devices no switch refers to any more.
    pub fn orphaned_devices(&self) -> impl Iterator<Item = (&str, &DeviceRecord)> {
        self.device_actions.iter().filter_map(|action| match action {
            DeviceAction::Orphan { name, record } => Some((name.as_str(), record)),
            DeviceAction::Create { .. } => None,
        })
    }
}

/// Match `definitions` against `store` by name.
///
/// Known names keep their record. Unknown names get a fresh id from
/// `generate` and a [`IdentityAction::Create`]. Records whose name is no
/// longer configured are dropped with a [`IdentityAction::Delete`], unless
/// the name is in `held`. Devices follow the same rules.
/// Definitions must already be free of duplicate names.
pub fn reconcile(
    definitions: &[SwitchDefinition],
    held: &HeldNames,
    store: &IdentityStore,
    mut generate: impl FnMut() -> UniqueId,
) -> Reconciliation {
    let mut remaining = store.switches.clone();
    let mut remaining_devices = store.devices.clone();
    let mut next = IdentityStore::default();
    let mut switches = Vec::with_capacity(definitions.len());
    let mut actions = Vec::new();
    let mut device_actions = Vec::new();

    for definition in definitions {
        let device_name = definition.device_name();
        let device = if let Some(device) = next.devices.get(device_name) {
            device.clone()
        } else {
            let device = remaining_devices.remove(device_name).unwrap_or_else(|| {
                let record = DeviceRecord {
                    device_id: generate(),
                };
                device_actions.push(DeviceAction::Create {
                    name: device_name.to_string(),
                    record: record.clone(),
                });
                record
            });
            next.devices.insert(device_name.to_string(), device.clone());
            device
        };

        let record = if let Some(record) = remaining.remove(&definition.name) {
            record
        } else {
            let record = IdentityRecord {
                unique_id: generate(),
                entity_id: definition.entity_id(),
            };
            actions.push(IdentityAction::Create {
                name: definition.name.clone(),
                record: record.clone(),
            });
            record
        };

        switches.push(ResolvedSwitch {
            unique_id: record.unique_id.clone(),
            entity_id: record.entity_id.clone(),
            device_id: device.device_id,
            definition: definition.clone(),
        });
        next.switches.insert(definition.name.clone(), record);
    }

    for (name, record) in remaining {
        if held.switches.contains(&name) {
            next.switches.insert(name, record);
        } else {
            actions.push(IdentityAction::Delete { name, record });
        }
    }
    for (name, record) in remaining_devices {
        if held.devices.contains(&name) {
            next.devices.insert(name, record);
        } else {
            device_actions.push(DeviceAction::Orphan { name, record });
        }
    }

    Reconciliation {
        store: next,
        switches,
        actions,
        device_actions,
    }
}
