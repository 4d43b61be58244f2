//! One-time import of legacy platform-style switches.
//!
//! Before the versioned switches file existed, switches were listed under
//! the host's `switch:` key with `platform: momentary`. A leading `!` on the
//! name suppressed the integration prefix on the entity id. Imported
//! switches keep the name-derived unique id they always had so the host
//! keeps correlating them with their history; the `!` marker is rewritten
//! into the new `+` marker (with inverted meaning).
//!
//! Legacy `mode` was read the other way round from what its values suggest:
//! `old` (the default) and `off` pulse the switch on from a resting off,
//! while any other value, `on` included, pulses it off from a resting on.

use serde::{Deserialize, Deserializer};

use crate::duration::ToggleDuration;
use crate::error::ConfigError;
use crate::id::{DOMAIN, UniqueId};
use crate::identity::{DeviceRecord, IdentityAction, IdentityRecord, IdentityStore};
use crate::slug::slugify;
use crate::switch::{PREFIX_MARKER, SwitchDefinition, SwitchMode, SwitchesFile, validate_switches};

/// Legacy marker: do not prefix the entity id.
pub const NO_PREFIX_MARKER: char = '!';

/// Legacy modes that pulse the switch on.
const LEGACY_PULSE_ON_MODES: [&str; 2] = ["old", "off"];

/// A legacy `switch:` entry. Unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LegacySwitch {
    pub platform: String,
    pub name: String,
    #[serde(default, deserialize_with = "legacy_mode")]
    pub mode: Option<SwitchMode>,
    #[serde(default)]
    pub toggle_for: Option<ToggleDuration>,
    #[serde(default)]
    pub on_for: Option<ToggleDuration>,
    #[serde(default)]
    pub cancellable: Option<bool>,
    #[serde(default)]
    pub allow_off: Option<bool>,
}

impl LegacySwitch {
    /// Whether the entry belongs to this integration.
    #[must_use]
    pub fn is_momentary(&self) -> bool {
        self.platform == DOMAIN
    }

    /// Name without the legacy marker.
    #[must_use]
    pub fn bare_name(&self) -> &str {
        self.name
            .strip_prefix(NO_PREFIX_MARKER)
            .unwrap_or(&self.name)
    }

    /// Name in the new scheme: `!Name` becomes `Name`, `Name` becomes `+Name`.
    #[must_use]
    pub fn migrated_name(&self) -> String {
        match self.name.strip_prefix(NO_PREFIX_MARKER) {
            Some(bare) => bare.to_string(),
            None => format!("{PREFIX_MARKER}{}", self.name),
        }
    }

    /// The unique id the legacy platform registered this switch with.
    #[must_use]
    pub fn legacy_unique_id(&self) -> UniqueId {
        UniqueId::from_name(self.bare_name())
    }

    /// The entity id the legacy platform registered this switch with.
    #[must_use]
    pub fn legacy_entity_id(&self) -> String {
        let slug = slugify(self.bare_name());
        if self.name.starts_with(NO_PREFIX_MARKER) {
            format!("switch.{slug}")
        } else {
            format!("switch.{DOMAIN}_{slug}")
        }
    }

    /// The device id the import registers for this switch.
    #[must_use]
    pub fn legacy_device_id(&self) -> UniqueId {
        UniqueId::from_name(self.bare_name())
    }

    /// Equivalent definition in the new scheme.
    #[must_use]
    pub fn to_definition(&self) -> SwitchDefinition {
        SwitchDefinition::new(self.migrated_name())
            .with_mode(self.mode.unwrap_or_default())
            .with_toggle_for(self.toggle_for.or(self.on_for).unwrap_or_default())
            .with_cancellable(self.cancellable.or(self.allow_off).unwrap_or(false))
    }
}

fn legacy_mode<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<SwitchMode>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Text(String),
    }

    let mode = match Option::<Raw>::deserialize(deserializer)? {
        None => return Ok(None),
        // YAML 1.1 hosts read a bare `off` as false
        Some(Raw::Bool(false)) => SwitchMode::On,
        Some(Raw::Bool(true)) => SwitchMode::Off,
        Some(Raw::Text(text)) => {
            let text = text.trim();
            if LEGACY_PULSE_ON_MODES
                .iter()
                .any(|mode| text.eq_ignore_ascii_case(mode))
            {
                SwitchMode::On
            } else {
                SwitchMode::Off
            }
        }
    };
    Ok(Some(mode))
}

/// Output of [`migrate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// New versioned switches file.
    pub file: SwitchesFile,
    /// Identity store including the imported identities.
    pub store: IdentityStore,
    /// Identities registered by this import.
    pub actions: Vec<IdentityAction>,
    /// Legacy entries that could not be imported.
    pub rejected: Vec<ConfigError>,
}

/// Translate legacy entries into the new scheme.
///
/// Entries of other platforms are skipped. Identities already present in
/// `existing` are left untouched, so running the import again over its own
/// output changes nothing.
#[must_use]
pub fn migrate(legacy: &[LegacySwitch], existing: &IdentityStore) -> Migration {
    let candidates: Vec<&LegacySwitch> = legacy
        .iter()
        .filter(|entry| entry.is_momentary())
        .collect();

    let validated = validate_switches(
        candidates
            .iter()
            .map(|entry| entry.to_definition())
            .collect(),
    );

    let mut store = existing.clone();
    let mut actions = Vec::new();

    for definition in &validated.accepted {
        let Some(entry) = candidates
            .iter()
            .find(|entry| entry.migrated_name() == definition.name)
        else {
            continue;
        };
        store
            .devices
            .entry(definition.name.clone())
            .or_insert_with(|| DeviceRecord {
                device_id: entry.legacy_device_id(),
            });
        if store.switches.contains_key(&definition.name) {
            continue;
        }
        let record = IdentityRecord {
            unique_id: entry.legacy_unique_id(),
            entity_id: entry.legacy_entity_id(),
        };
        store
            .switches
            .insert(definition.name.clone(), record.clone());
        actions.push(IdentityAction::Create {
            name: definition.name.clone(),
            record,
        });
    }

    Migration {
        file: SwitchesFile::new(validated.accepted),
        store,
        actions,
        rejected: validated.rejected,
    }
}
