//! Switch definitions: what the user writes in the switches file.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::duration::ToggleDuration;
use crate::error::ConfigError;
use crate::id::DOMAIN;
use crate::slug::slugify;

/// Current version of the switches file layout.
pub const SWITCHES_FILE_VERSION: u32 = 1;

/// Marker asking for the integration prefix on the entity id.
pub const PREFIX_MARKER: char = '+';

/// Which state the switch jumps to when activated.
///
/// The resting state is always the opposite one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SwitchMode {
    #[default]
    On,
    Off,
}

impl SwitchMode {
    /// `is_on` value while the switch is in its timed state.
    #[must_use]
    pub fn timed_state(self) -> bool {
        matches!(self, Self::On)
    }

    /// `is_on` value while the switch rests.
    #[must_use]
    pub fn idle_state(self) -> bool {
        !self.timed_state()
    }
}

impl fmt::Display for SwitchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::On => f.write_str("on"),
            Self::Off => f.write_str("off"),
        }
    }
}

impl std::str::FromStr for SwitchMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" | "true" | "yes" => Ok(Self::On),
            "off" | "false" | "no" => Ok(Self::Off),
            _ => Err(ConfigError::InvalidMode(s.to_string())),
        }
    }
}

impl Serialize for SwitchMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SwitchMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bool(bool),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Bool(true) => Ok(Self::On),
            Raw::Bool(false) => Ok(Self::Off),
            Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// What a second activation does while the switch is already timed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetriggerPolicy {
    /// Keep the pending reversion as it is.
    #[default]
    Ignore,
    /// Cancel the pending reversion and start a fresh delay.
    Restart,
}

impl RetriggerPolicy {
    fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// One momentary switch as configured by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SwitchDefinition {
    /// Configured name, possibly carrying the [`PREFIX_MARKER`].
    pub name: String,
    #[serde(default)]
    pub mode: SwitchMode,
    #[serde(default)]
    pub toggle_for: ToggleDuration,
    #[serde(default)]
    pub cancellable: bool,
    #[serde(default, skip_serializing_if = "RetriggerPolicy::is_default")]
    pub retrigger: RetriggerPolicy,
    /// Group the switch was listed under, if any.
    #[serde(skip)]
    pub device: Option<String>,
}

impl SwitchDefinition {
    /// Definition with defaults for everything but the name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: SwitchMode::default(),
            toggle_for: ToggleDuration::default(),
            cancellable: false,
            retrigger: RetriggerPolicy::default(),
            device: None,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: SwitchMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_toggle_for(mut self, toggle_for: ToggleDuration) -> Self {
        self.toggle_for = toggle_for;
        self
    }

    #[must_use]
    pub fn with_cancellable(mut self, cancellable: bool) -> Self {
        self.cancellable = cancellable;
        self
    }

    #[must_use]
    pub fn with_retrigger(mut self, retrigger: RetriggerPolicy) -> Self {
        self.retrigger = retrigger;
        self
    }

    #[must_use]
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Device the switch is attached to: its group, or a device of its own
    /// named after the switch.
    #[must_use]
    pub fn device_name(&self) -> &str {
        self.device.as_deref().unwrap_or(&self.name)
    }

    /// Whether the entity id gets the integration prefix.
    #[must_use]
    pub fn wants_prefix(&self) -> bool {
        self.name.starts_with(PREFIX_MARKER)
    }

    /// Name shown to users, without the prefix marker.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.strip_prefix(PREFIX_MARKER).unwrap_or(&self.name)
    }

    /// Entity id derived from the name: `switch.<slug>` or
    /// `switch.momentary_<slug>` when the prefix marker is present.
    #[must_use]
    pub fn entity_id(&self) -> String {
        let slug = slugify(self.display_name());
        if self.wants_prefix() {
            format!("switch.{DOMAIN}_{slug}")
        } else {
            format!("switch.{slug}")
        }
    }

    /// Check the invariants that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyName`] if the display name is blank.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.display_name().trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        Ok(())
    }
}

/// The versioned switches file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchesFile {
    pub version: u32,
    #[serde(default)]
    pub switches: Vec<SwitchDefinition>,
}

impl Default for SwitchesFile {
    fn default() -> Self {
        Self {
            version: SWITCHES_FILE_VERSION,
            switches: Vec::new(),
        }
    }
}

impl SwitchesFile {
    /// Wrap definitions in the current file version.
    #[must_use]
    pub fn new(switches: Vec<SwitchDefinition>) -> Self {
        Self {
            version: SWITCHES_FILE_VERSION,
            switches,
        }
    }
}

/// Definitions that survived validation plus the reasons others did not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatedSwitches {
    pub accepted: Vec<SwitchDefinition>,
    pub rejected: Vec<ConfigError>,
}

/// Validate each definition on its own and drop duplicates.
///
/// The first definition of a name wins; later ones are rejected. Order of
/// the accepted definitions is preserved.
#[must_use]
pub fn validate_switches(definitions: Vec<SwitchDefinition>) -> ValidatedSwitches {
    let mut seen = HashSet::new();
    let mut result = ValidatedSwitches::default();

    for definition in definitions {
        if let Err(err) = definition.validate() {
            result.rejected.push(err);
            continue;
        }
        if !seen.insert(definition.name.clone()) {
            result
                .rejected
                .push(ConfigError::DuplicateName(definition.name));
            continue;
        }
        result.accepted.push(definition);
    }

    result
}
