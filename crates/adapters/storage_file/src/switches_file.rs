//! YAML implementation of [`SwitchConfigStore`].
//!
//! Each item of `switches` is either a single switch (`- name: Door`) or a
//! group of switches sharing one device (`- Hallway: [{name: Door}, ...]`).

use std::future::Future;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::Value;

use momentary_app::ports::{LoadedSwitches, SwitchConfigStore};
use momentary_domain::error::{ConfigError, MomentaryError};
use momentary_domain::switch::{SWITCHES_FILE_VERSION, SwitchDefinition, SwitchesFile};

use crate::error::StorageError;
use crate::fs::{read_optional, write_atomic};

const NAME_KEY: &str = "name";

/// File layout before the entries are looked at.
#[derive(Deserialize)]
struct RawSwitchesFile {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    switches: Vec<Value>,
}

fn default_version() -> u32 {
    SWITCHES_FILE_VERSION
}

/// Switches file stored as YAML on disk.
pub struct YamlSwitchConfigStore {
    path: PathBuf,
}

impl YamlSwitchConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parse a switches document, one entry at a time.
///
/// # Errors
///
/// Returns [`ConfigError::UnsupportedVersion`] for an unknown layout, or a
/// YAML error when the document itself is not a switches file.
pub fn parse_switches(contents: &str) -> Result<LoadedSwitches, MomentaryError> {
    if contents.trim().is_empty() {
        return Ok(LoadedSwitches::default());
    }
    let document: Value = serde_yaml::from_str(contents).map_err(StorageError::from)?;
    if document.is_null() {
        return Ok(LoadedSwitches::default());
    }
    let raw: RawSwitchesFile = serde_yaml::from_value(document).map_err(StorageError::from)?;
    if raw.version != SWITCHES_FILE_VERSION {
        return Err(ConfigError::UnsupportedVersion(raw.version).into());
    }

    let mut loaded = LoadedSwitches::default();
    for (index, entry) in raw.switches.iter().enumerate() {
        if let Some((device, members)) = as_group(entry) {
            for (position, member) in members.iter().enumerate() {
                parse_entry(index, member, Some((device, position)), &mut loaded);
            }
        } else {
            parse_entry(index, entry, None, &mut loaded);
        }
    }
    Ok(loaded)
}

/// `Some` for a `{<device>: [switches]}` item.
fn as_group(entry: &Value) -> Option<(&str, &[Value])> {
    let Value::Mapping(mapping) = entry else {
        return None;
    };
    if mapping.contains_key(NAME_KEY) || mapping.len() != 1 {
        return None;
    }
    let (device, members) = mapping.iter().next()?;
    Some((device.as_str()?, members.as_sequence()?.as_slice()))
}

fn parse_entry(
    index: usize,
    entry: &Value,
    group: Option<(&str, usize)>,
    loaded: &mut LoadedSwitches,
) {
    match serde_yaml::from_value::<SwitchDefinition>(entry.clone()) {
        Ok(definition) => loaded.definitions.push(match group {
            Some((device, _)) => definition.with_device(device),
            None => definition,
        }),
        Err(err) => {
            if let Some(name) = entry.get(NAME_KEY).and_then(Value::as_str) {
                let device = group.map_or(name, |(device, _)| device);
                loaded.held.devices.insert(device.to_string());
                loaded.held.switches.insert(name.to_string());
            }
            let reason = match group {
                Some((device, position)) => format!("{device:?} #{position}: {err}"),
                None => err.to_string(),
            };
            loaded
                .rejected
                .push(ConfigError::MalformedEntry { index, reason });
        }
    }
}

impl SwitchConfigStore for YamlSwitchConfigStore {
    fn exists(&self) -> impl Future<Output = Result<bool, MomentaryError>> + Send {
        let path = self.path.clone();
        async move {
            let exists = tokio::fs::try_exists(&path)
                .await
                .map_err(StorageError::from)?;
            Ok(exists)
        }
    }

    fn load(&self) -> impl Future<Output = Result<LoadedSwitches, MomentaryError>> + Send {
        let path = self.path.clone();
        async move {
            let Some(contents) = read_optional(&path).await? else {
                tracing::debug!(path = %path.display(), "no switches file, nothing to load");
                return Ok(LoadedSwitches::default());
            };
            let loaded = parse_switches(&contents)?;
            tracing::debug!(
                path = %path.display(),
                accepted = loaded.definitions.len(),
                rejected = loaded.rejected.len(),
                "switches file loaded"
            );
            Ok(loaded)
        }
    }

    fn save(&self, file: &SwitchesFile) -> impl Future<Output = Result<(), MomentaryError>> + Send {
        let path = self.path.clone();
        let contents = serde_yaml::to_string(file);
        async move {
            let contents = contents.map_err(StorageError::from)?;
            write_atomic(&path, &contents).await?;
            tracing::debug!(path = %path.display(), "switches file written");
            Ok(())
        }
    }
}
