//! YAML implementation of [`LegacyConfigSource`].
//!
//! The host configuration is a large document full of host-specific tags
//! (`!include`, `!secret`, ...). Only the `switch` blocks are looked at, and
//! any tagged value among them is skipped.

use std::future::Future;
use std::path::{Path, PathBuf};

use serde_yaml::Value;

use momentary_app::ports::LegacyConfigSource;
use momentary_domain::error::MomentaryError;
use momentary_domain::id::DOMAIN;
use momentary_domain::migration::LegacySwitch;

use crate::error::StorageError;
use crate::fs::read_optional;

const SWITCH_KEY: &str = "switch";

/// Reads legacy switch entries out of the host's main configuration.
pub struct YamlLegacySource {
    path: PathBuf,
}

impl YamlLegacySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Every parseable entry under `switch` (and `switch <label>`) keys.
///
/// # Errors
///
/// Returns a YAML error when the document cannot be parsed at all.
pub fn parse_legacy(contents: &str) -> Result<Vec<LegacySwitch>, MomentaryError> {
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }
    let document: Value = serde_yaml::from_str(contents).map_err(StorageError::from)?;
    let Value::Mapping(root) = document else {
        return Ok(Vec::new());
    };

    let mut entries = Vec::new();
    for (key, block) in &root {
        let Some(key) = key.as_str() else {
            continue;
        };
        if !is_switch_key(key) {
            continue;
        }
        match block {
            Value::Sequence(items) => {
                entries.extend(items.iter().filter_map(|item| parse_entry(key, item)));
            }
            Value::Mapping(_) => entries.extend(parse_entry(key, block)),
            Value::Tagged(tagged) => {
                tracing::warn!(key, tag = %tagged.tag, "tagged switch block skipped");
            }
            _ => {}
        }
    }
    Ok(entries)
}

fn is_switch_key(key: &str) -> bool {
    key == SWITCH_KEY
        || key
            .strip_prefix(SWITCH_KEY)
            .is_some_and(|rest| rest.starts_with(' '))
}

fn parse_entry(key: &str, item: &Value) -> Option<LegacySwitch> {
    if let Value::Tagged(tagged) = item {
        tracing::warn!(key, tag = %tagged.tag, "tagged switch entry skipped");
        return None;
    }
    match serde_yaml::from_value::<LegacySwitch>(item.clone()) {
        Ok(entry) => Some(entry),
        Err(err) => {
            let platform = item.get("platform").and_then(Value::as_str);
            if platform == Some(DOMAIN) {
                tracing::warn!(key, error = %err, "legacy momentary switch skipped");
            } else {
                tracing::debug!(key, ?platform, "unrelated switch entry skipped");
            }
            None
        }
    }
}

impl LegacyConfigSource for YamlLegacySource {
    fn load(&self) -> impl Future<Output = Result<Vec<LegacySwitch>, MomentaryError>> + Send {
        let path = self.path.clone();
        async move {
            let Some(contents) = read_optional(&path).await? else {
                tracing::debug!(path = %path.display(), "no host configuration");
                return Ok(Vec::new());
            };
            parse_legacy(&contents)
        }
    }
}
