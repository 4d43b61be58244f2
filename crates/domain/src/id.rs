//! Identifiers.
//!
//! [`UniqueId`] is the stable identity the host uses to correlate a switch
//! across restarts. Switches imported from the legacy platform configuration
//! keep an id derived from their name; every switch created afterwards gets
//! a generated UUID.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::slug::slugify;

/// Integration domain, used as suffix of generated ids and entity id prefix.
pub const DOMAIN: &str = "momentary";

/// Stable identity of a switch.
///
/// Serialized as a plain string: name-derived ids are the slug itself,
/// generated ids are `"<uuid>.momentary"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum UniqueId {
    NameDerived(String),
    Generated(uuid::Uuid),
}

impl UniqueId {
    /// Generate a fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        Self::Generated(uuid::Uuid::new_v4())
    }

    /// Derive the legacy id for `name` (already stripped of markers).
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        Self::NameDerived(slugify(name))
    }

    /// Whether this id was carried over from the legacy scheme.
    #[must_use]
    pub fn is_name_derived(&self) -> bool {
        matches!(self, Self::NameDerived(_))
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NameDerived(slug) => f.write_str(slug),
            Self::Generated(uuid) => write!(f, "{uuid}.{DOMAIN}"),
        }
    }
}

/// A unique id string was empty.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unique id must not be empty")]
pub struct EmptyUniqueId;

impl FromStr for UniqueId {
    type Err = EmptyUniqueId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(EmptyUniqueId);
        }
        let generated = s
            .strip_suffix(DOMAIN)
            .and_then(|rest| rest.strip_suffix('.'))
            .and_then(|uuid| uuid::Uuid::parse_str(uuid).ok());
        Ok(generated.map_or_else(|| Self::NameDerived(s.to_string()), Self::Generated))
    }
}

impl TryFrom<String> for UniqueId {
    type Error = EmptyUniqueId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<UniqueId> for String {
    fn from(value: UniqueId) -> Self {
        value.to_string()
    }
}

/// Unique identifier for a [`SwitchEvent`](crate::event::SwitchEvent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(uuid::Uuid);

impl Default for EventId {
    fn default() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl EventId {
    /// Generate a new random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
