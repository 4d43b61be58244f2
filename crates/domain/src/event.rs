//! Switch events: immutable records of something that happened to a switch.

use serde::{Deserialize, Serialize};

use crate::id::{EventId, UniqueId};
use crate::time::{Timestamp, now};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchEventKind {
    Created,
    StateChanged,
    Removed,
}

/// A published switch event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchEvent {
    pub id: EventId,
    pub kind: SwitchEventKind,
    pub unique_id: UniqueId,
    pub entity_id: String,
    pub is_on: bool,
    pub timestamp: Timestamp,
}

impl SwitchEvent {
    /// Create an event stamped with the current time.
    #[must_use]
    pub fn new(
        kind: SwitchEventKind,
        unique_id: UniqueId,
        entity_id: impl Into<String>,
        is_on: bool,
    ) -> Self {
        Self {
            id: EventId::new(),
            kind,
            unique_id,
            entity_id: entity_id.into(),
            is_on,
            timestamp: now(),
        }
    }
}
