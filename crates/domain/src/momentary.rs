//! The timed-toggle state machine of a single momentary switch.
//!
//! The machine is pure: it never touches a clock or a timer. Every
//! transition returns an [`Outcome`] telling the caller which reversion to
//! schedule or cancel. Reversions are tagged with a [`Generation`]; an
//! expiry for any generation other than the pending one is stale and does
//! nothing, which is what keeps a late timer from flipping the switch a
//! second time.
//!
//! ```text
//!            activate / turn toward timed state
//!   Idle  ─────────────────────────────────────▶  Active
//!     ▲                                             │
//!     └──── expire(pending) | cancel (cancellable) ─┘
//! ```

use std::time::Duration;

use chrono::TimeDelta;
use serde::Serialize;

use crate::duration::ToggleDuration;
use crate::error::RemovedError;
use crate::id::UniqueId;
use crate::switch::{RetriggerPolicy, SwitchDefinition, SwitchMode};
use crate::time::Timestamp;

/// Identifies one scheduled reversion.
pub type Generation = u64;

/// Where the switch is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Active { generation: Generation, until: Timestamp },
    Removed,
}

/// A reversion the caller must schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reversion {
    pub generation: Generation,
    pub delay: Duration,
}

/// Result of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing changed, no timer work to do.
    Unchanged,
    /// Idle → Active; schedule the reversion.
    Activated(Reversion),
    /// Still Active; cancel the old reversion and schedule the new one.
    Restarted {
        cancelled: Generation,
        next: Reversion,
    },
    /// Active → Idle. `cancelled` is set when a pending reversion must be
    /// dropped (manual cancel), `None` when the reversion itself fired.
    Reverted { cancelled: Option<Generation> },
}

impl Outcome {
    /// Whether the observable `is_on` value changed.
    #[must_use]
    pub fn changed_state(&self) -> bool {
        matches!(self, Self::Activated(_) | Self::Reverted { .. })
    }
}

/// Read-only view of a switch, as exposed to the outside world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchSnapshot {
    pub unique_id: UniqueId,
    pub entity_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<UniqueId>,
    pub name: String,
    pub is_on: bool,
    pub idle_state: bool,
    pub timed_state: bool,
    pub toggle_until: Option<Timestamp>,
    pub last_changed: Timestamp,
    pub mode: SwitchMode,
    pub toggle_for: ToggleDuration,
    pub cancellable: bool,
}

/// Runtime state of one momentary switch.
#[derive(Debug, Clone)]
pub struct MomentarySwitch {
    definition: SwitchDefinition,
    phase: Phase,
    last_generation: Generation,
    last_changed: Timestamp,
}

impl MomentarySwitch {
    /// A fresh switch, resting.
    #[must_use]
    pub fn new(definition: SwitchDefinition, now: Timestamp) -> Self {
        Self {
            definition,
            phase: Phase::Idle,
            last_generation: 0,
            last_changed: now,
        }
    }

    #[must_use]
    pub fn definition(&self) -> &SwitchDefinition {
        &self.definition
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn last_changed(&self) -> Timestamp {
        self.last_changed
    }

    /// Observable switch state.
    #[must_use]
    pub fn is_on(&self) -> bool {
        match self.phase {
            Phase::Active { .. } => self.definition.mode.timed_state(),
            Phase::Idle | Phase::Removed => self.definition.mode.idle_state(),
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.phase, Phase::Active { .. })
    }

    /// Generation of the pending reversion, if any.
    #[must_use]
    pub fn pending(&self) -> Option<Generation> {
        match self.phase {
            Phase::Active { generation, .. } => Some(generation),
            Phase::Idle | Phase::Removed => None,
        }
    }

    /// When the pending reversion is due.
    #[must_use]
    pub fn toggle_until(&self) -> Option<Timestamp> {
        match self.phase {
            Phase::Active { until, .. } => Some(until),
            Phase::Idle | Phase::Removed => None,
        }
    }

    /// Describe the switch under the given identity.
    #[must_use]
    pub fn snapshot(&self, unique_id: &UniqueId, entity_id: &str) -> SwitchSnapshot {
        SwitchSnapshot {
            unique_id: unique_id.clone(),
            entity_id: entity_id.to_string(),
            device_id: None,
            name: self.definition.display_name().to_string(),
            is_on: self.is_on(),
            idle_state: self.definition.mode.idle_state(),
            timed_state: self.definition.mode.timed_state(),
            toggle_until: self.toggle_until(),
            last_changed: self.last_changed,
            mode: self.definition.mode,
            toggle_for: self.definition.toggle_for,
            cancellable: self.definition.cancellable,
        }
    }

    /// Enter the timed state.
    ///
    /// While already Active the [`RetriggerPolicy`] decides between leaving
    /// the pending reversion alone and restarting it.
    ///
    /// # Errors
    ///
    /// Returns [`RemovedError`] once the switch has been removed.
    pub fn activate(&mut self, now: Timestamp) -> Result<Outcome, RemovedError> {
        match self.phase {
            Phase::Removed => Err(self.removed()),
            Phase::Idle => {
                let next = self.arm(now);
                self.last_changed = now;
                Ok(Outcome::Activated(next))
            }
            Phase::Active { generation, .. } => match self.definition.retrigger {
                RetriggerPolicy::Ignore => Ok(Outcome::Unchanged),
                RetriggerPolicy::Restart => Ok(Outcome::Restarted {
                    cancelled: generation,
                    next: self.arm(now),
                }),
            },
        }
    }

    /// Manually return to the resting state.
    ///
    /// Only cancellable switches honour this; otherwise the pending
    /// reversion keeps its original firing time.
    ///
    /// # Errors
    ///
    /// Returns [`RemovedError`] once the switch has been removed.
    pub fn cancel(&mut self, now: Timestamp) -> Result<Outcome, RemovedError> {
        match self.phase {
            Phase::Removed => Err(self.removed()),
            Phase::Idle => Ok(Outcome::Unchanged),
            Phase::Active { generation, .. } => {
                if !self.definition.cancellable {
                    return Ok(Outcome::Unchanged);
                }
                self.phase = Phase::Idle;
                self.last_changed = now;
                Ok(Outcome::Reverted {
                    cancelled: Some(generation),
                })
            }
        }
    }

    /// Request `is_on == on`: an activation when that is the timed state,
    /// a cancellation otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`RemovedError`] once the switch has been removed.
    pub fn request(&mut self, on: bool, now: Timestamp) -> Result<Outcome, RemovedError> {
        if on == self.definition.mode.timed_state() {
            self.activate(now)
        } else {
            self.cancel(now)
        }
    }

    /// # Errors
    ///
    /// Returns [`RemovedError`] once the switch has been removed.
    pub fn turn_on(&mut self, now: Timestamp) -> Result<Outcome, RemovedError> {
        self.request(true, now)
    }

    /// # Errors
    ///
    /// Returns [`RemovedError`] once the switch has been removed.
    pub fn turn_off(&mut self, now: Timestamp) -> Result<Outcome, RemovedError> {
        self.request(false, now)
    }

    /// Activate when resting, try to cancel when timed.
    ///
    /// # Errors
    ///
    /// Returns [`RemovedError`] once the switch has been removed.
    pub fn toggle(&mut self, now: Timestamp) -> Result<Outcome, RemovedError> {
        if self.is_active() {
            self.cancel(now)
        } else {
            self.activate(now)
        }
    }

    /// The reversion for `generation` fired.
    pub fn expire(&mut self, generation: Generation, now: Timestamp) -> Outcome {
        match self.phase {
            Phase::Active { generation: pending, .. } if pending == generation => {
                self.phase = Phase::Idle;
                self.last_changed = now;
                Outcome::Reverted { cancelled: None }
            }
            _ => Outcome::Unchanged,
        }
    }

    /// Replace the definition, e.g. after a reload.
    ///
    /// A pending reversion keeps its firing time; the new settings apply
    /// from the next activation.
    pub fn reconfigure(&mut self, definition: SwitchDefinition) {
        self.definition = definition;
    }

    /// Terminal transition. Returns the reversion to cancel, if any.
    pub fn remove(&mut self) -> Option<Generation> {
        let pending = self.pending();
        self.phase = Phase::Removed;
        pending
    }

    fn arm(&mut self, now: Timestamp) -> Reversion {
        self.last_generation += 1;
        let delay = self.definition.toggle_for.as_duration();
        let until = TimeDelta::from_std(delay)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
            .unwrap_or(now);
        self.phase = Phase::Active {
            generation: self.last_generation,
            until,
        };
        Reversion {
            generation: self.last_generation,
            delay,
        }
    }

    fn removed(&self) -> RemovedError {
        RemovedError(self.definition.display_name().to_string())
    }
}
