//! `toggle_for` durations.
//!
//! Users write durations in several shapes: plain seconds (`5`, `2.5`), a
//! clock string (`"00:00:05"`), or a map of parts (`{milliseconds: 500}`).
//! They all normalize to a [`ToggleDuration`] with millisecond precision.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::ConfigError;

const MS_PER_SECOND: u64 = 1_000;
const MS_PER_MINUTE: u64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: u64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: u64 = 24 * MS_PER_HOUR;

// About 31 years; anything longer is a typo.
const MAX_MILLIS: f64 = 1e12;

/// How long a momentary switch stays in its timed state.
///
/// Always strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "RawDuration")]
pub struct ToggleDuration(Duration);

impl Default for ToggleDuration {
    fn default() -> Self {
        Self(Duration::from_secs(1))
    }
}

impl ToggleDuration {
    /// Build from whole milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDuration`] when `millis` is zero.
    pub fn from_millis(millis: u64) -> Result<Self, ConfigError> {
        if millis == 0 {
            return Err(ConfigError::InvalidDuration(
                "duration must be positive".to_string(),
            ));
        }
        Ok(Self(Duration::from_millis(millis)))
    }

    /// Build from (possibly fractional) seconds, rounded to the millisecond.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDuration`] for negative, zero,
    /// non-finite or absurdly large values.
    pub fn from_secs_f64(secs: f64) -> Result<Self, ConfigError> {
        Self::from_millis(millis_from_f64(secs * 1_000.0)?)
    }

    /// Build from a map of parts.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDuration`] if any part is negative or
    /// the total is zero.
    #[allow(clippy::cast_precision_loss)]
    pub fn from_parts(parts: &DurationParts) -> Result<Self, ConfigError> {
        let total = parts.days * MS_PER_DAY as f64
            + parts.hours * MS_PER_HOUR as f64
            + parts.minutes * MS_PER_MINUTE as f64
            + parts.seconds * MS_PER_SECOND as f64
            + parts.milliseconds;
        for value in [
            parts.days,
            parts.hours,
            parts.minutes,
            parts.seconds,
            parts.milliseconds,
        ] {
            if value < 0.0 {
                return Err(ConfigError::InvalidDuration(format!(
                    "negative duration part {value}"
                )));
            }
        }
        Self::from_millis(millis_from_f64(total)?)
    }

    /// Parse `"SS"`, `"HH:MM"` or `"HH:MM:SS(.fff)"`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDuration`] if the text does not match
    /// any of the accepted shapes.
    pub fn parse_clock(text: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidDuration(format!("cannot parse {text:?}"));
        let fields = text
            .trim()
            .split(':')
            .map(|part| part.trim().parse::<f64>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;

        let (hours, minutes, seconds) = match fields.as_slice() {
            [seconds] => (0.0, 0.0, *seconds),
            [hours, minutes] => (*hours, *minutes, 0.0),
            [hours, minutes, seconds] => (*hours, *minutes, *seconds),
            _ => return Err(invalid()),
        };
        Self::from_parts(&DurationParts {
            hours,
            minutes,
            seconds,
            ..DurationParts::default()
        })
    }

    /// The canonical value.
    #[must_use]
    pub fn as_duration(self) -> Duration {
        self.0
    }

    /// Total length in milliseconds.
    #[must_use]
    pub fn as_millis(self) -> u64 {
        u64::try_from(self.0.as_millis()).unwrap_or(u64::MAX)
    }

    /// Split into days, hours, minutes, seconds and milliseconds.
    #[must_use]
    pub fn to_parts(self) -> CanonicalParts {
        let total = self.as_millis();
        let (days, rem) = (total / MS_PER_DAY, total % MS_PER_DAY);
        let (hours, rem) = (rem / MS_PER_HOUR, rem % MS_PER_HOUR);
        let (minutes, rem) = (rem / MS_PER_MINUTE, rem % MS_PER_MINUTE);
        let (seconds, milliseconds) = (rem / MS_PER_SECOND, rem % MS_PER_SECOND);
        CanonicalParts {
            days,
            hours,
            minutes,
            seconds,
            milliseconds,
        }
    }
}

impl From<ToggleDuration> for Duration {
    fn from(value: ToggleDuration) -> Self {
        value.0
    }
}

impl fmt::Display for ToggleDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let millis = self.as_millis();
        if millis % MS_PER_SECOND == 0 {
            write!(f, "{}s", millis / MS_PER_SECOND)
        } else {
            write!(f, "{millis}ms")
        }
    }
}

impl Serialize for ToggleDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = self.as_millis();
        if millis % MS_PER_SECOND == 0 {
            serializer.serialize_u64(millis / MS_PER_SECOND)
        } else {
            self.to_parts().serialize(serializer)
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn millis_from_f64(millis: f64) -> Result<u64, ConfigError> {
    if !millis.is_finite() || millis < 0.0 {
        return Err(ConfigError::InvalidDuration(format!(
            "{millis}ms is not a valid length"
        )));
    }
    if millis > MAX_MILLIS {
        return Err(ConfigError::InvalidDuration("duration too long".to_string()));
    }
    Ok(millis.round() as u64)
}

/// Duration as written by the user, parts may be fractional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DurationParts {
    pub days: f64,
    pub hours: f64,
    pub minutes: f64,
    pub seconds: f64,
    pub milliseconds: f64,
}

/// Normalized parts; zero parts are omitted when serialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CanonicalParts {
    #[serde(skip_serializing_if = "is_zero")]
    pub days: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub hours: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub minutes: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub seconds: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub milliseconds: u64,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(value: &u64) -> bool {
    *value == 0
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Integer(i64),
    Float(f64),
    Clock(String),
    Parts(DurationParts),
}

impl TryFrom<RawDuration> for ToggleDuration {
    type Error = ConfigError;

    #[allow(clippy::cast_precision_loss)]
    fn try_from(raw: RawDuration) -> Result<Self, Self::Error> {
        match raw {
            RawDuration::Integer(secs) => Self::from_secs_f64(secs as f64),
            RawDuration::Float(secs) => Self::from_secs_f64(secs),
            RawDuration::Clock(text) => Self::parse_clock(&text),
            RawDuration::Parts(parts) => Self::from_parts(&parts),
        }
    }
}
