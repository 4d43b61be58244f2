//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`MomentaryError`] via `#[from]`.

/// Base error for everything that crosses a port boundary.
#[derive(Debug, thiserror::Error)]
pub enum MomentaryError {
    #[error("configuration error")]
    Config(#[from] ConfigError),

    #[error("migration error")]
    Migration(#[from] MigrationError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    #[error("switch removed")]
    Removed(#[from] RemovedError),

    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A switch definition failed validation.
///
/// Raised at load time; the offending entry is rejected while the other
/// entries of the same file still load.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("switch name must not be empty")]
    EmptyName,

    #[error("switch name {0:?} is defined more than once")]
    DuplicateName(String),

    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    #[error("invalid mode {0:?}, expected \"on\" or \"off\"")]
    InvalidMode(String),

    #[error("unsupported switches file version {0}")]
    UnsupportedVersion(u32),

    #[error("malformed switch entry #{index}: {reason}")]
    MalformedEntry { index: usize, reason: String },
}

/// The legacy configuration could not (or should not) be migrated.
///
/// Never fatal: the migration is skipped and the existing state is used.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("switches file already exists, nothing to migrate")]
    AlreadyMigrated,

    #[error("no legacy momentary switches found")]
    NoLegacySwitches,

    #[error("legacy configuration unreadable")]
    Unreadable(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A lookup did not match anything.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// An operation targeted a switch that has been removed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("switch {0} has been removed")]
pub struct RemovedError(pub String);
