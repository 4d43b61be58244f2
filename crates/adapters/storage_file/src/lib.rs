//! # momentary-adapter-storage-file
//!
//! Plain-file persistence for the momentary integration.
//!
//! ## Responsibilities
//! - Implement the storage port traits defined in `momentary-app::ports::storage`
//!   - [`YamlSwitchConfigStore`]: the user-edited, versioned switches file
//!   - [`JsonIdentityRepository`]: the name → identity store
//!   - [`YamlLegacySource`]: platform-style entries of the host configuration
//! - Parse the switches file entry by entry so one bad entry does not hide
//!   the others
//! - Replace files atomically (write to a sibling, then rename)
//!
//! ## Dependency rule
//! Depends on `momentary-app` (for port traits) and `momentary-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

pub mod error;
mod fs;
pub mod identity_file;
pub mod legacy_file;
pub mod switches_file;

pub use identity_file::JsonIdentityRepository;
pub use legacy_file::YamlLegacySource;
pub use switches_file::YamlSwitchConfigStore;

#[cfg(test)]
pub(crate) fn scratch_dir() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("momentary-test-{}", uuid::Uuid::new_v4()))
}
