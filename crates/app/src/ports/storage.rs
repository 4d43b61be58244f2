//! Storage ports: switches file, identity store and legacy configuration.
//!
//! All three are plain files on the host. Only the setup service writes to
//! them, and only while it holds the reload lock.

use std::future::Future;

use momentary_domain::error::{ConfigError, MomentaryError};
use momentary_domain::identity::{HeldNames, IdentityStore};
use momentary_domain::migration::LegacySwitch;
use momentary_domain::switch::{SwitchDefinition, SwitchesFile};

/// Definitions read from the switches file.
///
/// Entries are parsed one by one; an entry that fails to parse ends up in
/// `rejected` instead of failing the whole file. Whatever name could still
/// be read from a rejected entry goes to `held`, so its identity survives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedSwitches {
    pub definitions: Vec<SwitchDefinition>,
    pub rejected: Vec<ConfigError>,
    pub held: HeldNames,
}

/// The user-edited switches file.
pub trait SwitchConfigStore {
    /// Whether the file exists at all.
    fn exists(&self) -> impl Future<Output = Result<bool, MomentaryError>> + Send;

    /// Read and parse every entry.
    ///
    /// A missing file loads as empty.
    fn load(&self) -> impl Future<Output = Result<LoadedSwitches, MomentaryError>> + Send;

    /// Write the whole file.
    fn save(&self, file: &SwitchesFile) -> impl Future<Output = Result<(), MomentaryError>> + Send;
}

/// The name → identity mapping.
pub trait IdentityRepository {
    /// Read the store. A missing store loads as empty.
    fn load(&self) -> impl Future<Output = Result<IdentityStore, MomentaryError>> + Send;

    /// Replace the store.
    fn save(&self, store: &IdentityStore)
    -> impl Future<Output = Result<(), MomentaryError>> + Send;
}

/// Platform-style switch entries from the host's main configuration.
pub trait LegacyConfigSource {
    /// Every entry under the host's `switch:` key, whatever its platform.
    fn load(&self) -> impl Future<Output = Result<Vec<LegacySwitch>, MomentaryError>> + Send;
}

impl<T: SwitchConfigStore + Send + Sync> SwitchConfigStore for std::sync::Arc<T> {
    fn exists(&self) -> impl Future<Output = Result<bool, MomentaryError>> + Send {
        (**self).exists()
    }

    fn load(&self) -> impl Future<Output = Result<LoadedSwitches, MomentaryError>> + Send {
        (**self).load()
    }

    fn save(&self, file: &SwitchesFile) -> impl Future<Output = Result<(), MomentaryError>> + Send {
        (**self).save(file)
    }
}

impl<T: IdentityRepository + Send + Sync> IdentityRepository for std::sync::Arc<T> {
    fn load(&self) -> impl Future<Output = Result<IdentityStore, MomentaryError>> + Send {
        (**self).load()
    }

    fn save(&self, store: &IdentityStore)
    -> impl Future<Output = Result<(), MomentaryError>> + Send {
        (**self).save(store)
    }
}

impl<T: LegacyConfigSource + Send + Sync> LegacyConfigSource for std::sync::Arc<T> {
    fn load(&self) -> impl Future<Output = Result<Vec<LegacySwitch>, MomentaryError>> + Send {
        (**self).load()
    }
}
