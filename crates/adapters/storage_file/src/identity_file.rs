//! JSON implementation of [`IdentityRepository`].

use std::future::Future;
use std::path::{Path, PathBuf};

use momentary_app::ports::IdentityRepository;
use momentary_domain::error::{ConfigError, MomentaryError};
use momentary_domain::identity::{IDENTITY_STORE_VERSION, IdentityStore};

use crate::error::StorageError;
use crate::fs::{read_optional, write_atomic};

/// Identity store kept as a pretty-printed JSON file.
pub struct JsonIdentityRepository {
    path: PathBuf,
}

impl JsonIdentityRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IdentityRepository for JsonIdentityRepository {
    fn load(&self) -> impl Future<Output = Result<IdentityStore, MomentaryError>> + Send {
        let path = self.path.clone();
        async move {
            let contents = read_optional(&path).await?;
            let Some(contents) = contents.filter(|text| !text.trim().is_empty()) else {
                return Ok(IdentityStore::default());
            };
            let store: IdentityStore =
                serde_json::from_str(&contents).map_err(StorageError::from)?;
            if store.version != IDENTITY_STORE_VERSION {
                return Err(ConfigError::UnsupportedVersion(store.version).into());
            }
            Ok(store)
        }
    }

    fn save(&self, store: &IdentityStore)
    -> impl Future<Output = Result<(), MomentaryError>> + Send {
        let path = self.path.clone();
        let contents = serde_json::to_string_pretty(store);
        async move {
            let contents = contents.map_err(StorageError::from)?;
            write_atomic(&path, &contents).await?;
            tracing::debug!(path = %path.display(), "identity store written");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use momentary_domain::id::UniqueId;
    use momentary_domain::identity::IdentityRecord;

    #[tokio::test]
    async fn should_load_missing_store_as_empty() {
        let repo = JsonIdentityRepository::new(crate::scratch_dir().join("meta.json"));
        assert_eq!(repo.load().await.unwrap(), IdentityStore::default());
    }

    #[tokio::test]
    async fn should_read_back_saved_store() {
        let dir = crate::scratch_dir();
        let repo = JsonIdentityRepository::new(dir.join(".storage").join("momentary.meta.json"));
        let mut store = IdentityStore::default();
        store.switches.insert(
            "+Empty House Trigger".to_string(),
            IdentityRecord {
                unique_id: UniqueId::from_name("Empty House Trigger"),
                entity_id: "switch.momentary_empty_house_trigger".to_string(),
            },
        );
        store.switches.insert(
            "Doorbell".to_string(),
            IdentityRecord {
                unique_id: UniqueId::generate(),
                entity_id: "switch.doorbell".to_string(),
            },
        );

        repo.save(&store).await.unwrap();
        assert_eq!(repo.load().await.unwrap(), store);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn should_reject_unknown_version() {
        let dir = crate::scratch_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("meta.json");
        std::fs::write(&path, r#"{"version": 7, "switches": {}}"#).unwrap();

        let result = JsonIdentityRepository::new(&path).load().await;
        assert!(matches!(
            result,
            Err(MomentaryError::Config(ConfigError::UnsupportedVersion(7)))
        ));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn should_fail_on_corrupt_store() {
        let dir = crate::scratch_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("meta.json");
        std::fs::write(&path, "{not json").unwrap();

        let result = JsonIdentityRepository::new(&path).load().await;
        assert!(matches!(result, Err(MomentaryError::Storage(_))));

        let _ = std::fs::remove_dir_all(dir);
    }
}
