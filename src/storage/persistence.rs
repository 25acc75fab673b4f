//! File-backed profile storage for single node deployments

use super::engine::{ProfileStore, StorageResult, check_expected_revision};
use crate::core::StorageError;
use crate::profile::{Profile, ProfileType};
use async_trait::async_trait;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

// ============================================================================
// JSON File Store
// ============================================================================

/// Stores each profile as `<root>/<account id>/<profile type>.json`.
///
/// Writes go through a temp file in the same directory and an atomic rename,
/// so a crash never leaves a half-written profile behind.
pub struct JsonFileProfileStore {
    root: PathBuf,
    /// Serializes check-then-write across callers.
    write_lock: Mutex<()>,
}

impl JsonFileProfileStore {
    pub fn open<P: AsRef<Path>>(root: P) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn profile_path(&self, account_id: &str, profile_type: ProfileType) -> StorageResult<PathBuf> {
        validate_account_id(account_id)?;
        Ok(self
            .root
            .join(account_id)
            .join(format!("{}.json", profile_type.as_str())))
    }
}

fn validate_account_id(account_id: &str) -> StorageResult<()> {
    let valid = !account_id.is_empty()
        && account_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StorageError::Backend(format!(
            "account id '{account_id}' is not a valid storage key"
        )))
    }
}

fn read_profile(path: &Path) -> StorageResult<Option<Profile>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn write_profile(path: &Path, profile: &Profile) -> StorageResult<()> {
    let parent = path
        .parent()
        .ok_or_else(|| StorageError::Backend(format!("{} has no parent", path.display())))?;
    fs::create_dir_all(parent)?;
    let mut temp = NamedTempFile::new_in(parent)?;
    serde_json::to_writer(&mut temp, profile)?;
    temp.flush()?;
    temp.as_file().sync_all()?;
    temp.persist(path)
        .map_err(|err| StorageError::Backend(format!("Failed to persist profile: {}", err)))?;
    Ok(())
}

async fn run_blocking<T, F>(task: F) -> StorageResult<T>
where
    F: FnOnce() -> StorageResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| StorageError::Backend(format!("storage task failed: {}", err)))?
}

#[async_trait]
impl ProfileStore for JsonFileProfileStore {
    async fn load(
        &self,
        account_id: &str,
        profile_type: ProfileType,
    ) -> StorageResult<Option<Profile>> {
        let path = self.profile_path(account_id, profile_type)?;
        run_blocking(move || read_profile(&path)).await
    }

    async fn save(&self, profile: &Profile, expected_revision: u64) -> StorageResult<()> {
        let path = self.profile_path(&profile.account_id, profile.profile_type)?;
        let profile = profile.clone();
        let _guard = self.write_lock.lock().await;
        run_blocking(move || {
            let stored = read_profile(&path)?;
            check_expected_revision(stored.as_ref(), expected_revision)?;
            write_profile(&path, &profile)
        })
        .await
    }
}
