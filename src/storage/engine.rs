use crate::core::StorageError;
use crate::profile::{Profile, ProfileType};
use async_trait::async_trait;

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Storage collaborator for profiles - allows pluggable backends
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Load the profile for an account, `None` when no record exists
    async fn load(
        &self,
        account_id: &str,
        profile_type: ProfileType,
    ) -> StorageResult<Option<Profile>>;

    /// Persist `profile`, provided the stored revision still equals
    /// `expected_revision` (or no record exists and it is zero)
    async fn save(&self, profile: &Profile, expected_revision: u64) -> StorageResult<()>;
}

/// Compare-and-set guard shared by the bundled stores; an absent record
/// counts as revision zero.
pub(crate) fn check_expected_revision(
    stored: Option<&Profile>,
    expected_revision: u64,
) -> StorageResult<()> {
    let actual = stored.map(|profile| profile.revision).unwrap_or(0);
    if actual != expected_revision {
        return Err(StorageError::Conflict {
            expected: expected_revision,
            actual,
        });
    }
    Ok(())
}
