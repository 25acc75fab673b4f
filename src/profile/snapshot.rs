use super::types::{Profile, ProfileType};
use crate::core::{Result, SyncError};
use crate::storage::ProfileStore;
use std::sync::Arc;
use tracing::debug;

/// Loads the persisted profile for an account and profile type.
#[derive(Clone)]
pub struct ProfileSnapshotBuilder {
    store: Arc<dyn ProfileStore>,
}

impl ProfileSnapshotBuilder {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }

    /// Validates `profile_type` before touching storage, then loads.
    pub async fn build(&self, account_id: &str, profile_type: &str) -> Result<Profile> {
        let profile_type: ProfileType = profile_type.parse()?;
        self.load(account_id, profile_type).await
    }

    /// Like [`build`](Self::build), but starts an empty profile at revision
    /// zero when storage has no record.
    pub async fn build_or_create(&self, account_id: &str, profile_type: &str) -> Result<Profile> {
        let profile_type: ProfileType = profile_type.parse()?;
        match self.load(account_id, profile_type).await {
            Err(SyncError::ProfileNotFound { .. }) => {
                debug!(account_id = %account_id, profile_type = %profile_type, "creating empty profile");
                Ok(Profile::new(account_id, profile_type))
            }
            other => other,
        }
    }

    pub async fn load(&self, account_id: &str, profile_type: ProfileType) -> Result<Profile> {
        self.store
            .load(account_id, profile_type)
            .await?
            .ok_or_else(|| SyncError::ProfileNotFound {
                account_id: account_id.to_string(),
                profile_type,
            })
    }
}
