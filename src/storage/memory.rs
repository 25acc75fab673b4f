use super::engine::{ProfileStore, StorageResult, check_expected_revision};
use crate::profile::{Profile, ProfileType};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

type ProfileKey = (String, ProfileType);

/// Process-local profile store
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<ProfileKey, Profile>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or overwrite a profile without a revision check
    pub async fn insert(&self, profile: Profile) {
        let key = (profile.account_id.clone(), profile.profile_type);
        self.profiles.write().await.insert(key, profile);
    }

    pub async fn get(&self, account_id: &str, profile_type: ProfileType) -> Option<Profile> {
        self.profiles
            .read()
            .await
            .get(&(account_id.to_string(), profile_type))
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.profiles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.profiles.read().await.is_empty()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn load(
        &self,
        account_id: &str,
        profile_type: ProfileType,
    ) -> StorageResult<Option<Profile>> {
        Ok(self.get(account_id, profile_type).await)
    }

    async fn save(&self, profile: &Profile, expected_revision: u64) -> StorageResult<()> {
        let key = (profile.account_id.clone(), profile.profile_type);
        // Check and write under one guard.
        let mut profiles = self.profiles.write().await;
        check_expected_revision(profiles.get(&key), expected_revision)?;
        profiles.insert(key, profile.clone());
        Ok(())
    }
}
