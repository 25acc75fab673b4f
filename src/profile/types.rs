use crate::core::SyncError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Schema tag written into newly created profiles.
pub const PROFILE_VERSION: &str = "cloudsave_v1";

/// Enumerated set of profile types a client may synchronize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileType {
    Athena,
    CommonCore,
    CommonPublic,
    Campaign,
    Metadata,
    #[serde(rename = "theater0")]
    Theater0,
    #[serde(rename = "outpost0")]
    Outpost0,
    #[serde(rename = "collection_book_people0")]
    CollectionBookPeople0,
    #[serde(rename = "collection_book_schematics0")]
    CollectionBookSchematics0,
    Collections,
    Creative,
    #[serde(rename = "profile0")]
    Profile0,
}

impl ProfileType {
    pub const ALL: [ProfileType; 12] = [
        ProfileType::Athena,
        ProfileType::CommonCore,
        ProfileType::CommonPublic,
        ProfileType::Campaign,
        ProfileType::Metadata,
        ProfileType::Theater0,
        ProfileType::Outpost0,
        ProfileType::CollectionBookPeople0,
        ProfileType::CollectionBookSchematics0,
        ProfileType::Collections,
        ProfileType::Creative,
        ProfileType::Profile0,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            ProfileType::Athena => "athena",
            ProfileType::CommonCore => "common_core",
            ProfileType::CommonPublic => "common_public",
            ProfileType::Campaign => "campaign",
            ProfileType::Metadata => "metadata",
            ProfileType::Theater0 => "theater0",
            ProfileType::Outpost0 => "outpost0",
            ProfileType::CollectionBookPeople0 => "collection_book_people0",
            ProfileType::CollectionBookSchematics0 => "collection_book_schematics0",
            ProfileType::Collections => "collections",
            ProfileType::Creative => "creative",
            ProfileType::Profile0 => "profile0",
        }
    }
}

impl fmt::Display for ProfileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileType {
    type Err = SyncError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ProfileType::ALL
            .into_iter()
            .find(|profile_type| profile_type.as_str() == value)
            .ok_or_else(|| SyncError::InvalidProfileType {
                value: value.to_string(),
            })
    }
}

/// One entry of a profile's item map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileItem {
    pub template_id: String,
    #[serde(default)]
    pub attributes: JsonMap<String, JsonValue>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

impl ProfileItem {
    pub fn new(template_id: impl Into<String>) -> Self {
        Self {
            template_id: template_id.into(),
            attributes: JsonMap::new(),
            quantity: 1,
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: JsonValue) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileStats {
    #[serde(default)]
    pub attributes: JsonMap<String, JsonValue>,
}

/// Persisted player-state document for one (account, profile type).
///
/// `revision` and `command_revision` only ever move forward, and only
/// through [`ChangeLog::commit`](crate::sync::ChangeLog::commit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(rename = "_id")]
    pub id: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(rename = "rvn")]
    pub revision: u64,
    pub account_id: String,
    #[serde(rename = "profileId")]
    pub profile_type: ProfileType,
    pub version: String,
    #[serde(default)]
    pub items: BTreeMap<String, ProfileItem>,
    #[serde(default)]
    pub stats: ProfileStats,
    pub command_revision: u64,
}

impl Profile {
    /// Empty profile at revision zero.
    pub fn new(account_id: impl Into<String>, profile_type: ProfileType) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().simple().to_string(),
            created: now,
            updated: now,
            revision: 0,
            account_id: account_id.into(),
            profile_type,
            version: PROFILE_VERSION.to_string(),
            items: BTreeMap::new(),
            stats: ProfileStats::default(),
            command_revision: 0,
        }
    }

    pub fn with_revision(mut self, revision: u64, command_revision: u64) -> Self {
        self.revision = revision;
        self.command_revision = command_revision;
        self
    }

    pub fn with_item(mut self, item_id: impl Into<String>, item: ProfileItem) -> Self {
        self.items.insert(item_id.into(), item);
        self
    }

    pub fn stat(&self, name: &str) -> Option<&JsonValue> {
        self.stats.attributes.get(name)
    }
}
