//! Profile commands applied inside a synchronization batch.
//!
//! Commands arrive already parsed. Each one mutates the loaded profile through
//! the request's [`ChangeLog`], so every mutation is also recorded for the
//! response diff. The first failing command aborts the whole batch.

use super::types::Profile;
use crate::core::{Result, SyncError};
use crate::sync::ChangeLog;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};

/// Upper bound for creator/affiliate codes.
pub const AFFILIATE_NAME_MAX_LEN: usize = 64;

/// Storefront platforms a client may select.
pub const MTX_PLATFORMS: [&str; 11] = [
    "EpicPC",
    "EpicPCKorea",
    "Epic",
    "EpicAndroid",
    "PSN",
    "Live",
    "IOSAppStore",
    "Nintendo",
    "Samsung",
    "Shared",
    "WeGame",
];

/// A state-mutating operation on one profile.
pub trait ProfileCommand: Send + Sync {
    /// Operation name, used in logs and error reasons.
    fn name(&self) -> &str;

    fn apply(&self, profile: &mut Profile, log: &mut ChangeLog) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetMtxPlatform {
    pub new_platform: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetItemFavoriteStatus {
    pub target_item_id: String,
    #[serde(rename = "bFavorite")]
    pub favorite: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkItemSeen {
    pub item_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAffiliateName {
    pub affiliate_name: String,
}

/// Built-in client operations.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    QueryProfile,
    SetMtxPlatform(SetMtxPlatform),
    SetItemFavoriteStatus(SetItemFavoriteStatus),
    MarkItemSeen(MarkItemSeen),
    SetAffiliateName(SetAffiliateName),
}

impl ClientCommand {
    /// Parses an operation name and its JSON payload.
    ///
    /// `payload` is `Null` when the request carried no body.
    pub fn from_operation(operation: &str, payload: JsonValue) -> Result<Self> {
        fn parse<T: serde::de::DeserializeOwned>(operation: &str, payload: JsonValue) -> Result<T> {
            serde_json::from_value(payload)
                .map_err(|err| SyncError::invalid_command(operation, err.to_string()))
        }

        match operation {
            "QueryProfile" => Ok(Self::QueryProfile),
            "SetMtxPlatform" => parse(operation, payload).map(Self::SetMtxPlatform),
            "SetItemFavoriteStatus" => parse(operation, payload).map(Self::SetItemFavoriteStatus),
            "MarkItemSeen" => parse(operation, payload).map(Self::MarkItemSeen),
            "SetAffiliateName" => parse(operation, payload).map(Self::SetAffiliateName),
            _ => Err(SyncError::invalid_command(operation, "unsupported operation")),
        }
    }
}

impl ProfileCommand for ClientCommand {
    fn name(&self) -> &str {
        match self {
            ClientCommand::QueryProfile => "QueryProfile",
            ClientCommand::SetMtxPlatform(_) => "SetMtxPlatform",
            ClientCommand::SetItemFavoriteStatus(_) => "SetItemFavoriteStatus",
            ClientCommand::MarkItemSeen(_) => "MarkItemSeen",
            ClientCommand::SetAffiliateName(_) => "SetAffiliateName",
        }
    }

    fn apply(&self, profile: &mut Profile, log: &mut ChangeLog) -> Result<()> {
        match self {
            ClientCommand::QueryProfile => Ok(()),

            ClientCommand::SetMtxPlatform(cmd) => {
                if !MTX_PLATFORMS.contains(&cmd.new_platform.as_str()) {
                    return Err(SyncError::invalid_command(
                        self.name(),
                        format!("unknown platform '{}'", cmd.new_platform),
                    ));
                }
                log.set_stat(profile, "current_mtx_platform", json!(cmd.new_platform));
                Ok(())
            }

            ClientCommand::SetItemFavoriteStatus(cmd) => {
                if !log.set_item_attribute(
                    profile,
                    &cmd.target_item_id,
                    "favorite",
                    json!(cmd.favorite),
                ) {
                    return Err(missing_item(self.name(), &cmd.target_item_id));
                }
                Ok(())
            }

            ClientCommand::MarkItemSeen(cmd) => {
                if let Some(missing) = cmd
                    .item_ids
                    .iter()
                    .find(|item_id| !profile.items.contains_key(item_id.as_str()))
                {
                    return Err(missing_item(self.name(), missing));
                }
                for item_id in &cmd.item_ids {
                    log.set_item_attribute(profile, item_id, "item_seen", json!(true));
                }
                Ok(())
            }

            ClientCommand::SetAffiliateName(cmd) => {
                let name = cmd.affiliate_name.trim();
                if name.is_empty() || name.len() > AFFILIATE_NAME_MAX_LEN {
                    return Err(SyncError::invalid_command(
                        self.name(),
                        format!("affiliate name must be 1-{AFFILIATE_NAME_MAX_LEN} characters"),
                    ));
                }
                let set_time = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
                log.set_stat(profile, "mtx_affiliate", json!(name));
                log.set_stat(profile, "mtx_affiliate_set_time", json!(set_time));
                Ok(())
            }
        }
    }
}

fn missing_item(operation: &str, item_id: &str) -> SyncError {
    SyncError::invalid_command(operation, format!("item '{item_id}' not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{ProfileItem, ProfileType};

    fn profile() -> Profile {
        Profile::new("acc", ProfileType::Athena)
            .with_item("a", ProfileItem::new("AthenaCharacter:cid_a"))
            .with_item("b", ProfileItem::new("AthenaPickaxe:pid_b"))
    }

    #[test]
    fn parses_known_operations() {
        assert_eq!(
            ClientCommand::from_operation("QueryProfile", JsonValue::Null).unwrap(),
            ClientCommand::QueryProfile
        );
        assert_eq!(
            ClientCommand::from_operation(
                "SetItemFavoriteStatus",
                json!({"targetItemId": "a", "bFavorite": true})
            )
            .unwrap(),
            ClientCommand::SetItemFavoriteStatus(SetItemFavoriteStatus {
                target_item_id: "a".to_string(),
                favorite: true
            })
        );
    }

    #[test]
    fn rejects_unknown_operations_and_bad_payloads() {
        let err = ClientCommand::from_operation("PurchaseEverything", JsonValue::Null).unwrap_err();
        assert_eq!(err.code(), "invalid_command");

        let err = ClientCommand::from_operation("SetMtxPlatform", JsonValue::Null).unwrap_err();
        assert!(matches!(err, SyncError::InvalidCommand { ref operation, .. } if operation == "SetMtxPlatform"));
    }

    #[test]
    fn mark_item_seen_checks_every_item_first() {
        let mut profile = profile();
        let mut log = ChangeLog::new();
        let cmd = ClientCommand::MarkItemSeen(MarkItemSeen {
            item_ids: vec!["a".to_string(), "zzz".to_string()],
        });

        assert!(cmd.apply(&mut profile, &mut log).is_err());
        assert!(log.is_empty());
        assert!(profile.items["a"].attributes.get("item_seen").is_none());
    }

    #[test]
    fn mark_item_seen_records_each_item_in_order() {
        let mut profile = profile();
        let mut log = ChangeLog::new();
        let cmd = ClientCommand::MarkItemSeen(MarkItemSeen {
            item_ids: vec!["b".to_string(), "a".to_string()],
        });
        cmd.apply(&mut profile, &mut log).unwrap();

        let ids: Vec<_> = log
            .changes()
            .iter()
            .map(|change| match change {
                crate::sync::ProfileChange::ItemAttrChanged { item_id, .. } => item_id.as_str(),
                other => panic!("unexpected change {other:?}"),
            })
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn set_mtx_platform_validates_platform() {
        let mut profile = profile();
        let mut log = ChangeLog::new();
        let bad = ClientCommand::SetMtxPlatform(SetMtxPlatform {
            new_platform: "Moon".to_string(),
        });
        assert!(bad.apply(&mut profile, &mut log).is_err());

        let good = ClientCommand::SetMtxPlatform(SetMtxPlatform {
            new_platform: "PSN".to_string(),
        });
        good.apply(&mut profile, &mut log).unwrap();
        assert_eq!(profile.stat("current_mtx_platform"), Some(&json!("PSN")));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn set_affiliate_name_records_two_stats() {
        let mut profile = profile();
        let mut log = ChangeLog::new();
        ClientCommand::SetAffiliateName(SetAffiliateName {
            affiliate_name: " creator ".to_string(),
        })
        .apply(&mut profile, &mut log)
        .unwrap();

        assert_eq!(profile.stat("mtx_affiliate"), Some(&json!("creator")));
        assert!(profile.stat("mtx_affiliate_set_time").is_some());
        assert_eq!(log.len(), 2);
    }
}
