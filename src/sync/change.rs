// ============================================================================
// Profile Change Records
// ============================================================================
//
// One record per observable mutation made while processing a request. The
// records are sent to the client as a diff; only their net effect on the
// Profile is persisted.
//
// ============================================================================

use crate::profile::Profile;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A single change reported to the client, tagged by `changeType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "changeType", rename_all = "camelCase")]
pub enum ProfileChange {
    /// The whole profile, replacing the client's copy
    FullProfileUpdate { profile: Box<Profile> },

    /// A top-level stat attribute was set
    StatModified { name: String, value: JsonValue },

    /// One attribute of one item was set
    #[serde(rename_all = "camelCase")]
    ItemAttrChanged {
        item_id: String,
        attribute_name: String,
        attribute_value: JsonValue,
    },
}

impl ProfileChange {
    pub fn full_profile(profile: &Profile) -> Self {
        Self::FullProfileUpdate {
            profile: Box::new(profile.clone()),
        }
    }

    pub fn stat_modified(name: impl Into<String>, value: JsonValue) -> Self {
        Self::StatModified {
            name: name.into(),
            value,
        }
    }

    pub fn item_attr_changed(
        item_id: impl Into<String>,
        attribute_name: impl Into<String>,
        attribute_value: JsonValue,
    ) -> Self {
        Self::ItemAttrChanged {
            item_id: item_id.into(),
            attribute_name: attribute_name.into(),
            attribute_value,
        }
    }

    /// Wire name of the change kind
    pub fn change_type(&self) -> &'static str {
        match self {
            ProfileChange::FullProfileUpdate { .. } => "fullProfileUpdate",
            ProfileChange::StatModified { .. } => "statModified",
            ProfileChange::ItemAttrChanged { .. } => "itemAttrChanged",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ProfileType;
    use serde_json::json;

    #[test]
    fn serializes_with_change_type_tag() {
        let change = ProfileChange::item_attr_changed("item-1", "favorite", json!(true));
        assert_eq!(
            serde_json::to_value(&change).unwrap(),
            json!({
                "changeType": "itemAttrChanged",
                "itemId": "item-1",
                "attributeName": "favorite",
                "attributeValue": true
            })
        );

        let stat = ProfileChange::stat_modified("current_mtx_platform", json!("EpicPC"));
        assert_eq!(
            serde_json::to_value(&stat).unwrap(),
            json!({
                "changeType": "statModified",
                "name": "current_mtx_platform",
                "value": "EpicPC"
            })
        );
    }

    #[test]
    fn full_update_embeds_profile() {
        let profile = Profile::new("acc", ProfileType::Athena).with_revision(7, 4);
        let encoded = serde_json::to_value(ProfileChange::full_profile(&profile)).unwrap();
        assert_eq!(encoded["changeType"], "fullProfileUpdate");
        assert_eq!(encoded["profile"]["rvn"], 7);
        assert_eq!(encoded["profile"]["accountId"], "acc");
    }

    #[test]
    fn change_type_matches_serde_tag() {
        let changes = [
            ProfileChange::full_profile(&Profile::new("acc", ProfileType::Athena)),
            ProfileChange::stat_modified("s", json!(1)),
            ProfileChange::item_attr_changed("i", "a", json!(null)),
        ];
        for change in changes {
            let encoded = serde_json::to_value(&change).unwrap();
            assert_eq!(encoded["changeType"], change.change_type());
        }
    }
}
