// ============================================================================
// Revision Tracking
// ============================================================================
//
// Versioning is batch-level: one request that produced N >= 1 changes
// advances `revision` and `commandRevision` by exactly one, never by N.
//
// ============================================================================

use super::change::ProfileChange;
use crate::profile::Profile;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

/// Counters produced by committing one change log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitOutcome {
    pub revision: u64,
    pub command_revision: u64,
    /// Profile revision before this batch was applied
    pub changes_base_revision: u64,
}

impl CommitOutcome {
    pub fn changed(&self) -> bool {
        self.revision != self.changes_base_revision
    }
}

/// Ordered change records for one request.
///
/// Order is causal application order and is preserved in the response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeLog {
    changes: Vec<ProfileChange>,
    committed: Option<CommitOutcome>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a log from already-recorded changes
    pub fn from_changes(changes: Vec<ProfileChange>) -> Self {
        Self {
            changes,
            committed: None,
        }
    }

    pub fn track(&mut self, change: ProfileChange) {
        self.changes.push(change);
    }

    pub fn changes(&self) -> &[ProfileChange] {
        &self.changes
    }

    pub fn into_changes(self) -> Vec<ProfileChange> {
        self.changes
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn is_committed(&self) -> bool {
        self.committed.is_some()
    }

    /// Sets a stat on `profile` and records the change.
    pub fn set_stat(&mut self, profile: &mut Profile, name: &str, value: JsonValue) {
        profile
            .stats
            .attributes
            .insert(name.to_string(), value.clone());
        self.track(ProfileChange::stat_modified(name, value));
    }

    /// Sets an item attribute on `profile` and records the change.
    ///
    /// Returns `false`, recording nothing, when the item does not exist.
    pub fn set_item_attribute(
        &mut self,
        profile: &mut Profile,
        item_id: &str,
        attribute_name: &str,
        value: JsonValue,
    ) -> bool {
        let Some(item) = profile.items.get_mut(item_id) else {
            return false;
        };
        item.attributes
            .insert(attribute_name.to_string(), value.clone());
        self.track(ProfileChange::item_attr_changed(
            item_id,
            attribute_name,
            value,
        ));
        true
    }

    /// Advances the profile counters for this batch.
    ///
    /// A non-empty log bumps `revision` and `command_revision` by one each;
    /// an empty log leaves both untouched. Committing the same log again
    /// returns the first outcome without touching the profile.
    pub fn commit(&mut self, profile: &mut Profile) -> CommitOutcome {
        self.commit_at(profile, Utc::now())
    }

    /// Like [`commit`](Self::commit), stamping `updated` with `now`.
    pub fn commit_at(&mut self, profile: &mut Profile, now: DateTime<Utc>) -> CommitOutcome {
        if let Some(outcome) = self.committed {
            return outcome;
        }

        let changes_base_revision = profile.revision;
        if !self.changes.is_empty() {
            profile.revision += 1;
            profile.command_revision += 1;
            profile.updated = now;
        }

        let outcome = CommitOutcome {
            revision: profile.revision,
            command_revision: profile.command_revision,
            changes_base_revision,
        };
        self.committed = Some(outcome);
        outcome
    }

    /// Replaces the recorded diff with one full snapshot of `profile`.
    ///
    /// Used when the client's copy is too stale for a diff to apply.
    pub fn replace_with_full_update(&mut self, profile: &Profile) {
        self.changes = vec![ProfileChange::full_profile(profile)];
    }
}
