use super::change::ProfileChange;
use super::tracker::ChangeLog;
use crate::profile::{Profile, ProfileType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Envelope format version reported to clients.
pub const RESPONSE_VERSION: u32 = 1;

/// Wire envelope returned by every synchronization request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpResponseBody {
    pub profile_revision: u64,
    /// Profile type the changes apply to.
    pub profile_id: ProfileType,
    pub profile_changes_base_revision: u64,
    pub profile_changes: Vec<ProfileChange>,
    pub profile_command_revision: u64,
    pub server_time: DateTime<Utc>,
    pub response_version: u32,
}

/// Composes response envelopes. Performs no I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseAssembler;

impl ResponseAssembler {
    /// Builds the envelope from a committed profile and its change log.
    ///
    /// Changes are copied in recorded order. An empty log still carries all
    /// three revision fields.
    pub fn assemble(
        profile: &Profile,
        change_log: &ChangeLog,
        changes_base_revision: u64,
        server_time: DateTime<Utc>,
    ) -> McpResponseBody {
        McpResponseBody {
            profile_revision: profile.revision,
            profile_id: profile.profile_type,
            profile_changes_base_revision: changes_base_revision,
            profile_changes: change_log.changes().to_vec(),
            profile_command_revision: profile.command_revision,
            server_time,
            response_version: RESPONSE_VERSION,
        }
    }

    pub fn assemble_now(
        profile: &Profile,
        change_log: &ChangeLog,
        changes_base_revision: u64,
    ) -> McpResponseBody {
        Self::assemble(profile, change_log, changes_base_revision, Utc::now())
    }
}
