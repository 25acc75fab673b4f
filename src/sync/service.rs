// ============================================================================
// Profile Synchronization Service
// ============================================================================
//
// One request = one batch:
//   validate type -> (partition) load -> apply -> commit -> save -> assemble
//
// Everything after validation runs on the region's partition mailbox, so the
// read-modify-write of a profile is never interleaved within a region.
//
// ============================================================================

use super::partition::PartitionRegistry;
use super::response::{McpResponseBody, ResponseAssembler};
use super::tracker::ChangeLog;
use crate::affinity::RegionIdentifier;
use crate::core::{Clock, Result, SystemClock};
use crate::profile::{ProfileCommand, ProfileSnapshotBuilder, ProfileType};
use crate::storage::ProfileStore;
use std::sync::Arc;
use tracing::{Instrument, Span, debug, info_span, warn};

/// Input of one synchronization call.
#[derive(Debug, Clone)]
pub struct SyncRequest<C> {
    pub region: RegionIdentifier,
    pub account_id: String,
    /// Profile type as sent by the client, validated by the service
    pub profile_type: String,
    /// Revision the client last saw; `None` or negative means unknown
    pub client_revision: Option<i64>,
    pub commands: Vec<C>,
}

impl<C> SyncRequest<C> {
    pub fn new(
        region: RegionIdentifier,
        account_id: impl Into<String>,
        profile_type: impl Into<String>,
    ) -> Self {
        Self {
            region,
            account_id: account_id.into(),
            profile_type: profile_type.into(),
            client_revision: None,
            commands: Vec::new(),
        }
    }

    pub fn with_client_revision(mut self, revision: i64) -> Self {
        self.client_revision = Some(revision);
        self
    }

    pub fn with_command(mut self, command: C) -> Self {
        self.commands.push(command);
        self
    }
}

/// Orchestrates snapshot loading, command application and persistence.
#[derive(Clone)]
pub struct ProfileSyncService {
    store: Arc<dyn ProfileStore>,
    builder: ProfileSnapshotBuilder,
    partitions: Arc<PartitionRegistry>,
    clock: Arc<dyn Clock>,
    create_missing_profiles: bool,
}

impl ProfileSyncService {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self {
            builder: ProfileSnapshotBuilder::new(Arc::clone(&store)),
            store,
            partitions: Arc::new(PartitionRegistry::default()),
            clock: Arc::new(SystemClock),
            create_missing_profiles: false,
        }
    }

    pub fn with_partitions(mut self, partitions: Arc<PartitionRegistry>) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Start an empty profile instead of failing with `ProfileNotFound`.
    pub fn create_missing_profiles(mut self, enabled: bool) -> Self {
        self.create_missing_profiles = enabled;
        self
    }

    pub fn partitions(&self) -> &Arc<PartitionRegistry> {
        &self.partitions
    }

    /// Runs one request as a single batch and returns the response envelope.
    ///
    /// Fails before queueing on an invalid profile type. A failing command
    /// discards the whole batch; nothing is saved.
    pub async fn sync<C>(&self, request: SyncRequest<C>) -> Result<McpResponseBody>
    where
        C: ProfileCommand + 'static,
    {
        let span = info_span!(
            "profile.sync",
            region = %request.region,
            account_id = %request.account_id,
            profile_type = %request.profile_type,
            commands = request.commands.len(),
        );

        async move {
            let profile_type: ProfileType = request.profile_type.parse()?;
            let SyncRequest {
                region,
                account_id,
                client_revision,
                commands,
                ..
            } = request;

            let service = self.clone();
            let span = Span::current();
            self.partitions
                .run(&region, move || {
                    async move {
                        service
                            .process(&account_id, profile_type, client_revision, &commands)
                            .await
                    }
                    .instrument(span)
                })
                .await
        }
        .instrument(span)
        .await
    }

    async fn process<C: ProfileCommand>(
        &self,
        account_id: &str,
        profile_type: ProfileType,
        client_revision: Option<i64>,
        commands: &[C],
    ) -> Result<McpResponseBody> {
        let mut profile = if self.create_missing_profiles {
            self.builder
                .build_or_create(account_id, profile_type.as_str())
                .await?
        } else {
            self.builder.load(account_id, profile_type).await?
        };

        let mut log = ChangeLog::new();
        for command in commands {
            if let Err(err) = command.apply(&mut profile, &mut log) {
                warn!(command = command.name(), error = %err, "command rejected, batch discarded");
                return Err(err);
            }
        }

        let now = self.clock.now();
        let outcome = log.commit_at(&mut profile, now);
        if outcome.changed() {
            self.store
                .save(&profile, outcome.changes_base_revision)
                .await?;
        }

        let stale = client_revision
            .and_then(|rvn| u64::try_from(rvn).ok())
            .is_some_and(|rvn| rvn != outcome.changes_base_revision);
        if stale {
            debug!(
                client_revision = ?client_revision,
                base_revision = outcome.changes_base_revision,
                "client revision is stale, sending full profile"
            );
            log.replace_with_full_update(&profile);
        }

        debug!(
            revision = outcome.revision,
            command_revision = outcome.command_revision,
            changes = log.len(),
            "profile synced"
        );

        Ok(ResponseAssembler::assemble(
            &profile,
            &log,
            outcome.changes_base_revision,
            now,
        ))
    }
}
