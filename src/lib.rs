// ============================================================================
// cloudsave
// ============================================================================
//
// Profile synchronization backend: admission control, region affinity,
// batch-revisioned profile mutation and MCP response assembly.
//
// ============================================================================

pub mod admission;
pub mod affinity;
pub mod config;
pub mod core;
pub mod profile;
pub mod storage;
pub mod sync;
pub mod web;

pub use admission::{AdmissionController, AdmissionKey, AdmissionPolicy, BucketConfig, BucketPruner};
pub use affinity::{CacheAffinityRouter, HmacSigner, RegionIdentifier};
pub use self::core::{Result, StorageError, SyncError};
pub use profile::{ClientCommand, Profile, ProfileCommand, ProfileSnapshotBuilder, ProfileType};
pub use storage::{InMemoryProfileStore, JsonFileProfileStore, ProfileStore};
pub use sync::{
    ChangeLog, McpResponseBody, PartitionRegistry, ProfileChange, ProfileSyncService,
    ResponseAssembler, SyncRequest,
};
pub use web::{AppState, build_router};
