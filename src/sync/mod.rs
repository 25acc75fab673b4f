//! Request-scoped synchronization: change tracking, revisioning, response
//! assembly and the per-region partition actors that serialize it all.

pub mod change;
pub mod partition;
pub mod response;
pub mod service;
pub mod tracker;

pub use change::ProfileChange;
pub use partition::{DEFAULT_IDLE_TIMEOUT, DEFAULT_MAILBOX_CAPACITY, PartitionRegistry};
pub use response::{McpResponseBody, RESPONSE_VERSION, ResponseAssembler};
pub use service::{ProfileSyncService, SyncRequest};
pub use tracker::{ChangeLog, CommitOutcome};
