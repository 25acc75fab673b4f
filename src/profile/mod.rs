//! Player profile model and the read/mutate path on top of storage.

pub mod commands;
pub mod snapshot;
pub mod types;

pub use commands::{ClientCommand, ProfileCommand};
pub use snapshot::ProfileSnapshotBuilder;
pub use types::{PROFILE_VERSION, Profile, ProfileItem, ProfileStats, ProfileType};
