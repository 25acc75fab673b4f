use crate::profile::ProfileType;
use thiserror::Error;

/// Failures reported by the storage collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Revision conflict: expected {expected}, found {actual}")]
    Conflict { expected: u64, actual: u64 },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Terminal conditions of a synchronization request.
///
/// Every core operation returns one of these as a value; turning them into
/// transport responses is the job of the `web` boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Edge location metadata is missing from the request")]
    MissingRegionMetadata,

    #[error("Invalid profile type '{value}'")]
    InvalidProfileType { value: String },

    #[error("Profile '{profile_type}' not found for account '{account_id}'")]
    ProfileNotFound {
        account_id: String,
        profile_type: ProfileType,
    },

    #[error("Rate limited on '{key}'")]
    RateLimited { key: String },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Command '{operation}' rejected: {reason}")]
    InvalidCommand { operation: String, reason: String },

    #[error("Partition '{region}' is unavailable")]
    PartitionUnavailable { region: String },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl SyncError {
    pub fn invalid_command(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCommand {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Stable machine-readable identifier for the condition.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingRegionMetadata => "missing_region_metadata",
            Self::InvalidProfileType { .. } => "invalid_profile_type",
            Self::ProfileNotFound { .. } => "profile_not_found",
            Self::RateLimited { .. } => "rate_limited",
            Self::Storage(StorageError::Conflict { .. }) => "storage_conflict",
            Self::Storage(StorageError::Backend(_)) => "storage_failure",
            Self::InvalidCommand { .. } => "invalid_command",
            Self::PartitionUnavailable { .. } => "partition_unavailable",
            Self::Configuration(_) => "configuration_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
