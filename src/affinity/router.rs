use super::signer::Signer;
use crate::core::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Session-scoped identifier naming the regional partition for a client.
///
/// Display form is `<regionCode>-<randomSuffix>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionIdentifier {
    region_code: String,
    random_suffix: String,
}

impl RegionIdentifier {
    /// Mints a fresh identifier for `region_code` with a random suffix.
    pub fn generate(region_code: &str) -> Option<Self> {
        let region_code = normalize_region_code(region_code)?;
        Some(Self {
            region_code,
            random_suffix: Uuid::new_v4().simple().to_string(),
        })
    }

    /// Parses the display form back into an identifier.
    pub fn parse(value: &str) -> Option<Self> {
        let (code, suffix) = value.split_once('-')?;
        let region_code = normalize_region_code(code)?;
        if suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some(Self {
            region_code,
            random_suffix: suffix.to_string(),
        })
    }

    pub fn region_code(&self) -> &str {
        &self.region_code
    }

    pub fn random_suffix(&self) -> &str {
        &self.random_suffix
    }
}

impl fmt::Display for RegionIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.region_code, self.random_suffix)
    }
}

fn normalize_region_code(raw: &str) -> Option<String> {
    let code = raw.trim();
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(code.to_string())
}

/// Transport facts the router needs from one request.
#[derive(Debug, Clone, Default)]
pub struct RegionRequest {
    /// Signed identifier presented by the client, if any.
    pub session_token: Option<String>,
    /// Edge location code supplied by the transport, if any.
    pub edge_location: Option<String>,
}

impl RegionRequest {
    pub fn new(session_token: Option<String>, edge_location: Option<String>) -> Self {
        Self {
            session_token,
            edge_location,
        }
    }
}

/// Outcome of region resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionResolution {
    pub identifier: RegionIdentifier,
    /// Newly signed token the transport must persist for the session.
    /// `None` when the client's existing token was reused.
    pub issued_token: Option<String>,
}

/// Pins each client session to one regional partition.
///
/// A valid signed identifier is always reused, so the session keeps the
/// same partition for its whole lifetime. Only sessions without one get a
/// new identifier, derived from the edge location of the request.
#[derive(Clone)]
pub struct CacheAffinityRouter {
    signer: Arc<dyn Signer>,
}

impl CacheAffinityRouter {
    pub fn new(signer: Arc<dyn Signer>) -> Self {
        Self { signer }
    }

    pub fn resolve(&self, request: &RegionRequest) -> Result<RegionResolution> {
        if let Some(token) = request.session_token.as_deref() {
            match self.reuse(token) {
                Some(identifier) => {
                    return Ok(RegionResolution {
                        identifier,
                        issued_token: None,
                    });
                }
                None => warn!("discarding session identifier with invalid signature"),
            }
        }

        let edge_location = request
            .edge_location
            .as_deref()
            .ok_or(SyncError::MissingRegionMetadata)?;
        let identifier = RegionIdentifier::generate(edge_location).ok_or_else(|| {
            warn!(edge_location = %edge_location, "unusable edge location code");
            SyncError::MissingRegionMetadata
        })?;
        let token = self.signer.sign(&identifier.to_string());
        debug!(region = %identifier, "issued new region identifier");

        Ok(RegionResolution {
            identifier,
            issued_token: Some(token),
        })
    }

    fn reuse(&self, token: &str) -> Option<RegionIdentifier> {
        let value = self.signer.verify(token)?;
        RegionIdentifier::parse(&value)
    }
}
