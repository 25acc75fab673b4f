use axum::{
    Extension, Json,
    body::Bytes,
    extract::{
        Path, Query, State,
        rejection::{PathRejection, QueryRejection},
    },
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::{Result, state::AppState};
use crate::{
    affinity::RegionIdentifier,
    core::SyncError,
    profile::{ClientCommand, ProfileType},
    sync::{McpResponseBody, SyncRequest},
};

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub partitions: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileQuery {
    #[serde(default = "default_profile_id")]
    pub profile_id: String,
    /// Last profile revision the client saw
    #[serde(default = "default_rvn")]
    pub rvn: i64,
}

fn default_profile_id() -> String {
    ProfileType::Athena.as_str().to_string()
}

fn default_rvn() -> i64 {
    -1
}

pub async fn healthcheck(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        partitions: state.sync.partitions().partition_count(),
    })
}

pub async fn client_operation(
    State(state): State<AppState>,
    Extension(region): Extension<RegionIdentifier>,
    path: std::result::Result<Path<(String, String)>, PathRejection>,
    query: std::result::Result<Query<ProfileQuery>, QueryRejection>,
    body: Bytes,
) -> Result<Json<McpResponseBody>> {
    let Path((account_id, operation)) =
        path.map_err(|rejection| SyncError::invalid_command("path", rejection.body_text()))?;
    let Query(query) = query
        .map_err(|rejection| SyncError::invalid_command(&operation, rejection.body_text()))?;

    let payload = if body.iter().all(u8::is_ascii_whitespace) {
        JsonValue::Null
    } else {
        serde_json::from_slice(&body)
            .map_err(|err| SyncError::invalid_command(&operation, format!("malformed body: {err}")))?
    };
    let command = ClientCommand::from_operation(&operation, payload)?;

    let request = SyncRequest::new(region, account_id, query.profile_id)
        .with_client_revision(query.rvn)
        .with_command(command);
    let body = state.sync.sync(request).await?;

    Ok(Json(body))
}
