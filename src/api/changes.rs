//! Revision and change-notification endpoints.

use axum::extract::{Query, State};
use serde::Deserialize;

use super::items::poll_timeout;
use super::{success, ApiResult};
use crate::models::{ChangesResponse, RevisionInfo};
use crate::AppState;

/// GET /api/revision - Get the current revision info.
pub async fn get_revision(State(state): State<AppState>) -> ApiResult<RevisionInfo> {
    let revision_info = state
        .repo
        .get_revision_info()
        .await
        .map_err(|e| crate::errors::AppErrorWithRevision {
            error: e,
            revision_id: 0,
        })?;

    success(revision_info.clone(), revision_info.revision_id)
}

/// Query parameters for the change long-poll.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangesQuery {
    #[serde(default)]
    pub since: i64,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// GET /api/changes - Wait until the revision passes `since`.
pub async fn wait_for_changes(
    State(state): State<AppState>,
    Query(query): Query<ChangesQuery>,
) -> ApiResult<ChangesResponse> {
    let timeout = poll_timeout(query.timeout_ms, state.config.subscription_timeout);
    let revision_id = state
        .repo
        .feed()
        .wait_for_revision_after(query.since, timeout)
        .await;

    success(
        ChangesResponse {
            revision_id,
            changed: revision_id > query.since,
        },
        revision_id,
    )
}
