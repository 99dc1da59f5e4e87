//! Identity and allow-list API endpoints.

use axum::{
    extract::{Path, State},
    Extension, Json,
};

use super::{error, success, ApiResult};
use crate::models::{AllowUserRequest, AllowedUsers, Identity, MeResponse};
use crate::AppState;

/// GET /api/me - Caller identity and allow-list status.
///
/// Reachable without allow-list membership so a denied user can see the id
/// they must hand to an administrator.
pub async fn get_me(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<MeResponse> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.is_allowed(&identity.uid).await {
        Ok(allowed) => success(
            MeResponse {
                uid: identity.uid,
                allowed,
            },
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/access - List allowed user ids.
pub async fn list_allowed_users(State(state): State<AppState>) -> ApiResult<AllowedUsers> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.allowed_users().await {
        Ok(users) => success(users, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/access - Add a user id to the allow-list.
pub async fn allow_user(
    State(state): State<AppState>,
    Json(request): Json<AllowUserRequest>,
) -> ApiResult<AllowedUsers> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.allow_user(&request.uid).await {
        Ok(users) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(users, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/access/:uid - Remove a user id from the allow-list.
pub async fn revoke_user(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> ApiResult<AllowedUsers> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.revoke_user(&uid).await {
        Ok(users) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(users, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}
