//! List API endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::models::{AssignStoreRequest, CreateListRequest, RenameRequest, ShoppingList};
use crate::AppState;

/// Query parameters for listing lists.
#[derive(Debug, Default, Deserialize)]
pub struct ListListsQuery {
    #[serde(default)]
    pub archived: bool,
}

/// GET /api/lists - List active lists, or archived ones with `?archived=true`.
pub async fn list_lists(
    State(state): State<AppState>,
    Query(query): Query<ListListsQuery>,
) -> ApiResult<Vec<ShoppingList>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_lists(query.archived).await {
        Ok(lists) => success(lists, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/lists/:id - Get a single list.
pub async fn get_list(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ShoppingList> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_list(&id).await {
        Ok(Some(list)) => success(list, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("List {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/lists - Create a new list.
pub async fn create_list(
    State(state): State<AppState>,
    Json(request): Json<CreateListRequest>,
) -> ApiResult<ShoppingList> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.create_list(&request).await {
        Ok(list) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(list, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/lists/:id/name - Rename a list.
pub async fn rename_list(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RenameRequest>,
) -> ApiResult<ShoppingList> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.rename_list(&id, &request.name).await {
        Ok(list) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(list, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/lists/:id/archive - Soft-delete a list.
pub async fn archive_list(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ShoppingList> {
    set_archived(state, id, true).await
}

/// POST /api/lists/:id/restore - Bring an archived list back.
pub async fn restore_list(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ShoppingList> {
    set_archived(state, id, false).await
}

async fn set_archived(state: AppState, id: String, archived: bool) -> ApiResult<ShoppingList> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.set_list_archived(&id, archived).await {
        Ok(list) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(list, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/lists/:id/store - Assign or clear the list's store layout.
pub async fn assign_store(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AssignStoreRequest>,
) -> ApiResult<ShoppingList> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.assign_store(&id, request.normalized()).await {
        Ok(list) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(list, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/lists/:id - Permanently delete a list and its items.
pub async fn delete_list(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.delete_list(&id).await {
        Ok(()) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success((), new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}
