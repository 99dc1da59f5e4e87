//! Store layout API endpoints.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;

use super::items::poll_timeout;
use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::models::{
    AddSectionRequest, CreateStoreRequest, Identity, RenameRequest, ReplaceSectionsRequest, Store,
};
use crate::ordering::{add_section, move_down, move_up, normalize_sections, remove_section};
use crate::session::Session;
use crate::AppState;

/// GET /api/stores - List all stores.
pub async fn list_stores(State(state): State<AppState>) -> ApiResult<Vec<Store>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_stores().await {
        Ok(stores) => success(stores, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/stores/:id - Get a single store.
pub async fn get_store(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Store> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_store(&id).await {
        Ok(Some(store)) => success(store, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("Store {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/stores - Create a new store.
pub async fn create_store(
    State(state): State<AppState>,
    Json(request): Json<CreateStoreRequest>,
) -> ApiResult<Store> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.create_store(&request).await {
        Ok(store) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(store, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/stores/:id/name - Rename a store.
pub async fn rename_store(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RenameRequest>,
) -> ApiResult<Store> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.rename_store(&id, &request.name).await {
        Ok(store) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(store, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/stores/:id - Delete a store.
pub async fn delete_store(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.delete_store(&id).await {
        Ok(()) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success((), new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/stores/:id/sections - Append a section.
pub async fn add_store_section(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AddSectionRequest>,
) -> ApiResult<Store> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if request.name.trim().is_empty() {
        return error(
            AppError::Validation("Section name is required".to_string()),
            revision_id,
        );
    }
    let result = state
        .repo
        .edit_sections(&id, |sections| add_section(sections, &request.name))
        .await;
    section_response(&state, result, revision_id).await
}

/// PUT /api/stores/:id/sections - Replace the whole section sequence.
pub async fn replace_store_sections(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ReplaceSectionsRequest>,
) -> ApiResult<Store> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let sections = match normalize_sections(&request.sections) {
        Ok(sections) => sections,
        Err(e) => return error(e, revision_id),
    };
    let result = state.repo.replace_sections(&id, sections).await;
    section_response(&state, result, revision_id).await
}

/// POST /api/stores/:id/sections/:index/up - Swap a section with the one above it.
pub async fn move_store_section_up(
    State(state): State<AppState>,
    Path((id, index)): Path<(String, usize)>,
) -> ApiResult<Store> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let result = state
        .repo
        .edit_sections(&id, |sections| move_up(sections, index))
        .await;
    section_response(&state, result, revision_id).await
}

/// POST /api/stores/:id/sections/:index/down - Swap a section with the one below it.
pub async fn move_store_section_down(
    State(state): State<AppState>,
    Path((id, index)): Path<(String, usize)>,
) -> ApiResult<Store> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let result = state
        .repo
        .edit_sections(&id, |sections| move_down(sections, index))
        .await;
    section_response(&state, result, revision_id).await
}

/// DELETE /api/stores/:id/sections/:index - Remove a section.
pub async fn remove_store_section(
    State(state): State<AppState>,
    Path((id, index)): Path<(String, usize)>,
) -> ApiResult<Store> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let result = state
        .repo
        .edit_sections(&id, |sections| remove_section(sections, index))
        .await;
    section_response(&state, result, revision_id).await
}

/// Query parameters for a watched store.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchStoreQuery {
    #[serde(default)]
    pub since: i64,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// GET /api/stores/:id/watch - Wait for the store layout newer than `since`.
///
/// A store deleted while watched answers `NOT_FOUND`.
pub async fn watch_store(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Query(query): Query<WatchStoreQuery>,
) -> ApiResult<Store> {
    let revision_id = state.repo.feed().current_revision();

    let mut session = match Session::start(state.repo.clone(), &identity.uid).await {
        Ok(session) => session,
        Err(e) => return error(e, revision_id),
    };
    let opened = match session.open_store(&id).await {
        Ok(store) => store,
        Err(e) => return error(e, revision_id),
    };

    let timeout = poll_timeout(query.timeout_ms, state.config.subscription_timeout);
    let _ = tokio::time::timeout(timeout, session.wait_for_stores_after(query.since)).await;

    let (revision, store) = match session.stores_revision() {
        Some(revision) => (revision, session.active_store()),
        None => (revision_id, Some(opened)),
    };
    session.close_store();

    match store {
        Some(store) => success(store, revision),
        None => error(AppError::NotFound(format!("Store {} not found", id)), revision),
    }
}

async fn section_response(
    state: &AppState,
    result: Result<Store, AppError>,
    revision_id: i64,
) -> ApiResult<Store> {
    match result {
        Ok(store) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(store, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}
