//! Item API endpoints, including the rendered list views.

use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;

use super::{error, success, ApiResult};
use crate::db::Repository;
use crate::errors::AppError;
use crate::models::{Identity, Item, QuickAddRequest, UpdateItemRequest};
use crate::ordering::{render, RenderedList};
use crate::session::Session;
use crate::AppState;

/// GET /api/lists/:id/items - Items in creation order.
pub async fn list_items(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
) -> ApiResult<Vec<Item>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_items(&list_id).await {
        Ok(items) => success(items, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/lists/:id/items - Quick-add comma-separated items.
pub async fn quick_add(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
    Json(request): Json<QuickAddRequest>,
) -> ApiResult<Vec<Item>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.quick_add(&list_id, &request).await {
        Ok(items) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(items, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// PATCH /api/lists/:id/items/:item_id - Update text, note, section or checked state.
pub async fn update_item(
    State(state): State<AppState>,
    Path((list_id, item_id)): Path<(String, String)>,
    Json(request): Json<UpdateItemRequest>,
) -> ApiResult<Item> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.update_item(&list_id, &item_id, &request).await {
        Ok(item) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(item, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/lists/:id/items/:item_id - Delete an item.
pub async fn delete_item(
    State(state): State<AppState>,
    Path((list_id, item_id)): Path<(String, String)>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.delete_item(&list_id, &item_id).await {
        Ok(()) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success((), new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// Query parameters for the rendered view.
#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    #[serde(default)]
    pub q: Option<String>,
}

/// GET /api/lists/:id/view - Items ordered and grouped by the list's store.
pub async fn get_list_view(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
    Query(query): Query<ViewQuery>,
) -> ApiResult<RenderedList> {
    let revision_id = state.repo.feed().current_revision();

    match load_view(&state.repo, &list_id, query.q.as_deref()).await {
        Ok(view) => success(view, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// Query parameters for the watched view.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchQuery {
    #[serde(default)]
    pub since: i64,
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// GET /api/lists/:id/view/watch - Wait for a view newer than `since`.
///
/// The caller's session opens the list and holds it until a change to the list,
/// its items or a store layout lands, or the timeout passes. Answers at once when
/// the current view is already newer.
pub async fn watch_list_view(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(list_id): Path<String>,
    Query(query): Query<WatchQuery>,
) -> ApiResult<RenderedList> {
    let revision_id = state.repo.feed().current_revision();

    let mut session = match Session::start(state.repo.clone(), &identity.uid).await {
        Ok(session) => session,
        Err(e) => return error(e, revision_id),
    };
    if let Err(e) = session.open_list(&list_id).await {
        return error(e, revision_id);
    }
    if let Some(q) = query.q.as_deref() {
        session.set_search(q);
    }

    let timeout = poll_timeout(query.timeout_ms, state.config.subscription_timeout);
    let waited = tokio::time::timeout(timeout, session.watch_active(query.since)).await;
    let view = match waited {
        Ok(Some(snapshot)) => Some(snapshot),
        _ => session.active_view(),
    };
    session.close_list();

    match view {
        Some(snapshot) => {
            tracing::debug!(
                uid = %session.user().uid,
                list_id = %list_id,
                revision = snapshot.revision,
                items = snapshot.data.item_count(),
                "watched view delivered"
            );
            success(snapshot.data, snapshot.revision)
        }
        None => match load_view(&state.repo, &list_id, query.q.as_deref()).await {
            Ok(view) => success(view, revision_id),
            Err(e) => error(e, revision_id),
        },
    }
}

/// Load a list, its items and its store, and render them.
///
/// A store id pointing at a deleted store renders the flat layout.
pub(crate) async fn load_view(
    repo: &Repository,
    list_id: &str,
    search: Option<&str>,
) -> Result<RenderedList, AppError> {
    let list = repo
        .get_list(list_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("List {} not found", list_id)))?;
    let items = repo.list_items(list_id).await?;
    let store = match list.store_id.as_deref() {
        Some(store_id) => repo.get_store(store_id).await?,
        None => None,
    };

    Ok(render(&items, store.as_ref(), search))
}

/// Requested long-poll duration, capped by the configured ceiling.
pub(crate) fn poll_timeout(requested_ms: Option<u64>, ceiling: Duration) -> Duration {
    requested_ms
        .map(Duration::from_millis)
        .map_or(ceiling, |requested| requested.min(ceiling))
}
