//! List template API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::models::{find_template, ApplyTemplateRequest, ListTemplate, ShoppingList, BUILTIN_TEMPLATES};
use crate::AppState;

/// GET /api/templates - List the built-in templates.
pub async fn list_templates(State(state): State<AppState>) -> ApiResult<&'static [ListTemplate]> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);
    success(BUILTIN_TEMPLATES, revision_id)
}

/// POST /api/templates/:id/apply - Create a list pre-filled from a template.
pub async fn apply_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<ApplyTemplateRequest>>,
) -> ApiResult<ShoppingList> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let Some(template) = find_template(&id) else {
        return error(
            AppError::NotFound(format!("Template {} not found", id)),
            revision_id,
        );
    };
    let request = body.map(|Json(r)| r).unwrap_or_default();

    match state
        .repo
        .create_list_from_template(template, request.name.as_deref())
        .await
    {
        Ok(list) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(list, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}
