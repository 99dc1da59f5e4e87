//! Trip completion and history API endpoints.

use axum::{
    extract::{Path, State},
    Extension,
};

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::models::{Identity, Trip, TripDetail, TripResult};
use crate::AppState;

/// POST /api/lists/:id/complete - Move checked items into a new trip.
pub async fn complete_trip(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(list_id): Path<String>,
) -> ApiResult<TripResult> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.complete_trip(&list_id, &identity.uid).await {
        Ok(result) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(result, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/trips - List completed trips, newest first.
pub async fn list_trips(State(state): State<AppState>) -> ApiResult<Vec<Trip>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_trips().await {
        Ok(trips) => success(trips, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/trips/:id - Get a trip with its items.
pub async fn get_trip(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<TripDetail> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_trip(&id).await {
        Ok(Some(trip)) => success(trip, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("Trip {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}
