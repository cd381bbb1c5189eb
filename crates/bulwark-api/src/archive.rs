use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use bulwark_types::api::{ArchivedSubmissionResponse, RestoreResponse};

use crate::error::blocking;
use crate::review::{ReviewQuery, after_mutation};
use crate::{ApiError, AppState};

pub async fn list_archive(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let lc = state.submissions.clone();
    let archived = blocking(move || lc.archived()).await?;
    Ok(Json(
        archived
            .iter()
            .map(ArchivedSubmissionResponse::from)
            .collect::<Vec<_>>(),
    ))
}

pub async fn restore(
    State(state): State<AppState>,
    Path(archive_id): Path<i64>,
    Query(query): Query<ReviewQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let lc = state.submissions.clone();
    let id = blocking(move || lc.restore(archive_id)).await?;
    after_mutation(&state, &query, StatusCode::CREATED, RestoreResponse { id }).await
}

pub async fn purge(
    State(state): State<AppState>,
    Path(archive_id): Path<i64>,
    Query(query): Query<ReviewQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let lc = state.submissions.clone();
    blocking(move || lc.purge(archive_id)).await?;
    match query.review {
        Some(_) => after_mutation(&state, &query, StatusCode::OK, ()).await,
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}
