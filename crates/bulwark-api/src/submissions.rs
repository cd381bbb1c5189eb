use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use bulwark_types::api::{DeleteResponse, SubmissionResponse, UpdateCodeRequest, UpdateMessageRequest};

use crate::error::blocking;
use crate::review::{ReviewQuery, after_mutation};
use crate::{ApiError, AppState};

pub async fn list_submissions(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let lc = state.submissions.clone();
    let pending = blocking(move || lc.pending()).await?;
    Ok(Json(
        pending
            .iter()
            .map(SubmissionResponse::from)
            .collect::<Vec<_>>(),
    ))
}

pub async fn get_submission(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let lc = state.submissions.clone();
    let sub = blocking(move || lc.get(id)).await?;
    Ok(Json(SubmissionResponse::from(&sub)))
}

pub async fn update_code(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<ReviewQuery>,
    Json(req): Json<UpdateCodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let lc = state.submissions.clone();
    let sub = blocking(move || {
        lc.edit_code(id, &req.code)?;
        lc.get(id)
    })
    .await?;
    after_mutation(&state, &query, StatusCode::OK, SubmissionResponse::from(&sub)).await
}

pub async fn update_message(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<ReviewQuery>,
    Json(req): Json<UpdateMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let lc = state.submissions.clone();
    let sub = blocking(move || {
        lc.edit_message(id, req.message.as_deref(), req.extra_mention.as_deref())?;
        lc.get(id)
    })
    .await?;
    after_mutation(&state, &query, StatusCode::OK, SubmissionResponse::from(&sub)).await
}

pub async fn delete_submission(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<ReviewQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let lc = state.submissions.clone();
    let archive_id = blocking(move || lc.delete(id)).await?;
    after_mutation(&state, &query, StatusCode::OK, DeleteResponse { archive_id }).await
}
