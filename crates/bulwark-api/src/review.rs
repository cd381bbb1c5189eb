use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bulwark_types::api::{OpenReviewRequest, SetModeRequest, SetSeasonRequest};

use crate::{ApiError, AppState};

/// `?review=<id>` on a mutating route: answer with that review session,
/// reloaded after the change, instead of the action's own result.
#[derive(Debug, Default, Deserialize)]
pub struct ReviewQuery {
    pub review: Option<Uuid>,
}

pub(crate) async fn after_mutation<T: Serialize>(
    state: &AppState,
    query: &ReviewQuery,
    status: StatusCode,
    body: T,
) -> Result<Response, ApiError> {
    match query.review {
        Some(review_id) => {
            let view = state.reviews.refresh(review_id).await?;
            Ok((StatusCode::OK, Json(view)).into_response())
        }
        None => Ok((status, Json(body)).into_response()),
    }
}

pub async fn open_review(
    State(state): State<AppState>,
    Json(req): Json<OpenReviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.reviews.open(req.mode, req.season).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_review(
    State(state): State<AppState>,
    Path(review_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.reviews.view(review_id)?))
}

pub async fn next_item(
    State(state): State<AppState>,
    Path(review_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.reviews.next(review_id)?))
}

pub async fn prev_item(
    State(state): State<AppState>,
    Path(review_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.reviews.prev(review_id)?))
}

pub async fn refresh_review(
    State(state): State<AppState>,
    Path(review_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.reviews.refresh(review_id).await?))
}

pub async fn set_mode(
    State(state): State<AppState>,
    Path(review_id): Path<Uuid>,
    Json(req): Json<SetModeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.reviews.set_mode(review_id, req.mode).await?))
}

pub async fn set_season(
    State(state): State<AppState>,
    Path(review_id): Path<Uuid>,
    Json(req): Json<SetSeasonRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.reviews.set_season(review_id, &req.season)?))
}

pub async fn close_review(
    State(state): State<AppState>,
    Path(review_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.reviews.close(review_id)?;
    Ok(StatusCode::NO_CONTENT)
}
