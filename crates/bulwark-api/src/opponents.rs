use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use bulwark_types::api::{ClearResponse, OpponentDefenseResponse, PublishRequest};
use bulwark_workflow::WorkflowError;

use crate::error::blocking;
use crate::publish::report_status;
use crate::review::{ReviewQuery, after_mutation};
use crate::{ApiError, AppState};

pub async fn list_pending(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let lc = state.opponents.clone();
    let defenses = blocking(move || lc.pending()).await?;
    Ok(Json(
        defenses
            .iter()
            .map(OpponentDefenseResponse::from)
            .collect::<Vec<_>>(),
    ))
}

pub async fn list_approved(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let lc = state.opponents.clone();
    let defenses = blocking(move || lc.approved()).await?;
    Ok(Json(
        defenses
            .iter()
            .map(OpponentDefenseResponse::from)
            .collect::<Vec<_>>(),
    ))
}

pub async fn approve(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<ReviewQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let lc = state.opponents.clone();
    let approved = blocking(move || lc.approve(id)).await?;
    after_mutation(&state, &query, StatusCode::OK, approved).await
}

pub async fn approve_all(
    State(state): State<AppState>,
    Query(query): Query<ReviewQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let lc = state.opponents.clone();
    let report = blocking(move || lc.approve_all()).await?;
    after_mutation(&state, &query, StatusCode::OK, report).await
}

pub async fn reject(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<ReviewQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let lc = state.opponents.clone();
    blocking(move || lc.reject(id)).await?;
    match query.review {
        Some(_) => after_mutation(&state, &query, StatusCode::OK, ()).await,
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

pub async fn clear_all(
    State(state): State<AppState>,
    Query(query): Query<ReviewQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let lc = state.opponents.clone();
    let removed = blocking(move || lc.clear_all()).await?;
    after_mutation(&state, &query, StatusCode::OK, ClearResponse { removed }).await
}

pub async fn publish(
    State(state): State<AppState>,
    Query(query): Query<ReviewQuery>,
    Json(req): Json<PublishRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let channel_id = state
        .channel_or_default(req.channel_id)
        .ok_or_else(|| WorkflowError::Validation("no publish channel given or configured".into()))?;
    let season = state.season_or_default(req.season);

    let report = state.publisher.publish_opponents(&channel_id, &season).await;
    let status = report_status(&report);
    after_mutation(&state, &query, status, report).await
}
