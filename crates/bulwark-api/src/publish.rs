use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use bulwark_types::api::{PublishReport, PublishRequest, ScheduleRequest, StopScheduleResponse};
use bulwark_workflow::WorkflowError;

use crate::review::{ReviewQuery, after_mutation};
use crate::{ApiError, AppState};

pub(crate) fn report_status(report: &PublishReport) -> StatusCode {
    let busy = WorkflowError::PublishInProgress.to_string();
    match report.error.as_deref() {
        Some(e) if e == busy => StatusCode::CONFLICT,
        _ => StatusCode::OK,
    }
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

    info!("Manual publish requested to {}", channel_id);
    let report = state.publisher.publish_submissions(&channel_id, &season).await;
    let status = report_status(&report);
    after_mutation(&state, &query, status, report).await
}

pub async fn create_schedule(
    State(state): State<AppState>,
    Json(req): Json<ScheduleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let status = state.scheduler.schedule(&req)?;
    Ok((StatusCode::CREATED, Json(status)))
}

pub async fn get_schedule(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.scheduler.status())
}

pub async fn delete_schedule(State(state): State<AppState>) -> impl IntoResponse {
    Json(StopScheduleResponse {
        stopped: state.scheduler.stop(),
    })
}
