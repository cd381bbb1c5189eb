use axum::{Json, extract::State, response::IntoResponse};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;

use bulwark_types::api::{DmEventRequest, IntakeResponse};
use bulwark_workflow::{IncomingAttachment, IncomingDm, WorkflowError};

use crate::{ApiError, AppState};

/// Deliver one direct message from a player.
pub async fn receive_dm(
    State(state): State<AppState>,
    Json(req): Json<DmEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let attachments = req
        .attachments
        .into_iter()
        .map(|a| {
            let data = B64.decode(&a.data).map_err(|_| {
                WorkflowError::Validation(format!("attachment {} is not valid base64", a.filename))
            })?;
            Ok(IncomingAttachment {
                filename: a.filename,
                content_type: a.content_type,
                data,
            })
        })
        .collect::<Result<Vec<_>, WorkflowError>>()?;

    let reply = state
        .intake
        .handle(IncomingDm {
            user_id: req.user_id,
            username: req.username,
            content: req.content,
            command: req.command,
            attachments,
        })
        .await?;

    Ok(Json(IntakeResponse { reply }))
}
