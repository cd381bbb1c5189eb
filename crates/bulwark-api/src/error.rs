use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use bulwark_workflow::WorkflowError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing or invalid admin token")]
    Unauthorized,

    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Workflow(WorkflowError::Join(err))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Workflow(e) => match e {
                WorkflowError::Validation(_) | WorkflowError::InvalidSchedule(_) => {
                    StatusCode::BAD_REQUEST
                }
                WorkflowError::NotFound { .. } | WorkflowError::SessionNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                WorkflowError::PublishInProgress => StatusCode::CONFLICT,
                WorkflowError::ImageProcessing(_) => StatusCode::UNPROCESSABLE_ENTITY,
                WorkflowError::Transport(_) => StatusCode::BAD_GATEWAY,
                WorkflowError::Storage(_) | WorkflowError::Join(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Run synchronous store work off the async runtime.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, WorkflowError> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}
