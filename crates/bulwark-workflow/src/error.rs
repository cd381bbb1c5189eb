use thiserror::Error;
use uuid::Uuid;

use bulwark_db::StoreError;
use bulwark_gateway::TransportError;
use bulwark_imaging::ImageError;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("review session {0} not found")]
    SessionNotFound(Uuid),

    #[error("storage failure: {0}")]
    Storage(#[source] StoreError),

    #[error("image processing failed: {0}")]
    ImageProcessing(#[from] ImageError),

    #[error("send failed: {0}")]
    Transport(#[from] TransportError),

    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("publish already in progress")]
    PublishInProgress,

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(msg) => Self::Validation(msg),
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            other => Self::Storage(other),
        }
    }
}
