use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("database lock poisoned")]
    Poisoned,
}

impl StoreError {
    /// True for failures of the persistence layer itself, as opposed to a
    /// rejected request.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Self::Sqlite(_) | Self::Io(_) | Self::Corrupt(_) | Self::Poisoned
        )
    }
}
