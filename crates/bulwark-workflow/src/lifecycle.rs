use std::sync::Arc;

use tracing::info;

use bulwark_db::{Database, NewSubmission};
use bulwark_types::models::{ArchiveReason, ArchivedSubmission, Submission};

use crate::WorkflowError;

/// Admin-driven transitions of a submission:
///
/// ```text
/// PENDING --publish--> PUBLISHED (+ archive copy)
/// PENDING --delete---> ARCHIVED(deleted)
/// ARCHIVED --restore-> PENDING (new id)
/// ARCHIVED --purge---> gone
/// ```
///
/// Edits are only accepted while a submission is pending and never touch
/// `created_at`.
#[derive(Clone)]
pub struct SubmissionLifecycle {
    db: Arc<Database>,
}

impl SubmissionLifecycle {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn submit(&self, new: &NewSubmission) -> Result<i64, WorkflowError> {
        let id = self.db.insert_submission(new)?;
        info!("New submission {} from {}", id, new.username);
        Ok(id)
    }

    pub fn pending(&self) -> Result<Vec<Submission>, WorkflowError> {
        Ok(self.db.list_pending()?)
    }

    pub fn get(&self, id: i64) -> Result<Submission, WorkflowError> {
        self.db
            .get_submission(id)?
            .ok_or(WorkflowError::NotFound {
                entity: "submission",
                id,
            })
    }

    pub fn edit_code(&self, id: i64, code: &str) -> Result<(), WorkflowError> {
        self.db.update_code(id, code)?;
        info!("Submission {} code updated", id);
        Ok(())
    }

    pub fn edit_message(
        &self,
        id: i64,
        message: Option<&str>,
        extra_mention: Option<&str>,
    ) -> Result<(), WorkflowError> {
        self.db.update_message(id, message, extra_mention)?;
        info!("Submission {} message updated", id);
        Ok(())
    }

    /// Move a pending submission to the archive. Returns the archive id.
    pub fn delete(&self, id: i64) -> Result<i64, WorkflowError> {
        let archive_id = self.db.delete_to_archive(id, ArchiveReason::Deleted)?;
        info!("Submission {} deleted (archive {})", id, archive_id);
        Ok(archive_id)
    }

    pub fn archived(&self) -> Result<Vec<ArchivedSubmission>, WorkflowError> {
        Ok(self.db.list_archived()?)
    }

    /// Bring an archived submission back as a new pending one.
    pub fn restore(&self, archive_id: i64) -> Result<i64, WorkflowError> {
        let new_id = self.db.restore_from_archive(archive_id)?;
        info!("Archive {} restored as submission {}", archive_id, new_id);
        Ok(new_id)
    }

    pub fn purge(&self, archive_id: i64) -> Result<(), WorkflowError> {
        self.db.delete_permanently(archive_id)?;
        info!("Archive {} permanently deleted", archive_id);
        Ok(())
    }
}
