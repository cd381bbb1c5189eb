use bulwark_types::models::{ArchiveReason, Submission};
use rusqlite::{Connection, Transaction, params};
use tracing::debug;

use crate::models::{SUBMISSION_COLUMNS, SubmissionRow, non_blank, now_timestamp};
use crate::{Database, OptionalExt, Result, StoreError};

/// Fields supplied when a player sends in a defense.
#[derive(Debug, Clone, Default)]
pub struct NewSubmission {
    pub user_id: String,
    pub username: String,
    pub code: String,
    pub message: Option<String>,
    pub extra_mention: Option<String>,
    pub image_data: Option<Vec<u8>>,
    pub image_filename: Option<String>,
}

impl Database {
    pub fn insert_submission(&self, new: &NewSubmission) -> Result<i64> {
        if new.code.trim().is_empty() {
            return Err(StoreError::Validation("code must not be empty".into()));
        }

        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO submissions
                    (user_id, username, code, message, extra_mention, image_data, image_filename, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    new.user_id,
                    new.username,
                    new.code,
                    non_blank(new.message.as_deref()),
                    non_blank(new.extra_mention.as_deref()),
                    new.image_data,
                    new.image_filename,
                    now_timestamp(),
                ],
            )?;
            let id = conn.last_insert_rowid();
            debug!("Inserted submission {} from {}", id, new.username);
            Ok(id)
        })
    }

    pub fn get_submission(&self, id: i64) -> Result<Option<Submission>> {
        self.with_conn(|conn| {
            query_submission(conn, id)?
                .map(Submission::try_from)
                .transpose()
        })
    }

    /// Unpublished submissions, oldest first.
    pub fn list_pending(&self) -> Result<Vec<Submission>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SUBMISSION_COLUMNS} FROM submissions
                 WHERE published = 0
                 ORDER BY created_at ASC, id ASC"
            ))?;

            let rows = stmt
                .query_map([], SubmissionRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(Submission::try_from).collect()
        })
    }

    pub fn update_code(&self, id: i64, code: &str) -> Result<()> {
        if code.trim().is_empty() {
            return Err(StoreError::Validation("code must not be empty".into()));
        }

        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE submissions SET code = ?1 WHERE id = ?2 AND published = 0",
                params![code, id],
            )?;
            ensure_pending_changed(conn, id, changed)
        })
    }

    pub fn update_message(
        &self,
        id: i64,
        message: Option<&str>,
        extra_mention: Option<&str>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE submissions SET message = ?1, extra_mention = ?2
                 WHERE id = ?3 AND published = 0",
                params![non_blank(message), non_blank(extra_mention), id],
            )?;
            ensure_pending_changed(conn, id, changed)
        })
    }

    /// Copy a pending submission into the archive and drop it from the live
    /// table, in one transaction. Returns the archive id.
    pub fn delete_to_archive(&self, id: i64, reason: ArchiveReason) -> Result<i64> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let row = pending_row(&tx, id)?;
            let archive_id = copy_to_archive(&tx, &row, reason)?;
            tx.execute("DELETE FROM submissions WHERE id = ?1", [id])?;
            tx.commit()?;

            debug!("Archived submission {} as {} ({})", id, archive_id, reason);
            Ok(archive_id)
        })
    }

    /// Flag a pending submission as published and keep an audit copy in the
    /// archive. The live row stays queryable by id. Returns the archive id.
    pub fn mark_published(&self, id: i64) -> Result<i64> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let row = pending_row(&tx, id)?;
            tx.execute("UPDATE submissions SET published = 1 WHERE id = ?1", [id])?;
            let archive_id = copy_to_archive(&tx, &row, ArchiveReason::Published)?;
            tx.commit()?;
            Ok(archive_id)
        })
    }
}

fn query_submission(conn: &Connection, id: i64) -> Result<Option<SubmissionRow>> {
    conn.query_row(
        &format!("SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE id = ?1"),
        [id],
        SubmissionRow::from_row,
    )
    .optional()
}

fn pending_row(tx: &Transaction<'_>, id: i64) -> Result<SubmissionRow> {
    let row = query_submission(tx, id)?.ok_or(StoreError::NotFound {
        entity: "submission",
        id,
    })?;
    if row.published {
        return Err(StoreError::Validation(format!(
            "submission {} is already published",
            id
        )));
    }
    Ok(row)
}

/// Zero rows changed by a `published = 0` guarded update means either the
/// row is gone or it is no longer pending.
fn ensure_pending_changed(conn: &Connection, id: i64, changed: usize) -> Result<()> {
    if changed > 0 {
        return Ok(());
    }
    match query_submission(conn, id)? {
        None => Err(StoreError::NotFound {
            entity: "submission",
            id,
        }),
        Some(_) => Err(StoreError::Validation(format!(
            "submission {} is already published",
            id
        ))),
    }
}

fn copy_to_archive(tx: &Transaction<'_>, row: &SubmissionRow, reason: ArchiveReason) -> Result<i64> {
    tx.execute(
        "INSERT INTO archive
            (submission_id, user_id, username, code, message, extra_mention,
             image_data, image_filename, created_at, archive_reason, archived_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            row.id,
            row.user_id,
            row.username,
            row.code,
            row.message,
            row.extra_mention,
            row.image_data,
            row.image_filename,
            row.created_at,
            reason.as_str(),
            now_timestamp(),
        ],
    )?;
    Ok(tx.last_insert_rowid())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_sub(user: &str, code: &str) -> NewSubmission {
        NewSubmission {
            user_id: user.to_string(),
            username: format!("{}-name", user),
            code: code.to_string(),
            image_data: Some(vec![1, 2, 3]),
            image_filename: Some("shot.png".into()),
            ..Default::default()
        }
    }

    #[test]
    fn empty_code_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let err = db.insert_submission(&new_sub("u1", "   ")).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(db.list_pending().unwrap().is_empty());
    }

    #[test]
    fn pending_is_oldest_first() {
        let db = Database::open_in_memory().unwrap();
        let a = db.insert_submission(&new_sub("u1", "A")).unwrap();
        let b = db.insert_submission(&new_sub("u2", "B")).unwrap();
        let c = db.insert_submission(&new_sub("u1", "C")).unwrap();

        let ids: Vec<i64> = db.list_pending().unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![a, b, c]);
    }

    #[test]
    fn edits_keep_created_at() {
        let db = Database::open_in_memory().unwrap();
        let id = db.insert_submission(&new_sub("u1", "A")).unwrap();
        let before = db.get_submission(id).unwrap().unwrap();

        db.update_code(id, "A2").unwrap();
        db.update_message(id, Some("gg"), Some("  ")).unwrap();

        let after = db.get_submission(id).unwrap().unwrap();
        assert_eq!(after.code, "A2");
        assert_eq!(after.message.as_deref(), Some("gg"));
        assert_eq!(after.extra_mention, None);
        assert_eq!(after.created_at, before.created_at);
    }

    #[test]
    fn edits_on_missing_id_are_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.update_code(42, "x").unwrap_err(),
            StoreError::NotFound { id: 42, .. }
        ));
        assert!(matches!(
            db.update_message(42, None, None).unwrap_err(),
            StoreError::NotFound { id: 42, .. }
        ));
        assert!(matches!(
            db.delete_to_archive(42, ArchiveReason::Deleted).unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }

    #[test]
    fn delete_moves_row_to_archive() {
        let db = Database::open_in_memory().unwrap();
        let id = db.insert_submission(&new_sub("u1", "A")).unwrap();

        db.delete_to_archive(id, ArchiveReason::Deleted).unwrap();

        assert!(db.list_pending().unwrap().is_empty());
        assert!(db.get_submission(id).unwrap().is_none());
        let archived = db.list_archived().unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].submission_id, id);
        assert_eq!(archived[0].archive_reason, ArchiveReason::Deleted);

        let next = db.insert_submission(&new_sub("u1", "B")).unwrap();
        assert!(next > id);
    }

    #[test]
    fn publish_flags_row_and_archives_copy() {
        let db = Database::open_in_memory().unwrap();
        let id = db.insert_submission(&new_sub("u1", "A")).unwrap();

        db.mark_published(id).unwrap();

        let live = db.get_submission(id).unwrap().unwrap();
        assert!(live.published);
        assert!(db.list_pending().unwrap().is_empty());

        let archived = db.list_archived().unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].archive_reason, ArchiveReason::Published);

        // terminal: no second publish, no edits
        assert!(matches!(db.mark_published(id).unwrap_err(), StoreError::Validation(_)));
        assert!(matches!(db.update_code(id, "B").unwrap_err(), StoreError::Validation(_)));
        assert_eq!(db.list_archived().unwrap().len(), 1);
    }
}
