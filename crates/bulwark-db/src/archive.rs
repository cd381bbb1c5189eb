use bulwark_types::models::ArchivedSubmission;
use rusqlite::params;
use tracing::debug;

use crate::models::{ARCHIVE_COLUMNS, ArchiveRow};
use crate::{Database, OptionalExt, Result, StoreError};

impl Database {
    /// Archived submissions, most recently archived first.
    pub fn list_archived(&self) -> Result<Vec<ArchivedSubmission>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ARCHIVE_COLUMNS} FROM archive ORDER BY archived_at DESC, id DESC"
            ))?;

            let rows = stmt
                .query_map([], ArchiveRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(ArchivedSubmission::try_from).collect()
        })
    }

    pub fn get_archived(&self, archive_id: i64) -> Result<Option<ArchivedSubmission>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {ARCHIVE_COLUMNS} FROM archive WHERE id = ?1"),
                [archive_id],
                ArchiveRow::from_row,
            )
            .optional()?
            .map(ArchivedSubmission::try_from)
            .transpose()
        })
    }

    /// Recreate an archived submission as a new pending row and drop the
    /// archive entry. The new row always gets a fresh id; `created_at` is
    /// carried over so the item returns to its old queue position.
    pub fn restore_from_archive(&self, archive_id: i64) -> Result<i64> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let row = tx
                .query_row(
                    &format!("SELECT {ARCHIVE_COLUMNS} FROM archive WHERE id = ?1"),
                    [archive_id],
                    ArchiveRow::from_row,
                )
                .optional()?
                .ok_or(StoreError::NotFound {
                    entity: "archived submission",
                    id: archive_id,
                })?;

            tx.execute(
                "INSERT INTO submissions
                    (user_id, username, code, message, extra_mention, image_data, image_filename, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    row.user_id,
                    row.username,
                    row.code,
                    row.message,
                    row.extra_mention,
                    row.image_data,
                    row.image_filename,
                    row.created_at,
                ],
            )?;
            let new_id = tx.last_insert_rowid();
            tx.execute("DELETE FROM archive WHERE id = ?1", [archive_id])?;
            tx.commit()?;

            debug!(
                "Restored archive {} (was submission {}) as submission {}",
                archive_id, row.submission_id, new_id
            );
            Ok(new_id)
        })
    }

    pub fn delete_permanently(&self, archive_id: i64) -> Result<()> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("DELETE FROM archive WHERE id = ?1", [archive_id])?;
            if changed == 0 {
                return Err(StoreError::NotFound {
                    entity: "archived submission",
                    id: archive_id,
                });
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use bulwark_types::models::ArchiveReason;

    use super::*;
    use crate::NewSubmission;

    fn seeded() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let id = db
            .insert_submission(&NewSubmission {
                user_id: "u1".into(),
                username: "alice".into(),
                code: "AAA-111".into(),
                message: Some("try this".into()),
                ..Default::default()
            })
            .unwrap();
        (db, id)
    }

    #[test]
    fn restore_assigns_new_id_and_removes_archive_row() {
        let (db, id) = seeded();
        let archive_id = db.delete_to_archive(id, ArchiveReason::Deleted).unwrap();

        let new_id = db.restore_from_archive(archive_id).unwrap();

        assert_ne!(new_id, id);
        assert!(db.list_archived().unwrap().is_empty());
        let pending = db.list_pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, new_id);
        assert_eq!(pending[0].code, "AAA-111");
        assert_eq!(pending[0].message.as_deref(), Some("try this"));
        assert!(!pending[0].published);
    }

    #[test]
    fn restore_missing_is_not_found() {
        let (db, _) = seeded();
        assert!(matches!(
            db.restore_from_archive(99).unwrap_err(),
            StoreError::NotFound { id: 99, .. }
        ));
    }

    #[test]
    fn permanent_delete_only_touches_archive() {
        let (db, id) = seeded();
        let other = db
            .insert_submission(&NewSubmission {
                user_id: "u2".into(),
                username: "bob".into(),
                code: "B".into(),
                ..Default::default()
            })
            .unwrap();
        let archive_id = db.delete_to_archive(id, ArchiveReason::Deleted).unwrap();

        db.delete_permanently(archive_id).unwrap();

        assert!(db.get_archived(archive_id).unwrap().is_none());
        assert_eq!(db.list_pending().unwrap()[0].id, other);
        assert!(matches!(
            db.delete_permanently(archive_id).unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }

    #[test]
    fn archive_lists_newest_first() {
        let (db, first) = seeded();
        let second = db
            .insert_submission(&NewSubmission {
                user_id: "u2".into(),
                username: "bob".into(),
                code: "B".into(),
                ..Default::default()
            })
            .unwrap();

        db.delete_to_archive(first, ArchiveReason::Deleted).unwrap();
        db.mark_published(second).unwrap();

        let archived = db.list_archived().unwrap();
        assert_eq!(archived[0].submission_id, second);
        assert_eq!(archived[1].submission_id, first);
    }
}
