use bulwark_types::models::{DefenseStatus, OpponentDefense};
use rusqlite::{Connection, params};
use tracing::debug;

use crate::migrations::OPPONENT_NUMBER_COUNTER;
use crate::models::{OPPONENT_COLUMNS, OpponentRow, now_timestamp};
use crate::{Database, OptionalExt, Result, StoreError};

#[derive(Debug, Clone, Default)]
pub struct NewOpponentDefense {
    pub user_id: String,
    pub username: String,
    pub image_data: Vec<u8>,
    pub image_filename: Option<String>,
}

impl Database {
    pub fn insert_opponent_defense(&self, new: &NewOpponentDefense) -> Result<i64> {
        let ids = self.insert_opponent_defenses(std::slice::from_ref(new))?;
        ids.first().copied().ok_or(StoreError::Corrupt("insert returned no id".into()))
    }

    /// Insert a batch in one transaction: either every image is stored or none.
    pub fn insert_opponent_defenses(&self, batch: &[NewOpponentDefense]) -> Result<Vec<i64>> {
        if let Some(i) = batch.iter().position(|n| n.image_data.is_empty()) {
            return Err(StoreError::Validation(format!("image {} must not be empty", i + 1)));
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut ids = Vec::with_capacity(batch.len());
            for new in batch {
                tx.execute(
                    "INSERT INTO opponent_defenses (user_id, username, image_data, image_filename, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        new.user_id,
                        new.username,
                        new.image_data,
                        new.image_filename,
                        now_timestamp(),
                    ],
                )?;
                ids.push(tx.last_insert_rowid());
            }
            tx.commit()?;
            Ok(ids)
        })
    }

    pub fn get_opponent_defense(&self, id: i64) -> Result<Option<OpponentDefense>> {
        self.with_conn(|conn| {
            query_opponent(conn, id)?
                .map(OpponentDefense::try_from)
                .transpose()
        })
    }

    pub fn list_pending_opponent_defenses(&self) -> Result<Vec<OpponentDefense>> {
        self.query_opponents("WHERE status = 'pending' ORDER BY created_at ASC, id ASC")
    }

    /// Approved defenses, published ones included, by number.
    pub fn list_approved_opponent_defenses(&self) -> Result<Vec<OpponentDefense>> {
        self.query_opponents("WHERE status = 'approved' ORDER BY number ASC")
    }

    /// Approved defenses not yet sent anywhere, oldest first.
    pub fn list_publishable_opponent_defenses(&self) -> Result<Vec<OpponentDefense>> {
        self.query_opponents(
            "WHERE status = 'approved' AND published = 0 ORDER BY created_at ASC, id ASC",
        )
    }

    /// Store the approval outcome for a pending defense. `number` must come
    /// from [`Database::next_opponent_number`].
    pub fn approve_opponent_defense(
        &self,
        id: i64,
        processed_image: &[u8],
        number: i64,
    ) -> Result<()> {
        if number <= 0 {
            return Err(StoreError::Validation(format!(
                "opponent number must be positive, got {}",
                number
            )));
        }

        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE opponent_defenses
                 SET status = ?1, processed_image = ?2, number = ?3
                 WHERE id = ?4 AND status = 'pending'",
                params![DefenseStatus::Approved.as_str(), processed_image, number, id],
            )?;
            if changed == 0 {
                return Err(missing_or_wrong_state(conn, id, "is not pending")?);
            }
            debug!("Approved opponent defense {} as #{}", id, number);
            Ok(())
        })
    }

    /// Hard delete, pending or approved. Nothing is archived.
    pub fn reject_opponent_defense(&self, id: i64) -> Result<()> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("DELETE FROM opponent_defenses WHERE id = ?1", [id])?;
            if changed == 0 {
                return Err(StoreError::NotFound {
                    entity: "opponent defense",
                    id,
                });
            }
            Ok(())
        })
    }

    /// Advance the persisted counter and return the new value. Numbers are
    /// never handed out twice, even if the approval that asked for one fails.
    pub fn next_opponent_number(&self) -> Result<i64> {
        self.with_conn_mut(|conn| {
            let value = conn.query_row(
                "UPDATE counters SET value = value + 1 WHERE name = ?1 RETURNING value",
                [OPPONENT_NUMBER_COUNTER],
                |r| r.get(0),
            )?;
            Ok(value)
        })
    }

    /// Last number handed out, 0 if none.
    pub fn current_opponent_number(&self) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT value FROM counters WHERE name = ?1",
                [OPPONENT_NUMBER_COUNTER],
                |r| r.get(0),
            )?)
        })
    }

    pub fn mark_opponent_published(&self, id: i64) -> Result<()> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE opponent_defenses SET published = 1
                 WHERE id = ?1 AND status = 'approved' AND published = 0",
                [id],
            )?;
            if changed == 0 {
                return Err(missing_or_wrong_state(conn, id, "is not an unpublished approved defense")?);
            }
            Ok(())
        })
    }

    /// Remove every opponent defense. The number counter is left alone.
    pub fn clear_all_opponent_defenses(&self) -> Result<usize> {
        self.with_conn_mut(|conn| Ok(conn.execute("DELETE FROM opponent_defenses", [])?))
    }

    fn query_opponents(&self, clause: &str) -> Result<Vec<OpponentDefense>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {OPPONENT_COLUMNS} FROM opponent_defenses {clause}"))?;

            let rows = stmt
                .query_map([], OpponentRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(OpponentDefense::try_from).collect()
        })
    }
}

fn query_opponent(conn: &Connection, id: i64) -> Result<Option<OpponentRow>> {
    conn.query_row(
        &format!("SELECT {OPPONENT_COLUMNS} FROM opponent_defenses WHERE id = ?1"),
        [id],
        OpponentRow::from_row,
    )
    .optional()
}

fn missing_or_wrong_state(conn: &Connection, id: i64, what: &str) -> Result<StoreError> {
    Ok(match query_opponent(conn, id)? {
        None => StoreError::NotFound {
            entity: "opponent defense",
            id,
        },
        Some(_) => StoreError::Validation(format!("opponent defense {} {}", id, what)),
    })
}
