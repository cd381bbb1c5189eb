use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub const OPPONENT_NUMBER_COUNTER: &str = "opponent_number";

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Store: running migration v1 (submissions + archive)");
        conn.execute_batch(
            "
            CREATE TABLE submissions (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id         TEXT NOT NULL,
                username        TEXT NOT NULL,
                code            TEXT NOT NULL,
                message         TEXT,
                extra_mention   TEXT,
                image_data      BLOB,
                image_filename  TEXT,
                created_at      TEXT NOT NULL,
                published       INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX idx_submissions_pending
                ON submissions(published, created_at);

            CREATE TABLE archive (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                submission_id   INTEGER NOT NULL,
                user_id         TEXT NOT NULL,
                username        TEXT NOT NULL,
                code            TEXT NOT NULL,
                message         TEXT,
                extra_mention   TEXT,
                image_data      BLOB,
                image_filename  TEXT,
                created_at      TEXT NOT NULL,
                archive_reason  TEXT NOT NULL CHECK (archive_reason IN ('deleted', 'published')),
                archived_at     TEXT NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Store: running migration v2 (opponent defenses)");
        conn.execute_batch(&format!(
            "
            CREATE TABLE opponent_defenses (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id         TEXT NOT NULL,
                username        TEXT NOT NULL,
                image_data      BLOB NOT NULL,
                image_filename  TEXT,
                created_at      TEXT NOT NULL,
                status          TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'approved')),
                processed_image BLOB,
                number          INTEGER UNIQUE,
                published       INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX idx_opponent_defenses_status
                ON opponent_defenses(status, created_at);

            CREATE TABLE counters (
                name    TEXT PRIMARY KEY,
                value   INTEGER NOT NULL
            );

            INSERT INTO counters (name, value) VALUES ('{OPPONENT_NUMBER_COUNTER}', 0);

            INSERT INTO schema_version (version) VALUES (2);
            "
        ))?;
    }

    info!("Store migrations complete");
    Ok(())
}
