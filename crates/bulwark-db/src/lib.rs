pub mod archive;
pub mod error;
pub mod migrations;
pub mod models;
pub mod opponents;
pub mod submissions;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::backup::{Backup, Progress};
use rusqlite::{Connection, DatabaseName};
use tracing::{debug, error, info};

pub use error::{Result, StoreError};
pub use opponents::NewOpponentDefense;
pub use submissions::NewSubmission;

/// The whole store lives in an in-memory SQLite database. Every successful
/// mutation is followed by a full backup of that database to `snapshot_path`,
/// written to a temp file and renamed over the previous snapshot.
///
/// A second in-memory copy tracks the last snapshot that reached disk. When a
/// snapshot write fails the live database is rolled back to it, so a mutation
/// that returns an error is never visible afterwards.
pub struct Database {
    conn: Mutex<Connection>,
    snapshot: Option<Snapshot>,
}

struct Snapshot {
    path: PathBuf,
    last_good: Mutex<Connection>,
}

impl Database {
    /// Load the snapshot at `path` if it exists, otherwise start empty.
    pub fn open(path: &Path) -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;

        if path.exists() {
            conn.restore(DatabaseName::Main, path, None::<fn(Progress)>)?;
            info!("Loaded snapshot from {}", path.display());
        } else if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
            info!("No snapshot at {}, starting with an empty store", path.display());
        }

        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;

        let db = Self {
            conn: Mutex::new(conn),
            snapshot: Some(Snapshot {
                path: path.to_path_buf(),
                last_good: Mutex::new(Connection::open_in_memory()?),
            }),
        };
        db.with_conn_mut(|_| Ok(()))?;
        Ok(db)
    }

    /// A store that is never written to disk.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            snapshot: None,
        })
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot.as_ref().map(|s| s.path.as_path())
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&conn)
    }

    /// Run a mutation and persist the snapshot before returning. Nothing is
    /// written when `f` fails, and the mutation is undone when the snapshot
    /// cannot be written.
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let value = f(&mut conn)?;

        let Some(snapshot) = &self.snapshot else {
            return Ok(value);
        };
        if let Err(e) = snapshot.write(&conn) {
            error!("Snapshot write to {} failed: {}", snapshot.path.display(), e);
            snapshot.roll_back(&mut conn)?;
            return Err(e);
        }
        snapshot.remember(&conn);
        Ok(value)
    }
}

impl Snapshot {
    fn write(&self, conn: &Connection) -> Result<()> {
        let mut tmp_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        tmp_name.push(".tmp");
        let tmp = self.path.with_file_name(tmp_name);

        // Left over from an interrupted write
        if tmp.exists() {
            fs::remove_file(&tmp)?;
        }
        conn.backup(DatabaseName::Main, &tmp, None)?;
        fs::rename(&tmp, &self.path)?;

        debug!("Snapshot written to {}", self.path.display());
        Ok(())
    }

    /// Copy the state that just reached disk into `last_good`.
    fn remember(&self, conn: &Connection) {
        let result = self
            .last_good
            .lock()
            .map_err(|_| StoreError::Poisoned)
            .and_then(|mut good| copy_database(conn, &mut good));
        if let Err(e) = result {
            error!("Could not keep a rollback copy of the store: {}", e);
        }
    }

    fn roll_back(&self, conn: &mut Connection) -> Result<()> {
        let good = self.last_good.lock().map_err(|_| StoreError::Poisoned)?;
        copy_database(&good, conn)?;
        info!("Store rolled back to the last written snapshot");
        Ok(())
    }
}

fn copy_database(from: &Connection, to: &mut Connection) -> Result<()> {
    let backup = Backup::new(from, to)?;
    backup.run_to_completion(-1, Duration::ZERO, None)?;
    Ok(())
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
