//! The single SQLite connection every other part of the core goes through.

use crate::core::search::register_functions;
use crate::core::transaction::SavepointNames;
use crate::{JournalError, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

/// An open journal data file.
///
/// A `Store` owns exactly one connection. Write access (`&mut Store`) is what
/// makes it impossible to open two top-level transactions at once.
#[derive(Debug)]
pub struct Store {
    conn: Connection,
    path: Option<PathBuf>,
    savepoints: SavepointNames,
}

impl Store {
    /// Opens (or creates) the data file at `path` and applies connection pragmas.
    ///
    /// The schema is not touched here; run [`crate::apply_all`] before any other access.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Database`] if the file cannot be opened or is not a
    /// SQLite database.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(&path)?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;",
        )?;
        register_functions(&conn)?;
        Ok(Self {
            conn,
            path: Some(path.as_ref().to_path_buf()),
            savepoints: SavepointNames::default(),
        })
    }

    /// Opens a private in-memory store. Used by tests and scratch work.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        register_functions(&conn)?;
        Ok(Self {
            conn,
            path: None,
            savepoints: SavepointNames::default(),
        })
    }

    /// Path of the data file, or `None` for an in-memory store.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Forces every committed write into the main data file.
    ///
    /// Must be called right before the data file is copied or replaced.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidStore`] if another connection kept the
    /// checkpoint from completing, or [`JournalError::Database`] on failure.
    pub fn flush(&self) -> Result<()> {
        let busy: i64 = self
            .conn
            .query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |row| row.get(0))?;
        if busy != 0 {
            return Err(JournalError::InvalidStore(
                "Checkpoint could not complete; the data file is busy".to_string(),
            ));
        }
        log::debug!("flushed write-ahead log for {:?}", self.path);
        Ok(())
    }

    /// Closes the connection, reporting any error SQLite raises while doing so.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| JournalError::Database(e))
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut Connection, &SavepointNames) {
        (&mut self.conn, &self.savepoints)
    }
}
