//! Error types for the journal persistence core.

use thiserror::Error;

/// All errors that can occur within the journal core library.
#[derive(Debug, Error)]
pub enum JournalError {
    /// A SQLite operation failed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A schema migration failed; it was rolled back and later migrations were not run.
    #[error("Migration {id} failed: {source}")]
    Migration {
        id: String,
        #[source]
        source: Box<JournalError>,
    },

    /// A unit of work failed and rolling the transaction back failed as well.
    ///
    /// `original` is the error raised by the unit of work.
    #[error("Rollback failed ({rollback}) after: {original}")]
    RollbackFailed {
        original: Box<JournalError>,
        rollback: rusqlite::Error,
    },

    /// A savepoint name was malformed or is already open in this transaction.
    #[error("Invalid savepoint: {0}")]
    InvalidSavepoint(String),

    /// An entry ID was requested that does not exist in the database.
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    /// A journal ID was requested that does not exist in the database.
    #[error("Journal not found: {0}")]
    JournalNotFound(String),

    /// The opened file is not a usable journal database.
    #[error("Invalid store: {0}")]
    InvalidStore(String),

    /// An I/O operation on the filesystem failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be (de)serialized as JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias that pins the error type to [`JournalError`].
pub type Result<T> = std::result::Result<T, JournalError>;

impl JournalError {
    /// Returns a short, human-readable message suitable for display to the end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Database(e) => format!("Failed to save: {e}"),
            Self::Migration { id, .. } => format!("Could not upgrade the journal database ({id})"),
            Self::RollbackFailed { original, .. } => {
                format!("Failed to save and could not undo partial changes: {}", original.user_message())
            }
            Self::InvalidSavepoint(msg) => msg.clone(),
            Self::EntryNotFound(_) => "Entry no longer exists".to_string(),
            Self::JournalNotFound(_) => "Journal no longer exists".to_string(),
            Self::InvalidStore(_) => "Could not open journal file".to_string(),
            Self::Io(e) => format!("File error: {e}"),
            Self::Json(e) => format!("Data format error: {e}"),
        }
    }
}
