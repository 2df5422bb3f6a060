//! Persistence core for a local-first journaling application.
//!
//! [`Database::open`] is the startup entry point: it opens the SQLite data
//! file as a [`Store`], brings the schema up to date with [`apply_all`] and
//! sets up a [`BackupRotator`] next to it. Writes go through
//! [`Store::run_in_transaction`] and its [`Scope`]/[`Savepoint`] handles;
//! reads for the query surface go through [`search`] and [`advanced_search`].
//!
//! Types are re-exported from their respective sub-modules for convenience;
//! consumers should import from the crate root rather than the `core` module.

pub mod core;

// Re-export commonly used types.
#[doc(inline)]
pub use core::{
    backup::{BackupRecord, BackupRotator},
    config::{BackupConfig, CoreConfig, DEFAULT_MAX_BACKUPS},
    database::Database,
    entry::{Entry, Journal, NewEntry},
    error::{JournalError, Result},
    migration::{
        add_column_if_missing, applied_migrations, apply_all, apply_migrations, column_exists,
        LedgerRow, Migration, MIGRATIONS,
    },
    search::{advanced_search, search, AdvancedSearch, ArchiveFilter, SearchOptions, SearchResult},
    snippet::{extract_snippet, fold_case, strip_markup, MatchedField, Snippet},
    storage::Store,
    transaction::{LocalBoxFuture, Savepoint, Scope, TransactionMode},
};

/// Statements for journals, entries and settings, run inside a [`Scope`].
pub use core::repository;
