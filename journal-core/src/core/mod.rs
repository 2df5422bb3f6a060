//! Internal domain modules for the journal core library.
//!
//! All public types from these modules are re-exported at the crate root
//! with `#[doc(inline)]`; import from there in preference to this module.

pub mod backup;
pub mod config;
pub mod database;
pub mod entry;
pub mod error;
pub mod migration;
pub mod repository;
pub mod search;
pub mod snippet;
pub mod storage;
pub mod transaction;

#[doc(inline)]
pub use backup::{BackupRecord, BackupRotator};
#[doc(inline)]
pub use config::{BackupConfig, CoreConfig, DEFAULT_MAX_BACKUPS};
#[doc(inline)]
pub use database::Database;
#[doc(inline)]
pub use entry::{Entry, Journal, NewEntry};
#[doc(inline)]
pub use error::{JournalError, Result};
#[doc(inline)]
pub use migration::{
    add_column_if_missing, applied_migrations, apply_all, apply_migrations, column_exists,
    LedgerRow, Migration, MIGRATIONS,
};
#[doc(inline)]
pub use search::{advanced_search, search, AdvancedSearch, ArchiveFilter, SearchOptions, SearchResult};
#[doc(inline)]
pub use snippet::{extract_snippet, fold_case, strip_markup, MatchedField, Snippet};
#[doc(inline)]
pub use storage::Store;
#[doc(inline)]
pub use transaction::{LocalBoxFuture, Savepoint, Scope, TransactionMode};
