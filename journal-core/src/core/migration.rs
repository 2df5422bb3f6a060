//! Ledger-tracked schema migrations.
//!
//! [`MIGRATIONS`] is applied strictly in declaration order. The
//! `schema_migrations` ledger only answers "has this id run?"; it is never used
//! to decide order. Each migration runs in its own transaction together with
//! its ledger insert, so a crash can never record a half-applied migration.
//!
//! Migration bodies must be idempotent on their own: a body that adds a column
//! checks for it first, so re-running after a crash between the schema change
//! and the ledger insert is harmless.

use crate::{JournalError, Result, Store, TransactionMode};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashSet;

const LEDGER_DDL: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    id TEXT PRIMARY KEY,
    applied_at TEXT NOT NULL
)";

/// One schema change, identified by an id that sorts in declaration order.
#[derive(Clone, Copy)]
pub struct Migration {
    pub id: &'static str,
    pub apply: fn(&Connection) -> Result<()>,
}

impl std::fmt::Debug for Migration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration").field("id", &self.id).finish_non_exhaustive()
    }
}

/// A row of the `schema_migrations` ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRow {
    pub id: String,
    pub applied_at: DateTime<Utc>,
}

/// Every migration the current code knows about, oldest first.
///
/// Append only. Reordering or editing an entry that has shipped changes the
/// schema of databases that already ledgered it.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        id: "001_initial_schema",
        apply: initial_schema,
    },
    Migration {
        id: "002_entry_mood",
        apply: entry_mood,
    },
    Migration {
        id: "003_entry_flags",
        apply: entry_flags,
    },
    Migration {
        id: "004_entry_indexes",
        apply: entry_indexes,
    },
];

fn initial_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(include_str!("schema.sql"))?;
    Ok(())
}

fn entry_mood(conn: &Connection) -> Result<()> {
    add_column_if_missing(conn, "entries", "mood", "TEXT")?;
    Ok(())
}

fn entry_flags(conn: &Connection) -> Result<()> {
    add_column_if_missing(conn, "entries", "is_favorite", "INTEGER NOT NULL DEFAULT 0")?;
    add_column_if_missing(conn, "entries", "is_archived", "INTEGER NOT NULL DEFAULT 0")?;
    Ok(())
}

fn entry_indexes(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_entries_modified_at ON entries(modified_at);
         CREATE INDEX IF NOT EXISTS idx_entries_journal_id ON entries(journal_id);
         CREATE INDEX IF NOT EXISTS idx_entries_entry_date ON entries(entry_date);",
    )?;
    Ok(())
}

/// Applies every pending migration in [`MIGRATIONS`]. Call once at startup.
///
/// Returns the ids applied by this call (empty when already up to date).
///
/// # Errors
///
/// Returns [`JournalError::Migration`] naming the first migration that failed.
/// That migration is rolled back and no later migration is attempted; the
/// caller must not continue with a partially migrated schema.
pub fn apply_all(store: &mut Store) -> Result<Vec<&'static str>> {
    apply_migrations(store, MIGRATIONS)
}

/// Applies the pending members of `migrations`, in slice order.
pub fn apply_migrations(store: &mut Store, migrations: &[Migration]) -> Result<Vec<&'static str>> {
    store.connection().execute_batch(LEDGER_DDL)?;
    let applied = applied_ids(store.connection())?;

    let mut newly_applied = Vec::new();
    for migration in migrations {
        if applied.contains(migration.id) {
            continue;
        }
        store
            .run_in_transaction(TransactionMode::Immediate, |scope| {
                (migration.apply)(scope.connection())?;
                scope.execute(
                    "INSERT INTO schema_migrations (id, applied_at) VALUES (?1, ?2)",
                    rusqlite::params![migration.id, Utc::now()],
                )?;
                Ok(())
            })
            .map_err(|e| {
                log::error!("migration {} failed: {e}", migration.id);
                JournalError::Migration {
                    id: migration.id.to_string(),
                    source: Box::new(e),
                }
            })?;
        log::info!("applied migration {}", migration.id);
        newly_applied.push(migration.id);
    }
    Ok(newly_applied)
}

/// Returns the ledger in the order migrations were recorded.
///
/// A store that has never been migrated has no ledger and yields an empty list.
pub fn applied_migrations(conn: &Connection) -> Result<Vec<LedgerRow>> {
    if !table_exists(conn, "schema_migrations")? {
        return Ok(vec![]);
    }
    let mut stmt = conn.prepare("SELECT id, applied_at FROM schema_migrations ORDER BY rowid")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(LedgerRow {
                id: row.get(0)?,
                applied_at: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn applied_ids(conn: &Connection) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT id FROM schema_migrations")?;
    let ids = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<HashSet<_>>>()?;
    Ok(ids)
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Whether `table` currently has a column named `column`.
pub fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        [table, column],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Adds `column` to `table` unless it is already there. Returns whether it was added.
///
/// `table`, `column` and `definition` are spliced into DDL and must be
/// trusted constants.
pub fn add_column_if_missing(
    conn: &Connection,
    table: &str,
    column: &str,
    definition: &str,
) -> Result<bool> {
    if column_exists(conn, table, column)? {
        return Ok(false);
    }
    conn.execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {column} {definition}"))?;
    Ok(true)
}
