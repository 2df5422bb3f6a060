//! Transactions and nested savepoints over a [`Store`].
//!
//! Every write path runs inside [`Store::run_in_transaction`] (or its async
//! twin). The unit of work receives a [`Scope`], which derefs to the
//! underlying [`Connection`] for issuing statements and can open
//! [`Savepoint`]s for partial rollback.
//!
//! ```rust
//! use journal_core::{Store, TransactionMode};
//!
//! let mut store = Store::open_in_memory().unwrap();
//! store.connection().execute_batch("CREATE TABLE t (v INTEGER)").unwrap();
//!
//! store.run_in_transaction(TransactionMode::Immediate, |scope| {
//!     scope.execute("INSERT INTO t VALUES (1)", [])?;
//!     // The optional step fails, only its own write is undone.
//!     let _ = scope.with_savepoint(|sp| {
//!         sp.execute("INSERT INTO t VALUES (2)", [])?;
//!         Err::<(), _>(journal_core::JournalError::InvalidSavepoint("skip".into()))
//!     });
//!     Ok(())
//! }).unwrap();
//!
//! let count: i64 = store.connection()
//!     .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
//!     .unwrap();
//! assert_eq!(count, 1);
//! ```

use crate::{JournalError, Result, Store};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::ops::Deref;
use std::pin::Pin;

/// A boxed future that may borrow the transaction scope. Not `Send`: the
/// connection must stay on the thread that opened it.
pub type LocalBoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// When SQLite acquires the write lock for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum TransactionMode {
    /// Locks are taken lazily by the first read or write.
    Deferred,
    /// The write lock is taken at `BEGIN`.
    #[default]
    Immediate,
    /// The write lock is taken at `BEGIN` and readers on other connections are blocked.
    Exclusive,
}

impl From<TransactionMode> for TransactionBehavior {
    fn from(mode: TransactionMode) -> Self {
        match mode {
            TransactionMode::Deferred => TransactionBehavior::Deferred,
            TransactionMode::Immediate => TransactionBehavior::Immediate,
            TransactionMode::Exclusive => TransactionBehavior::Exclusive,
        }
    }
}

/// Savepoint bookkeeping owned by a [`Store`].
///
/// `next` only ever grows, so generated names are never reused for the life
/// of the connection. Each open savepoint also gets a token, so a stale
/// handle can never act on a newer savepoint that took the same name.
#[derive(Debug, Default)]
pub(crate) struct SavepointNames {
    next: Cell<u64>,
    next_token: Cell<u64>,
    open: RefCell<Vec<(u64, String)>>,
}

impl SavepointNames {
    fn generate(&self) -> String {
        let open = self.open.borrow();
        loop {
            let n = self.next.get() + 1;
            self.next.set(n);
            let name = format!("sp_{n}");
            if !open.iter().any(|(_, taken)| *taken == name) {
                return name;
            }
        }
    }

    fn push(&self, name: &str) -> Result<u64> {
        let mut open = self.open.borrow_mut();
        if open.iter().any(|(_, taken)| taken == name) {
            return Err(JournalError::InvalidSavepoint(format!(
                "savepoint '{name}' is already open in this transaction"
            )));
        }
        let token = self.next_token.get() + 1;
        self.next_token.set(token);
        open.push((token, name.to_string()));
        Ok(token)
    }

    /// Forgets the savepoint and everything opened after it; SQLite discards those too.
    ///
    /// Returns `false` when it was already gone, released or rolled back
    /// together with an enclosing savepoint.
    fn close(&self, token: u64) -> bool {
        let mut open = self.open.borrow_mut();
        match open.iter().position(|(t, _)| *t == token) {
            Some(pos) => {
                open.truncate(pos);
                true
            }
            None => false,
        }
    }

    fn clear(&self) {
        self.open.borrow_mut().clear();
    }
}

/// Handle to the open transaction, passed to every unit of work.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    conn: &'a Connection,
    savepoints: &'a SavepointNames,
}

impl<'a> Deref for Scope<'a> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn
    }
}

impl<'a> Scope<'a> {
    pub fn connection(&self) -> &'a Connection {
        self.conn
    }

    /// Opens a savepoint nested in the current scope.
    ///
    /// When `name` is `None` a fresh name is generated from the store's counter.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidSavepoint`] if `name` is not a plain SQL
    /// identifier or is already open, and [`JournalError::Database`] if SQLite
    /// rejects the `SAVEPOINT` statement.
    pub fn open_savepoint(&self, name: Option<&str>) -> Result<Savepoint<'a>> {
        let name = match name {
            Some(name) if is_identifier(name) => name.to_string(),
            Some(name) => {
                return Err(JournalError::InvalidSavepoint(format!(
                    "'{name}' is not a valid savepoint name"
                )))
            }
            None => self.savepoints.generate(),
        };
        let token = self.savepoints.push(&name)?;
        if let Err(e) = self.conn.execute_batch(&format!("SAVEPOINT {name}")) {
            self.savepoints.close(token);
            return Err(e.into());
        }
        log::debug!("opened savepoint {name}");
        Ok(Savepoint {
            scope: *self,
            name,
            token,
            finished: false,
        })
    }

    /// Runs `f` inside a fresh savepoint: released on `Ok`, rolled back on `Err`.
    ///
    /// The error from `f` is returned unchanged after the rollback; the
    /// enclosing scope stays open either way.
    pub fn with_savepoint<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Scope<'a>) -> Result<T>,
    {
        let savepoint = self.open_savepoint(None)?;
        match f(&savepoint.scope()) {
            Ok(value) => {
                savepoint.release()?;
                Ok(value)
            }
            Err(err) => match savepoint.rollback() {
                Ok(()) => Err(err),
                Err(JournalError::Database(rollback)) => {
                    log::error!("savepoint rollback failed: {rollback}");
                    Err(JournalError::RollbackFailed {
                        original: Box::new(err),
                        rollback,
                    })
                }
                Err(other) => Err(other),
            },
        }
    }
}

/// A named checkpoint inside an open transaction.
///
/// Consumed by either [`release`](Self::release) or [`rollback`](Self::rollback).
/// Dropping it unfinished rolls it back.
#[derive(Debug)]
pub struct Savepoint<'a> {
    scope: Scope<'a>,
    name: String,
    token: u64,
    finished: bool,
}

impl<'a> Deref for Savepoint<'a> {
    type Target = Scope<'a>;

    fn deref(&self) -> &Scope<'a> {
        &self.scope
    }
}

impl<'a> Savepoint<'a> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The scope statements inside this savepoint run against.
    pub fn scope(&self) -> Scope<'a> {
        self.scope
    }

    /// Merges everything done since the savepoint opened into the enclosing scope.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidSavepoint`] if an enclosing savepoint
    /// already ended this one.
    pub fn release(mut self) -> Result<()> {
        self.finished = true;
        self.ensure_open()?;
        self.scope
            .conn
            .execute_batch(&format!("RELEASE SAVEPOINT {}", self.name))?;
        log::debug!("released savepoint {}", self.name);
        Ok(())
    }

    /// Undoes everything done since the savepoint opened and discards it.
    ///
    /// If SQLite already rolled back the whole transaction on its own, there
    /// is nothing left to undo and this succeeds without issuing SQL.
    pub fn rollback(mut self) -> Result<()> {
        self.finished = true;
        self.ensure_open()?;
        if self.scope.conn.is_autocommit() {
            log::debug!("savepoint {} already discarded with its transaction", self.name);
            return Ok(());
        }
        self.scope.conn.execute_batch(&format!(
            "ROLLBACK TO SAVEPOINT {name}; RELEASE SAVEPOINT {name};",
            name = self.name
        ))?;
        log::debug!("rolled back savepoint {}", self.name);
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.scope.savepoints.close(self.token) {
            Ok(())
        } else {
            Err(JournalError::InvalidSavepoint(format!(
                "savepoint '{}' was already ended by an enclosing savepoint",
                self.name
            )))
        }
    }
}

impl Drop for Savepoint<'_> {
    fn drop(&mut self) {
        if self.finished
            || !self.scope.savepoints.close(self.token)
            || self.scope.conn.is_autocommit()
        {
            return;
        }
        let sql = format!(
            "ROLLBACK TO SAVEPOINT {name}; RELEASE SAVEPOINT {name};",
            name = self.name
        );
        match self.scope.conn.execute_batch(&sql) {
            Ok(()) => log::warn!("savepoint {} dropped unfinished; rolled back", self.name),
            Err(e) => log::error!("savepoint {} dropped unfinished; rollback failed: {e}", self.name),
        }
    }
}

impl Store {
    /// Runs `unit_of_work` inside a transaction using the default [`TransactionMode::Immediate`].
    pub fn transaction<T, F>(&mut self, unit_of_work: F) -> Result<T>
    where
        F: FnOnce(&Scope<'_>) -> Result<T>,
    {
        self.run_in_transaction(TransactionMode::default(), unit_of_work)
    }

    /// Runs `unit_of_work` inside a transaction begun with `mode`.
    ///
    /// Commits when the unit of work returns `Ok`. On `Err` the transaction is
    /// rolled back and the error is returned unchanged. A panic inside the
    /// unit of work also rolls back, as the transaction is dropped while
    /// unwinding.
    ///
    /// # Errors
    ///
    /// Returns whatever the unit of work returned, [`JournalError::Database`]
    /// if `BEGIN` or `COMMIT` fails, or [`JournalError::RollbackFailed`] if the
    /// rollback after an error failed too.
    pub fn run_in_transaction<T, F>(&mut self, mode: TransactionMode, unit_of_work: F) -> Result<T>
    where
        F: FnOnce(&Scope<'_>) -> Result<T>,
    {
        let (conn, savepoints) = self.parts_mut();
        let tx = conn.transaction_with_behavior(mode.into())?;
        log::debug!("began {mode:?} transaction");
        let outcome = unit_of_work(&Scope {
            conn: &tx,
            savepoints,
        });
        savepoints.clear();
        finish(tx, outcome)
    }

    /// Async form of [`run_in_transaction`](Self::run_in_transaction).
    ///
    /// The future may suspend between statements. The write lock stays held
    /// while it is suspended, so long pauses starve other connections.
    ///
    /// ```rust
    /// # use journal_core::{JournalError, Store, TransactionMode};
    /// # async fn demo(store: &mut Store) -> journal_core::Result<()> {
    /// store
    ///     .run_in_transaction_async(TransactionMode::Immediate, |scope| {
    ///         Box::pin(async move {
    ///             scope.execute("INSERT INTO t VALUES (1)", [])?;
    ///             Ok::<_, JournalError>(())
    ///         })
    ///     })
    ///     .await
    /// # }
    /// ```
    pub async fn run_in_transaction_async<T, F>(
        &mut self,
        mode: TransactionMode,
        unit_of_work: F,
    ) -> Result<T>
    where
        F: for<'s> FnOnce(Scope<'s>) -> LocalBoxFuture<'s, Result<T>>,
    {
        let (conn, savepoints) = self.parts_mut();
        let tx = conn.transaction_with_behavior(mode.into())?;
        log::debug!("began async {mode:?} transaction");
        let outcome = unit_of_work(Scope {
            conn: &tx,
            savepoints,
        })
        .await;
        savepoints.clear();
        finish(tx, outcome)
    }
}

fn finish<T>(tx: Transaction<'_>, outcome: Result<T>) -> Result<T> {
    match outcome {
        Ok(value) => {
            tx.commit()?;
            log::debug!("committed transaction");
            Ok(value)
        }
        // SQLite ends the transaction itself after some failures (OR ROLLBACK,
        // SQLITE_FULL, I/O errors); there is nothing left to roll back.
        Err(err) if tx.is_autocommit() => {
            log::debug!("transaction already rolled back by SQLite: {err}");
            Err(err)
        }
        Err(err) => match tx.rollback() {
            Ok(()) => {
                log::debug!("rolled back transaction: {err}");
                Err(err)
            }
            Err(rollback) => {
                log::error!("rollback failed after '{err}': {rollback}");
                Err(JournalError::RollbackFailed {
                    original: Box::new(err),
                    rollback,
                })
            }
        },
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn store_with_table() -> Store {
        let store = Store::open_in_memory().unwrap();
        store
            .connection()
            .execute_batch("CREATE TABLE t (v INTEGER NOT NULL)")
            .unwrap();
        store
    }

    fn values(store: &Store) -> Vec<i64> {
        let mut stmt = store.connection().prepare("SELECT v FROM t ORDER BY v").unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_commit_persists_writes() {
        let mut store = store_with_table();
        let n = store
            .transaction(|scope| {
                scope.execute("INSERT INTO t VALUES (1)", [])?;
                scope.execute("INSERT INTO t VALUES (2)", [])?;
                Ok(2)
            })
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(values(&store), vec![1, 2]);
    }

    #[test]
    fn test_error_rolls_back_and_is_returned_unchanged() {
        let mut store = store_with_table();
        let result: Result<()> = store.transaction(|scope| {
            scope.execute("INSERT INTO t VALUES (1)", [])?;
            Err(JournalError::EntryNotFound("missing".to_string()))
        });

        match result {
            Err(JournalError::EntryNotFound(id)) => assert_eq!(id, "missing"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(values(&store).is_empty());

        // The next transaction sees the pre-failure state and works normally.
        store
            .transaction(|scope| {
                let count: i64 = scope.query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))?;
                assert_eq!(count, 0);
                scope.execute("INSERT INTO t VALUES (7)", [])?;
                Ok(())
            })
            .unwrap();
        assert_eq!(values(&store), vec![7]);
    }

    #[test]
    fn test_statement_error_rolls_back_earlier_writes() {
        let mut store = store_with_table();
        let result = store.transaction(|scope| {
            scope.execute("INSERT INTO t VALUES (1)", [])?;
            scope.execute("INSERT INTO t VALUES (NULL)", [])?;
            Ok(())
        });
        assert!(matches!(result, Err(JournalError::Database(_))));
        assert!(values(&store).is_empty());
    }

    #[test]
    fn test_panic_rolls_back() {
        let mut store = store_with_table();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = store.transaction(|scope| -> Result<()> {
                scope.execute("INSERT INTO t VALUES (1)", []).unwrap();
                panic!("unit of work blew up");
            });
        }));
        assert!(result.is_err());
        assert!(values(&store).is_empty());
    }

    #[test]
    fn test_all_modes_commit() {
        let mut store = store_with_table();
        for (i, mode) in [
            TransactionMode::Deferred,
            TransactionMode::Immediate,
            TransactionMode::Exclusive,
        ]
        .into_iter()
        .enumerate()
        {
            store
                .run_in_transaction(mode, |scope| {
                    scope.execute("INSERT INTO t VALUES (?1)", [i as i64])?;
                    Ok(())
                })
                .unwrap();
        }
        assert_eq!(values(&store), vec![0, 1, 2]);
        assert_eq!(TransactionMode::default(), TransactionMode::Immediate);
    }

    #[test]
    fn test_savepoint_rollback_keeps_outer_writes() {
        let mut store = store_with_table();
        store
            .transaction(|scope| {
                scope.execute("INSERT INTO t VALUES (1)", [])?;
                let sp = scope.open_savepoint(None)?;
                sp.execute("INSERT INTO t VALUES (2)", [])?;
                sp.rollback()?;
                scope.execute("INSERT INTO t VALUES (3)", [])?;
                Ok(())
            })
            .unwrap();
        assert_eq!(values(&store), vec![1, 3]);
    }

    #[test]
    fn test_savepoint_release_merges_into_outer() {
        let mut store = store_with_table();
        let result: Result<()> = store.transaction(|scope| {
            let sp = scope.open_savepoint(Some("import_step"))?;
            assert_eq!(sp.name(), "import_step");
            sp.execute("INSERT INTO t VALUES (1)", [])?;
            sp.release()?;
            Err(JournalError::InvalidStore("abort outer".to_string()))
        });
        assert!(result.is_err());
        // Released work belongs to the outer transaction and is undone with it.
        assert!(values(&store).is_empty());
    }

    #[test]
    fn test_nested_savepoints() {
        let mut store = store_with_table();
        store
            .transaction(|scope| {
                let outer = scope.open_savepoint(None)?;
                outer.execute("INSERT INTO t VALUES (1)", [])?;
                let inner = outer.open_savepoint(None)?;
                inner.execute("INSERT INTO t VALUES (2)", [])?;
                inner.rollback()?;
                outer.execute("INSERT INTO t VALUES (3)", [])?;
                outer.release()?;
                Ok(())
            })
            .unwrap();
        assert_eq!(values(&store), vec![1, 3]);
    }

    #[test]
    fn test_with_savepoint_isolates_failed_step() {
        let mut store = store_with_table();
        store
            .transaction(|scope| {
                scope.execute("INSERT INTO t VALUES (1)", [])?;
                let failed = scope.with_savepoint(|sp| -> Result<()> {
                    sp.execute("INSERT INTO t VALUES (2)", [])?;
                    Err(JournalError::InvalidStore("optional step failed".to_string()))
                });
                assert!(matches!(failed, Err(JournalError::InvalidStore(_))));
                let kept = scope.with_savepoint(|sp| {
                    sp.execute("INSERT INTO t VALUES (4)", [])?;
                    Ok(4)
                })?;
                assert_eq!(kept, 4);
                Ok(())
            })
            .unwrap();
        assert_eq!(values(&store), vec![1, 4]);
    }

    #[test]
    fn test_dropped_savepoint_rolls_back() {
        let mut store = store_with_table();
        store
            .transaction(|scope| {
                {
                    let sp = scope.open_savepoint(None)?;
                    sp.execute("INSERT INTO t VALUES (9)", [])?;
                }
                scope.execute("INSERT INTO t VALUES (1)", [])?;
                Ok(())
            })
            .unwrap();
        assert_eq!(values(&store), vec![1]);
    }

    #[test]
    fn test_generated_names_are_never_reused() {
        let mut store = store_with_table();
        let first = store
            .transaction(|scope| {
                let a = scope.open_savepoint(None)?;
                let a_name = a.name().to_string();
                a.release()?;
                let b = scope.open_savepoint(None)?;
                let b_name = b.name().to_string();
                b.rollback()?;
                assert_ne!(a_name, b_name);
                Ok(b_name)
            })
            .unwrap();
        let second = store
            .transaction(|scope| {
                let c = scope.open_savepoint(None)?;
                let name = c.name().to_string();
                c.release()?;
                Ok(name)
            })
            .unwrap();
        assert_eq!(first, "sp_2");
        assert_eq!(second, "sp_3");
    }

    #[test]
    fn test_generated_name_skips_caller_supplied_names() {
        let mut store = store_with_table();
        store
            .transaction(|scope| {
                let named = scope.open_savepoint(Some("sp_1"))?;
                let generated = scope.open_savepoint(None)?;
                assert_eq!(generated.name(), "sp_2");
                generated.release()?;
                named.release()?;
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_stale_savepoint_leaves_newer_namesake_alone() {
        let mut store = store_with_table();
        store
            .transaction(|scope| {
                scope.execute("INSERT INTO t VALUES (1)", [])?;
                let outer = scope.open_savepoint(Some("outer"))?;
                let inner = outer.open_savepoint(Some("step"))?;
                let stale = outer.open_savepoint(Some("late"))?;
                inner.execute("INSERT INTO t VALUES (2)", [])?;
                outer.release()?;

                let again = scope.open_savepoint(Some("step"))?;
                again.execute("INSERT INTO t VALUES (3)", [])?;
                drop(inner);
                assert!(matches!(stale.release(), Err(JournalError::InvalidSavepoint(_))));
                again.release()?;
                Ok(())
            })
            .unwrap();
        assert_eq!(values(&store), vec![1, 2, 3]);
    }

    #[test]
    fn test_engine_rollback_returns_original_error() {
        let mut store = store_with_table();
        let result = store.transaction(|scope| {
            scope.execute("INSERT INTO t VALUES (1)", [])?;
            scope.execute("INSERT OR ROLLBACK INTO t VALUES (NULL)", [])?;
            Ok(())
        });
        assert!(matches!(result, Err(JournalError::Database(_))), "{result:?}");
        assert!(values(&store).is_empty());

        let result: Result<()> = store.transaction(|scope| {
            scope.execute("INSERT INTO t VALUES (1)", [])?;
            scope.with_savepoint(|sp| {
                sp.execute("INSERT OR ROLLBACK INTO t VALUES (NULL)", [])?;
                Ok(())
            })
        });
        assert!(matches!(result, Err(JournalError::Database(_))), "{result:?}");
        assert!(values(&store).is_empty());

        // The store is still usable afterwards.
        store
            .transaction(|scope| {
                scope.execute("INSERT INTO t VALUES (5)", [])?;
                Ok(())
            })
            .unwrap();
        assert_eq!(values(&store), vec![5]);
    }

    #[test]
    fn test_failed_savepoint_rollback_reports_both_errors() {
        let mut store = store_with_table();
        let result: Result<()> = store.transaction(|scope| {
            scope.execute("INSERT INTO t VALUES (1)", [])?;
            scope.with_savepoint(|sp| -> Result<()> {
                sp.execute("INSERT INTO t VALUES (2)", [])?;
                // Ends the savepoint behind the handle's back, so undoing it fails.
                sp.execute_batch("RELEASE SAVEPOINT sp_1")?;
                Err(JournalError::InvalidStore("step failed".to_string()))
            })
        });

        match result {
            Err(JournalError::RollbackFailed { original, rollback }) => {
                assert!(matches!(*original, JournalError::InvalidStore(_)));
                assert!(rollback.to_string().contains("sp_1"), "{rollback}");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(values(&store).is_empty());
    }

    #[test]
    fn test_invalid_and_duplicate_names_rejected() {
        let mut store = store_with_table();
        store
            .transaction(|scope| {
                assert!(matches!(
                    scope.open_savepoint(Some("bad name; DROP TABLE t")),
                    Err(JournalError::InvalidSavepoint(_))
                ));
                assert!(matches!(
                    scope.open_savepoint(Some("1abc")),
                    Err(JournalError::InvalidSavepoint(_))
                ));
                let sp = scope.open_savepoint(Some("step"))?;
                assert!(matches!(
                    scope.open_savepoint(Some("step")),
                    Err(JournalError::InvalidSavepoint(_))
                ));
                sp.release()?;
                // Once released, the name is free again.
                scope.open_savepoint(Some("step"))?.release()?;
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_file_backed_rollback_not_visible_after_reopen() {
        let temp = NamedTempFile::new().unwrap();
        {
            let mut store = Store::open(temp.path()).unwrap();
            store.connection().execute_batch("CREATE TABLE t (v INTEGER NOT NULL)").unwrap();
            store
                .transaction(|scope| {
                    scope.execute("INSERT INTO t VALUES (1)", [])?;
                    Ok(())
                })
                .unwrap();
            let _ = store.transaction(|scope| -> Result<()> {
                scope.execute("INSERT INTO t VALUES (2)", [])?;
                Err(JournalError::InvalidStore("stop".to_string()))
            });
        }
        let store = Store::open(temp.path()).unwrap();
        assert_eq!(values(&store), vec![1]);
    }

    #[tokio::test]
    async fn test_async_transaction_commits_across_suspension() {
        let mut store = store_with_table();
        let inserted = store
            .run_in_transaction_async(TransactionMode::Immediate, |scope| {
                Box::pin(async move {
                    scope.execute("INSERT INTO t VALUES (1)", [])?;
                    tokio::task::yield_now().await;
                    scope.execute("INSERT INTO t VALUES (2)", [])?;
                    Ok::<_, JournalError>(2)
                })
            })
            .await
            .unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(values(&store), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_async_transaction_rolls_back_on_error() {
        let mut store = store_with_table();
        let result = store
            .run_in_transaction_async(TransactionMode::Deferred, |scope| {
                Box::pin(async move {
                    scope.execute("INSERT INTO t VALUES (1)", [])?;
                    tokio::task::yield_now().await;
                    scope.with_savepoint(|sp| {
                        sp.execute("INSERT INTO t VALUES (2)", [])?;
                        Ok(())
                    })?;
                    Err::<(), _>(JournalError::InvalidStore("cancelled".to_string()))
                })
            })
            .await;
        assert!(matches!(result, Err(JournalError::InvalidStore(_))));
        assert!(values(&store).is_empty());
    }
}
