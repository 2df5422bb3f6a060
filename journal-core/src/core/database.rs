//! Startup wiring: one store, migrated, plus its backup rotator.

use crate::{apply_all, BackupRotator, CoreConfig, Result, Store};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// The opened persistence core.
///
/// Built once at startup with [`Database::open`]; handles are passed down from
/// here rather than looked up globally.
#[derive(Debug)]
pub struct Database {
    config: CoreConfig,
    store: Store,
    backups: BackupRotator,
}

impl Database {
    /// Opens the data file named in `config` and migrates it to the current schema.
    ///
    /// # Errors
    ///
    /// Any error is fatal for the caller: the store could not be opened, or a
    /// migration failed and the schema is not current.
    pub fn open(config: CoreConfig) -> Result<Self> {
        if let Some(parent) = config.data_file.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut store = Store::open(&config.data_file)?;
        let applied = apply_all(&mut store)?;
        if !applied.is_empty() {
            log::info!(
                "migrated {} with {} migration(s)",
                config.data_file.display(),
                applied.len()
            );
        }
        let backups = BackupRotator::with_config(config.backup_directory(), &config.backup);
        Ok(Self {
            config,
            store,
            backups,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    pub fn backups(&self) -> &BackupRotator {
        &self.backups
    }

    /// Flushes the store and snapshots the data file.
    pub fn backup_now(&self) -> Result<Option<PathBuf>> {
        self.store.flush()?;
        self.backups.create_backup(&self.config.data_file)
    }

    /// Replaces the live data file with `backup` and reopens it.
    ///
    /// The connection is flushed and closed before the copy, and the restored
    /// file is migrated before use, so an older backup comes back on the
    /// current schema. Returns `Ok(false)` without touching anything if
    /// `backup` does not exist.
    ///
    /// # Errors
    ///
    /// On error the `Database` must be dropped and opened again.
    pub fn restore_backup(&mut self, backup: &Path) -> Result<bool> {
        if !backup.try_exists()? {
            log::warn!("backup {} not found, nothing restored", backup.display());
            return Ok(false);
        }

        self.store.flush()?;
        let live = std::mem::replace(&mut self.store, Store::open_in_memory()?);
        live.close()?;
        remove_sidecars(&self.config.data_file)?;

        let restored = self.backups.restore_backup(backup, &self.config.data_file);

        let mut store = Store::open(&self.config.data_file)?;
        apply_all(&mut store)?;
        self.store = store;
        restored
    }
}

/// Removes WAL and shared-memory files left beside `data_file`; they belong to the replaced file.
fn remove_sidecars(data_file: &Path) -> Result<()> {
    for suffix in ["-wal", "-shm"] {
        let mut sidecar = data_file.as_os_str().to_owned();
        sidecar.push(suffix);
        match fs::remove_file(PathBuf::from(sidecar)) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
