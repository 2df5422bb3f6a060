//! Configuration for the persistence core.
//!
//! Stored as camelCase JSON. Every field has a default, so a missing or
//! partial file still yields a usable configuration.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default number of backups kept by the rotator.
pub const DEFAULT_MAX_BACKUPS: usize = 10;

/// Where the data file lives and how it is backed up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoreConfig {
    /// Path of the SQLite data file.
    pub data_file: PathBuf,
    pub backup: BackupConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("journal.db"),
            backup: BackupConfig::default(),
        }
    }
}

/// Backup directory layout and retention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackupConfig {
    /// Backup directory; `None` means a `backups` directory next to the data file.
    pub directory: Option<PathBuf>,
    /// How many backups survive pruning. Values below 1 are treated as 1.
    pub max_backups: usize,
    pub file_prefix: String,
    /// File extension without the leading dot.
    pub extension: String,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            directory: None,
            max_backups: DEFAULT_MAX_BACKUPS,
            file_prefix: "journal-backup-".to_string(),
            extension: "db".to_string(),
        }
    }
}

impl BackupConfig {
    /// The backup directory for a given data file.
    pub fn resolve_directory(&self, data_file: &Path) -> PathBuf {
        match &self.directory {
            Some(dir) => dir.clone(),
            None => data_file
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("backups"),
        }
    }
}

impl CoreConfig {
    /// Loads the configuration at `path`; returns defaults if the file is missing or corrupt.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                log::warn!("ignoring corrupt config {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Saves the configuration to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Backup directory for [`data_file`](Self::data_file).
    pub fn backup_directory(&self) -> PathBuf {
        self.backup.resolve_directory(&self.data_file)
    }
}
