//! Timestamped copies of the data file with count-based retention.
//!
//! Backups are named `<prefix><YYYY-MM-DDTHH-MM-SS>.<ext>` in UTC. A second
//! backup within the same second gets a `-1`, `-2`, ... suffix. Files in the
//! directory that do not follow this pattern are never listed or pruned.
//!
//! The caller must flush the live data file (see [`crate::Store::flush`])
//! immediately before [`BackupRotator::create_backup`] or
//! [`BackupRotator::restore_backup`]; the rotator only copies bytes.

use crate::core::config::BackupConfig;
use crate::Result;
use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";
const TIMESTAMP_LEN: usize = 19;

/// Metadata about one archived copy of the data file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRecord {
    pub name: String,
    pub path: PathBuf,
    /// Last modification time of the backup file.
    pub timestamp: DateTime<Utc>,
    pub size_bytes: u64,
}

/// Creates, lists, restores and prunes backups in one directory.
#[derive(Debug, Clone)]
pub struct BackupRotator {
    directory: PathBuf,
    max_backups: usize,
    file_prefix: String,
    extension: String,
}

impl BackupRotator {
    /// A rotator over `directory` using the default naming and retention.
    pub fn new<P: Into<PathBuf>>(directory: P) -> Self {
        Self::with_config(directory, &BackupConfig::default())
    }

    /// A rotator over `directory` using the naming and retention in `config`.
    ///
    /// `config.directory` is ignored; resolve it with
    /// [`BackupConfig::resolve_directory`] first.
    pub fn with_config<P: Into<PathBuf>>(directory: P, config: &BackupConfig) -> Self {
        Self {
            directory: directory.into(),
            max_backups: config.max_backups.max(1),
            file_prefix: config.file_prefix.clone(),
            extension: config.extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn max_backups(&self) -> usize {
        self.max_backups
    }

    /// Copies `source` into a new timestamped backup and prunes old ones.
    ///
    /// Returns `Ok(None)` when `source` does not exist; there is nothing to back up.
    ///
    /// # Errors
    ///
    /// Returns [`crate::JournalError::Io`] if the directory cannot be created or
    /// the copy fails. Pruning problems are logged, never returned.
    pub fn create_backup(&self, source: &Path) -> Result<Option<PathBuf>> {
        fs::create_dir_all(&self.directory)?;
        match fs::metadata(source) {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!("no data file at {}, skipping backup", source.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        let path = self.next_backup_path(Utc::now())?;
        let bytes = fs::copy(source, &path)?;
        log::info!("created backup {} ({bytes} bytes)", path.display());

        self.prune();
        Ok(Some(path))
    }

    /// Lists backups, newest modification time first.
    ///
    /// Ties are broken by the timestamp and sequence number in the file name.
    /// A missing directory lists as empty.
    pub fn list_backups(&self) -> Result<Vec<BackupRecord>> {
        let dir = match fs::read_dir(&self.directory) {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };

        let mut found = Vec::new();
        for item in dir {
            let item = item?;
            let Some(name) = item.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let Some(name_key) = self.parse_name(&name) else {
                continue;
            };
            let metadata = item.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let modified: DateTime<Utc> = metadata.modified()?.into();
            found.push((
                (modified, name_key),
                BackupRecord {
                    name,
                    path: item.path(),
                    timestamp: modified,
                    size_bytes: metadata.len(),
                },
            ));
        }

        found.sort_by(|(a, _), (b, _)| b.cmp(a));
        Ok(found.into_iter().map(|(_, record)| record).collect())
    }

    /// The most recent backup, if any.
    pub fn latest_backup(&self) -> Result<Option<BackupRecord>> {
        Ok(self.list_backups()?.into_iter().next())
    }

    /// Copies `backup` over `target`. The backup itself is left in place.
    ///
    /// Returns `Ok(false)` when `backup` does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`crate::JournalError::Io`] if the copy fails.
    pub fn restore_backup(&self, backup: &Path, target: &Path) -> Result<bool> {
        match fs::metadata(backup) {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::warn!("backup {} not found, nothing restored", backup.display());
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        }
        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::copy(backup, target)?;
        log::info!("restored {} from {}", target.display(), backup.display());
        Ok(true)
    }

    /// Deletes one backup. Returns `Ok(false)` if it was already gone.
    pub fn delete_backup(&self, backup: &Path) -> Result<bool> {
        match fs::remove_file(backup) {
            Ok(()) => {
                log::info!("deleted backup {}", backup.display());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes every backup past the retention count, oldest first. Returns how many went.
    ///
    /// Failures are logged and skipped.
    pub fn prune(&self) -> usize {
        let backups = match self.list_backups() {
            Ok(backups) => backups,
            Err(e) => {
                log::warn!("could not list backups for pruning: {e}");
                return 0;
            }
        };

        let mut removed = 0;
        for record in backups.iter().skip(self.max_backups) {
            match fs::remove_file(&record.path) {
                Ok(()) => {
                    log::debug!("pruned backup {}", record.name);
                    removed += 1;
                }
                Err(e) => log::warn!("failed to prune backup {}: {e}", record.path.display()),
            }
        }
        removed
    }

    /// Picks a name that sorts after every backup already taken in the same second.
    ///
    /// The sequence continues from the highest one present for this second, so
    /// a name freed by pruning is never handed out again.
    fn next_backup_path(&self, now: DateTime<Utc>) -> Result<PathBuf> {
        let stamp = now.naive_utc().trunc_subsecs(0);
        let mut highest: Option<u32> = None;
        for item in fs::read_dir(&self.directory)? {
            let item = item?;
            let Some(name) = item.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if let Some((taken, seq)) = self.parse_name(&name) {
                if taken == stamp {
                    highest = highest.max(Some(seq));
                }
            }
        }

        let stem = format!("{}{}", self.file_prefix, now.format(TIMESTAMP_FORMAT));
        let mut seq = highest.map_or(0, |s| s + 1);
        loop {
            let name = match seq {
                0 => format!("{stem}.{}", self.extension),
                n => format!("{stem}-{n}.{}", self.extension),
            };
            let path = self.directory.join(name);
            if !path.try_exists()? {
                return Ok(path);
            }
            seq += 1;
        }
    }

    /// Parses `<prefix><timestamp>[-seq].<ext>` into a sort key; `None` if it is not a backup name.
    fn parse_name(&self, name: &str) -> Option<(NaiveDateTime, u32)> {
        let rest = name
            .strip_prefix(&self.file_prefix)?
            .strip_suffix(&self.extension)?
            .strip_suffix('.')?;
        if rest.len() < TIMESTAMP_LEN || !rest.is_char_boundary(TIMESTAMP_LEN) {
            return None;
        }
        let (stamp, seq) = rest.split_at(TIMESTAMP_LEN);
        let stamp = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;
        let seq = match seq {
            "" => 0,
            s => s.strip_prefix('-')?.parse().ok()?,
        };
        Some((stamp, seq))
    }
}
