//! Numbered backup rotation run before a save overwrites a file.
//!
//! Backups live next to the file. Slot 0 is `<stem>.<ext>` and holds the most
//! recent revision; slot `i` is `<stem>(i).<ext>`. A rotation shifts every
//! existing slot one step older, deletes the oldest slot, and finally moves
//! the live file into slot 0.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate};
use tracing::{debug, info};

use crate::error::{FsError, FsResult};
use crate::path::file_stem;

/// Backup policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupConfig {
    pub enabled: bool,
    /// Rotate at most once per day: skip when the file was modified today.
    pub daily_only: bool,
    /// Number of slots kept, including slot 0.
    pub max_backups: usize,
    /// Extension of backup files, without the dot.
    pub extension: String,
}

impl Default for BackupConfig {
    fn default() -> Self {
        BackupConfig {
            enabled: true,
            daily_only: false,
            max_backups: 5,
            extension: "bak".to_string(),
        }
    }
}

/// Why a rotation did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Backups are switched off or `max_backups` is zero.
    Disabled,
    /// Nothing to back up yet.
    Missing,
    /// The file was already modified today (daily-only policy).
    SameDay,
}

/// What a rotation did on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupReport {
    pub skipped: Option<SkipReason>,
    /// Oldest slot, deleted to make room.
    pub evicted: Option<PathBuf>,
    /// Renames in the order they were performed, `(from, to)`.
    pub renamed: Vec<(PathBuf, PathBuf)>,
    /// Slot 0 after the rotation.
    pub backup: Option<PathBuf>,
}

impl BackupReport {
    fn skipped(reason: SkipReason) -> Self {
        BackupReport {
            skipped: Some(reason),
            ..BackupReport::default()
        }
    }
}

/// Path of backup `slot` for `path`.
pub fn backup_path(path: &Path, slot: usize, extension: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = file_stem(&name);
    let file_name = if slot == 0 {
        format!("{stem}.{extension}")
    } else {
        format!("{stem}({slot}).{extension}")
    };
    match path.parent() {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    }
}

#[derive(Debug, Clone, Default)]
pub struct BackupRotator {
    config: BackupConfig,
}

impl BackupRotator {
    pub fn new(config: BackupConfig) -> Self {
        BackupRotator { config }
    }

    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    /// Rotate the backups of `path` using today's local date.
    pub fn rotate(&self, path: &Path) -> FsResult<BackupReport> {
        self.rotate_on(path, Local::now().date_naive())
    }

    /// Rotate the backups of `path` as if the current local date were `today`.
    pub fn rotate_on(&self, path: &Path, today: NaiveDate) -> FsResult<BackupReport> {
        let config = &self.config;
        if !config.enabled || config.max_backups == 0 {
            return Ok(BackupReport::skipped(SkipReason::Disabled));
        }

        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(BackupReport::skipped(SkipReason::Missing));
            }
            Err(e) => return Err(FsError::backup("inspect", path, e)),
        };
        if metadata.is_dir() {
            return Err(FsError::BackupSource {
                path: path.to_path_buf(),
                reason: "it is a directory",
            });
        }
        if !metadata.is_file() {
            return Err(FsError::BackupSource {
                path: path.to_path_buf(),
                reason: "it is not a regular file",
            });
        }

        if config.daily_only {
            let modified = metadata
                .modified()
                .map_err(|e| FsError::backup("inspect", path, e))?;
            let modified_day = DateTime::<Local>::from(modified).date_naive();
            // A modification date in the future also skips.
            if modified_day >= today {
                debug!(path = %path.display(), %modified_day, %today, "backup already taken today");
                return Ok(BackupReport::skipped(SkipReason::SameDay));
            }
        }

        let newest = backup_path(path, 0, &config.extension);
        if newest == path {
            return Err(FsError::BackupSource {
                path: path.to_path_buf(),
                reason: "its name collides with its own backup",
            });
        }

        let mut report = BackupReport::default();
        let oldest_slot = config.max_backups - 1;
        let mut older = backup_path(path, oldest_slot, &config.extension);
        if older.exists() {
            fs::remove_file(&older).map_err(|e| FsError::backup("delete", &older, e))?;
            report.evicted = Some(older.clone());
        }
        for slot in (0..oldest_slot).rev() {
            let current = backup_path(path, slot, &config.extension);
            if current.exists() {
                fs::rename(&current, &older).map_err(|e| FsError::backup("rename", &current, e))?;
                report.renamed.push((current.clone(), older));
            }
            older = current;
        }

        fs::rename(path, &newest).map_err(|e| FsError::backup("rename", path, e))?;
        report.renamed.push((path.to_path_buf(), newest.clone()));
        report.backup = Some(newest);

        info!(
            path = %path.display(),
            shifted = report.renamed.len() - 1,
            evicted = report.evicted.is_some(),
            "backups rotated"
        );
        Ok(report)
    }
}
