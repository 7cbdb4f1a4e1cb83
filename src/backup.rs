// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Rotating copies of the database file

use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::{CollectionError, Result};

/// One backup copy on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFile {
    pub path: PathBuf,
    /// `YYYYmmddHHMMSSmmm` taken from the file name
    pub stamp: String,
    modified: Option<SystemTime>,
}

/// Creates timestamped copies of a database file and prunes old ones
pub struct BackupManager {
    dir: PathBuf,
    keep: usize,
}

impl BackupManager {
    /// `keep` is clamped to at least one copy
    pub fn new(dir: impl Into<PathBuf>, keep: usize) -> Self {
        Self {
            dir: dir.into(),
            keep: keep.max(1),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn keep(&self) -> usize {
        self.keep
    }

    /// Copy `db_path` into the backup directory, then rotate.
    ///
    /// Returns `None` when there is no database file yet (first run).
    pub fn create(&self, db_path: &Path) -> Result<Option<PathBuf>> {
        if !db_path.is_file() {
            tracing::debug!("No database at {:?}, skipping backup", db_path);
            return Ok(None);
        }

        fs::create_dir_all(&self.dir)?;
        let stem = db_stem(db_path)?;
        let stamp = Local::now().format("%Y%m%d%H%M%S%3f");
        let target = self.dir.join(format!("{}_backup_{}.db", stem, stamp));

        fs::copy(db_path, &target)?;
        tracing::info!("Backup created: {}", target.display());

        self.rotate(&stem)?;
        Ok(Some(target))
    }

    /// Delete all but the newest `keep` backups of `stem`.
    /// Returns the deleted paths.
    pub fn rotate(&self, stem: &str) -> Result<Vec<PathBuf>> {
        let backups = self.list(stem)?;
        let mut removed = Vec::new();
        for old in backups.into_iter().skip(self.keep) {
            fs::remove_file(&old.path)?;
            tracing::info!("Deleted old backup: {}", old.path.display());
            removed.push(old.path);
        }
        Ok(removed)
    }

    /// Backups of `stem`, newest first
    pub fn list(&self, stem: &str) -> Result<Vec<BackupFile>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let prefix = format!("{}_backup_", stem);
        let escaped_dir = glob::Pattern::escape(&self.dir.to_string_lossy());
        let pattern = Path::new(&escaped_dir)
            .join(format!("{}*.db", glob::Pattern::escape(&prefix)))
            .to_string_lossy()
            .into_owned();

        let entries = glob::glob(&pattern)
            .map_err(|e| CollectionError::Backup(format!("Bad backup pattern {}: {}", pattern, e)))?;

        let mut backups: Vec<BackupFile> = entries
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::warn!("Unreadable backup entry: {}", e);
                    None
                }
            })
            .filter(|path| path.is_file())
            .map(|path| {
                let stamp = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(|s| s.strip_prefix(&prefix))
                    .unwrap_or_default()
                    .to_string();
                let modified = fs::metadata(&path).and_then(|m| m.modified()).ok();
                BackupFile { path, stamp, modified }
            })
            .collect();

        backups.sort_by(|a, b| {
            b.stamp
                .cmp(&a.stamp)
                .then_with(|| b.modified.cmp(&a.modified))
                .then_with(|| b.path.cmp(&a.path))
        });
        Ok(backups)
    }

    /// Backups belonging to `db_path`, newest first
    pub fn list_for(&self, db_path: &Path) -> Result<Vec<BackupFile>> {
        self.list(&db_stem(db_path)?)
    }

    /// Replace `db_path` with the contents of `backup`. The current file is
    /// backed up first; its copy path is returned.
    pub fn restore(&self, backup: &Path, db_path: &Path) -> Result<Option<PathBuf>> {
        if !backup.is_file() {
            return Err(CollectionError::Backup(format!(
                "Backup not found: {}",
                backup.display()
            )));
        }
        // Read before rotating: the safety copy may push `backup` out.
        let contents = fs::read(backup)?;
        let safety = self.create(db_path)?;
        fs::write(db_path, contents)?;
        tracing::info!("Restored {} from {}", db_path.display(), backup.display());
        Ok(safety)
    }
}

fn db_stem(db_path: &Path) -> Result<String> {
    db_path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            CollectionError::Backup(format!("Cannot derive a backup name from {:?}", db_path))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, name).unwrap();
        path
    }

    #[test]
    fn test_create_without_database_is_noop() {
        let tmp = TempDir::new().unwrap();
        let manager = BackupManager::new(tmp.path().join("db-backup"), 3);
        assert_eq!(manager.create(&tmp.path().join("collection.db")).unwrap(), None);
        assert!(!tmp.path().join("db-backup").exists());
    }

    #[test]
    fn test_create_copies_database() {
        let tmp = TempDir::new().unwrap();
        let db = touch(tmp.path(), "collection.db");
        let manager = BackupManager::new(tmp.path().join("db-backup"), 3);

        let backup = manager.create(&db).unwrap().unwrap();
        assert_eq!(fs::read(&backup).unwrap(), fs::read(&db).unwrap());
        let name = backup.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("collection_backup_"));
        assert!(name.ends_with(".db"));
        assert_eq!(manager.list_for(&db).unwrap().len(), 1);
    }

    #[test]
    fn test_rotate_keeps_newest() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("db-backup");
        fs::create_dir_all(&dir).unwrap();
        for stamp in ["20240101000000000", "20240301000000000", "20240201000000000", "20231201000000000"] {
            touch(&dir, &format!("collection_backup_{stamp}.db"));
        }
        touch(&dir, "other_backup_20200101000000000.db");
        touch(&dir, "notes.txt");

        let manager = BackupManager::new(&dir, 2);
        let removed = manager.rotate("collection").unwrap();
        assert_eq!(removed.len(), 2);

        let kept: Vec<String> = manager.list("collection").unwrap().into_iter().map(|b| b.stamp).collect();
        assert_eq!(kept, vec!["20240301000000000", "20240201000000000"]);
        assert!(dir.join("other_backup_20200101000000000.db").exists());
        assert!(dir.join("notes.txt").exists());
    }

    #[test]
    fn test_repeated_creates_never_exceed_keep() {
        let tmp = TempDir::new().unwrap();
        let db = touch(tmp.path(), "collection.db");
        let manager = BackupManager::new(tmp.path().join("db-backup"), 3);
        for _ in 0..6 {
            manager.create(&db).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(2));
            assert!(manager.list_for(&db).unwrap().len() <= 3);
        }
        assert_eq!(manager.list_for(&db).unwrap().len(), 3);
    }

    #[test]
    fn test_keep_is_clamped() {
        let manager = BackupManager::new("backups", 0);
        assert_eq!(manager.keep(), 1);
    }

    #[test]
    fn test_restore_replaces_database() {
        let tmp = TempDir::new().unwrap();
        let db = tmp.path().join("collection.db");
        fs::write(&db, "old").unwrap();
        let manager = BackupManager::new(tmp.path().join("db-backup"), 1);
        let backup = manager.create(&db).unwrap().unwrap();

        fs::write(&db, "new").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let safety = manager.restore(&backup, &db).unwrap().unwrap();

        assert_eq!(fs::read_to_string(&db).unwrap(), "old");
        assert_eq!(fs::read_to_string(&safety).unwrap(), "new");
        assert!(manager.restore(&tmp.path().join("missing.db"), &db).is_err());
    }
}
