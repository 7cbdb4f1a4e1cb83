// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Folder scanning: filenames in, upserted records out

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::db::{Database, UpsertOutcome};
use crate::filename::{self, ContentId, Version};
use crate::{CollectionError, Result};

/// Summary of one scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Candidate files looked at
    pub files_seen: usize,
    /// Files without an identifier
    pub skipped: usize,
    /// Distinct identifiers found
    pub matched: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Records left without a matching file
    pub missing: i64,
}

impl ScanReport {
    /// True when the scan changed nothing but presence flags
    pub fn is_noop(&self) -> bool {
        self.inserted == 0 && self.updated == 0
    }
}

/// Scan `folder` (non-recursively) and upsert every identified file.
pub fn scan_folder(db: &Database, folder: &Path) -> Result<ScanReport> {
    if !folder.is_dir() {
        return Err(CollectionError::Config(format!(
            "Folder does not exist or is not a directory: {}",
            folder.display()
        )));
    }

    info!("Scanning folder: {}", folder.display());
    let files = list_content_files(folder)?;
    debug!("Found {} candidate files", files.len());

    let names: Vec<String> = files
        .iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect();

    import_names(db, names.iter().map(String::as_str))
}

/// Interpret a batch of filenames and apply them to the store in a single
/// transaction. Presence flags are reset first, so entries whose file is
/// gone end up marked missing.
pub fn import_names<'a>(db: &Database, names: impl IntoIterator<Item = &'a str>) -> Result<ScanReport> {
    let mut report = ScanReport::default();
    let mut found: BTreeMap<ContentId, Option<Version>> = BTreeMap::new();

    for name in names {
        report.files_seen += 1;
        match filename::extract(name) {
            Some(parsed) => {
                // Several files may share an identifier; keep the newest version.
                let slot = found.entry(parsed.content_id).or_insert(None);
                if parsed.version > *slot {
                    *slot = parsed.version;
                }
            }
            None => {
                debug!("Skipping '{}': no ID in filename", name);
                report.skipped += 1;
            }
        }
    }
    report.matched = found.len();

    db.transaction(|db| {
        db.reset_present()?;
        for (content_id, version) in &found {
            match db.upsert(content_id, version.as_ref())? {
                UpsertOutcome::Inserted(_) => {
                    debug!("New entry {} {}", content_id, filename::format_version(version.as_ref()));
                    report.inserted += 1;
                }
                UpsertOutcome::Updated { previous, .. } => {
                    debug!(
                        "Updated {}: {} -> {}",
                        content_id,
                        filename::format_version(previous.as_ref()),
                        filename::format_version(version.as_ref())
                    );
                    report.updated += 1;
                }
                UpsertOutcome::Unchanged(_) => report.unchanged += 1,
            }
        }
        Ok(())
    })?;

    let stats = db.stats()?;
    report.missing = stats.total - stats.present;

    info!(
        "Scan complete: {} files, {} IDs ({} new, {} updated), {} skipped, {} missing",
        report.files_seen, report.matched, report.inserted, report.updated, report.skipped, report.missing
    );
    Ok(report)
}

/// Regular files directly inside `folder`, sorted by name
pub fn list_content_files(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(folder)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && should_process(p))
        .collect();
    files.sort();
    Ok(files)
}

/// Check if a file should be considered by a scan
pub fn should_process(path: &Path) -> bool {
    let filename = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return true,
    };

    // Skip hidden files
    if filename.starts_with('.') {
        return false;
    }

    // Skip unfinished downloads
    let temp_extensions = [".tmp", ".part", ".crdownload", ".partial", ".download"];
    if temp_extensions.iter().any(|ext| filename.to_ascii_lowercase().ends_with(ext)) {
        return false;
    }

    // Skip system files
    let skip_names = ["desktop.ini", "thumbs.db", ".ds_store"];
    !skip_names.iter().any(|n| filename.eq_ignore_ascii_case(n))
}
