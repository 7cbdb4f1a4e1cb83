// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Database module for content records

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::filename::{ContentId, Version};
use crate::{CollectionError, Result};

/// Database manager for Collection Helper.
///
/// Owns a single connection; every call runs synchronously on the caller's
/// thread.
pub struct Database {
    conn: Connection,
}

/// A catalogued content entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub rowid: i64,
    pub content_id: ContentId,
    pub version: Option<Version>,
    pub tested: bool,
    /// A matching file was found by the latest folder scan
    pub present: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a manually added entry
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub content_id: ContentId,
    pub version: Option<Version>,
    pub tested: bool,
}

/// Replacement values for a user edit
#[derive(Debug, Clone, PartialEq)]
pub struct RecordUpdate {
    pub content_id: ContentId,
    pub version: Option<Version>,
    pub tested: bool,
}

/// What a scan upsert did to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted(i64),
    Updated { rowid: i64, previous: Option<Version> },
    Unchanged(i64),
}

/// Filters for [`Database::list`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordQuery {
    /// Case-insensitive substring of the identifier
    pub search: Option<String>,
    pub tested: Option<bool>,
    pub present: Option<bool>,
}

/// Database statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbStats {
    pub total: i64,
    pub tested: i64,
    pub present: i64,
    pub with_version: i64,
}

const RECORD_COLUMNS: &str =
    "rowid, content_id, version, tested, present, created_at, updated_at";

/// Bumped whenever opening an older file has to rewrite it
const SCHEMA_VERSION: i32 = 1;

impl Database {
    /// Open or create the database, upgrading an older layout in place
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Open an existing database without writing to it.
    ///
    /// Returns `Ok(None)` when the file still needs a schema upgrade; such a
    /// file has to go through [`Database::open`] (and a backup) first.
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(CollectionError::MissingDatabase(path.to_path_buf()));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let db = Self { conn };
        if db.schema_version()? < SCHEMA_VERSION || db.table_columns("records")?.is_empty() {
            tracing::debug!("{} needs a schema upgrade", path.display());
            return Ok(None);
        }
        Ok(Some(db))
    }

    /// Open an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize database schema
    fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                content_id TEXT NOT NULL,
                version TEXT,
                tested INTEGER NOT NULL DEFAULT 0,
                present INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT '',
                updated_at TEXT NOT NULL DEFAULT ''
            );
        "#,
        )?;
        self.migrate()?;
        self.conn.execute_batch(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_records_content_id ON records(content_id);
            CREATE INDEX IF NOT EXISTS idx_records_present ON records(present);
        "#,
        )?;

        if self.schema_version()? < SCHEMA_VERSION {
            self.transaction(|db| {
                db.import_legacy_table()?;
                db.conn
                    .execute_batch(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))?;
                Ok(())
            })?;
        }
        Ok(())
    }

    fn schema_version(&self) -> Result<i32> {
        Ok(self.conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    /// Add the columns an older database file lacks
    fn migrate(&self) -> Result<()> {
        let columns = self.table_columns("records")?;
        let wanted = [
            ("present", "INTEGER NOT NULL DEFAULT 0"),
            ("created_at", "TEXT NOT NULL DEFAULT ''"),
            ("updated_at", "TEXT NOT NULL DEFAULT ''"),
        ];
        for (name, decl) in wanted {
            if !columns.iter().any(|c| c == name) {
                tracing::info!("Migrating database: adding column '{}'", name);
                self.conn
                    .execute_batch(&format!("ALTER TABLE records ADD COLUMN {} {}", name, decl))?;
            }
        }

        let now = now_string();
        self.conn.execute(
            "UPDATE records SET created_at = ?1 WHERE created_at = ''",
            params![now],
        )?;
        self.conn.execute(
            "UPDATE records SET updated_at = created_at WHERE updated_at = ''",
            [],
        )?;
        Ok(())
    }

    /// Copy rows from the single-table layout of earlier releases
    /// (`dlsite_ids`) into an empty `records` table. Runs once per file.
    ///
    /// That layout allowed one row per id and version. Duplicates collapse
    /// into the highest version, with `tested` and `marked` OR-ed together.
    fn import_legacy_table(&self) -> Result<()> {
        let legacy = self.table_columns("dlsite_ids")?;
        if legacy.is_empty() || self.count()? > 0 {
            return Ok(());
        }
        let marked = if legacy.iter().any(|c| c == "marked") { "marked" } else { "0" };

        let mut stmt = self.conn.prepare(&format!(
            "SELECT dlsite_id, version, tested, {} FROM dlsite_ids ORDER BY rowid",
            marked
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    value_text(row.get(0)?),
                    value_text(row.get(1)?),
                    value_flag(row.get(2)?),
                    value_flag(row.get(3)?),
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut merged: BTreeMap<ContentId, (Option<Version>, bool, bool)> = BTreeMap::new();
        let mut invalid = 0usize;
        for (raw_id, raw_version, tested, marked) in &rows {
            let content_id = match raw_id.as_deref().map(ContentId::parse) {
                Some(Ok(id)) => id,
                _ => {
                    tracing::warn!("Skipping legacy row with invalid ID {:?}", raw_id);
                    invalid += 1;
                    continue;
                }
            };
            let version = Version::from_stored(raw_version.clone());
            let entry = merged.entry(content_id).or_insert((None, false, false));
            if version > entry.0 {
                entry.0 = version;
            }
            entry.1 |= *tested;
            entry.2 |= *marked;
        }

        let now = now_string();
        for (content_id, (version, tested, present)) in &merged {
            self.conn.execute(
                r#"INSERT INTO records (content_id, version, tested, present, created_at, updated_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?5)"#,
                params![
                    content_id.as_str(),
                    version.as_ref().map(Version::as_str),
                    tested,
                    present,
                    now
                ],
            )?;
        }

        let merged_away = rows.len() - merged.len() - invalid;
        tracing::info!(
            "Imported {} entries from legacy table ({} duplicate rows merged, {} invalid rows skipped)",
            merged.len(),
            merged_away,
            invalid
        );
        Ok(())
    }

    fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(&format!("PRAGMA table_info({})", table))?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(columns)
    }

    /// Run `f` inside a transaction; any error rolls every change back
    pub fn transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let tx = self.conn.unchecked_transaction()?;
        let value = f(self)?;
        tx.commit()?;
        Ok(value)
    }

    /// Record a scan hit: insert unknown identifiers, refresh the version
    /// of known ones, and mark the entry present. `tested` is never touched,
    /// and a scan without a version never clears a stored one.
    pub fn upsert(&self, content_id: &ContentId, version: Option<&Version>) -> Result<UpsertOutcome> {
        let now = now_string();
        match self.find_by_content_id(content_id)? {
            None => {
                self.conn.execute(
                    r#"INSERT INTO records (content_id, version, tested, present, created_at, updated_at)
                       VALUES (?1, ?2, 0, 1, ?3, ?3)"#,
                    params![content_id.as_str(), version.map(Version::as_str), now],
                )?;
                Ok(UpsertOutcome::Inserted(self.conn.last_insert_rowid()))
            }
            Some(existing) => match version {
                Some(v) if existing.version.as_ref() != Some(v) => {
                    self.conn.execute(
                        "UPDATE records SET version = ?1, present = 1, updated_at = ?2 WHERE rowid = ?3",
                        params![v.as_str(), now, existing.rowid],
                    )?;
                    Ok(UpsertOutcome::Updated {
                        rowid: existing.rowid,
                        previous: existing.version,
                    })
                }
                _ => {
                    self.mark_present(existing.rowid)?;
                    Ok(UpsertOutcome::Unchanged(existing.rowid))
                }
            },
        }
    }

    /// Insert a manually entered record
    pub fn insert(&self, record: &NewRecord) -> Result<i64> {
        if self.find_by_content_id(&record.content_id)?.is_some() {
            return Err(CollectionError::Duplicate(record.content_id.to_string()));
        }
        let now = now_string();
        self.conn.execute(
            r#"INSERT INTO records (content_id, version, tested, present, created_at, updated_at)
               VALUES (?1, ?2, ?3, 0, ?4, ?4)"#,
            params![
                record.content_id.as_str(),
                record.version.as_ref().map(Version::as_str),
                record.tested,
                now
            ],
        )?;
        let rowid = self.conn.last_insert_rowid();
        tracing::debug!("Inserted {} as row {}", record.content_id, rowid);
        Ok(rowid)
    }

    /// Replace identifier, version and tested flag of an existing record
    pub fn update(&self, rowid: i64, update: &RecordUpdate) -> Result<()> {
        if self.get(rowid)?.is_none() {
            return Err(CollectionError::NotFound(rowid));
        }
        let clash: Option<i64> = self
            .conn
            .query_row(
                "SELECT rowid FROM records WHERE content_id = ?1 AND rowid != ?2",
                params![update.content_id.as_str(), rowid],
                |row| row.get(0),
            )
            .optional()?;
        if clash.is_some() {
            return Err(CollectionError::Duplicate(update.content_id.to_string()));
        }

        self.conn.execute(
            r#"UPDATE records SET content_id = ?1, version = ?2, tested = ?3, updated_at = ?4
               WHERE rowid = ?5"#,
            params![
                update.content_id.as_str(),
                update.version.as_ref().map(Version::as_str),
                update.tested,
                now_string(),
                rowid
            ],
        )?;
        tracing::debug!("Updated row {} -> {}", rowid, update.content_id);
        Ok(())
    }

    pub fn set_tested(&self, rowid: i64, tested: bool) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE records SET tested = ?1, updated_at = ?2 WHERE rowid = ?3",
            params![tested, now_string(), rowid],
        )?;
        if changed == 0 {
            return Err(CollectionError::NotFound(rowid));
        }
        Ok(())
    }

    pub fn delete(&self, rowid: i64) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM records WHERE rowid = ?1", params![rowid])?;
        if changed == 0 {
            return Err(CollectionError::NotFound(rowid));
        }
        tracing::debug!("Deleted row {}", rowid);
        Ok(())
    }

    pub fn get(&self, rowid: i64) -> Result<Option<ContentRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {} FROM records WHERE rowid = ?1", RECORD_COLUMNS),
                params![rowid],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    pub fn find_by_content_id(&self, content_id: &ContentId) -> Result<Option<ContentRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {} FROM records WHERE content_id = ?1", RECORD_COLUMNS),
                params![content_id.as_str()],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// List records matching the query, ordered by identifier
    pub fn list(&self, query: &RecordQuery) -> Result<Vec<ContentRecord>> {
        let mut sql = format!("SELECT {} FROM records WHERE 1 = 1", RECORD_COLUMNS);
        let mut values: Vec<Value> = Vec::new();

        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            values.push(Value::Text(format!("%{}%", escape_like(search))));
            sql.push_str(&format!(" AND content_id LIKE ?{} ESCAPE '\\'", values.len()));
        }
        if let Some(tested) = query.tested {
            values.push(Value::Integer(i64::from(tested)));
            sql.push_str(&format!(" AND tested = ?{}", values.len()));
        }
        if let Some(present) = query.present {
            values.push(Value::Integer(i64::from(present)));
            sql.push_str(&format!(" AND present = ?{}", values.len()));
        }
        sql.push_str(" ORDER BY content_id");

        tracing::trace!("Listing records: {}", sql);
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(values), row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    pub fn all(&self) -> Result<Vec<ContentRecord>> {
        self.list(&RecordQuery::default())
    }

    /// Clear the presence flag on every record before a scan
    pub fn reset_present(&self) -> Result<usize> {
        Ok(self.conn.execute("UPDATE records SET present = 0 WHERE present != 0", [])?)
    }

    pub fn mark_present(&self, rowid: i64) -> Result<()> {
        self.conn
            .execute("UPDATE records SET present = 1 WHERE rowid = ?1", params![rowid])?;
        Ok(())
    }

    pub fn count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))
            .map_err(Into::into)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        let stats = self.conn.query_row(
            r#"SELECT COUNT(*),
                      COALESCE(SUM(tested), 0),
                      COALESCE(SUM(present), 0),
                      COALESCE(SUM(CASE WHEN version IS NOT NULL AND version != '' THEN 1 ELSE 0 END), 0)
               FROM records"#,
            [],
            |row| {
                Ok(DbStats {
                    total: row.get(0)?,
                    tested: row.get(1)?,
                    present: row.get(2)?,
                    with_version: row.get(3)?,
                })
            },
        )?;
        Ok(stats)
    }

    /// Vacuum database
    pub fn vacuum(&self) -> Result<()> {
        self.conn.execute("VACUUM", [])?;
        Ok(())
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<ContentRecord> {
    let created: String = row.get(5)?;
    let updated: String = row.get(6)?;
    Ok(ContentRecord {
        rowid: row.get(0)?,
        content_id: ContentId::from_stored(row.get(1)?),
        version: Version::from_stored(row.get(2)?),
        tested: row.get(3)?,
        present: row.get(4)?,
        created_at: parse_timestamp(&created),
        updated_at: parse_timestamp(&updated),
    })
}

/// Text of a loosely typed legacy cell
fn value_text(value: Value) -> Option<String> {
    match value {
        Value::Text(s) => Some(s),
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Null | Value::Blob(_) => None,
    }
}

/// Legacy flags were stored as `Yes`/`No` text or as integers
fn value_flag(value: Value) -> bool {
    match value {
        Value::Integer(i) => i != 0,
        Value::Real(f) => f != 0.0,
        Value::Text(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "yes" | "1" | "true"),
        Value::Null | Value::Blob(_) => false,
    }
}

fn now_string() -> String {
    Utc::now().to_rfc3339()
}

/// Parse RFC 3339 or SQLite's `CURRENT_TIMESTAMP` layout
fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").map(|naive| naive.and_utc())
        })
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
