// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Table model shared by the interactive view and the `list` command

use serde::Serialize;
use std::cmp::Ordering;

use crate::db::{ContentRecord, RecordQuery};
use crate::filename::{compare_digits, format_version};

pub const PRESENT_MARKER: &str = "✓";
pub const MISSING_MARKER: &str = "✗";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortColumn {
    #[default]
    Id,
    Version,
    Tested,
    Present,
}

impl SortColumn {
    pub fn next(self) -> Self {
        match self {
            SortColumn::Id => SortColumn::Version,
            SortColumn::Version => SortColumn::Tested,
            SortColumn::Tested => SortColumn::Present,
            SortColumn::Present => SortColumn::Id,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortColumn::Id => "ID",
            SortColumn::Version => "Version",
            SortColumn::Tested => "Tested",
            SortColumn::Present => "Present",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

impl SortDirection {
    pub fn reversed(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    pub fn arrow(self) -> &'static str {
        match self {
            SortDirection::Ascending => "▲",
            SortDirection::Descending => "▼",
        }
    }
}

/// Natural identifier order: `RJ999` sorts before `RJ01000`
pub fn compare_ids(a: &ContentRecord, b: &ContentRecord) -> Ordering {
    compare_digits(a.content_id.number(), b.content_id.number())
        .then_with(|| a.content_id.cmp(&b.content_id))
}

/// Sort in place. Every column falls back to the identifier, so the order
/// is total and stable across refreshes.
pub fn sort_records(records: &mut [ContentRecord], column: SortColumn, direction: SortDirection) {
    records.sort_by(|a, b| {
        let primary = match column {
            SortColumn::Id => Ordering::Equal,
            SortColumn::Version => a.version.cmp(&b.version),
            SortColumn::Tested => a.tested.cmp(&b.tested),
            SortColumn::Present => a.present.cmp(&b.present),
        };
        let ordering = primary.then_with(|| compare_ids(a, b));
        match direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });
}

/// Display cells of one table row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRow {
    pub rowid: i64,
    pub marker: &'static str,
    pub id: String,
    pub tested: &'static str,
    pub version: String,
}

impl From<&ContentRecord> for TableRow {
    fn from(record: &ContentRecord) -> Self {
        Self {
            rowid: record.rowid,
            marker: if record.present { PRESENT_MARKER } else { MISSING_MARKER },
            id: record.content_id.to_string(),
            tested: if record.tested { "Yes" } else { "No" },
            version: format_version(record.version.as_ref()),
        }
    }
}

impl TableRow {
    /// `✓ - RJ01234567`
    pub fn display_id(&self) -> String {
        format!("{} - {}", self.marker, self.id)
    }
}

/// Search filter and ordering of the visible table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    pub search: String,
    pub sort_column: SortColumn,
    pub sort_direction: SortDirection,
    pub only_missing: bool,
}

impl ViewState {
    /// Database filters for this view
    pub fn query(&self) -> RecordQuery {
        let search = self.search.trim();
        RecordQuery {
            search: (!search.is_empty()).then(|| search.to_string()),
            tested: None,
            present: self.only_missing.then_some(false),
        }
    }

    /// Clicking a header: a new column starts ascending, the same column
    /// flips direction.
    pub fn sort_by(&mut self, column: SortColumn) {
        if self.sort_column == column {
            self.sort_direction = self.sort_direction.reversed();
        } else {
            self.sort_column = column;
            self.sort_direction = SortDirection::Ascending;
        }
    }

    pub fn apply(&self, mut records: Vec<ContentRecord>) -> Vec<ContentRecord> {
        sort_records(&mut records, self.sort_column, self.sort_direction);
        records
    }
}
