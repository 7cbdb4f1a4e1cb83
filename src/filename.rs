// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Filename interpretation: identifier and version extraction
//!
//! A content file is named after its catalogue identifier (`RJ` followed by
//! digits) and may carry a revision in parentheses, e.g.
//! `RJ01234567 Some Title (v1.2).zip`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use crate::{CollectionError, Result};

static ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"RJ[0-9]+").expect("identifier pattern is valid"));

static ID_EXACT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^RJ[0-9]+$").expect("identifier pattern is valid"));

static VERSION_IN_PARENS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(([vV]?[0-9]+(?:\.[0-9]+)*)\)").expect("version pattern is valid")
});

static VERSION_EXACT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[vV]?([0-9]+(?:\.[0-9]+)*)$").expect("version pattern is valid"));

/// A catalogue identifier such as `RJ01234567`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    /// Validate user input. Surrounding whitespace is trimmed and the
    /// prefix is upper-cased before matching.
    pub fn parse(input: &str) -> Result<Self> {
        let candidate = input.trim().to_uppercase();
        if candidate.is_empty() {
            return Err(CollectionError::Validation("ID cannot be empty".to_string()));
        }
        if !ID_EXACT.is_match(&candidate) {
            return Err(CollectionError::Validation(format!(
                "'{}' is not a valid ID (expected RJ followed by digits)",
                input.trim()
            )));
        }
        Ok(Self(candidate))
    }

    /// Wrap a value read back from the database without re-validating it
    pub(crate) fn from_stored(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The digits after the `RJ` prefix
    pub fn number(&self) -> &str {
        self.0.trim_start_matches(|c: char| c.is_ascii_alphabetic())
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A content revision, stored canonically as `v<digits>(.<digits>)*`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    /// Normalize user input. Empty input and the `-` placeholder mean
    /// "no version".
    pub fn parse(input: &str) -> Result<Option<Self>> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed == "-" {
            return Ok(None);
        }
        match VERSION_EXACT.captures(trimmed) {
            Some(caps) => Ok(Some(Self(format!("v{}", &caps[1])))),
            None => Err(CollectionError::Validation(format!(
                "'{}' is not a valid version (expected digits like 1.2 or v3)",
                trimmed
            ))),
        }
    }

    /// Wrap a value read back from the database. Legacy rows may hold an
    /// empty string or a version without the prefix.
    pub(crate) fn from_stored(value: Option<String>) -> Option<Self> {
        let value = value?;
        match Self::parse(&value) {
            Ok(v) => v,
            Err(_) => Some(Self(value.trim().to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Dot-separated numeric components, without the `v` prefix
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.trim_start_matches(['v', 'V']).split('.')
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let mut left = self.components();
        let mut right = other.components();
        loop {
            match (left.next(), right.next()) {
                (Some(a), Some(b)) => match compare_digits(a, b) {
                    Ordering::Equal => continue,
                    non_eq => return non_eq,
                },
                (Some(_), None) => return Ordering::Greater,
                (None, Some(_)) => return Ordering::Less,
                (None, None) => return self.0.cmp(&other.0),
            }
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compare two digit strings by numeric value without overflowing
pub(crate) fn compare_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Display form of an optional version: `v1.2` or `-`
pub fn format_version(version: Option<&Version>) -> String {
    version.map_or_else(|| "-".to_string(), |v| v.to_string())
}

/// Identifier and version extracted from one filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub content_id: ContentId,
    pub version: Option<Version>,
}

/// Extract the identifier and optional version from a filename.
///
/// Returns `None` when the name holds no identifier; such files are not
/// part of the collection.
pub fn extract(filename: &str) -> Option<ParsedName> {
    let stem = strip_extension(filename);

    let content_id = match ID_PATTERN.find(stem) {
        Some(m) => ContentId(m.as_str().to_string()),
        None => {
            tracing::debug!("No ID found in '{}'", filename);
            return None;
        }
    };

    let version = VERSION_IN_PARENS
        .captures(stem)
        .and_then(|caps| Version::parse(&caps[1]).ok().flatten());

    tracing::debug!(
        "Parsed '{}': id={}, version={}",
        filename,
        content_id,
        format_version(version.as_ref())
    );

    Some(ParsedName { content_id, version })
}

/// Drop a trailing `.ext` when it looks like a real extension. A name such
/// as `RJ01 (v1.2)` keeps its dotted version intact.
fn strip_extension(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(idx) if idx > 0 => {
            let ext = &filename[idx + 1..];
            let looks_like_ext = !ext.is_empty()
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
                && !ext.chars().all(|c| c.is_ascii_digit());
            if looks_like_ext {
                &filename[..idx]
            } else {
                filename
            }
        }
        _ => filename,
    }
}
