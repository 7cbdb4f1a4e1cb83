// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Collection Helper: catalogue content files by identifier and version
//!
//! Scans a folder, pulls `RJ` identifiers and `(v1.2)` style versions out of
//! the filenames, and keeps them in a SQLite database with rotating backups.
//! The interactive terminal view and the command line share the same store.

pub mod backup;
pub mod config;
pub mod db;
pub mod error;
pub mod filename;
pub mod logging;
pub mod scanner;
pub mod tui;
pub mod view;

pub use config::AppConfig;
pub use error::{CollectionError, Result};
