// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for Collection Helper

use thiserror::Error;

/// Result type alias for Collection Helper operations
pub type Result<T> = std::result::Result<T, CollectionError>;

/// Collection Helper error types
#[derive(Error, Debug)]
pub enum CollectionError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("An entry with ID {0} already exists")]
    Duplicate(String),

    #[error("No entry with row id {0}")]
    NotFound(i64),

    #[error("Database not found: {}", .0.display())]
    MissingDatabase(std::path::PathBuf),

    #[error("Backup error: {0}")]
    Backup(String),

    #[error("Terminal error: {0}")]
    Terminal(String),
}
