// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for Collection Helper

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::{CollectionError, Result};

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Folder holding the content files
    #[serde(default)]
    pub folder_path: Option<String>,

    /// Verbose parsing and query logging
    #[serde(default)]
    pub debug_enabled: bool,

    /// Colour scheme of the interactive view
    #[serde(default)]
    pub theme: Theme,

    /// Database and backup settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Where the interactive view writes its log file
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    #[serde(default = "default_backup_dir")]
    pub backup_dir: String,
    #[serde(default = "default_backup_keep")]
    pub backup_keep: usize,
}

// Default value functions
fn default_db_path() -> String { "collection.db".to_string() }
fn default_backup_dir() -> String { "db-backup".to_string() }
fn default_backup_keep() -> usize { 3 }
fn default_log_dir() -> String { "logs".to_string() }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            folder_path: None,
            debug_enabled: false,
            theme: Theme::default(),
            database: DatabaseConfig::default(),
            log_dir: default_log_dir(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            backup_dir: default_backup_dir(),
            backup_keep: default_backup_keep(),
        }
    }
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = CollectionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(CollectionError::Config(format!(
                "Unknown theme '{}' (expected light or dark)",
                other
            ))),
        }
    }
}

/// Keys accepted by [`AppConfig::set`]
pub const SETTABLE_KEYS: &[&str] = &[
    "folder_path",
    "debug_enabled",
    "theme",
    "log_dir",
    "database.path",
    "database.backup_dir",
    "database.backup_keep",
];

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| CollectionError::Config(format!("Failed to parse config: {}", e)))?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Set a single value by its dotted key name. An empty `folder_path`
    /// clears the folder.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "folder_path" => {
                let value = value.trim();
                self.folder_path = (!value.is_empty()).then(|| value.to_string());
            }
            "debug_enabled" => self.debug_enabled = parse_bool(value)?,
            "theme" => self.theme = value.parse()?,
            "log_dir" => self.log_dir = non_empty(key, value)?,
            "database.path" => self.database.path = non_empty(key, value)?,
            "database.backup_dir" => self.database.backup_dir = non_empty(key, value)?,
            "database.backup_keep" => {
                let keep: usize = value.trim().parse().map_err(|_| {
                    CollectionError::Config(format!("'{}' is not a number", value.trim()))
                })?;
                if keep == 0 {
                    return Err(CollectionError::Config(
                        "database.backup_keep must be at least 1".to_string(),
                    ));
                }
                self.database.backup_keep = keep;
            }
            other => {
                return Err(CollectionError::Config(format!(
                    "Unknown config key '{}' (known: {})",
                    other,
                    SETTABLE_KEYS.join(", ")
                )))
            }
        }
        Ok(())
    }

    pub fn folder(&self) -> Option<PathBuf> {
        self.folder_path.as_ref().map(PathBuf::from)
    }

    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.database.path)
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        other => Err(CollectionError::Config(format!("'{}' is not a boolean", other))),
    }
}

fn non_empty(key: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CollectionError::Config(format!("{} cannot be empty", key)));
    }
    Ok(value.to_string())
}
