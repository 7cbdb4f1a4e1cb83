// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Tracing setup for the command line and the interactive view

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::Result;

pub const LOG_FILE_NAME: &str = "collection-helper.log";

/// Flags that pick the log level
#[derive(Debug, Clone, Copy, Default)]
pub struct Verbosity {
    pub verbose: bool,
    pub trace: bool,
    pub quiet: bool,
    /// `debug_enabled` from the config file
    pub debug_enabled: bool,
}

impl Verbosity {
    pub fn level(self) -> &'static str {
        if self.trace {
            "trace"
        } else if self.verbose || self.debug_enabled {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}

fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Log to stderr, for one-shot commands
pub fn init_stderr(verbosity: Verbosity) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(verbosity.level()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Log to `<dir>/collection-helper.log` while the terminal is owned by the
/// interactive view. Keep the guard alive for the whole session.
pub fn init_file(dir: &Path, verbosity: Verbosity) -> Result<WorkerGuard> {
    std::fs::create_dir_all(dir)?;
    let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(verbosity.level()))
        .with_ansi(false)
        .with_writer(writer)
        .try_init();
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_precedence() {
        assert_eq!(Verbosity::default().level(), "info");
        assert_eq!(Verbosity { quiet: true, ..Default::default() }.level(), "warn");
        assert_eq!(Verbosity { debug_enabled: true, quiet: true, ..Default::default() }.level(), "debug");
        assert_eq!(Verbosity { trace: true, verbose: true, ..Default::default() }.level(), "trace");
    }
}
