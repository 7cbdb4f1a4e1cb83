// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Interactive terminal view over the collection

pub mod app;
pub mod event;
pub mod ui;

use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::Terminal;
use std::io;
use std::time::Duration;
use tracing::info;

use crate::error::CollectionError;
use crate::Result;

pub use app::App;
use event::{Event, EventHandler};

const TICK_RATE: Duration = Duration::from_millis(250);

fn terminal_error(e: io::Error) -> CollectionError {
    CollectionError::Terminal(e.to_string())
}

/// Take over the terminal until the user quits
pub fn run(mut app: App) -> Result<()> {
    enable_raw_mode().map_err(terminal_error)?;
    let mut stdout = io::stdout();
    if let Err(e) = execute!(stdout, EnterAlternateScreen) {
        let _ = disable_raw_mode();
        return Err(terminal_error(e));
    }

    let result = Terminal::new(CrosstermBackend::new(stdout))
        .map_err(terminal_error)
        .and_then(|mut terminal| {
            let result = run_loop(&mut terminal, &mut app, &EventHandler::new(TICK_RATE));
            let _ = terminal.show_cursor();
            result
        });

    // Always restore the terminal, even on error
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), LeaveAlternateScreen);
    info!("Interactive view closed");
    result
}

fn run_loop<B: Backend>(terminal: &mut Terminal<B>, app: &mut App, events: &EventHandler) -> Result<()> {
    while app.running {
        terminal.draw(|frame| ui::draw(frame, app)).map_err(terminal_error)?;
        match events.next()? {
            Event::Key(key) => app.handle_key(key),
            Event::Resize(..) | Event::Tick => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db::Database;
    use ratatui::backend::TestBackend;

    #[test]
    fn test_loop_exits_when_not_running() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = App::new(Database::in_memory().unwrap(), AppConfig::default(), tmp.path().join("c.json"));
        app.running = false;
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        run_loop(&mut terminal, &mut app, &EventHandler::new(Duration::from_millis(1))).unwrap();
    }
}
