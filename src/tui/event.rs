// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Event handling for the interactive view

use crossterm::event::{self, Event as CrosstermEvent, KeyEvent};
use std::time::Duration;

use crate::Result;

/// Application events
#[derive(Debug)]
pub enum Event {
    /// Key press
    Key(KeyEvent),
    /// Nothing happened within the tick rate
    Tick,
    /// Terminal resize
    Resize(u16, u16),
}

/// Blocking event source polled from the UI thread
pub struct EventHandler {
    tick_rate: Duration,
}

impl EventHandler {
    pub fn new(tick_rate: Duration) -> Self {
        Self { tick_rate }
    }

    /// Wait up to one tick for the next terminal event
    pub fn next(&self) -> Result<Event> {
        if !event::poll(self.tick_rate)? {
            return Ok(Event::Tick);
        }
        Ok(match event::read()? {
            CrosstermEvent::Key(key) => Event::Key(key),
            CrosstermEvent::Resize(w, h) => Event::Resize(w, h),
            _ => Event::Tick,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_handler_creation() {
        let handler = EventHandler::new(Duration::from_millis(100));
        assert_eq!(handler.tick_rate, Duration::from_millis(100));
    }
}
