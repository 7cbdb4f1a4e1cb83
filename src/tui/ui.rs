// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Rendering for the interactive view

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap};

use crate::config::Theme;
use crate::tui::app::{App, EntryForm, FormField, Mode};
use crate::view::{SortColumn, TableRow};

/// Colours for one theme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub bg: Color,
    pub fg: Color,
    pub table_bg: Color,
    pub select_bg: Color,
    pub select_fg: Color,
    pub border: Color,
    pub accent: Color,
    pub muted: Color,
    pub error: Color,
}

pub fn palette(theme: Theme) -> Palette {
    match theme {
        Theme::Light => Palette {
            bg: Color::Rgb(0xff, 0xff, 0xff),
            fg: Color::Rgb(0x00, 0x00, 0x00),
            table_bg: Color::Rgb(0xff, 0xff, 0xff),
            select_bg: Color::Rgb(0xe5, 0xf3, 0xff),
            select_fg: Color::Rgb(0x00, 0x00, 0x00),
            border: Color::Rgb(0xcc, 0xcc, 0xcc),
            accent: Color::Rgb(0x1f, 0x6f, 0xeb),
            muted: Color::Rgb(0x70, 0x70, 0x70),
            error: Color::Rgb(0xc0, 0x1c, 0x28),
        },
        Theme::Dark => Palette {
            bg: Color::Rgb(0x2d, 0x2d, 0x2d),
            fg: Color::Rgb(0xff, 0xff, 0xff),
            table_bg: Color::Rgb(0x1e, 0x1e, 0x1e),
            select_bg: Color::Rgb(0x40, 0x48, 0x59),
            select_fg: Color::Rgb(0xff, 0xff, 0xff),
            border: Color::Rgb(0x40, 0x40, 0x40),
            accent: Color::Rgb(0x6c, 0xb6, 0xff),
            muted: Color::Rgb(0xa0, 0xa0, 0xa0),
            error: Color::Rgb(0xff, 0x6b, 0x6b),
        },
    }
}

/// Draw the whole screen
pub fn draw(frame: &mut Frame, app: &App) {
    let colors = palette(app.config.theme);
    let area = frame.area();
    frame.render_widget(Block::default().style(Style::default().bg(colors.bg).fg(colors.fg)), area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Title bar
            Constraint::Length(1), // Search line
            Constraint::Min(3),    // Table
            Constraint::Length(1), // Key hints
            Constraint::Length(1), // Status
        ])
        .split(area);

    draw_title(frame, app, &colors, chunks[0]);
    draw_search(frame, app, &colors, chunks[1]);
    draw_table(frame, app, &colors, chunks[2]);

    let hints = Paragraph::new(
        " [/]search [s/S]sort [r]rescan [a]add [e]edit [d]delete [t]tested [m]missing [T]theme [f]folder [?]help [q]quit",
    )
    .style(Style::default().fg(colors.muted));
    frame.render_widget(hints, chunks[3]);

    let status = Paragraph::new(format!(" {}", app.status)).style(Style::default().fg(colors.accent));
    frame.render_widget(status, chunks[4]);

    match &app.mode {
        Mode::Form(form) => draw_form(frame, form, &colors, area),
        Mode::ConfirmDelete { content_id, .. } => draw_message(
            frame,
            " Confirm Delete ",
            &format!("Delete {}?\n\n[y] Yes   [n] No", content_id),
            colors.accent,
            &colors,
            area,
        ),
        Mode::FolderPrompt { input } => draw_message(
            frame,
            " Content Folder ",
            &format!("{}_\n\n[Enter] Save and scan   [Esc] Cancel", input),
            colors.accent,
            &colors,
            area,
        ),
        Mode::Error { message, .. } => {
            draw_message(frame, " Error ", &format!("{}\n\n[Enter] OK", message), colors.error, &colors, area)
        }
        Mode::Help => draw_message(frame, " Help ", HELP_TEXT, colors.accent, &colors, area),
        Mode::Normal | Mode::Search => {}
    }
}

const HELP_TEXT: &str = "\
j/k, arrows   move selection
g/G           first / last entry
/             search IDs (Enter keeps, Esc clears)
s             next sort column
S             reverse sort direction
m             show only missing entries
r             rescan folder
a / e         add / edit entry
d             delete entry
t             toggle tested
T             toggle light/dark theme
f             set content folder
q             quit";

fn draw_title(frame: &mut Frame, app: &App, colors: &Palette, area: Rect) {
    let folder = app.config.folder_path.as_deref().unwrap_or("(no folder set)");
    let line = Line::from(vec![
        Span::styled(" Collection Helper ", Style::default().fg(colors.accent).add_modifier(Modifier::BOLD)),
        Span::styled(format!("│ {} entries │ ", app.records.len()), Style::default().fg(colors.muted)),
        Span::raw(folder.to_string()),
        Span::styled(format!(" │ {}", app.config.theme), Style::default().fg(colors.muted)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn draw_search(frame: &mut Frame, app: &App, colors: &Palette, area: Rect) {
    let editing = app.mode == Mode::Search;
    let mut spans = vec![Span::styled(" Search: ", Style::default().fg(colors.muted))];
    spans.push(Span::raw(app.view.search.clone()));
    if editing {
        spans.push(Span::styled("_", Style::default().fg(colors.accent)));
    }
    if app.view.only_missing {
        spans.push(Span::styled("  [missing only]", Style::default().fg(colors.error)));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn header_label(app: &App, column: SortColumn) -> String {
    if app.view.sort_column == column {
        format!("{} {}", column.label(), app.view.sort_direction.arrow())
    } else {
        column.label().to_string()
    }
}

fn draw_table(frame: &mut Frame, app: &App, colors: &Palette, area: Rect) {
    let header = Row::new(vec![
        Cell::from(header_label(app, SortColumn::Present)),
        Cell::from(header_label(app, SortColumn::Id)),
        Cell::from(header_label(app, SortColumn::Tested)),
        Cell::from(header_label(app, SortColumn::Version)),
    ])
    .style(Style::default().fg(colors.accent).add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = app
        .records
        .iter()
        .map(|record| {
            let row = TableRow::from(record);
            let marker_color = if record.present { colors.fg } else { colors.error };
            Row::new(vec![
                Cell::from(row.marker).style(Style::default().fg(marker_color)),
                Cell::from(row.id),
                Cell::from(row.tested),
                Cell::from(row.version),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(10),
            Constraint::Min(14),
            Constraint::Length(10),
            Constraint::Length(14),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(colors.border)),
    )
    .style(Style::default().bg(colors.table_bg).fg(colors.fg))
    .row_highlight_style(Style::default().bg(colors.select_bg).fg(colors.select_fg))
    .highlight_symbol("> ");

    let mut state = TableState::default()
        .with_selected((!app.records.is_empty()).then_some(app.selected));
    frame.render_stateful_widget(table, area, &mut state);

    if app.records.is_empty() {
        let inner = Rect::new(area.x + 2, area.y + 2, area.width.saturating_sub(4), 1);
        let hint = if app.view.search.is_empty() && !app.view.only_missing {
            "No entries yet. Press r to scan or a to add one."
        } else {
            "No entries match the current filter."
        };
        frame.render_widget(Paragraph::new(hint).style(Style::default().fg(colors.muted)), inner);
    }
}

/// Centre a dialog of at most `width` x `height` inside `area`
fn dialog_area(area: Rect, width: u16, height: u16) -> Rect {
    let width = area.width.min(width);
    let height = area.height.min(height);
    let x = area.width.saturating_sub(width) / 2;
    let y = area.height.saturating_sub(height) / 2;
    Rect::new(area.x + x, area.y + y, width, height)
}

fn draw_message(frame: &mut Frame, title: &str, text: &str, border: Color, colors: &Palette, area: Rect) {
    let lines = text.lines().count() as u16;
    let dialog = dialog_area(area, 64, lines + 4);
    frame.render_widget(Clear, dialog);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(Span::styled(title.to_string(), Style::default().fg(border).add_modifier(Modifier::BOLD)))
        .style(Style::default().bg(colors.bg).fg(colors.fg));
    let paragraph = Paragraph::new(text.to_string()).block(block).wrap(Wrap { trim: false });
    frame.render_widget(paragraph, dialog);
}

fn draw_form(frame: &mut Frame, form: &EntryForm, colors: &Palette, area: Rect) {
    let dialog = dialog_area(area, 50, 9);
    frame.render_widget(Clear, dialog);

    let field = |label: &str, value: String, focused: bool| {
        let style = if focused {
            Style::default().bg(colors.select_bg).fg(colors.select_fg)
        } else {
            Style::default()
        };
        Line::from(vec![
            Span::styled(format!(" {:<9}", label), Style::default().fg(colors.muted)),
            Span::styled(value, style),
        ])
    };

    let cursor = |text: &str, focused: bool| if focused { format!("{}_", text) } else { text.to_string() };
    let lines = vec![
        field("ID", cursor(&form.id, form.focus == FormField::Id), form.focus == FormField::Id),
        field(
            "Version",
            cursor(&form.version, form.focus == FormField::Version),
            form.focus == FormField::Version,
        ),
        field(
            "Tested",
            if form.tested { "[x] Yes".to_string() } else { "[ ] No".to_string() },
            form.focus == FormField::Tested,
        ),
        Line::from(""),
        Line::from(Span::styled(
            " [Tab] Next  [Space] Toggle  [Enter] Save  [Esc] Cancel",
            Style::default().fg(colors.muted),
        )),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(colors.accent))
        .title(Span::styled(form.title(), Style::default().fg(colors.accent).add_modifier(Modifier::BOLD)))
        .style(Style::default().bg(colors.bg).fg(colors.fg));
    frame.render_widget(Paragraph::new(lines).block(block), dialog);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db::{Database, NewRecord};
    use crate::filename::ContentId;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn render(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
        terminal.draw(|frame| draw(frame, app)).unwrap();
        let buffer = terminal.backend().buffer();
        let mut text = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                text.push_str(buffer[(x, y)].symbol());
            }
            text.push('\n');
        }
        text
    }

    fn app() -> (tempfile::TempDir, App) {
        let tmp = tempfile::tempdir().unwrap();
        let db = Database::in_memory().unwrap();
        db.insert(&NewRecord { content_id: ContentId::parse("RJ4242").unwrap(), version: None, tested: true })
            .unwrap();
        let app = App::new(db, AppConfig::default(), tmp.path().join("config.json"));
        (tmp, app)
    }

    #[test]
    fn test_renders_table() {
        let (_tmp, app) = app();
        let screen = render(&app);
        assert!(screen.contains("Collection Helper"));
        assert!(screen.contains("RJ4242"));
        assert!(screen.contains("✗"));
        assert!(screen.contains("ID ▼"));
    }

    #[test]
    fn test_renders_dialogs() {
        let (_tmp, mut app) = app();
        app.handle_key(KeyEvent::new(KeyCode::Char('d'), KeyModifiers::NONE));
        assert!(render(&app).contains("Delete RJ4242?"));

        app.handle_key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE));
        app.handle_key(KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE));
        assert!(render(&app).contains("Add Entry"));
    }

    #[test]
    fn test_renders_empty_hint() {
        let tmp = tempfile::tempdir().unwrap();
        let app = App::new(Database::in_memory().unwrap(), AppConfig::default(), tmp.path().join("c.json"));
        assert!(render(&app).contains("No entries yet"));
    }

    #[test]
    fn test_palettes_differ() {
        assert_ne!(palette(Theme::Light), palette(Theme::Dark));
    }
}
