// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Application state and key handling for the interactive view

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::db::{ContentRecord, Database, NewRecord, RecordUpdate};
use crate::filename::{format_version, ContentId, Version};
use crate::scanner;
use crate::view::ViewState;
use crate::Result;

const PAGE: usize = 10;

/// Which field of the entry form has focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Id,
    Version,
    Tested,
}

impl FormField {
    fn next(self) -> Self {
        match self {
            FormField::Id => FormField::Version,
            FormField::Version => FormField::Tested,
            FormField::Tested => FormField::Id,
        }
    }

    fn prev(self) -> Self {
        match self {
            FormField::Id => FormField::Tested,
            FormField::Version => FormField::Id,
            FormField::Tested => FormField::Version,
        }
    }
}

/// Add/edit dialog contents
#[derive(Debug, Clone, PartialEq)]
pub struct EntryForm {
    /// `None` when adding a new entry
    pub rowid: Option<i64>,
    pub id: String,
    pub version: String,
    pub tested: bool,
    pub focus: FormField,
    /// Version of the record being edited, as stored
    pub stored_version: Option<Version>,
}

impl EntryForm {
    fn blank() -> Self {
        Self {
            rowid: None,
            id: String::new(),
            version: String::new(),
            tested: false,
            focus: FormField::Id,
            stored_version: None,
        }
    }

    fn for_record(record: &ContentRecord) -> Self {
        Self {
            rowid: Some(record.rowid),
            id: record.content_id.to_string(),
            version: record.version.as_ref().map(version_field).unwrap_or_default(),
            tested: record.tested,
            focus: FormField::Id,
            stored_version: record.version.clone(),
        }
    }

    /// The version to save. An untouched field keeps the stored value even
    /// when it predates the current version format.
    fn version(&self) -> Result<Option<Version>> {
        match &self.stored_version {
            Some(stored) if self.version.trim() == version_field(stored) => Ok(Some(stored.clone())),
            _ => Version::parse(&self.version),
        }
    }

    pub fn title(&self) -> &'static str {
        if self.rowid.is_some() { " Edit Entry " } else { " Add Entry " }
    }

    fn focused_text(&mut self) -> Option<&mut String> {
        match self.focus {
            FormField::Id => Some(&mut self.id),
            FormField::Version => Some(&mut self.version),
            FormField::Tested => None,
        }
    }
}

/// Form text for a stored version: `v1.2` is edited as `1.2`
fn version_field(version: &Version) -> String {
    version.as_str().trim_start_matches('v').to_string()
}

/// Interaction mode; dialogs are drawn over the table
#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Normal,
    Search,
    Form(EntryForm),
    ConfirmDelete { rowid: i64, content_id: String },
    FolderPrompt { input: String },
    Error { message: String, previous: Box<Mode> },
    Help,
}

pub struct App {
    pub db: Database,
    pub config: AppConfig,
    pub config_path: PathBuf,
    pub view: ViewState,
    /// Rows currently shown, already filtered and sorted
    pub records: Vec<ContentRecord>,
    pub selected: usize,
    pub mode: Mode,
    pub status: String,
    pub running: bool,
}

impl App {
    pub fn new(db: Database, config: AppConfig, config_path: PathBuf) -> Self {
        let mut app = Self {
            db,
            config,
            config_path,
            view: ViewState::default(),
            records: Vec::new(),
            selected: 0,
            mode: Mode::Normal,
            status: String::new(),
            running: true,
        };
        app.refresh();
        app
    }

    pub fn selected_record(&self) -> Option<&ContentRecord> {
        self.records.get(self.selected)
    }

    /// Re-query the store, keeping the selection on the same row when it
    /// is still visible.
    pub fn refresh(&mut self) {
        let keep = self.selected_record().map(|r| r.rowid);
        match self.db.list(&self.view.query()) {
            Ok(records) => {
                self.records = self.view.apply(records);
                self.selected = keep
                    .and_then(|rowid| self.records.iter().position(|r| r.rowid == rowid))
                    .unwrap_or(self.selected)
                    .min(self.records.len().saturating_sub(1));
            }
            Err(e) => self.show_error(e.to_string()),
        }
    }

    /// Scan the configured folder, then refresh
    pub fn rescan(&mut self) {
        match self.config.folder() {
            Some(folder) => match scanner::scan_folder(&self.db, &folder) {
                Ok(report) => {
                    self.status = format!(
                        "Scanned {}: {} IDs, {} new, {} updated, {} missing",
                        folder.display(),
                        report.matched,
                        report.inserted,
                        report.updated,
                        report.missing
                    );
                }
                Err(e) => {
                    warn!("Scan failed: {}", e);
                    self.show_error(e.to_string());
                }
            },
            None => self.status = "No folder set. Press f to choose one.".to_string(),
        }
        self.refresh();
    }

    fn show_error(&mut self, message: String) {
        let previous = std::mem::replace(&mut self.mode, Mode::Normal);
        let previous = match previous {
            Mode::Error { previous, .. } => previous,
            other => Box::new(other),
        };
        self.mode = Mode::Error { message, previous };
    }

    fn persist_config(&mut self) -> Result<()> {
        self.config.save(&self.config_path)?;
        debug!("Saved config to {:?}", self.config_path);
        Ok(())
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.running = false;
            return;
        }

        match std::mem::replace(&mut self.mode, Mode::Normal) {
            Mode::Normal => self.handle_normal(key),
            Mode::Search => self.handle_search(key),
            Mode::Form(form) => self.handle_form(form, key),
            Mode::ConfirmDelete { rowid, content_id } => self.handle_confirm(rowid, content_id, key),
            Mode::FolderPrompt { input } => self.handle_folder_prompt(input, key),
            Mode::Error { message, previous } => match key.code {
                KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ') => self.mode = *previous,
                _ => self.mode = Mode::Error { message, previous },
            },
            Mode::Help => {}
        }
    }

    fn handle_normal(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.running = false,
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            KeyCode::PageDown => self.move_selection(PAGE as isize),
            KeyCode::PageUp => self.move_selection(-(PAGE as isize)),
            KeyCode::Home | KeyCode::Char('g') => self.selected = 0,
            KeyCode::End | KeyCode::Char('G') => self.selected = self.records.len().saturating_sub(1),
            KeyCode::Char('/') => self.mode = Mode::Search,
            KeyCode::Char('s') => {
                self.view.sort_by(self.view.sort_column.next());
                self.refresh();
            }
            KeyCode::Char('S') => {
                self.view.sort_direction = self.view.sort_direction.reversed();
                self.refresh();
            }
            KeyCode::Char('m') => {
                self.view.only_missing = !self.view.only_missing;
                self.refresh();
            }
            KeyCode::Char('r') => self.rescan(),
            KeyCode::Char('a') => self.mode = Mode::Form(EntryForm::blank()),
            KeyCode::Char('e') | KeyCode::Enter => match self.selected_record() {
                Some(record) => self.mode = Mode::Form(EntryForm::for_record(record)),
                None => self.status = "Select an entry to edit.".to_string(),
            },
            KeyCode::Char('d') | KeyCode::Delete => match self.selected_record() {
                Some(record) => {
                    self.mode = Mode::ConfirmDelete {
                        rowid: record.rowid,
                        content_id: record.content_id.to_string(),
                    }
                }
                None => self.status = "Select an entry to remove.".to_string(),
            },
            KeyCode::Char('t') => self.toggle_tested(),
            KeyCode::Char('T') => {
                self.config.theme = self.config.theme.toggled();
                match self.persist_config() {
                    Ok(()) => self.status = format!("Theme: {}", self.config.theme),
                    Err(e) => self.show_error(e.to_string()),
                }
            }
            KeyCode::Char('f') => {
                self.mode = Mode::FolderPrompt {
                    input: self.config.folder_path.clone().unwrap_or_default(),
                }
            }
            KeyCode::Char('?') => self.mode = Mode::Help,
            _ => {}
        }
    }

    fn move_selection(&mut self, delta: isize) {
        if self.records.is_empty() {
            self.selected = 0;
            return;
        }
        let last = self.records.len() - 1;
        self.selected = self.selected.saturating_add_signed(delta).min(last);
    }

    fn toggle_tested(&mut self) {
        let Some((rowid, tested)) = self.selected_record().map(|r| (r.rowid, r.tested)) else {
            return;
        };
        match self.db.set_tested(rowid, !tested) {
            Ok(()) => self.refresh(),
            Err(e) => self.show_error(e.to_string()),
        }
    }

    fn handle_search(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => {}
            KeyCode::Esc => {
                self.view.search.clear();
                self.refresh();
            }
            KeyCode::Backspace => {
                self.view.search.pop();
                self.mode = Mode::Search;
                self.refresh();
            }
            KeyCode::Char(c) => {
                self.view.search.push(c);
                self.mode = Mode::Search;
                self.refresh();
            }
            _ => self.mode = Mode::Search,
        }
    }

    fn handle_form(&mut self, mut form: EntryForm, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => return,
            KeyCode::Enter => {
                self.submit_form(form);
                return;
            }
            KeyCode::Tab | KeyCode::Down => form.focus = form.focus.next(),
            KeyCode::BackTab | KeyCode::Up => form.focus = form.focus.prev(),
            KeyCode::Char(' ') if form.focus == FormField::Tested => form.tested = !form.tested,
            KeyCode::Char(c) => {
                if let Some(text) = form.focused_text() {
                    text.push(c);
                } else if matches!(c, 'y' | 'Y') {
                    form.tested = true;
                } else if matches!(c, 'n' | 'N') {
                    form.tested = false;
                }
            }
            KeyCode::Backspace => {
                if let Some(text) = form.focused_text() {
                    text.pop();
                }
            }
            _ => {}
        }
        self.mode = Mode::Form(form);
    }

    fn submit_form(&mut self, form: EntryForm) {
        let outcome = (|| -> Result<(i64, String)> {
            let content_id = ContentId::parse(&form.id)?;
            let version = form.version()?;
            let label = format!("{} {}", content_id, format_version(version.as_ref()));
            match form.rowid {
                Some(rowid) => {
                    self.db.update(rowid, &RecordUpdate { content_id, version, tested: form.tested })?;
                    Ok((rowid, format!("Updated {}", label)))
                }
                None => {
                    let rowid = self.db.insert(&NewRecord { content_id, version, tested: form.tested })?;
                    Ok((rowid, format!("Added {}", label)))
                }
            }
        })();

        match outcome {
            Ok((rowid, message)) => {
                info!("{}", message);
                self.status = message;
                self.refresh();
                if let Some(pos) = self.records.iter().position(|r| r.rowid == rowid) {
                    self.selected = pos;
                }
            }
            Err(e) => {
                self.mode = Mode::Form(form);
                self.show_error(e.to_string());
            }
        }
    }

    fn handle_confirm(&mut self, rowid: i64, content_id: String, key: KeyEvent) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => match self.db.delete(rowid) {
                Ok(()) => {
                    info!("Deleted {}", content_id);
                    self.status = format!("Deleted {}", content_id);
                    self.refresh();
                }
                Err(e) => self.show_error(e.to_string()),
            },
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {}
            _ => self.mode = Mode::ConfirmDelete { rowid, content_id },
        }
    }

    fn handle_folder_prompt(&mut self, mut input: String, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {}
            KeyCode::Enter => {
                let folder = input.trim().to_string();
                if !folder.is_empty() && !std::path::Path::new(&folder).is_dir() {
                    self.mode = Mode::FolderPrompt { input };
                    self.show_error(format!("Not a directory: {}", folder));
                    return;
                }
                self.config.folder_path = (!folder.is_empty()).then_some(folder);
                if let Err(e) = self.persist_config() {
                    self.show_error(e.to_string());
                    return;
                }
                self.rescan();
            }
            KeyCode::Backspace => {
                input.pop();
                self.mode = Mode::FolderPrompt { input };
            }
            KeyCode::Char(c) => {
                input.push(c);
                self.mode = Mode::FolderPrompt { input };
            }
            _ => self.mode = Mode::FolderPrompt { input },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Theme;
    use crate::view::{SortColumn, SortDirection};
    use tempfile::TempDir;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
    }

    fn app_with(ids: &[&str]) -> (TempDir, App) {
        let tmp = TempDir::new().unwrap();
        let db = Database::in_memory().unwrap();
        for id in ids {
            db.insert(&NewRecord { content_id: ContentId::parse(id).unwrap(), version: None, tested: false })
                .unwrap();
        }
        let app = App::new(db, AppConfig::default(), tmp.path().join("config.json"));
        (tmp, app)
    }

    fn shown(app: &App) -> Vec<&str> {
        app.records.iter().map(|r| r.content_id.as_str()).collect()
    }

    #[test]
    fn test_starts_sorted_descending() {
        let (_tmp, app) = app_with(&["RJ1", "RJ30", "RJ200"]);
        assert_eq!(shown(&app), vec!["RJ200", "RJ30", "RJ1"]);
        assert!(app.running);
        assert_eq!(app.mode, Mode::Normal);
    }

    #[test]
    fn test_add_entry_through_form() {
        let (_tmp, mut app) = app_with(&[]);
        app.handle_key(key(KeyCode::Char('a')));
        type_text(&mut app, "rj77");
        app.handle_key(key(KeyCode::Tab));
        type_text(&mut app, "1.5");
        app.handle_key(key(KeyCode::Tab));
        app.handle_key(key(KeyCode::Char(' ')));
        app.handle_key(key(KeyCode::Enter));

        assert_eq!(app.mode, Mode::Normal);
        let record = app.selected_record().unwrap();
        assert_eq!(record.content_id.as_str(), "RJ77");
        assert_eq!(record.version.as_ref().unwrap().as_str(), "v1.5");
        assert!(record.tested);
    }

    #[test]
    fn test_duplicate_add_shows_error_and_keeps_form() {
        let (_tmp, mut app) = app_with(&["RJ5"]);
        app.handle_key(key(KeyCode::Char('a')));
        type_text(&mut app, "RJ5");
        app.handle_key(key(KeyCode::Enter));

        match &app.mode {
            Mode::Error { message, previous } => {
                assert!(message.contains("RJ5"));
                assert!(matches!(**previous, Mode::Form(_)));
            }
            other => panic!("expected error dialog, got {:?}", other),
        }
        app.handle_key(key(KeyCode::Esc));
        assert!(matches!(app.mode, Mode::Form(_)));
        assert_eq!(app.db.count().unwrap(), 1);
    }

    #[test]
    fn test_invalid_version_is_rejected() {
        let (_tmp, mut app) = app_with(&[]);
        app.handle_key(key(KeyCode::Char('a')));
        type_text(&mut app, "RJ8");
        app.handle_key(key(KeyCode::Tab));
        type_text(&mut app, "beta");
        app.handle_key(key(KeyCode::Enter));
        assert!(matches!(app.mode, Mode::Error { .. }));
        assert_eq!(app.db.count().unwrap(), 0);
    }

    #[test]
    fn test_edit_entry() {
        let (_tmp, mut app) = app_with(&["RJ10"]);
        app.handle_key(key(KeyCode::Char('e')));
        match &app.mode {
            Mode::Form(form) => assert_eq!(form.id, "RJ10"),
            other => panic!("expected form, got {:?}", other),
        }
        app.handle_key(key(KeyCode::Tab));
        type_text(&mut app, "2");
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.records[0].version.as_ref().unwrap().as_str(), "v2");
    }

    #[test]
    fn test_edit_keeps_legacy_version() {
        let (_tmp, mut app) = app_with(&[]);
        let legacy = Version::from_stored(Some("beta".to_string()));
        app.db
            .insert(&NewRecord { content_id: ContentId::parse("RJ11").unwrap(), version: legacy.clone(), tested: false })
            .unwrap();
        app.refresh();

        app.handle_key(key(KeyCode::Char('e')));
        app.handle_key(key(KeyCode::BackTab));
        app.handle_key(key(KeyCode::Char(' ')));
        app.handle_key(key(KeyCode::Enter));

        assert_eq!(app.mode, Mode::Normal);
        assert!(app.records[0].tested);
        assert_eq!(app.records[0].version, legacy);

        // Typing over it still goes through validation
        app.handle_key(key(KeyCode::Char('e')));
        app.handle_key(key(KeyCode::Tab));
        type_text(&mut app, "x");
        app.handle_key(key(KeyCode::Enter));
        assert!(matches!(app.mode, Mode::Error { .. }));
    }

    #[test]
    fn test_delete_requires_confirmation() {
        let (_tmp, mut app) = app_with(&["RJ1", "RJ2"]);
        app.handle_key(key(KeyCode::Char('d')));
        app.handle_key(key(KeyCode::Char('n')));
        assert_eq!(app.records.len(), 2);

        app.handle_key(key(KeyCode::Char('d')));
        app.handle_key(key(KeyCode::Char('y')));
        assert_eq!(shown(&app), vec!["RJ1"]);
        assert_eq!(app.mode, Mode::Normal);
    }

    #[test]
    fn test_toggle_tested() {
        let (_tmp, mut app) = app_with(&["RJ1"]);
        app.handle_key(key(KeyCode::Char('t')));
        assert!(app.records[0].tested);
        app.handle_key(key(KeyCode::Char('t')));
        assert!(!app.records[0].tested);
    }

    #[test]
    fn test_search_filters_live() {
        let (_tmp, mut app) = app_with(&["RJ100", "RJ200", "RJ101"]);
        app.handle_key(key(KeyCode::Char('/')));
        type_text(&mut app, "10");
        assert_eq!(app.mode, Mode::Search);
        assert_eq!(shown(&app), vec!["RJ101", "RJ100"]);

        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.mode, Mode::Normal);
        assert_eq!(app.records.len(), 2);

        app.handle_key(key(KeyCode::Char('/')));
        app.handle_key(key(KeyCode::Esc));
        assert_eq!(app.records.len(), 3);
    }

    #[test]
    fn test_sort_keys() {
        let (_tmp, mut app) = app_with(&["RJ1", "RJ2"]);
        app.handle_key(key(KeyCode::Char('S')));
        assert_eq!(app.view.sort_direction, SortDirection::Ascending);
        assert_eq!(shown(&app), vec!["RJ1", "RJ2"]);
        app.handle_key(key(KeyCode::Char('s')));
        assert_eq!(app.view.sort_column, SortColumn::Version);
    }

    #[test]
    fn test_theme_toggle_persists() {
        let (tmp, mut app) = app_with(&[]);
        app.handle_key(key(KeyCode::Char('T')));
        assert_eq!(app.config.theme, Theme::Dark);
        let saved = AppConfig::load(&tmp.path().join("config.json")).unwrap();
        assert_eq!(saved.theme, Theme::Dark);
    }

    #[test]
    fn test_folder_prompt_scans() {
        let (tmp, mut app) = app_with(&[]);
        let folder = tmp.path().join("works");
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join("RJ321 (1.0).zip"), b"").unwrap();

        app.handle_key(key(KeyCode::Char('f')));
        type_text(&mut app, folder.to_str().unwrap());
        app.handle_key(key(KeyCode::Enter));

        assert_eq!(app.mode, Mode::Normal);
        assert_eq!(shown(&app), vec!["RJ321"]);
        assert!(app.records[0].present);
        let saved = AppConfig::load(&tmp.path().join("config.json")).unwrap();
        assert_eq!(saved.folder(), Some(folder));
    }

    #[test]
    fn test_folder_prompt_rejects_missing_dir() {
        let (tmp, mut app) = app_with(&[]);
        app.handle_key(key(KeyCode::Char('f')));
        type_text(&mut app, tmp.path().join("nope").to_str().unwrap());
        app.handle_key(key(KeyCode::Enter));
        assert!(matches!(app.mode, Mode::Error { .. }));
        assert_eq!(app.config.folder_path, None);
    }

    #[test]
    fn test_rescan_without_folder_sets_status() {
        let (_tmp, mut app) = app_with(&[]);
        app.handle_key(key(KeyCode::Char('r')));
        assert!(app.status.contains("No folder"));
    }

    #[test]
    fn test_quit_and_navigation() {
        let (_tmp, mut app) = app_with(&["RJ1", "RJ2", "RJ3"]);
        app.handle_key(key(KeyCode::Char('G')));
        assert_eq!(app.selected, 2);
        app.handle_key(key(KeyCode::Down));
        assert_eq!(app.selected, 2);
        app.handle_key(key(KeyCode::Char('g')));
        app.handle_key(key(KeyCode::Up));
        assert_eq!(app.selected, 0);
        app.handle_key(key(KeyCode::Char('q')));
        assert!(!app.running);
    }
}
