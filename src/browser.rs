use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::widgets::ListState;
use tracing::warn;

use crate::session::{self, SessionRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    List,
    Preview,
}

/// History browser state: a selectable list of saved sessions plus a
/// preview pane, with focus deciding which one navigation keys drive.
pub struct Browser {
    pub dir: PathBuf,
    pub records: Vec<SessionRecord>,
    pub state: ListState,
    pub focus: Focus,

    // Preview viewport (updated during render)
    pub preview_scroll: u16,
    pub preview_height: u16,
    pub preview_lines: u16,

    pub should_quit: bool,
}

impl Browser {
    pub fn new(dir: PathBuf) -> Result<Self> {
        let mut browser = Self {
            dir,
            records: Vec::new(),
            state: ListState::default(),
            focus: Focus::List,
            preview_scroll: 0,
            preview_height: 0,
            preview_lines: 0,
            should_quit: false,
        };
        browser.load()?;
        Ok(browser)
    }

    /// Replace the list with the directory's current contents, keeping the
    /// selection index clamped to the new length.
    pub fn load(&mut self) -> Result<()> {
        self.records = session::load_records(&self.dir)?;
        if self.records.is_empty() {
            self.state.select(None);
        } else {
            let idx = self.state.selected().unwrap_or(0).min(self.records.len() - 1);
            self.state.select(Some(idx));
        }
        Ok(())
    }

    pub fn selected(&self) -> Option<&SessionRecord> {
        self.state.selected().and_then(|i| self.records.get(i))
    }

    /// Switch which pane receives navigation keys; content is untouched.
    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::List => Focus::Preview,
            Focus::Preview => Focus::List,
        };
    }

    pub fn nav_down(&mut self) {
        match self.focus {
            Focus::List => {
                let len = self.records.len();
                if len > 0 {
                    let i = self.state.selected().unwrap_or(0);
                    self.state.select(Some((i + 1).min(len - 1)));
                    self.preview_scroll = 0;
                }
            }
            Focus::Preview => {
                let max = self.preview_lines.saturating_sub(self.preview_height);
                self.preview_scroll = self.preview_scroll.saturating_add(1).min(max);
            }
        }
    }

    pub fn nav_up(&mut self) {
        match self.focus {
            Focus::List => {
                if let Some(i) = self.state.selected() {
                    self.state.select(Some(i.saturating_sub(1)));
                    self.preview_scroll = 0;
                }
            }
            Focus::Preview => {
                self.preview_scroll = self.preview_scroll.saturating_sub(1);
            }
        }
    }

    /// Delete the selected session's file and reload, restoring the
    /// selection to the same index clamped to the new length. A deletion
    /// failure leaves the list untouched so the user can retry.
    pub fn delete_selected(&mut self) {
        let Some(idx) = self.state.selected() else {
            return;
        };
        let Some(record) = self.records.get(idx) else {
            return;
        };

        let path = self.dir.join(&record.filename);
        if let Err(err) = fs::remove_file(&path) {
            warn!(file = %record.filename, %err, "could not delete session file");
            return;
        }

        if let Err(err) = self.load() {
            warn!(%err, "could not reload history list after deletion");
            return;
        }

        if self.records.is_empty() {
            self.state.select(None);
        } else {
            self.state.select(Some(idx.min(self.records.len() - 1)));
        }
        self.preview_scroll = 0;
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Tab => self.toggle_focus(),
            KeyCode::Delete => self.delete_selected(),
            KeyCode::Down | KeyCode::Char('j') => self.nav_down(),
            KeyCode::Up | KeyCode::Char('k') => self.nav_up(),
            _ => {}
        }
    }
}
