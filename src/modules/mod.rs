//! Dashboard tabs
//!
//! Each tab implements [`Tab`](crate::core::Tab) and owns its own:
//! - list selection and scroll state
//! - loading/error flags and stale-result generation
//! - rendering
//!
//! Tabs:
//! - queries: saved query tree
//! - work_items: result set of the selected query with detail pane
//! - templates: local YAML template tree with preview
//! - placeholder: Pipelines and Agents
//!
//! `workflow` holds the async multi-call operations the coordinator schedules.

pub mod placeholder;
pub mod queries;
pub mod templates;
pub mod work_items;
pub mod workflow;

pub use placeholder::PlaceholderTab;
pub use queries::QueriesTab;
pub use templates::TemplatesTab;
pub use work_items::WorkItemsTab;

use std::ops::Range;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Selection and scroll offset over a list of `len` rows shown `height` at a time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListCursor {
    selected: usize,
    offset: usize,
    len: usize,
    height: usize,
}

impl ListCursor {
    pub fn selected(&self) -> Option<usize> {
        (self.len > 0).then_some(self.selected)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn set_len(&mut self, len: usize) {
        self.len = len;
        self.selected = self.selected.min(len.saturating_sub(1));
        self.scroll_into_view();
    }

    pub fn set_height(&mut self, height: usize) {
        self.height = height;
        self.scroll_into_view();
    }

    pub fn select(&mut self, index: usize) {
        self.selected = index.min(self.len.saturating_sub(1));
        self.scroll_into_view();
    }

    pub fn reset(&mut self) {
        self.selected = 0;
        self.offset = 0;
    }

    /// Apply a navigation action by name; false if `action` is not navigation.
    pub fn navigate(&mut self, action: &str) -> bool {
        let page = self.height.max(1);
        let target = match action {
            "up" => self.selected.saturating_sub(1),
            "down" => self.selected + 1,
            "top" => 0,
            "bottom" => self.len.saturating_sub(1),
            "page_up" => self.selected.saturating_sub(page),
            "page_down" => self.selected + page,
            _ => return false,
        };
        self.select(target);
        true
    }

    /// Rows to draw for a viewport of `height`
    pub fn window(&self, height: usize) -> Range<usize> {
        if height == 0 || self.len == 0 {
            return 0..0;
        }
        let mut start = self.offset.min(self.len.saturating_sub(1));
        if self.selected < start {
            start = self.selected;
        } else if self.selected >= start + height {
            start = self.selected + 1 - height;
        }
        start..(start + height).min(self.len)
    }

    fn scroll_into_view(&mut self) {
        if self.height == 0 {
            self.offset = self.selected;
            return;
        }
        if self.selected < self.offset {
            self.offset = self.selected;
        } else if self.selected >= self.offset + self.height {
            self.offset = self.selected + 1 - self.height;
        }
        let max_offset = self.len.saturating_sub(self.height);
        self.offset = self.offset.min(max_offset);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterEvent {
    Changed,
    Committed,
    Cleared,
    Ignored,
}

/// Text typed after `/`. While `typing`, every key edits the field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterInput {
    typing: bool,
    text: String,
}

impl FilterInput {
    pub fn start(&mut self) {
        self.typing = true;
    }

    pub fn is_typing(&self) -> bool {
        self.typing
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_active(&self) -> bool {
        self.typing || !self.text.is_empty()
    }

    pub fn clear(&mut self) {
        self.typing = false;
        self.text.clear();
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> FilterEvent {
        match key.code {
            KeyCode::Enter => {
                self.typing = false;
                FilterEvent::Committed
            }
            KeyCode::Esc => {
                self.clear();
                FilterEvent::Cleared
            }
            KeyCode::Backspace => {
                if self.text.pop().is_some() {
                    FilterEvent::Changed
                } else {
                    FilterEvent::Ignored
                }
            }
            KeyCode::Char(ch)
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                self.text.push(ch);
                FilterEvent::Changed
            }
            _ => FilterEvent::Ignored,
        }
    }

    /// Case-insensitive substring match; empty filter matches everything.
    pub fn matches(&self, label: &str) -> bool {
        self.text.is_empty() || label.to_lowercase().contains(&self.text.to_lowercase())
    }
}
