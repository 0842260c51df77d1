//! Saved query tree

use std::any::Any;
use std::collections::BTreeSet;
use std::sync::Arc;

use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;
use tracing::debug;

use super::{FilterEvent, FilterInput, ListCursor};
use crate::config::keybinds::{KeybindTable, Scope};
use crate::core::{flatten, resolve, toggle, Command, FlatRow, Message, Tab, TabKind, TreeItem};
use crate::domain::QueryNode;
use crate::ui::{self, layout};

const LOAD_TASK: &str = "load queries";

const HELP: &[(&str, &str)] = &[
    ("up", "Move up"),
    ("down", "Move down"),
    ("top", "First row"),
    ("bottom", "Last row"),
    ("page_up", "Page up"),
    ("page_down", "Page down"),
    ("select", "Expand folder / run query"),
    ("filter", "Filter by name"),
    ("refresh", "Reload queries"),
];

impl TreeItem for QueryNode {
    fn key(&self) -> &str {
        if self.path.is_empty() {
            &self.id
        } else {
            &self.path
        }
    }

    fn label(&self) -> &str {
        &self.name
    }

    fn is_folder(&self) -> bool {
        self.is_folder
    }

    fn children(&self) -> &[Self] {
        &self.children
    }
}

pub struct QueriesTab {
    keybinds: Arc<KeybindTable>,
    roots: Vec<QueryNode>,
    expanded: BTreeSet<String>,
    rows: Vec<FlatRow>,
    cursor: ListCursor,
    filter: FilterInput,
    loading: bool,
    error: Option<String>,
    generation: u64,
    height: u16,
}

impl QueriesTab {
    pub fn new(keybinds: Arc<KeybindTable>) -> Self {
        Self {
            keybinds,
            roots: Vec::new(),
            expanded: BTreeSet::new(),
            rows: Vec::new(),
            cursor: ListCursor::default(),
            filter: FilterInput::default(),
            loading: false,
            error: None,
            generation: 0,
            height: 0,
        }
    }

    pub fn rows(&self) -> &[FlatRow] {
        &self.rows
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn selected_row(&self) -> Option<&FlatRow> {
        self.cursor.selected().and_then(|i| self.rows.get(i))
    }

    fn fetch(&mut self) -> Command {
        self.generation += 1;
        self.loading = true;
        self.error = None;
        let generation = self.generation;
        Command::task(LOAD_TASK, move |services| async move {
            let result = services
                .api
                .list_queries()
                .await
                .map_err(|e| e.to_string());
            Message::QueriesLoaded { generation, result }
        })
    }

    /// Rebuild visible rows, keeping the selection on the same key when possible.
    fn rebuild(&mut self) {
        let selected_key = self.selected_row().map(|row| row.key.clone());
        self.rows = flatten(&self.roots, &self.expanded)
            .into_iter()
            .filter(|row| self.filter.matches(&row.label))
            .collect();
        self.cursor.set_len(self.rows.len());
        if let Some(index) = selected_key.and_then(|key| self.rows.iter().position(|r| r.key == key)) {
            self.cursor.select(index);
        }
    }

    fn list_height(&self) -> u16 {
        let body = layout::body_height(self.height);
        if self.filter.is_active() {
            body.saturating_sub(1)
        } else {
            body
        }
    }

    fn select(&mut self) -> Option<Command> {
        let row = self.selected_row()?.clone();
        if row.is_folder {
            toggle(&mut self.expanded, &row.key);
            self.rebuild();
            return None;
        }
        let node = resolve(&self.roots, &row.index_path)?;
        debug!(query = %node.name, "query selected");
        Some(Command::emit(Message::RunQuery {
            id: node.id.clone(),
            name: node.name.clone(),
        }))
    }

    fn handle_key(&mut self, key: crossterm::event::KeyEvent) -> Option<Command> {
        if self.filter.is_typing() {
            if self.filter.handle_key(key) != FilterEvent::Ignored {
                self.rebuild();
                self.cursor.set_height(self.list_height() as usize);
            }
            return None;
        }
        if key.code == crossterm::event::KeyCode::Esc && self.filter.is_active() {
            self.filter.clear();
            self.rebuild();
            self.cursor.set_height(self.list_height() as usize);
            return None;
        }
        let action = self.keybinds.action_for(&key, Scope::Queries)?.to_string();
        if self.cursor.navigate(&action) {
            return None;
        }
        match action.as_str() {
            "select" => self.select(),
            "filter" => {
                self.filter.start();
                self.cursor.set_height(self.list_height() as usize);
                None
            }
            "refresh" => Some(self.fetch()),
            _ => None,
        }
    }
}

impl Tab for QueriesTab {
    fn kind(&self) -> TabKind {
        TabKind::Queries
    }

    fn init(&mut self, width: u16, height: u16) -> Option<Command> {
        self.resize(width, height);
        Some(self.fetch())
    }

    fn handle(&mut self, message: Message) -> Option<Command> {
        match message {
            Message::Key(key) => self.handle_key(key),
            Message::QueriesLoaded { generation, result } => {
                if generation != self.generation {
                    debug!(generation, latest = self.generation, "dropping stale queries");
                    return None;
                }
                self.loading = false;
                match result {
                    Ok(roots) => {
                        self.roots = roots;
                        self.rebuild();
                    }
                    Err(err) => self.error = Some(err),
                }
                None
            }
            Message::TaskFailed { label, .. } if label == LOAD_TASK => {
                self.loading = false;
                None
            }
            _ => None,
        }
    }

    fn render(&self, f: &mut Frame, area: Rect) {
        if let Some(err) = &self.error {
            let keys = self.keybinds.describe(Scope::Queries, "refresh");
            ui::draw_error(f, area, "queries", err, &keys);
            return;
        }
        if self.rows.is_empty() && !self.filter.is_active() {
            let text = if self.loading {
                "Loading queries…"
            } else {
                "No saved queries"
            };
            ui::draw_placeholder(f, area, text);
            return;
        }

        let filter_rows = u16::from(self.filter.is_active()).min(area.height);
        let list_height = area.height - filter_rows;
        let width = area.width as usize;
        let lines: Vec<Line> = self
            .cursor
            .window(list_height as usize)
            .filter_map(|index| self.rows.get(index).map(|row| (index, row)))
            .map(|(index, row)| {
                let marker = match (row.is_folder, row.expanded) {
                    (true, true) => "▾ ",
                    (true, false) => "▸ ",
                    (false, _) => "  ",
                };
                let text = format!("{}{}{}", "  ".repeat(row.depth), marker, row.label);
                let style = if Some(index) == self.cursor.selected() {
                    ui::selected_style()
                } else if row.is_folder {
                    Style::default().fg(Color::LightBlue)
                } else {
                    Style::default()
                };
                Line::from(Span::styled(ui::truncate_str(&text, width), style))
            })
            .collect();
        f.render_widget(
            Paragraph::new(lines),
            Rect::new(area.x, area.y, area.width, list_height),
        );

        if filter_rows > 0 {
            let cursor = if self.filter.is_typing() { "▏" } else { "" };
            let line = Line::from(vec![
                Span::styled("/", Style::default().fg(Color::Yellow)),
                Span::raw(format!("{}{cursor}", self.filter.text())),
            ]);
            f.render_widget(
                Paragraph::new(line),
                Rect::new(area.x, area.y + list_height, area.width, 1),
            );
        }
    }

    fn resize(&mut self, _width: u16, height: u16) {
        self.height = height;
        self.cursor.set_height(self.list_height() as usize);
    }

    fn help(&self) -> &'static [(&'static str, &'static str)] {
        HELP
    }

    fn is_filtering(&self) -> bool {
        self.filter.is_typing()
    }

    fn is_loading(&self) -> bool {
        self.loading
    }

    fn owns_task(&self, label: &str) -> bool {
        label == LOAD_TASK
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
