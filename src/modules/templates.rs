//! Local template tree with a preview column

use std::any::Any;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossterm::event::KeyEvent;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;
use tracing::debug;

use super::ListCursor;
use crate::config::keybinds::{KeybindTable, Scope};
use crate::core::{batch, flatten, resolve, toggle, Command, FlatRow, Message, Tab, TabKind};
use crate::store::TemplateNode;
use crate::ui::{self, layout};

const LOAD_TASK: &str = "load templates";
const PREVIEW_TASK: &str = "load template preview";

const HELP: &[(&str, &str)] = &[
    ("up", "Move up"),
    ("down", "Move down"),
    ("top", "First entry"),
    ("bottom", "Last entry"),
    ("page_up", "Page up"),
    ("page_down", "Page down"),
    ("select", "Expand folder"),
    ("refresh", "Reload from disk"),
    ("create_work_item", "Create work item from template"),
    ("copy", "Copy"),
    ("rename", "Rename"),
    ("new_template", "New template"),
    ("new_folder", "New folder"),
    ("delete", "Delete"),
    ("edit", "Edit in $EDITOR"),
];

pub struct TemplatesTab {
    keybinds: Arc<KeybindTable>,
    root: PathBuf,
    roots: Vec<TemplateNode>,
    expanded: BTreeSet<String>,
    rows: Vec<FlatRow>,
    cursor: ListCursor,
    preview: Option<(PathBuf, Result<String, String>)>,
    loading: bool,
    error: Option<String>,
    generation: u64,
    height: u16,
}

impl TemplatesTab {
    pub fn new(keybinds: Arc<KeybindTable>, root: impl Into<PathBuf>) -> Self {
        Self {
            keybinds,
            root: root.into(),
            roots: Vec::new(),
            expanded: BTreeSet::new(),
            rows: Vec::new(),
            cursor: ListCursor::default(),
            preview: None,
            loading: false,
            error: None,
            generation: 0,
            height: 0,
        }
    }

    pub fn rows(&self) -> &[FlatRow] {
        &self.rows
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn preview(&self) -> Option<(&Path, Result<&str, &str>)> {
        self.preview
            .as_ref()
            .map(|(path, text)| (path.as_path(), text.as_deref().map_err(String::as_str)))
    }

    pub fn selected_node(&self) -> Option<&TemplateNode> {
        let row = self.cursor.selected().and_then(|i| self.rows.get(i))?;
        resolve(&self.roots, &row.index_path)
    }

    /// Folder new entries go into: the selected folder, a file's folder, or the root.
    pub fn target_dir(&self) -> PathBuf {
        match self.selected_node() {
            Some(node) if node.is_folder => node.path.clone(),
            Some(node) => node
                .path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.root.clone()),
            None => self.root.clone(),
        }
    }

    pub fn reload(&mut self) -> Command {
        self.generation += 1;
        self.loading = true;
        self.error = None;
        let generation = self.generation;
        Command::task(LOAD_TASK, move |services| async move {
            let templates = services.templates.clone();
            let result = tokio::task::spawn_blocking(move || templates.list_tree())
                .await
                .map_err(|e| e.to_string())
                .and_then(|listed| listed.map_err(|e| e.to_string()));
            Message::TemplatesLoaded { generation, result }
        })
    }

    /// Request a preview for the selection unless it is already shown.
    fn load_preview(&mut self) -> Option<Command> {
        let path = self.selected_node()?.path.clone();
        if self.preview.as_ref().is_some_and(|(shown, _)| *shown == path) {
            return None;
        }
        self.preview = Some((path.clone(), Ok(String::new())));
        Some(Command::task(PREVIEW_TASK, move |services| async move {
            let result = services.templates.preview(&path).map_err(|e| e.to_string());
            Message::TemplatePreviewLoaded { path, result }
        }))
    }

    fn rebuild(&mut self) {
        let selected_key = self
            .cursor
            .selected()
            .and_then(|i| self.rows.get(i))
            .map(|row| row.key.clone());
        self.rows = flatten(&self.roots, &self.expanded);
        self.cursor.set_len(self.rows.len());
        if let Some(index) = selected_key.and_then(|key| self.rows.iter().position(|r| r.key == key)) {
            self.cursor.select(index);
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Option<Command> {
        let action = self.keybinds.action_for(&key, Scope::Templates)?.to_string();
        if self.cursor.navigate(&action) {
            return self.load_preview();
        }
        match action.as_str() {
            "select" => {
                let node = self.selected_node()?;
                if node.is_folder {
                    let key = node.key.clone();
                    toggle(&mut self.expanded, &key);
                    self.rebuild();
                }
                None
            }
            "refresh" => Some(self.reload()),
            _ => None,
        }
    }
}

impl Tab for TemplatesTab {
    fn kind(&self) -> TabKind {
        TabKind::Templates
    }

    fn init(&mut self, width: u16, height: u16) -> Option<Command> {
        self.resize(width, height);
        Some(self.reload())
    }

    fn handle(&mut self, message: Message) -> Option<Command> {
        match message {
            Message::Key(key) => self.handle_key(key),
            Message::TemplatesLoaded { generation, result } => {
                if generation != self.generation {
                    debug!(generation, latest = self.generation, "dropping stale template tree");
                    return None;
                }
                self.loading = false;
                match result {
                    Ok(roots) => {
                        self.roots = roots;
                        self.rebuild();
                        self.preview = None;
                        batch([self.load_preview()])
                    }
                    Err(err) => {
                        self.error = Some(err);
                        None
                    }
                }
            }
            Message::TemplatePreviewLoaded { path, result } => {
                if let Some((shown, text)) = self.preview.as_mut() {
                    if *shown == path {
                        *text = result;
                    }
                }
                None
            }
            Message::TaskFailed { label, .. } if label == LOAD_TASK => {
                self.loading = false;
                None
            }
            Message::TaskFailed { label, error } if label == PREVIEW_TASK => {
                if let Some((_, text)) = self.preview.as_mut() {
                    *text = Err(error);
                }
                None
            }
            _ => None,
        }
    }

    fn render(&self, f: &mut Frame, area: Rect) {
        if let Some(err) = &self.error {
            let keys = self.keybinds.describe(Scope::Templates, "refresh");
            ui::draw_error(f, area, "templates", err, &keys);
            return;
        }
        if self.rows.is_empty() {
            let text = if self.loading {
                "Loading templates…".to_string()
            } else {
                format!(
                    "No templates in {} (press {} to create one)",
                    self.root.display(),
                    self.keybinds.describe(Scope::Templates, "new_template")
                )
            };
            ui::draw_placeholder(f, area, &text);
            return;
        }

        let (tree_width, preview_width) = layout::split_preview(area.width);
        let lines: Vec<Line> = self
            .cursor
            .window(area.height as usize)
            .filter_map(|index| self.rows.get(index).map(|row| (index, row)))
            .map(|(index, row)| {
                let marker = match (row.is_folder, row.expanded) {
                    (true, true) => "▾ ",
                    (true, false) => "▸ ",
                    (false, _) => "• ",
                };
                let text = format!("{}{}{}", "  ".repeat(row.depth), marker, row.label);
                let style = if Some(index) == self.cursor.selected() {
                    ui::selected_style()
                } else if row.is_folder {
                    Style::default().fg(Color::LightBlue)
                } else {
                    Style::default()
                };
                Line::from(Span::styled(ui::truncate_str(&text, tree_width as usize), style))
            })
            .collect();
        f.render_widget(
            Paragraph::new(lines),
            Rect::new(area.x, area.y, tree_width, area.height),
        );

        if preview_width == 0 {
            return;
        }
        let preview_area = Rect::new(area.x + tree_width, area.y, preview_width, area.height);
        let block = Block::default().borders(Borders::LEFT);
        let inner = block.inner(preview_area);
        f.render_widget(block, preview_area);
        match self.preview() {
            Some((_, Ok(text))) => {
                let lines: Vec<Line> = text
                    .lines()
                    .take(inner.height as usize)
                    .map(|line| Line::from(ui::truncate_str(line, inner.width as usize)))
                    .collect();
                f.render_widget(Paragraph::new(lines), inner);
            }
            Some((_, Err(err))) => {
                f.render_widget(
                    Paragraph::new(Span::styled(err.to_string(), Style::default().fg(Color::LightRed))),
                    inner,
                );
            }
            None => {}
        }
    }

    fn resize(&mut self, _width: u16, height: u16) {
        self.height = height;
        self.cursor.set_height(layout::body_height(height) as usize);
    }

    fn help(&self) -> &'static [(&'static str, &'static str)] {
        HELP
    }

    fn is_loading(&self) -> bool {
        self.loading
    }

    fn owns_task(&self, label: &str) -> bool {
        label == LOAD_TASK || label == PREVIEW_TASK
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
