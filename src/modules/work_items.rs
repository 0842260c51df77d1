//! Work items returned by the selected query, with an optional detail pane

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;
use tracing::debug;

use super::{workflow, FilterEvent, FilterInput, ListCursor};
use crate::config::keybinds::{KeybindTable, Scope};
use crate::core::{Command, Message, Tab, TabKind};
use crate::domain::work_item::{FIELD_AREA_PATH, FIELD_DESCRIPTION, FIELD_ITERATION_PATH};
use crate::domain::WorkItem;
use crate::ui::{self, layout};

const LOAD_TASK: &str = "load work items";
const DETAIL_TASK: &str = "load work item detail";

const HELP: &[(&str, &str)] = &[
    ("up", "Move up"),
    ("down", "Move down"),
    ("top", "First item"),
    ("bottom", "Last item"),
    ("page_up", "Page up"),
    ("page_down", "Page down"),
    ("toggle_detail", "Show or hide details"),
    ("filter", "Filter (state: type: assigned: tag: id: or free text)"),
    ("refresh", "Re-run the query"),
    ("download", "Save as template"),
    ("edit", "Edit fields in $EDITOR"),
    ("delete", "Delete with children"),
    ("change_state", "Change state"),
    ("assign", "Assign"),
    ("add_tags", "Add tags"),
    ("yank", "Copy ID and title"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKey {
    State,
    Type,
    Assigned,
    Tag,
    Id,
}

fn parse_filter_key(raw: &str) -> Option<FilterKey> {
    match raw.to_lowercase().as_str() {
        "state" | "s" => Some(FilterKey::State),
        "type" | "t" => Some(FilterKey::Type),
        "assigned" | "assignee" | "a" => Some(FilterKey::Assigned),
        "tag" | "tags" => Some(FilterKey::Tag),
        "id" => Some(FilterKey::Id),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterToken {
    KeyValue(FilterKey, String),
    Free(String),
}

/// Parsed filter text; every token must match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    pub raw: String,
    pub tokens: Vec<FilterToken>,
}

impl FilterState {
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }
        let tokens = trimmed
            .split_whitespace()
            .map(|part| match part.split_once(':') {
                Some((key, value)) => match parse_filter_key(key) {
                    Some(key) => FilterToken::KeyValue(key, value.to_lowercase()),
                    None => FilterToken::Free(part.to_lowercase()),
                },
                None => FilterToken::Free(part.to_lowercase()),
            })
            .collect();
        Some(Self {
            raw: trimmed.to_string(),
            tokens,
        })
    }

    pub fn matches(&self, item: &WorkItem) -> bool {
        self.tokens.iter().all(|token| match token {
            FilterToken::KeyValue(key, value) => match key {
                FilterKey::State => contains_ci(item.state(), value),
                FilterKey::Type => contains_ci(item.work_item_type(), value),
                FilterKey::Assigned => item
                    .assigned_display()
                    .into_iter()
                    .chain(item.assigned_to())
                    .any(|name| contains_ci(&name, value)),
                FilterKey::Tag => item.tags().iter().any(|tag| contains_ci(tag, value)),
                FilterKey::Id => item.id.to_string().starts_with(value.trim_start_matches('#')),
            },
            FilterToken::Free(value) => {
                item.id.to_string().starts_with(value.trim_start_matches('#'))
                    || contains_ci(item.title(), value)
                    || contains_ci(item.state(), value)
                    || contains_ci(item.work_item_type(), value)
                    || item
                        .assigned_display()
                        .is_some_and(|name| contains_ci(&name, value))
            }
        })
    }
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

/// Plain text from the HTML the service stores in rich-text fields.
pub fn strip_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut tag = String::new();
    let mut in_tag = false;
    for ch in input.chars() {
        match ch {
            '<' => {
                in_tag = true;
                tag.clear();
            }
            '>' if in_tag => {
                in_tag = false;
                let name = tag
                    .trim_start_matches('/')
                    .split(|c: char| c.is_whitespace() || c == '/')
                    .next()
                    .unwrap_or("")
                    .to_lowercase();
                let closing = tag.starts_with('/');
                let breaks = matches!(name.as_str(), "br" | "tr")
                    || (closing && matches!(name.as_str(), "p" | "div" | "li" | "h1" | "h2" | "h3"));
                if breaks && !out.ends_with('\n') {
                    out.push('\n');
                } else if name == "li" && !closing {
                    out.push_str("- ");
                }
            }
            _ if in_tag => tag.push(ch),
            _ => out.push(ch),
        }
    }
    let decoded = out
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    decoded
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

pub struct WorkItemsTab {
    keybinds: Arc<KeybindTable>,
    items: Vec<WorkItem>,
    visible: Vec<usize>,
    cursor: ListCursor,
    filter_input: FilterInput,
    filter: Option<FilterState>,
    query: Option<(String, String)>,
    loading: bool,
    error: Option<String>,
    generation: u64,
    detail_open: bool,
    detail_cache: HashMap<u32, WorkItem>,
    relation_cache: HashMap<u32, Vec<String>>,
    detail_pending: Option<u32>,
    detail_errors: HashMap<u32, String>,
    height: u16,
}

impl WorkItemsTab {
    pub fn new(keybinds: Arc<KeybindTable>) -> Self {
        Self {
            keybinds,
            items: Vec::new(),
            visible: Vec::new(),
            cursor: ListCursor::default(),
            filter_input: FilterInput::default(),
            filter: None,
            query: None,
            loading: false,
            error: None,
            generation: 0,
            detail_open: false,
            detail_cache: HashMap::new(),
            relation_cache: HashMap::new(),
            detail_pending: None,
            detail_errors: HashMap::new(),
            height: 0,
        }
    }

    pub fn query_name(&self) -> Option<&str> {
        self.query.as_ref().map(|(_, name)| name.as_str())
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_detail_open(&self) -> bool {
        self.detail_open
    }

    pub fn visible_items(&self) -> impl Iterator<Item = &WorkItem> {
        self.visible.iter().filter_map(|&i| self.items.get(i))
    }

    pub fn selected_item(&self) -> Option<&WorkItem> {
        self.cursor
            .selected()
            .and_then(|i| self.visible.get(i))
            .and_then(|&i| self.items.get(i))
    }

    pub fn cached_detail(&self, id: u32) -> Option<&WorkItem> {
        self.detail_cache.get(&id)
    }

    /// Re-run the current query; None until a query has been chosen.
    pub fn refresh(&mut self) -> Option<Command> {
        let (id, _) = self.query.clone()?;
        Some(self.fetch(id))
    }

    fn fetch(&mut self, query_id: String) -> Command {
        self.generation += 1;
        self.loading = true;
        self.error = None;
        self.detail_cache.clear();
        self.relation_cache.clear();
        self.detail_errors.clear();
        self.detail_pending = None;
        let generation = self.generation;
        Command::task(LOAD_TASK, move |services| async move {
            let result = services
                .api
                .execute_query(&query_id)
                .await
                .map_err(|e| e.to_string());
            Message::WorkItemsLoaded { generation, result }
        })
    }

    fn apply_filter(&mut self) {
        let selected_id = self.selected_item().map(|item| item.id);
        self.visible = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| self.filter.as_ref().map_or(true, |f| f.matches(item)))
            .map(|(index, _)| index)
            .collect();
        self.cursor.set_len(self.visible.len());
        if let Some(position) = selected_id.and_then(|id| {
            self.visible
                .iter()
                .position(|&i| self.items.get(i).is_some_and(|item| item.id == id))
        }) {
            self.cursor.select(position);
        }
    }

    fn list_height(&self) -> u16 {
        let body = layout::body_height(self.height);
        let (list, _) = layout::split_detail(body, self.detail_open);
        if self.filter_input.is_active() {
            list.saturating_sub(1)
        } else {
            list
        }
    }

    fn sync_height(&mut self) {
        self.cursor.set_height(self.list_height() as usize);
    }

    /// Load details for the selection when the pane is open and nothing is cached.
    fn ensure_detail(&mut self) -> Option<Command> {
        if !self.detail_open {
            return None;
        }
        let id = self.selected_item()?.id;
        if self.detail_cache.contains_key(&id) || self.detail_pending == Some(id) {
            return None;
        }
        self.detail_pending = Some(id);
        self.detail_errors.remove(&id);
        let generation = self.generation;
        Some(Command::task(DETAIL_TASK, move |services| async move {
            let result = workflow::load_detail(services.api.as_ref(), id).await;
            Message::WorkItemDetailLoaded {
                id,
                generation,
                result,
            }
        }))
    }

    fn handle_key(&mut self, key: KeyEvent) -> Option<Command> {
        if self.filter_input.is_typing() {
            if self.filter_input.handle_key(key) != FilterEvent::Ignored {
                self.filter = FilterState::parse(self.filter_input.text());
                self.apply_filter();
                self.sync_height();
            }
            return None;
        }
        if key.code == KeyCode::Esc {
            if self.filter_input.is_active() {
                self.filter_input.clear();
                self.filter = None;
                self.apply_filter();
            } else {
                self.detail_open = false;
            }
            self.sync_height();
            return None;
        }
        let action = self.keybinds.action_for(&key, Scope::WorkItems)?.to_string();
        if self.cursor.navigate(&action) {
            return self.ensure_detail();
        }
        match action.as_str() {
            "toggle_detail" => {
                self.detail_open = !self.detail_open;
                self.sync_height();
                self.ensure_detail()
            }
            "filter" => {
                self.filter_input.start();
                self.sync_height();
                None
            }
            "refresh" => self.refresh(),
            _ => None,
        }
    }

    fn render_list(&self, f: &mut Frame, area: Rect) {
        let filter_rows = u16::from(self.filter_input.is_active()).min(area.height);
        let list_height = area.height - filter_rows;
        let width = area.width as usize;

        let mut lines = Vec::new();
        if list_height > 0 {
            let title = format!(
                "{}  ({} of {})",
                self.query_name().unwrap_or(""),
                self.visible.len(),
                self.items.len()
            );
            lines.push(Line::from(Span::styled(
                ui::truncate_str(&title, width),
                Style::default().fg(Color::DarkGray),
            )));
        }
        let rows = list_height.saturating_sub(1) as usize;
        for index in self.cursor.window(rows) {
            let Some(item) = self.visible.get(index).and_then(|&i| self.items.get(i)) else {
                continue;
            };
            let assigned = item.assigned_display().unwrap_or_default();
            let text = format!(
                "{:>7}  {:<12} {:<12} {}  {}",
                format!("#{}", item.id),
                ui::truncate_str(item.work_item_type(), 12),
                ui::truncate_str(item.state(), 12),
                item.title(),
                assigned
            );
            let style = if Some(index) == self.cursor.selected() {
                ui::selected_style()
            } else {
                Style::default()
            };
            lines.push(Line::from(Span::styled(ui::truncate_str(&text, width), style)));
        }
        f.render_widget(
            Paragraph::new(lines),
            Rect::new(area.x, area.y, area.width, list_height),
        );

        if filter_rows > 0 {
            let cursor = if self.filter_input.is_typing() { "▏" } else { "" };
            let line = Line::from(vec![
                Span::styled("/", Style::default().fg(Color::Yellow)),
                Span::raw(format!("{}{cursor}", self.filter_input.text())),
            ]);
            f.render_widget(
                Paragraph::new(line),
                Rect::new(area.x, area.y + list_height, area.width, 1),
            );
        }
    }

    fn render_detail(&self, f: &mut Frame, area: Rect) {
        if area.height == 0 {
            return;
        }
        let block = Block::default().borders(Borders::TOP).title("Details");
        let inner = block.inner(area);
        f.render_widget(block, area);

        let Some(selected) = self.selected_item() else {
            return;
        };
        if let Some(err) = self.detail_errors.get(&selected.id) {
            ui::draw_placeholder(f, inner, &format!("Failed to load #{}: {err}", selected.id));
            return;
        }
        let Some(item) = self.detail_cache.get(&selected.id) else {
            ui::draw_placeholder(f, inner, "Loading details…");
            return;
        };

        let label = Style::default().fg(Color::DarkGray);
        let field = |name: &'static str, value: String| {
            Line::from(vec![
                Span::styled(format!("{name:<10}"), label),
                Span::raw(value),
            ])
        };
        let mut lines = vec![
            Line::from(Span::styled(
                format!("#{} {}", item.id, item.title()),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            field("Type", item.work_item_type().to_string()),
            field("State", item.state().to_string()),
            field(
                "Assigned",
                item.assigned_display().unwrap_or_else(|| "-".into()),
            ),
            field("Tags", item.tags().join(", ")),
            field(
                "Area",
                item.field_str(FIELD_AREA_PATH).unwrap_or("").to_string(),
            ),
            field(
                "Iteration",
                item.field_str(FIELD_ITERATION_PATH).unwrap_or("").to_string(),
            ),
            field(
                "Changed",
                item.changed_at()
                    .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default(),
            ),
        ];
        if let Some(relations) = self.relation_cache.get(&item.id) {
            if !relations.is_empty() {
                lines.push(Line::from(""));
                lines.extend(relations.iter().map(|rel| Line::from(rel.clone())));
            }
        }
        let description = item
            .field_str(FIELD_DESCRIPTION)
            .map(strip_html)
            .unwrap_or_default();
        if !description.is_empty() {
            lines.push(Line::from(""));
            lines.extend(description.lines().map(|l| Line::from(l.to_string())));
        }
        f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
    }
}

impl Tab for WorkItemsTab {
    fn kind(&self) -> TabKind {
        TabKind::WorkItems
    }

    fn init(&mut self, width: u16, height: u16) -> Option<Command> {
        self.resize(width, height);
        None
    }

    fn handle(&mut self, message: Message) -> Option<Command> {
        match message {
            Message::Key(key) => self.handle_key(key),
            Message::RunQuery { id, name } => {
                self.query = Some((id.clone(), name));
                self.items.clear();
                self.visible.clear();
                self.cursor.set_len(0);
                self.cursor.reset();
                Some(self.fetch(id))
            }
            Message::WorkItemsLoaded { generation, result } => {
                if generation != self.generation {
                    debug!(generation, latest = self.generation, "dropping stale work items");
                    return None;
                }
                self.loading = false;
                match result {
                    Ok(items) => {
                        self.items = items;
                        self.apply_filter();
                        self.ensure_detail()
                    }
                    Err(err) => {
                        self.error = Some(err);
                        None
                    }
                }
            }
            Message::WorkItemDetailLoaded {
                id,
                generation,
                result,
            } => {
                if generation != self.generation {
                    debug!(id, generation, latest = self.generation, "dropping stale detail");
                    return None;
                }
                if self.detail_pending == Some(id) {
                    self.detail_pending = None;
                }
                match result {
                    Ok(detail) => {
                        self.relation_cache.insert(id, detail.relations);
                        self.detail_cache.insert(id, detail.item);
                    }
                    Err(err) => {
                        self.detail_errors.insert(id, err);
                    }
                }
                None
            }
            Message::TaskFailed { label, .. } if label == LOAD_TASK => {
                self.loading = false;
                None
            }
            Message::TaskFailed { label, .. } if label == DETAIL_TASK => {
                self.detail_pending = None;
                None
            }
            _ => None,
        }
    }

    fn render(&self, f: &mut Frame, area: Rect) {
        if let Some(err) = &self.error {
            let keys = self.keybinds.describe(Scope::WorkItems, "refresh");
            ui::draw_error(f, area, "work items", err, &keys);
            return;
        }
        if self.query.is_none() {
            ui::draw_placeholder(f, area, "Select a query on the Queries tab");
            return;
        }
        if self.items.is_empty() {
            let text = if self.loading {
                "Running query…"
            } else {
                "Query returned no work items"
            };
            ui::draw_placeholder(f, area, text);
            return;
        }

        let (list, detail) = layout::split_detail(area.height, self.detail_open);
        self.render_list(f, Rect::new(area.x, area.y, area.width, list));
        if detail > 0 {
            self.render_detail(f, Rect::new(area.x, area.y + list, area.width, detail));
        }
    }

    fn resize(&mut self, _width: u16, height: u16) {
        self.height = height;
        self.sync_height();
    }

    fn help(&self) -> &'static [(&'static str, &'static str)] {
        HELP
    }

    fn is_filtering(&self) -> bool {
        self.filter_input.is_typing()
    }

    fn is_loading(&self) -> bool {
        self.loading || self.detail_pending.is_some()
    }

    fn owns_task(&self, label: &str) -> bool {
        label == LOAD_TASK || label == DETAIL_TASK
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
