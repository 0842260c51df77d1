//! Dashboard coordinator
//!
//! Owns the tabs, overlays, keybinds and the single pending action. Every event
//! goes through [`Dashboard::update`], which mutates state in place and returns
//! the commands the loop should run next.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use tracing::{debug, info, warn};

use crate::config::keybinds::{KeybindTable, Scope};
use crate::core::{
    batch, ActionContext, ActionController, ActionKind, ActionStep, Command, ConfirmAction, EditorPurpose,
    EditorRequest, Message, NotifyLevel, PendingAction, PromptAction, Tab, TabKind, TemplateOp,
    UpdateOutcome,
};
use crate::domain::work_item::{merge_tags, FIELD_ASSIGNED_TO, FIELD_STATE, FIELD_TAGS};
use crate::domain::{FieldUpdate, WorkItem};
use crate::logging::LogHandle;
use crate::modules::{workflow, PlaceholderTab, QueriesTab, TemplatesTab, WorkItemsTab};
use crate::store::TemplateNode;
use crate::ui::{
    self,
    widgets::{
        ConfirmDialog, ConfirmOutcome, HelpOverlay, HelpSection, InputPrompt, Notification,
        PromptOutcome,
    },
};

/// How long a notification stays in the footer
pub const NOTIFY_TTL: Duration = Duration::from_secs(4);

const WORK_ITEM_SHORTCUTS: &[&str] = &[
    "yank",
    "download",
    "edit",
    "delete",
    "change_state",
    "assign",
    "add_tags",
];

const TEMPLATE_SHORTCUTS: &[&str] = &[
    "create_work_item",
    "copy",
    "rename",
    "new_template",
    "new_folder",
    "delete",
    "edit",
];

const GLOBAL_HELP: &[(&str, &str)] = &[
    ("quit", "Quit"),
    ("next_tab", "Next tab"),
    ("prev_tab", "Previous tab"),
    ("help", "Toggle help"),
];

/// Organization and project shown in the header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Target {
    pub organization: String,
    pub project: String,
}

/// Modal widgets. Prompt, confirmation and help are mutually exclusive; the
/// notification lives in the footer and never blocks input.
#[derive(Debug, Default)]
pub struct Overlays {
    pub notification: Notification,
    pub prompt: InputPrompt,
    pub confirm: ConfirmDialog,
    pub help: HelpOverlay,
}

impl Overlays {
    fn open_prompt(&mut self, title: String, initial: String, options: Vec<String>, action: PromptAction) {
        self.confirm.hide();
        self.help.hide();
        self.prompt.show(title, initial, options, action);
    }

    fn open_confirm(&mut self, prompt: String, action: ConfirmAction) {
        self.prompt.hide();
        self.help.hide();
        self.confirm.show(prompt, action);
    }

    fn toggle_help(&mut self) {
        if self.help.toggle() {
            self.prompt.hide();
            self.confirm.hide();
        }
    }

    pub fn is_modal_open(&self) -> bool {
        self.prompt.is_visible() || self.confirm.is_visible() || self.help.is_visible()
    }
}

pub struct Dashboard {
    tabs: Vec<Box<dyn Tab>>,
    active: usize,
    keybinds: Arc<KeybindTable>,
    actions: ActionController,
    overlays: Overlays,
    log: LogHandle,
    target: Target,
    size: (u16, u16),
    initialized: bool,
    should_quit: bool,
    startup_warnings: Vec<String>,
}

impl Dashboard {
    pub fn new(
        keybinds: Arc<KeybindTable>,
        target: Target,
        templates_root: impl Into<PathBuf>,
        log: LogHandle,
    ) -> Self {
        let tabs: Vec<Box<dyn Tab>> = vec![
            Box::new(QueriesTab::new(keybinds.clone())),
            Box::new(WorkItemsTab::new(keybinds.clone())),
            Box::new(TemplatesTab::new(keybinds.clone(), templates_root)),
            Box::new(PlaceholderTab::new(TabKind::Pipelines)),
            Box::new(PlaceholderTab::new(TabKind::Agents)),
        ];
        Self {
            tabs,
            active: 0,
            keybinds,
            actions: ActionController::new(),
            overlays: Overlays::default(),
            log,
            target,
            size: (0, 0),
            initialized: false,
            should_quit: false,
            startup_warnings: Vec::new(),
        }
    }

    /// Warnings collected before the UI existed, shown once by [`init`](Self::init).
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.startup_warnings = warnings;
        self
    }

    pub fn init(&mut self) -> Vec<Command> {
        if self.startup_warnings.is_empty() {
            return Vec::new();
        }
        let text = std::mem::take(&mut self.startup_warnings).join("; ");
        vec![self.notify(text, NotifyLevel::Warn)]
    }

    pub fn update(&mut self, message: Message) -> Vec<Command> {
        let log = self.log.clone();
        log.scope(|| {
            debug!(message = message.name(), "update");
            self.dispatch(message)
                .map(Command::flatten)
                .unwrap_or_default()
        })
    }

    pub fn render(&self, f: &mut Frame) {
        ui::draw(f, self);
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn size(&self) -> (u16, u16) {
        self.size
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn overlays(&self) -> &Overlays {
        &self.overlays
    }

    pub fn active_kind(&self) -> TabKind {
        self.tabs[self.active].kind()
    }

    pub fn active_tab(&self) -> &dyn Tab {
        &*self.tabs[self.active]
    }

    fn active_tab_mut(&mut self) -> &mut dyn Tab {
        &mut *self.tabs[self.active]
    }

    pub fn pending_action(&self) -> Option<&PendingAction> {
        self.actions.current()
    }

    pub fn is_loading(&self) -> bool {
        self.tabs.iter().any(|tab| tab.is_loading())
    }

    pub fn tab<T: Tab>(&self) -> Option<&T> {
        self.tabs.iter().find_map(|tab| tab.as_any().downcast_ref::<T>())
    }

    pub fn tab_mut<T: Tab>(&mut self) -> Option<&mut T> {
        self.tabs
            .iter_mut()
            .find_map(|tab| tab.as_any_mut().downcast_mut::<T>())
    }

    pub fn help_sections(&self) -> Vec<HelpSection> {
        let rows = |scope: Scope, entries: &[(&str, &str)]| {
            entries
                .iter()
                .map(|(action, description)| {
                    (self.keybinds.describe(scope, action), description.to_string())
                })
                .filter(|(keys, _)| !keys.is_empty())
                .collect::<Vec<_>>()
        };
        let mut sections = vec![HelpSection {
            title: "Global".into(),
            rows: rows(Scope::Global, GLOBAL_HELP),
        }];
        let tab = self.active_tab();
        if let Some(scope) = tab.kind().scope() {
            sections.push(HelpSection {
                title: tab.name().into(),
                rows: rows(scope, tab.help()),
            });
        }
        sections
    }

    /// `(keys, label)` pairs for the footer: help and quit, then the tab's actions.
    pub fn footer_hints(&self) -> Vec<(String, String)> {
        let mut hints = vec![
            (self.keybinds.describe(Scope::Global, "help"), "help".to_string()),
            (self.keybinds.describe(Scope::Global, "quit"), "quit".to_string()),
        ];
        let kind = self.active_kind();
        if let Some(scope) = kind.scope() {
            let shortcuts = match kind {
                TabKind::WorkItems => WORK_ITEM_SHORTCUTS,
                TabKind::Templates => TEMPLATE_SHORTCUTS,
                _ => &["select", "filter", "refresh"][..],
            };
            hints.extend(shortcuts.iter().map(|action| {
                (self.keybinds.describe(scope, action), action.replace('_', " "))
            }));
        }
        hints.retain(|(keys, _)| !keys.is_empty());
        hints
    }

    fn dispatch(&mut self, message: Message) -> Option<Command> {
        match message {
            Message::Resize { width, height } => self.resize(width, height),
            Message::Key(key) => self.handle_key(key),
            Message::Notify { text, level } => Some(self.notify(text, level)),
            Message::ClearNotification { id } => {
                self.overlays.notification.clear(id);
                None
            }
            Message::SwitchTab(kind) => {
                self.switch_to(kind);
                None
            }
            message @ Message::QueriesLoaded { .. } => self.route(TabKind::Queries, message),
            message @ Message::RunQuery { .. } => {
                self.switch_to(TabKind::WorkItems);
                self.route(TabKind::WorkItems, message)
            }
            message @ (Message::WorkItemsLoaded { .. } | Message::WorkItemDetailLoaded { .. }) => {
                self.route(TabKind::WorkItems, message)
            }
            message @ (Message::TemplatesLoaded { .. } | Message::TemplatePreviewLoaded { .. }) => {
                self.route(TabKind::Templates, message)
            }
            Message::WorkItemCreated { result } => {
                self.finish_action();
                match result {
                    Ok(summary) => {
                        self.switch_to(TabKind::WorkItems);
                        let children = match summary.children {
                            0 => String::new(),
                            1 => " with 1 child".to_string(),
                            n => format!(" with {n} children"),
                        };
                        let text = format!("Created #{} {}{children}", summary.id, summary.title);
                        batch([Some(self.notify(text, NotifyLevel::Info)), self.refresh_work_items()])
                    }
                    Err(err) => Some(self.notify(format!("Create failed: {err}"), NotifyLevel::Error)),
                }
            }
            Message::WorkItemUpdated { id, result } => {
                self.finish_action();
                match result {
                    Ok(UpdateOutcome::Updated { title }) => batch([
                        Some(self.notify(format!("Updated #{id} {title}"), NotifyLevel::Info)),
                        self.refresh_work_items(),
                    ]),
                    Ok(UpdateOutcome::Unchanged) => {
                        Some(self.notify(format!("No changes to #{id}"), NotifyLevel::Info))
                    }
                    Err(err) => Some(self.notify(
                        format!("Update of #{id} failed: {err}"),
                        NotifyLevel::Error,
                    )),
                }
            }
            Message::WorkItemDeleted { id, result } => {
                self.finish_action();
                let notice = match result {
                    Ok(count) => self.notify(
                        format!("Deleted #{id} ({count} work items)"),
                        NotifyLevel::Info,
                    ),
                    Err(err) => self.notify(format!("Delete failed: {err}"), NotifyLevel::Error),
                };
                // children may be gone even when the parent was kept
                batch([Some(notice), self.refresh_work_items()])
            }
            Message::TemplateSaved { result } => {
                self.finish_action();
                match result {
                    Ok(path) => batch([
                        Some(self.notify(
                            format!("Saved template {}", display_name(&path)),
                            NotifyLevel::Info,
                        )),
                        self.reload_templates(),
                    ]),
                    Err(err) => Some(self.notify(format!("Download failed: {err}"), NotifyLevel::Error)),
                }
            }
            Message::TemplateMutated { op, result } => {
                self.finish_action();
                match result {
                    Ok(text) => batch([
                        Some(self.notify(text, NotifyLevel::Info)),
                        self.reload_templates(),
                    ]),
                    Err(err) => Some(self.notify(format!("Template {op} failed: {err}"), NotifyLevel::Error)),
                }
            }
            Message::ConfirmRequested { prompt, action } => {
                self.actions.advance(ActionStep::AwaitingConfirm);
                self.overlays.open_confirm(prompt, action);
                None
            }
            Message::PromptRequested {
                title,
                initial,
                options,
                action,
            } => {
                self.actions.advance(ActionStep::AwaitingInput);
                self.overlays.open_prompt(title, initial, options, action);
                None
            }
            Message::EditorRequested { path, purpose } => {
                self.actions.advance(ActionStep::Executing);
                Some(Command::Editor(EditorRequest { path, purpose }))
            }
            Message::EditorClosed {
                path,
                purpose,
                result,
            } => {
                let command = self.editor_closed(path, purpose, result);
                self.track_action_task(command)
            }
            Message::ActionAborted { error } => {
                self.finish_action();
                Some(self.notify(error, NotifyLevel::Error))
            }
            Message::TaskFailed { label, error } => {
                warn!(%label, %error, "task failed");
                if self.actions.owns_task(&label) {
                    self.finish_action();
                }
                let routed = self
                    .tabs
                    .iter_mut()
                    .find(|tab| tab.owns_task(&label))
                    .and_then(|tab| {
                        tab.handle(Message::TaskFailed {
                            label: label.clone(),
                            error: error.clone(),
                        })
                    });
                let notice = self.notify(format!("{label} failed: {error}"), NotifyLevel::Error);
                batch([routed, Some(notice)])
            }
        }
    }

    fn resize(&mut self, width: u16, height: u16) -> Option<Command> {
        self.size = (width, height);
        for tab in &mut self.tabs {
            tab.resize(width, height);
        }
        if self.initialized || width == 0 || height == 0 {
            return None;
        }
        self.initialized = true;
        info!(width, height, "first layout, initializing tabs");
        let commands = self
            .tabs
            .iter_mut()
            .map(|tab| tab.init(width, height))
            .collect::<Vec<_>>();
        batch(commands)
    }

    fn route(&mut self, kind: TabKind, message: Message) -> Option<Command> {
        let tab = self.tabs.iter_mut().find(|tab| tab.kind() == kind)?;
        tab.handle(message)
    }

    fn switch_to(&mut self, kind: TabKind) {
        if let Some(index) = self.tabs.iter().position(|tab| tab.kind() == kind) {
            self.active = index;
        }
    }

    fn notify(&mut self, text: impl Into<String>, level: NotifyLevel) -> Command {
        let text = text.into();
        match level {
            NotifyLevel::Error => warn!(%text, "notify"),
            _ => debug!(%text, "notify"),
        }
        let id = self.overlays.notification.show(text, level);
        Command::task("notification timer", move |_| async move {
            tokio::time::sleep(NOTIFY_TTL).await;
            Message::ClearNotification { id }
        })
    }

    /// Remember which task the pending action is waiting on, so only its own
    /// failure releases the slot.
    fn track_action_task(&mut self, command: Option<Command>) -> Option<Command> {
        if let Some(Command::Task { label, .. }) = &command {
            self.actions.track_task(label);
        }
        command
    }

    fn finish_action(&mut self) {
        self.actions.advance(ActionStep::Complete);
        if let Some(done) = self.actions.clear() {
            debug!(action = done.kind.label(), "action finished");
        }
    }

    fn refresh_work_items(&mut self) -> Option<Command> {
        self.tab_mut::<WorkItemsTab>()?.refresh()
    }

    fn reload_templates(&mut self) -> Option<Command> {
        Some(self.tab_mut::<TemplatesTab>()?.reload())
    }

    /// A global chord, skipping plain printable ones while the tab is typing.
    fn global_matches(&self, key: &KeyEvent, action: &str, filtering: bool) -> bool {
        self.keybinds
            .chords(Scope::Global, action)
            .iter()
            .any(|chord| chord.matches(key) && !(filtering && chord.is_plain_char()))
    }

    fn shortcut_for(&self, key: &KeyEvent) -> Option<String> {
        let kind = self.active_kind();
        let shortcuts = match kind {
            TabKind::WorkItems => WORK_ITEM_SHORTCUTS,
            TabKind::Templates => TEMPLATE_SHORTCUTS,
            _ => return None,
        };
        let action = self.keybinds.action_for(key, kind.scope()?)?;
        shortcuts.contains(&action).then(|| action.to_string())
    }

    fn handle_key(&mut self, key: KeyEvent) -> Option<Command> {
        if self.overlays.prompt.is_visible() {
            return match self.overlays.prompt.handle_key(key) {
                PromptOutcome::Submitted { value, action } => {
                    let command = self.run_prompt_action(action, value);
                    self.track_action_task(command)
                }
                PromptOutcome::Cancelled => {
                    self.actions.clear();
                    None
                }
                PromptOutcome::Editing => None,
            };
        }
        if self.overlays.confirm.is_visible() {
            return match self.overlays.confirm.handle_key(key) {
                ConfirmOutcome::Confirmed(action) => {
                    let command = self.run_confirm_action(action);
                    self.track_action_task(command)
                }
                ConfirmOutcome::Declined => {
                    self.actions.clear();
                    None
                }
                ConfirmOutcome::Pending => None,
            };
        }

        let filtering = self.active_tab().is_filtering();
        if self.global_matches(&key, "help", filtering) {
            self.overlays.toggle_help();
            return None;
        }
        if self.overlays.help.is_visible() {
            if key.code == KeyCode::Esc {
                self.overlays.help.hide();
            }
            return None;
        }
        if self.global_matches(&key, "quit", filtering) {
            info!("quit requested");
            self.should_quit = true;
            return None;
        }
        let count = self.tabs.len();
        if self.global_matches(&key, "next_tab", filtering) {
            self.active = (self.active + 1) % count;
            return None;
        }
        if self.global_matches(&key, "prev_tab", filtering) {
            self.active = (self.active + count - 1) % count;
            return None;
        }

        let shortcut = self.shortcut_for(&key);
        if !self.actions.can_start(self.active_tab()) {
            if let (Some(pending), Some(_), false) = (self.actions.current(), &shortcut, filtering) {
                let text = format!("Busy: {} is still running", pending.kind.label());
                return Some(self.notify(text, NotifyLevel::Warn));
            }
            return self.active_tab_mut().handle(Message::Key(key));
        }
        match shortcut {
            Some(action) => {
                let command = match self.active_kind() {
                    TabKind::WorkItems => self.work_item_shortcut(&action),
                    TabKind::Templates => self.template_shortcut(&action),
                    _ => None,
                };
                self.track_action_task(command)
            }
            None => self.active_tab_mut().handle(Message::Key(key)),
        }
    }

    fn start(&mut self, kind: ActionKind, context: ActionContext, step: ActionStep) -> bool {
        let origin = self.active_kind();
        if !self.actions.start(kind, context, origin) {
            return false;
        }
        self.actions.advance(step);
        debug!(action = kind.label(), "action started");
        true
    }

    fn work_item_shortcut(&mut self, action: &str) -> Option<Command> {
        let Some(item) = self.tab::<WorkItemsTab>().and_then(|tab| tab.selected_item()).cloned() else {
            return Some(self.notify("No work item selected", NotifyLevel::Warn));
        };
        let id = item.id;
        let context = ActionContext::WorkItem {
            id,
            title: item.title().to_string(),
        };
        match action {
            "yank" => Some(self.yank(&item)),
            "download" => {
                self.start(ActionKind::DownloadTemplate, context, ActionStep::Executing);
                Some(Command::task("download template", move |services| async move {
                    let result = workflow::download_template(&services, id).await;
                    Message::TemplateSaved { result }
                }))
            }
            "edit" => {
                self.start(ActionKind::EditWorkItem, context, ActionStep::Executing);
                Some(Command::task("prepare edit", move |services| async move {
                    match workflow::prepare_edit(&services, id).await {
                        Ok((path, original)) => Message::EditorRequested {
                            path,
                            purpose: EditorPurpose::WorkItem {
                                id,
                                original: Box::new(original),
                            },
                        },
                        Err(error) => Message::ActionAborted { error },
                    }
                }))
            }
            "delete" => {
                self.start(ActionKind::DeleteWorkItem, context, ActionStep::Executing);
                Some(Command::task("resolve children", move |services| async move {
                    match workflow::resolve_children(services.api.as_ref(), id).await {
                        Ok((item, children)) => Message::ConfirmRequested {
                            prompt: delete_prompt(&item, children.len()),
                            action: ConfirmAction::DeleteWorkItem { id, children },
                        },
                        Err(error) => Message::ActionAborted { error },
                    }
                }))
            }
            "change_state" => {
                self.start(ActionKind::ChangeState, context, ActionStep::Executing);
                Some(Command::task("load states", move |services| async move {
                    match workflow::allowed_states(services.api.as_ref(), id).await {
                        Ok((item, states)) => Message::PromptRequested {
                            title: format!("State of #{id} ({})", item.work_item_type()),
                            initial: item.state().to_string(),
                            options: states,
                            action: PromptAction::ChangeState { id },
                        },
                        Err(error) => Message::ActionAborted { error },
                    }
                }))
            }
            "assign" => {
                self.start(ActionKind::Assign, context, ActionStep::Idle);
                Some(Command::emit(Message::PromptRequested {
                    title: format!("Assign #{id} to (empty to unassign)"),
                    initial: item.assigned_to().unwrap_or_default(),
                    options: Vec::new(),
                    action: PromptAction::Assign { id },
                }))
            }
            "add_tags" => {
                self.start(ActionKind::AddTags, context, ActionStep::Idle);
                Some(Command::emit(Message::PromptRequested {
                    title: format!("Add tags to #{id} (comma separated)"),
                    initial: String::new(),
                    options: Vec::new(),
                    action: PromptAction::AddTags {
                        id,
                        existing: item.tags(),
                    },
                }))
            }
            _ => None,
        }
    }

    fn yank(&mut self, item: &WorkItem) -> Command {
        let text = format!("#{} {}", item.id, item.title());
        let copied = arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(text.clone()));
        match copied {
            Ok(()) => self.notify(format!("Copied {text}"), NotifyLevel::Info),
            Err(err) => self.notify(format!("Clipboard unavailable: {err}"), NotifyLevel::Error),
        }
    }

    fn template_shortcut(&mut self, action: &str) -> Option<Command> {
        let (selected, target_dir) = match self.tab::<TemplatesTab>() {
            Some(tab) => (tab.selected_node().cloned(), tab.target_dir()),
            None => return None,
        };
        match action {
            "new_template" | "new_folder" => {
                let folder = action == "new_folder";
                let (kind, title, prompt_action) = if folder {
                    (
                        ActionKind::NewFolder,
                        "New folder name",
                        PromptAction::NewFolder { dir: target_dir.clone() },
                    )
                } else {
                    (
                        ActionKind::NewTemplate,
                        "New template name",
                        PromptAction::NewTemplate { dir: target_dir.clone() },
                    )
                };
                self.start(kind, ActionContext::TemplatePath(target_dir), ActionStep::Idle);
                return Some(Command::emit(Message::PromptRequested {
                    title: title.to_string(),
                    initial: String::new(),
                    options: Vec::new(),
                    action: prompt_action,
                }));
            }
            _ => {}
        }

        let Some(node) = selected else {
            return Some(self.notify("No template selected", NotifyLevel::Warn));
        };
        let context = ActionContext::TemplatePath(node.path.clone());
        match action {
            "create_work_item" | "edit" if node.is_folder => {
                Some(self.notify("Select a template file, not a folder", NotifyLevel::Warn))
            }
            "create_work_item" => {
                self.start(ActionKind::CreateFromTemplate, context, ActionStep::Executing);
                let path = node.path;
                Some(Command::task("create from template", move |services| async move {
                    let result = workflow::create_from_template(&services, &path).await;
                    Message::WorkItemCreated { result }
                }))
            }
            "edit" => {
                self.start(ActionKind::EditTemplate, context, ActionStep::Executing);
                Some(Command::emit(Message::EditorRequested {
                    path: node.path,
                    purpose: EditorPurpose::Template,
                }))
            }
            "copy" => {
                self.start(ActionKind::CopyTemplate, context, ActionStep::Idle);
                Some(Command::emit(Message::PromptRequested {
                    title: format!("Copy '{}' as", node.name),
                    initial: copy_name(&node),
                    options: Vec::new(),
                    action: PromptAction::CopyTemplate { path: node.path },
                }))
            }
            "rename" => {
                self.start(ActionKind::RenameTemplate, context, ActionStep::Idle);
                Some(Command::emit(Message::PromptRequested {
                    title: format!("Rename '{}' to", node.name),
                    initial: node.name.clone(),
                    options: Vec::new(),
                    action: PromptAction::RenameTemplate { path: node.path },
                }))
            }
            "delete" => {
                self.start(ActionKind::DeleteTemplate, context, ActionStep::Idle);
                let what = if node.is_folder { "folder" } else { "template" };
                Some(Command::emit(Message::ConfirmRequested {
                    prompt: format!("Delete {what} '{}'? (y/n)", node.name),
                    action: ConfirmAction::DeleteTemplate { path: node.path },
                }))
            }
            _ => None,
        }
    }

    fn run_prompt_action(&mut self, action: PromptAction, value: String) -> Option<Command> {
        self.actions.advance(ActionStep::Executing);
        match action {
            PromptAction::RenameTemplate { path } => Some(template_task(TemplateOp::Rename, move |store| {
                store
                    .rename(&path, &value)
                    .map(|to| format!("Renamed to {}", display_name(&to)))
            })),
            PromptAction::CopyTemplate { path } => Some(template_task(TemplateOp::Copy, move |store| {
                store
                    .copy(&path, &value)
                    .map(|to| format!("Copied to {}", display_name(&to)))
            })),
            PromptAction::NewTemplate { dir } => Some(template_task(TemplateOp::Create, move |store| {
                store
                    .create_template(&dir, &value)
                    .map(|to| format!("Created {}", display_name(&to)))
            })),
            PromptAction::NewFolder { dir } => {
                Some(template_task(TemplateOp::CreateFolder, move |store| {
                    store
                        .create_folder(&dir, &value)
                        .map(|to| format!("Created folder {}", display_name(&to)))
                }))
            }
            PromptAction::ChangeState { id } => {
                if value.is_empty() {
                    self.actions.clear();
                    return None;
                }
                Some(update_task(id, vec![FieldUpdate::set(FIELD_STATE, value)]))
            }
            PromptAction::Assign { id } => {
                let change = if value.is_empty() {
                    FieldUpdate::remove(FIELD_ASSIGNED_TO)
                } else {
                    FieldUpdate::set(FIELD_ASSIGNED_TO, value)
                };
                Some(update_task(id, vec![change]))
            }
            PromptAction::AddTags { id, existing } => {
                let merged = merge_tags(&existing, &value);
                if merged == existing.join("; ") {
                    self.actions.clear();
                    return Some(self.notify(format!("No new tags for #{id}"), NotifyLevel::Info));
                }
                Some(update_task(id, vec![FieldUpdate::set(FIELD_TAGS, merged)]))
            }
        }
    }

    fn run_confirm_action(&mut self, action: ConfirmAction) -> Option<Command> {
        self.actions.advance(ActionStep::Executing);
        match action {
            ConfirmAction::DeleteWorkItem { id, children } => {
                Some(Command::task("delete work item", move |services| async move {
                    let result =
                        workflow::delete_with_children(services.api.as_ref(), id, &children).await;
                    Message::WorkItemDeleted { id, result }
                }))
            }
            ConfirmAction::DeleteTemplate { path } => Some(template_task(TemplateOp::Delete, move |store| {
                store
                    .delete(&path)
                    .map(|()| format!("Deleted {}", display_name(&path)))
            })),
        }
    }

    fn editor_closed(
        &mut self,
        path: PathBuf,
        purpose: EditorPurpose,
        result: Result<(), String>,
    ) -> Option<Command> {
        if let Err(err) = result {
            self.finish_action();
            if matches!(purpose, EditorPurpose::WorkItem { .. }) {
                if let Err(remove_err) = std::fs::remove_file(&path) {
                    debug!(path = %path.display(), error = %remove_err, "temp file not removed");
                }
            }
            return Some(self.notify(format!("Editor failed: {err}"), NotifyLevel::Error));
        }
        match purpose {
            EditorPurpose::WorkItem { id, original } => {
                Some(Command::task("apply edit", move |services| async move {
                    let result = workflow::apply_edit(&services, id, &path, &original).await;
                    Message::WorkItemUpdated { id, result }
                }))
            }
            EditorPurpose::Template => {
                self.finish_action();
                batch([
                    Some(self.notify(
                        format!("Edited {}", display_name(&path)),
                        NotifyLevel::Info,
                    )),
                    self.reload_templates(),
                ])
            }
        }
    }
}

fn update_task(id: u32, changes: Vec<FieldUpdate>) -> Command {
    Command::task("update work item", move |services| async move {
        let result = workflow::update_fields(services.api.as_ref(), id, &changes).await;
        Message::WorkItemUpdated { id, result }
    })
}

fn template_task<F>(op: TemplateOp, run: F) -> Command
where
    F: FnOnce(&crate::store::TemplateStore) -> crate::store::TemplateResult<String> + Send + 'static,
{
    Command::task(op.to_string(), move |services| async move {
        let result = run(&services.templates).map_err(|e| e.to_string());
        Message::TemplateMutated { op, result }
    })
}

fn delete_prompt(item: &WorkItem, children: usize) -> String {
    let tail = match children {
        0 => String::new(),
        1 => " and its 1 child".to_string(),
        n => format!(" and its {n} children"),
    };
    format!("Delete #{} '{}'{tail}? (y/n)", item.id, item.title())
}

fn copy_name(node: &TemplateNode) -> String {
    let path = Path::new(&node.name);
    match (node.is_folder, path.file_stem(), path.extension()) {
        (false, Some(stem), Some(ext)) => {
            format!("{}-copy.{}", stem.to_string_lossy(), ext.to_string_lossy())
        }
        _ => format!("{}-copy", node.name),
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn dashboard() -> (Dashboard, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let dashboard = Dashboard::new(
            Arc::new(KeybindTable::defaults()),
            Target::default(),
            dir.path(),
            LogHandle::disabled(),
        );
        (dashboard, dir)
    }

    fn press(dashboard: &mut Dashboard, code: KeyCode) -> Vec<Command> {
        dashboard.update(Message::Key(KeyEvent::new(code, KeyModifiers::NONE)))
    }

    #[test]
    fn test_tab_cycling_wraps() {
        let (mut dashboard, _dir) = dashboard();
        press(&mut dashboard, KeyCode::BackTab);
        assert_eq!(dashboard.active_kind(), TabKind::Agents);
        press(&mut dashboard, KeyCode::Tab);
        assert_eq!(dashboard.active_kind(), TabKind::Queries);
    }

    #[test]
    fn test_help_swallows_keys() {
        let (mut dashboard, _dir) = dashboard();
        press(&mut dashboard, KeyCode::Char('?'));
        assert!(dashboard.overlays().help.is_visible());
        press(&mut dashboard, KeyCode::Char('q'));
        assert!(!dashboard.should_quit());
        press(&mut dashboard, KeyCode::Esc);
        assert!(!dashboard.overlays().help.is_visible());
        press(&mut dashboard, KeyCode::Char('q'));
        assert!(dashboard.should_quit());
    }

    #[test]
    fn test_overlays_are_exclusive() {
        let (mut dashboard, _dir) = dashboard();
        dashboard.update(Message::PromptRequested {
            title: "Name".into(),
            initial: String::new(),
            options: Vec::new(),
            action: PromptAction::NewFolder { dir: PathBuf::from("/tmp") },
        });
        dashboard.update(Message::ConfirmRequested {
            prompt: "Delete?".into(),
            action: ConfirmAction::DeleteTemplate { path: PathBuf::from("/tmp/x.yaml") },
        });
        let overlays = dashboard.overlays();
        assert!(overlays.confirm.is_visible());
        assert!(!overlays.prompt.is_visible());

        // declining dismisses without running anything
        assert!(press(&mut dashboard, KeyCode::Char('n')).is_empty());
        assert!(!dashboard.overlays().is_modal_open());
    }

    #[test]
    fn test_stale_notification_clear_is_ignored() {
        let (mut dashboard, _dir) = dashboard();
        dashboard.update(Message::info("first"));
        dashboard.update(Message::warn("second"));
        dashboard.update(Message::ClearNotification { id: 1 });
        assert_eq!(dashboard.overlays().notification.text(), Some("second"));
        dashboard.update(Message::ClearNotification { id: 2 });
        assert!(!dashboard.overlays().notification.is_visible());
    }

    #[test]
    fn test_copy_name() {
        let node = TemplateNode {
            name: "bug.yaml".into(),
            path: PathBuf::from("/t/bug.yaml"),
            key: "bug.yaml".into(),
            is_folder: false,
            children: Vec::new(),
        };
        assert_eq!(copy_name(&node), "bug-copy.yaml");
        let folder = TemplateNode {
            name: "bugs".into(),
            is_folder: true,
            ..node
        };
        assert_eq!(copy_name(&folder), "bugs-copy");
    }
}
