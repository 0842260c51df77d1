//! Single-slot tracker for multi-step user actions

use super::tab::{Tab, TabKind};

/// Notification levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    DownloadTemplate,
    EditWorkItem,
    DeleteWorkItem,
    ChangeState,
    Assign,
    AddTags,
    CreateFromTemplate,
    CopyTemplate,
    RenameTemplate,
    NewTemplate,
    NewFolder,
    DeleteTemplate,
    EditTemplate,
}

impl ActionKind {
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::DownloadTemplate => "download template",
            ActionKind::EditWorkItem => "edit work item",
            ActionKind::DeleteWorkItem => "delete work item",
            ActionKind::ChangeState => "change state",
            ActionKind::Assign => "assign",
            ActionKind::AddTags => "add tags",
            ActionKind::CreateFromTemplate => "create from template",
            ActionKind::CopyTemplate => "copy template",
            ActionKind::RenameTemplate => "rename template",
            ActionKind::NewTemplate => "new template",
            ActionKind::NewFolder => "new folder",
            ActionKind::DeleteTemplate => "delete template",
            ActionKind::EditTemplate => "edit template",
        }
    }
}

/// What the action operates on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionContext {
    WorkItem { id: u32, title: String },
    TemplatePath(std::path::PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStep {
    Idle,
    AwaitingInput,
    AwaitingConfirm,
    Executing,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAction {
    pub kind: ActionKind,
    pub context: ActionContext,
    pub step: ActionStep,
    pub origin: TabKind,
    /// Label of the task currently running on the action's behalf
    pub task: Option<String>,
}

#[derive(Debug, Default)]
pub struct ActionController {
    pending: Option<PendingAction>,
}

impl ActionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// False while another action is in flight or the tab is typing a filter.
    pub fn can_start(&self, tab: &dyn Tab) -> bool {
        self.pending.is_none() && !tab.is_filtering()
    }

    /// Returns false (and keeps the current action) if the slot is taken.
    pub fn start(&mut self, kind: ActionKind, context: ActionContext, origin: TabKind) -> bool {
        if self.pending.is_some() {
            return false;
        }
        self.pending = Some(PendingAction {
            kind,
            context,
            step: ActionStep::Idle,
            origin,
            task: None,
        });
        true
    }

    pub fn current(&self) -> Option<&PendingAction> {
        self.pending.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    pub fn advance(&mut self, step: ActionStep) {
        if let Some(pending) = self.pending.as_mut() {
            pending.step = step;
        }
    }

    /// Record the task now running for the pending action.
    pub fn track_task(&mut self, label: &str) {
        if let Some(pending) = self.pending.as_mut() {
            pending.task = Some(label.to_string());
        }
    }

    /// True when `label` is the task the pending action is waiting on.
    pub fn owns_task(&self, label: &str) -> bool {
        self.pending
            .as_ref()
            .and_then(|pending| pending.task.as_deref())
            == Some(label)
    }

    pub fn clear(&mut self) -> Option<PendingAction> {
        self.pending.take()
    }
}
