//! Messages flowing through the dashboard loop
//!
//! Every asynchronous command finishes with exactly one of these. Error payloads are
//! plain strings so messages stay cheap to clone and log.

use std::fmt;
use std::path::PathBuf;

use crossterm::event::KeyEvent;

use super::action::NotifyLevel;
use super::tab::TabKind;
use crate::domain::{QueryNode, Template, WorkItem};
use crate::store::TemplateNode;

/// Work item plus the pre-rendered text of its related items
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItemDetail {
    pub item: WorkItem,
    pub relations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedSummary {
    pub id: u32,
    pub title: String,
    pub children: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    Updated { title: String },
    /// The edit produced no field changes; nothing was sent.
    Unchanged,
}

/// Deferred work attached to a confirmation dialog
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmAction {
    DeleteWorkItem { id: u32, children: Vec<u32> },
    DeleteTemplate { path: PathBuf },
}

/// Deferred work attached to an input prompt; receives the committed value
#[derive(Debug, Clone, PartialEq)]
pub enum PromptAction {
    RenameTemplate { path: PathBuf },
    CopyTemplate { path: PathBuf },
    NewTemplate { dir: PathBuf },
    NewFolder { dir: PathBuf },
    ChangeState { id: u32 },
    Assign { id: u32 },
    AddTags { id: u32, existing: Vec<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditorPurpose {
    /// Temporary YAML snapshot of a work item; `original` is what was written out.
    WorkItem { id: u32, original: Box<Template> },
    Template,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateOp {
    Copy,
    Rename,
    Create,
    CreateFolder,
    Delete,
}

impl fmt::Display for TemplateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TemplateOp::Copy => "copy",
            TemplateOp::Rename => "rename",
            TemplateOp::Create => "create template",
            TemplateOp::CreateFolder => "create folder",
            TemplateOp::Delete => "delete",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Resize {
        width: u16,
        height: u16,
    },
    Key(KeyEvent),
    Notify {
        text: String,
        level: NotifyLevel,
    },
    ClearNotification {
        id: u64,
    },
    SwitchTab(TabKind),

    // Queries
    QueriesLoaded {
        generation: u64,
        result: Result<Vec<QueryNode>, String>,
    },
    RunQuery {
        id: String,
        name: String,
    },

    // Work items
    WorkItemsLoaded {
        generation: u64,
        result: Result<Vec<WorkItem>, String>,
    },
    WorkItemDetailLoaded {
        id: u32,
        /// List generation the request was issued under
        generation: u64,
        result: Result<WorkItemDetail, String>,
    },
    WorkItemCreated {
        result: Result<CreatedSummary, String>,
    },
    WorkItemUpdated {
        id: u32,
        result: Result<UpdateOutcome, String>,
    },
    WorkItemDeleted {
        id: u32,
        /// Number of work items removed, children included
        result: Result<usize, String>,
    },

    // Templates
    TemplatesLoaded {
        generation: u64,
        result: Result<Vec<TemplateNode>, String>,
    },
    TemplatePreviewLoaded {
        path: PathBuf,
        result: Result<String, String>,
    },
    TemplateSaved {
        result: Result<PathBuf, String>,
    },
    TemplateMutated {
        op: TemplateOp,
        result: Result<String, String>,
    },

    // Overlays and editor
    ConfirmRequested {
        prompt: String,
        action: ConfirmAction,
    },
    PromptRequested {
        title: String,
        initial: String,
        options: Vec<String>,
        action: PromptAction,
    },
    EditorRequested {
        path: PathBuf,
        purpose: EditorPurpose,
    },
    EditorClosed {
        path: PathBuf,
        purpose: EditorPurpose,
        result: Result<(), String>,
    },

    /// A multi-step action failed before reaching its mutation
    ActionAborted {
        error: String,
    },
    /// A command panicked or its worker went away
    TaskFailed {
        label: String,
        error: String,
    },
}

impl Message {
    pub fn info(text: impl Into<String>) -> Self {
        Message::Notify {
            text: text.into(),
            level: NotifyLevel::Info,
        }
    }

    pub fn warn(text: impl Into<String>) -> Self {
        Message::Notify {
            text: text.into(),
            level: NotifyLevel::Warn,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Message::Notify {
            text: text.into(),
            level: NotifyLevel::Error,
        }
    }

    /// Short name used in log lines
    pub fn name(&self) -> &'static str {
        match self {
            Message::Resize { .. } => "resize",
            Message::Key(_) => "key",
            Message::Notify { .. } => "notify",
            Message::ClearNotification { .. } => "clear_notification",
            Message::SwitchTab(_) => "switch_tab",
            Message::QueriesLoaded { .. } => "queries_loaded",
            Message::RunQuery { .. } => "run_query",
            Message::WorkItemsLoaded { .. } => "work_items_loaded",
            Message::WorkItemDetailLoaded { .. } => "work_item_detail_loaded",
            Message::WorkItemCreated { .. } => "work_item_created",
            Message::WorkItemUpdated { .. } => "work_item_updated",
            Message::WorkItemDeleted { .. } => "work_item_deleted",
            Message::TemplatesLoaded { .. } => "templates_loaded",
            Message::TemplatePreviewLoaded { .. } => "template_preview_loaded",
            Message::TemplateSaved { .. } => "template_saved",
            Message::TemplateMutated { .. } => "template_mutated",
            Message::ConfirmRequested { .. } => "confirm_requested",
            Message::PromptRequested { .. } => "prompt_requested",
            Message::EditorRequested { .. } => "editor_requested",
            Message::EditorClosed { .. } => "editor_closed",
            Message::ActionAborted { .. } => "action_aborted",
            Message::TaskFailed { .. } => "task_failed",
        }
    }
}
