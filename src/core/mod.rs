pub mod action;
pub mod command;
pub mod message;
pub mod tab;
pub mod tree;

pub use action::{ActionContext, ActionController, ActionKind, ActionStep, NotifyLevel, PendingAction};
pub use command::{batch, Command, EditorRequest, Services, TaskFn};
pub use message::{
    ConfirmAction, CreatedSummary, EditorPurpose, Message, PromptAction, TemplateOp,
    UpdateOutcome, WorkItemDetail,
};
pub use tab::{Tab, TabKind};
pub use tree::{flatten, resolve, toggle, FlatRow, TreeItem};
