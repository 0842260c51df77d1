//! Modal overlays drawn above the active tab

mod confirm;
mod help;
mod input_prompt;
mod notification;

pub use confirm::{ConfirmDialog, ConfirmOutcome};
pub use help::{HelpOverlay, HelpSection};
pub use input_prompt::{InputPrompt, PromptOutcome};
pub use notification::Notification;
