//! Tab trait implemented by every dashboard view

use std::any::Any;

use ratatui::layout::Rect;
use ratatui::Frame;

use super::command::Command;
use super::message::Message;
use crate::config::keybinds::Scope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TabKind {
    Queries,
    WorkItems,
    Templates,
    Pipelines,
    Agents,
}

impl TabKind {
    pub const ALL: [TabKind; 5] = [
        TabKind::Queries,
        TabKind::WorkItems,
        TabKind::Templates,
        TabKind::Pipelines,
        TabKind::Agents,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            TabKind::Queries => "Queries",
            TabKind::WorkItems => "Work Items",
            TabKind::Templates => "Templates",
            TabKind::Pipelines => "Pipelines",
            TabKind::Agents => "Agents",
        }
    }

    /// Keybind scope for tab-local actions; placeholders have none.
    pub fn scope(&self) -> Option<Scope> {
        match self {
            TabKind::Queries => Some(Scope::Queries),
            TabKind::WorkItems => Some(Scope::WorkItems),
            TabKind::Templates => Some(Scope::Templates),
            TabKind::Pipelines | TabKind::Agents => None,
        }
    }
}

pub trait Tab: Any {
    fn name(&self) -> &'static str {
        self.kind().title()
    }

    fn kind(&self) -> TabKind;

    /// Called once, on the first resize with nonzero dimensions.
    fn init(&mut self, width: u16, height: u16) -> Option<Command>;

    /// Mutates the tab in place; the returned command is run by the loop.
    fn handle(&mut self, message: Message) -> Option<Command>;

    fn render(&self, frame: &mut Frame, area: Rect);

    fn resize(&mut self, width: u16, height: u16);

    /// `(action, description)` pairs; chords come from the keybind table.
    fn help(&self) -> &'static [(&'static str, &'static str)] {
        &[]
    }

    fn is_filtering(&self) -> bool {
        false
    }

    fn is_loading(&self) -> bool {
        false
    }

    /// Whether a task with this label was issued by this tab.
    fn owns_task(&self, _label: &str) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
