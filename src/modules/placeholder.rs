use std::any::Any;

use ratatui::layout::Rect;
use ratatui::Frame;

use crate::core::{Command, Message, Tab, TabKind};
use crate::ui;

/// Inert tab for areas that are not built yet (Pipelines, Agents)
pub struct PlaceholderTab {
    kind: TabKind,
}

impl PlaceholderTab {
    pub fn new(kind: TabKind) -> Self {
        Self { kind }
    }
}

impl Tab for PlaceholderTab {
    fn kind(&self) -> TabKind {
        self.kind
    }

    fn init(&mut self, _width: u16, _height: u16) -> Option<Command> {
        None
    }

    fn handle(&mut self, _message: Message) -> Option<Command> {
        None
    }

    fn render(&self, f: &mut Frame, area: Rect) {
        ui::draw_placeholder(f, area, &format!("{}: coming soon", self.kind.title()));
    }

    fn resize(&mut self, _width: u16, _height: u16) {}

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
