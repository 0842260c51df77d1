use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::core::NotifyLevel;
use crate::ui::{level_color, truncate_str};

/// Transient one-line message shown in the footer
#[derive(Debug, Default)]
pub struct Notification {
    current: Option<(u64, String, NotifyLevel)>,
    next_id: u64,
}

impl Notification {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever is shown; returns the id that must be passed to [`clear`](Self::clear).
    pub fn show(&mut self, text: impl Into<String>, level: NotifyLevel) -> u64 {
        self.next_id += 1;
        self.current = Some((self.next_id, text.into(), level));
        self.next_id
    }

    /// Hide only if `id` is still the one shown.
    pub fn clear(&mut self, id: u64) -> bool {
        if self.current.as_ref().is_some_and(|(shown, _, _)| *shown == id) {
            self.current = None;
            true
        } else {
            false
        }
    }

    pub fn hide(&mut self) {
        self.current = None;
    }

    pub fn is_visible(&self) -> bool {
        self.current.is_some()
    }

    pub fn text(&self) -> Option<&str> {
        self.current.as_ref().map(|(_, text, _)| text.as_str())
    }

    pub fn level(&self) -> Option<NotifyLevel> {
        self.current.as_ref().map(|(_, _, level)| *level)
    }

    pub fn render(&self, f: &mut Frame, area: Rect) {
        let Some((_, text, level)) = &self.current else {
            return;
        };
        let label = match level {
            NotifyLevel::Info => "info: ",
            NotifyLevel::Warn => "warn: ",
            NotifyLevel::Error => "error: ",
        };
        let width = (area.width as usize).saturating_sub(label.len());
        let line = Line::from(vec![
            Span::styled(label, Style::default().fg(level_color(*level))),
            Span::styled(truncate_str(text, width), Style::default().fg(level_color(*level))),
        ]);
        f.render_widget(Paragraph::new(line), area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_clear_keeps_newer_message() {
        let mut notification = Notification::new();
        let first = notification.show("saved", NotifyLevel::Info);
        let second = notification.show("failed", NotifyLevel::Error);
        assert!(!notification.clear(first));
        assert_eq!(notification.text(), Some("failed"));
        assert!(notification.clear(second));
        assert!(!notification.is_visible());
    }
}
