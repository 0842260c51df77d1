use crossterm::event::{KeyCode, KeyEvent};
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

use crate::core::ConfirmAction;
use crate::ui::centered_box;

#[derive(Debug, PartialEq)]
pub enum ConfirmOutcome {
    Confirmed(ConfirmAction),
    Declined,
    /// Key ignored; dialog stays open
    Pending,
}

/// Yes/no dialog carrying the action to run on `y`
#[derive(Debug, Default)]
pub struct ConfirmDialog {
    prompt: String,
    action: Option<ConfirmAction>,
}

impl ConfirmDialog {
    pub fn show(&mut self, prompt: impl Into<String>, action: ConfirmAction) {
        self.prompt = prompt.into();
        self.action = Some(action);
    }

    pub fn hide(&mut self) {
        self.action = None;
        self.prompt.clear();
    }

    pub fn is_visible(&self) -> bool {
        self.action.is_some()
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> ConfirmOutcome {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                let outcome = self
                    .action
                    .take()
                    .map(ConfirmOutcome::Confirmed)
                    .unwrap_or(ConfirmOutcome::Declined);
                self.hide();
                outcome
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.hide();
                ConfirmOutcome::Declined
            }
            _ => ConfirmOutcome::Pending,
        }
    }

    pub fn render(&self, f: &mut Frame, area: Rect) {
        let width = (self.prompt.chars().count() as u16 + 6).clamp(30, 70);
        let popup = centered_box(width, 6, area);
        f.render_widget(Clear, popup);
        let lines = vec![
            Line::from(self.prompt.clone()),
            Line::from(""),
            Line::from(vec![
                Span::styled("y", Style::default().fg(Color::LightGreen)),
                Span::raw(" confirm   "),
                Span::styled("n/esc", Style::default().fg(Color::LightRed)),
                Span::raw(" cancel"),
            ]),
        ];
        let paragraph = Paragraph::new(lines)
            .block(
                Block::default()
                    .title("Confirm")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::LightRed)),
            )
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, popup);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;
    use std::path::PathBuf;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_confirm_and_decline() {
        let mut dialog = ConfirmDialog::default();
        let action = ConfirmAction::DeleteTemplate {
            path: PathBuf::from("a.yaml"),
        };
        dialog.show("Delete a.yaml?", action.clone());
        assert_eq!(dialog.handle_key(key(KeyCode::Char('z'))), ConfirmOutcome::Pending);
        assert!(dialog.is_visible());
        assert_eq!(
            dialog.handle_key(key(KeyCode::Char('Y'))),
            ConfirmOutcome::Confirmed(action.clone())
        );
        assert!(!dialog.is_visible());

        dialog.show("Delete a.yaml?", action);
        assert_eq!(dialog.handle_key(key(KeyCode::Esc)), ConfirmOutcome::Declined);
        assert!(!dialog.is_visible());
    }
}
