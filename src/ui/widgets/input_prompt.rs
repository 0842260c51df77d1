use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

use crate::core::PromptAction;
use crate::ui::{centered_box, truncate_str};

#[derive(Debug, PartialEq)]
pub enum PromptOutcome {
    Submitted { value: String, action: PromptAction },
    Cancelled,
    Editing,
}

/// Single-line text prompt. With options, up/down (or tab) cycle through them.
#[derive(Debug, Default)]
pub struct InputPrompt {
    title: String,
    value: String,
    /// Cursor position in chars
    cursor: usize,
    options: Vec<String>,
    option_index: Option<usize>,
    action: Option<PromptAction>,
}

impl InputPrompt {
    pub fn show(
        &mut self,
        title: impl Into<String>,
        initial: impl Into<String>,
        options: Vec<String>,
        action: PromptAction,
    ) {
        self.title = title.into();
        self.value = initial.into();
        self.cursor = self.value.chars().count();
        self.option_index = options.iter().position(|o| *o == self.value);
        self.options = options;
        self.action = Some(action);
    }

    pub fn hide(&mut self) {
        *self = Self::default();
    }

    pub fn is_visible(&self) -> bool {
        self.action.is_some()
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> PromptOutcome {
        match key.code {
            KeyCode::Enter => {
                let value = self.value.trim().to_string();
                let outcome = match self.action.take() {
                    Some(action) => PromptOutcome::Submitted { value, action },
                    None => PromptOutcome::Cancelled,
                };
                self.hide();
                return outcome;
            }
            KeyCode::Esc => {
                self.hide();
                return PromptOutcome::Cancelled;
            }
            KeyCode::Up | KeyCode::BackTab => self.cycle(false),
            KeyCode::Down | KeyCode::Tab => self.cycle(true),
            KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Right => self.cursor = (self.cursor + 1).min(self.len()),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.len(),
            KeyCode::Backspace if self.cursor > 0 => {
                self.cursor -= 1;
                self.remove_at(self.cursor);
            }
            KeyCode::Delete if self.cursor < self.len() => self.remove_at(self.cursor),
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.value.clear();
                self.cursor = 0;
            }
            KeyCode::Char(ch)
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                let at = self.byte_index(self.cursor);
                self.value.insert(at, ch);
                self.cursor += 1;
            }
            _ => {}
        }
        PromptOutcome::Editing
    }

    fn len(&self) -> usize {
        self.value.chars().count()
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.value
            .char_indices()
            .nth(char_index)
            .map(|(i, _)| i)
            .unwrap_or(self.value.len())
    }

    fn remove_at(&mut self, char_index: usize) {
        let at = self.byte_index(char_index);
        if at < self.value.len() {
            self.value.remove(at);
        }
    }

    fn cycle(&mut self, forward: bool) {
        if self.options.is_empty() {
            return;
        }
        let len = self.options.len();
        let next = match (self.option_index, forward) {
            (None, true) => 0,
            (None, false) => len - 1,
            (Some(i), true) => (i + 1) % len,
            (Some(i), false) => (i + len - 1) % len,
        };
        self.option_index = Some(next);
        self.value = self.options[next].clone();
        self.cursor = self.len();
    }

    pub fn render(&self, f: &mut Frame, area: Rect) {
        let option_rows = self.options.len().min(8) as u16;
        let height = 3 + if option_rows > 0 { option_rows + 1 } else { 0 };
        let popup = centered_box(60, height, area);
        f.render_widget(Clear, popup);

        let inner_width = popup.width.saturating_sub(2) as usize;
        let (before, after) = self.value.split_at(self.byte_index(self.cursor));
        let mut lines = vec![Line::from(vec![
            Span::styled("> ", Style::default().fg(Color::LightCyan)),
            Span::raw(before.to_string()),
            Span::styled("▏", Style::default().fg(Color::LightCyan)),
            Span::raw(after.to_string()),
        ])];
        if option_rows > 0 {
            lines.push(Line::from(Span::styled(
                "up/down to choose, enter to apply",
                Style::default().fg(Color::DarkGray),
            )));
            let start = self
                .option_index
                .map(|i| i.saturating_sub(option_rows as usize - 1))
                .unwrap_or(0);
            for (index, option) in self
                .options
                .iter()
                .enumerate()
                .skip(start)
                .take(option_rows as usize)
            {
                let style = if Some(index) == self.option_index {
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                lines.push(Line::from(Span::styled(
                    format!("  {}", truncate_str(option, inner_width.saturating_sub(2))),
                    style,
                )));
            }
        }

        let paragraph = Paragraph::new(lines).block(
            Block::default()
                .title(self.title.clone())
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::LightCyan)),
        );
        f.render_widget(paragraph, popup);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_str(prompt: &mut InputPrompt, text: &str) {
        for ch in text.chars() {
            prompt.handle_key(key(KeyCode::Char(ch)));
        }
    }

    #[test]
    fn test_editing_and_submit() {
        let mut prompt = InputPrompt::default();
        prompt.show("Rename", "draft", Vec::new(), PromptAction::Assign { id: 3 });
        prompt.handle_key(key(KeyCode::Backspace));
        type_str(&mut prompt, "y");
        prompt.handle_key(key(KeyCode::Home));
        type_str(&mut prompt, "é");
        assert_eq!(prompt.value(), "édrafy");

        let outcome = prompt.handle_key(key(KeyCode::Enter));
        assert_eq!(
            outcome,
            PromptOutcome::Submitted {
                value: "édrafy".into(),
                action: PromptAction::Assign { id: 3 }
            }
        );
        assert!(!prompt.is_visible());
    }

    #[test]
    fn test_option_cycling() {
        let mut prompt = InputPrompt::default();
        let states = vec!["New".to_string(), "Active".to_string(), "Closed".to_string()];
        prompt.show("State", "Active", states, PromptAction::ChangeState { id: 1 });
        prompt.handle_key(key(KeyCode::Down));
        assert_eq!(prompt.value(), "Closed");
        prompt.handle_key(key(KeyCode::Down));
        assert_eq!(prompt.value(), "New");
        prompt.handle_key(key(KeyCode::Up));
        assert_eq!(prompt.value(), "Closed");
    }

    #[test]
    fn test_escape_cancels() {
        let mut prompt = InputPrompt::default();
        prompt.show("Tags", "", Vec::new(), PromptAction::Assign { id: 1 });
        assert_eq!(prompt.handle_key(key(KeyCode::Esc)), PromptOutcome::Cancelled);
        assert!(!prompt.is_visible());
    }
}
