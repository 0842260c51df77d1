use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

use crate::ui::centered_rect;

/// Titled group of `(keys, description)` rows
#[derive(Debug, Clone, PartialEq)]
pub struct HelpSection {
    pub title: String,
    pub rows: Vec<(String, String)>,
}

#[derive(Debug, Default)]
pub struct HelpOverlay {
    visible: bool,
}

impl HelpOverlay {
    pub fn toggle(&mut self) -> bool {
        self.visible = !self.visible;
        self.visible
    }

    pub fn show(&mut self) {
        self.visible = true;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn render(&self, f: &mut Frame, area: Rect, sections: &[HelpSection]) {
        let popup_area = centered_rect(70, 80, area);
        f.render_widget(Clear, popup_area);

        let key_width = sections
            .iter()
            .flat_map(|s| s.rows.iter())
            .map(|(keys, _)| keys.chars().count())
            .max()
            .unwrap_or(0)
            .min(20);

        let mut lines = Vec::new();
        for section in sections {
            if !lines.is_empty() {
                lines.push(Line::from(""));
            }
            lines.push(Line::from(Span::styled(
                section.title.clone(),
                Style::default()
                    .fg(Color::LightCyan)
                    .add_modifier(Modifier::BOLD),
            )));
            for (keys, description) in &section.rows {
                lines.push(Line::from(vec![
                    Span::styled(
                        format!("  {keys:<key_width$}  "),
                        Style::default().fg(Color::Cyan),
                    ),
                    Span::raw(description.clone()),
                ]));
            }
        }

        let paragraph = Paragraph::new(Text::from(lines))
            .block(Block::default().title("Help").borders(Borders::ALL))
            .alignment(Alignment::Left);
        f.render_widget(paragraph, popup_area);
    }
}
