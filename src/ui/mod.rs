use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Tabs as RataTabs, Wrap};
use ratatui::Frame;

pub mod layout;
pub mod widgets;

use crate::app::Dashboard;
use crate::core::{NotifyLevel, TabKind};

pub fn draw(f: &mut Frame, dashboard: &Dashboard) {
    let areas = layout::areas(f.size());

    draw_header(f, areas.header, dashboard);
    draw_tab_bar(f, areas.tabs, dashboard.active_kind());
    if areas.body.height > 0 && areas.body.width > 0 {
        dashboard.active_tab().render(f, areas.body);
    }
    draw_footer(f, areas.footer, dashboard);

    let overlays = dashboard.overlays();
    if overlays.help.is_visible() {
        overlays
            .help
            .render(f, areas.size, &dashboard.help_sections());
    }
    if overlays.confirm.is_visible() {
        overlays.confirm.render(f, areas.size);
    }
    if overlays.prompt.is_visible() {
        overlays.prompt.render(f, areas.size);
    }
}

fn draw_header(f: &mut Frame, area: Rect, dashboard: &Dashboard) {
    if area.height == 0 {
        return;
    }
    let target = dashboard.target();
    let mut spans = vec![
        Span::styled(
            "itemdeck",
            Style::default()
                .fg(Color::LightCyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled("Org ", Style::default().fg(Color::DarkGray)),
        Span::raw(format!("{}  ", or_dash(&target.organization))),
        Span::styled("Project ", Style::default().fg(Color::DarkGray)),
        Span::raw(or_dash(&target.project).to_string()),
    ];
    if dashboard.is_loading() {
        spans.push(Span::styled(
            "  loading…",
            Style::default().fg(Color::Yellow),
        ));
    }
    if let Some(pending) = dashboard.pending_action() {
        spans.push(Span::styled(
            format!("  [{}]", pending.kind.label()),
            Style::default().fg(Color::Magenta),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Draw the tab bar
pub fn draw_tab_bar(f: &mut Frame, area: Rect, active: TabKind) {
    if area.height == 0 {
        return;
    }
    let titles: Vec<Line> = TabKind::ALL
        .iter()
        .enumerate()
        .map(|(index, kind)| {
            Line::from(vec![
                Span::styled(
                    format!("{}:", index + 1),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::raw(kind.title()),
            ])
        })
        .collect();
    let selected = TabKind::ALL.iter().position(|k| *k == active).unwrap_or(0);

    let tabs = RataTabs::new(titles)
        .select(selected)
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .divider(" │ ");
    f.render_widget(tabs, area);
}

fn draw_footer(f: &mut Frame, area: Rect, dashboard: &Dashboard) {
    if area.height == 0 {
        return;
    }
    let notification = &dashboard.overlays().notification;
    if notification.is_visible() {
        notification.render(f, area);
        return;
    }
    let hints: Vec<Span> = dashboard
        .footer_hints()
        .into_iter()
        .flat_map(|(keys, label)| {
            [
                Span::styled(keys, Style::default().fg(Color::Cyan)),
                Span::styled(format!(" {label}  "), Style::default().fg(Color::DarkGray)),
            ]
        })
        .collect();
    f.render_widget(Paragraph::new(Line::from(hints)), area);
}

/// Full-body error view for failed loads
pub fn draw_error(f: &mut Frame, area: Rect, title: &str, error: &str, retry_keys: &str) {
    let lines = vec![
        Line::from(Span::styled(
            format!("Failed to load {title}"),
            Style::default()
                .fg(Color::LightRed)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(error.to_string()),
        Line::from(""),
        Line::from(Span::styled(
            format!("Press {retry_keys} to retry"),
            Style::default().fg(Color::DarkGray),
        )),
    ];
    f.render_widget(
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true }),
        area,
    );
}

/// Dim single-line message centered in `area`
pub fn draw_placeholder(f: &mut Frame, area: Rect, text: &str) {
    if area.height == 0 {
        return;
    }
    let top = area.height / 2;
    let line_area = Rect::new(area.x, area.y + top, area.width, 1);
    f.render_widget(
        Paragraph::new(Span::styled(
            text.to_string(),
            Style::default().fg(Color::DarkGray),
        ))
        .alignment(Alignment::Center),
        line_area,
    );
}

pub fn level_color(level: NotifyLevel) -> Color {
    match level {
        NotifyLevel::Info => Color::LightGreen,
        NotifyLevel::Warn => Color::LightYellow,
        NotifyLevel::Error => Color::LightRed,
    }
}

pub fn selected_style() -> Style {
    Style::default()
        .bg(Color::DarkGray)
        .fg(Color::White)
        .add_modifier(Modifier::BOLD)
}

pub fn truncate_str(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    if max == 0 {
        return String::new();
    }
    value.chars().take(max - 1).collect::<String>() + "…"
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "--"
    } else {
        value
    }
}

pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Fixed-height popup, clamped to `r`
pub fn centered_box(width: u16, height: u16, r: Rect) -> Rect {
    let width = width.min(r.width);
    let height = height.min(r.height);
    Rect::new(
        r.x + (r.width - width) / 2,
        r.y + (r.height - height) / 2,
        width,
        height,
    )
}
