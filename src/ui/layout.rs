use ratatui::layout::{Constraint, Direction, Layout, Rect};

pub const HEADER_HEIGHT: u16 = 1;
pub const TAB_BAR_HEIGHT: u16 = 1;
pub const FOOTER_HEIGHT: u16 = 1;
/// Rows used by header, tab bar and footer
pub const CHROME: u16 = HEADER_HEIGHT + TAB_BAR_HEIGHT + FOOTER_HEIGHT;

#[derive(Debug, Clone, Copy)]
pub struct UiAreas {
    pub size: Rect,
    pub header: Rect,
    pub tabs: Rect,
    pub body: Rect,
    pub footer: Rect,
}

pub fn areas(size: Rect) -> UiAreas {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(HEADER_HEIGHT),
            Constraint::Length(TAB_BAR_HEIGHT),
            Constraint::Min(0),
            Constraint::Length(FOOTER_HEIGHT),
        ])
        .split(size);

    UiAreas {
        size,
        header: vertical[0],
        tabs: vertical[1],
        body: vertical[2],
        footer: vertical[3],
    }
}

/// Height left for a tab body once chrome is drawn.
pub fn body_height(total: u16) -> u16 {
    total.saturating_sub(CHROME)
}

/// Split a body into list and detail heights. Detail takes up to 60% when open,
/// the list keeps at least three rows while space allows.
pub fn split_detail(height: u16, detail_open: bool) -> (u16, u16) {
    if !detail_open {
        return (height, 0);
    }
    let detail = (height.saturating_mul(3) / 5).min(height.saturating_sub(3));
    (height - detail, detail)
}

/// Split a width into a tree column and a preview column.
pub fn split_preview(width: u16) -> (u16, u16) {
    let tree = (width / 2).max(width.min(24));
    (tree, width.saturating_sub(tree))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heights_never_exceed_available() {
        for h in 0..40u16 {
            assert!(body_height(h) <= h);
            for open in [false, true] {
                let (list, detail) = split_detail(h, open);
                assert_eq!(list + detail, h);
            }
        }
        assert_eq!(split_detail(2, true), (2, 0));
        assert_eq!(split_detail(20, true), (8, 12));
    }

    #[test]
    fn test_areas_on_tiny_terminal() {
        let ui = areas(Rect::new(0, 0, 10, 2));
        let used = ui.header.height + ui.tabs.height + ui.body.height + ui.footer.height;
        assert!(used <= 2);
    }

    #[test]
    fn test_split_preview() {
        assert_eq!(split_preview(100), (50, 50));
        assert_eq!(split_preview(30), (24, 6));
        assert_eq!(split_preview(10), (10, 0));
    }
}
