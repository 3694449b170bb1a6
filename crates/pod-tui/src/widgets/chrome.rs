//! Bordered panes and the fixed layout every screen is drawn into.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Modifier,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::theme::Palette;
use crate::widgets::status_bar::draw_keys_bar;

/// A bordered pane with an optional right-aligned badge in the top edge
/// (e.g. "11-25 of 40").
pub fn pane_chrome<'a>(title: &'a str, palette: &Palette, badge: Option<&str>) -> Block<'a> {
    let mut block = Block::default()
        .borders(Borders::ALL)
        .border_style(palette.border());
    if !title.is_empty() {
        block = block.title(Line::from(Span::styled(
            format!(" {} ", title),
            palette.text().add_modifier(Modifier::BOLD),
        )));
    }

    if let Some(text) = badge {
        block.title_top(
            Line::from(Span::styled(format!(" {} ", text), palette.secondary())).right_aligned(),
        )
    } else {
        block
    }
}

/// Rows of one full-screen redraw, top to bottom.
#[derive(Debug, Clone, Copy)]
pub struct ScreenAreas {
    pub header: Rect,
    pub title: Rect,
    pub help: Rect,
    pub body: Rect,
    pub footer: Rect,
}

pub fn screen_layout(area: Rect, with_footer: bool) -> ScreenAreas {
    let footer_h = if with_footer { 1u16 } else { 0 };
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(footer_h),
        ])
        .split(area);

    ScreenAreas {
        header: rows[0],
        title: rows[1],
        help: rows[2],
        body: rows[3],
        footer: rows[4],
    }
}

/// Header, title and help rows. The caller fills `body` and `footer`.
pub fn draw_screen(
    frame: &mut Frame,
    palette: &Palette,
    title: &str,
    help: &str,
    with_footer: bool,
) -> ScreenAreas {
    let areas = screen_layout(frame.area(), with_footer);
    draw_keys_bar(frame, areas.header, palette);
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(format!(" {}", title), palette.accent()))),
        areas.title,
    );
    if !help.is_empty() {
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(format!(" {}", help), palette.muted()))),
            areas.help,
        );
    }
    areas
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_without_footer_gives_body_the_rest() {
        let areas = screen_layout(Rect::new(0, 0, 80, 24), false);
        assert_eq!(areas.header.y, 0);
        assert_eq!(areas.title.y, 1);
        assert_eq!(areas.help.y, 2);
        assert_eq!(areas.body.y, 3);
        assert_eq!(areas.body.height, 21);
        assert_eq!(areas.footer.height, 0);
    }

    #[test]
    fn test_layout_with_footer_reserves_last_row() {
        let areas = screen_layout(Rect::new(0, 0, 80, 24), true);
        assert_eq!(areas.body.height, 20);
        assert_eq!(areas.footer.y, 23);
        assert_eq!(areas.footer.height, 1);
    }
}
