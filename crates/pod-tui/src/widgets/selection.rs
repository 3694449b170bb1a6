//! Paginated list state and rendering for the selection screen.

use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::theme::Palette;
use crate::widgets::chrome::pane_chrome;

/// Cursor and viewport of one selection screen.
///
/// `viewport_top <= selected < viewport_top + page_size` holds after every move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionState {
    selected: usize,
    viewport_top: usize,
    len: usize,
    page_size: usize,
}

impl SelectionState {
    pub fn new(len: usize, page_size: usize) -> Self {
        Self {
            selected: 0,
            viewport_top: 0,
            len,
            page_size: page_size.max(1),
        }
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn viewport_top(&self) -> usize {
        self.viewport_top
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn move_by(&mut self, delta: isize) {
        if self.len == 0 {
            return;
        }
        let last = self.len - 1;
        self.selected = if delta < 0 {
            self.selected.saturating_sub(delta.unsigned_abs())
        } else {
            self.selected.saturating_add(delta as usize).min(last)
        };
        self.scroll_to_selection();
    }

    pub fn move_to(&mut self, index: usize) {
        if self.len == 0 {
            return;
        }
        self.selected = index.min(self.len - 1);
        self.scroll_to_selection();
    }

    fn scroll_to_selection(&mut self) {
        if self.selected < self.viewport_top {
            self.viewport_top = self.selected;
        } else if self.selected >= self.viewport_top + self.page_size {
            self.viewport_top = self.selected + 1 - self.page_size;
        }
    }

    pub fn visible_range(&self) -> std::ops::Range<usize> {
        self.viewport_top..(self.viewport_top + self.page_size).min(self.len)
    }

    /// "11-15 of 40" style position label.
    pub fn position_label(&self) -> String {
        let range = self.visible_range();
        format!("{}-{} of {}", range.start + 1, range.end, self.len)
    }
}

/// Draw the visible page of `items` inside a bordered pane.
pub fn draw_list<T>(
    frame: &mut Frame,
    area: Rect,
    palette: &Palette,
    items: &[T],
    render: &dyn Fn(&T, &Palette) -> Line<'static>,
    state: &SelectionState,
) {
    let badge = (items.len() > state.page_size()).then(|| state.position_label());
    let block = pane_chrome("", palette, badge.as_deref());

    let range = state.visible_range();
    let lines: Vec<Line> = items[range.clone()]
        .iter()
        .zip(range)
        .map(|(item, idx)| {
            let mut line = render(item, palette);
            if idx == state.selected() {
                line.spans.insert(0, Span::styled("▶ ", palette.selected()));
                line = line.style(palette.selected());
            } else {
                line.spans.insert(0, Span::raw("  "));
            }
            line
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_invariant(s: &SelectionState) {
        assert!(s.viewport_top() <= s.selected());
        assert!(s.selected() < s.viewport_top() + s.page_size());
    }

    #[test]
    fn test_forty_items_down_twenty() {
        let mut s = SelectionState::new(40, 15);
        for _ in 0..20 {
            s.move_by(1);
            assert_invariant(&s);
        }
        assert_eq!(s.selected(), 20);
        assert_eq!(s.viewport_top(), 6);
    }

    #[test]
    fn test_clamps_at_both_ends() {
        let mut s = SelectionState::new(5, 3);
        s.move_by(-1);
        assert_eq!(s.selected(), 0);
        s.move_by(15);
        assert_eq!(s.selected(), 4);
        assert_eq!(s.viewport_top(), 2);
        s.move_by(-3);
        assert_eq!(s.selected(), 1);
        assert_eq!(s.viewport_top(), 1);
        assert_invariant(&s);
    }

    #[test]
    fn test_mixed_moves_keep_invariant() {
        let mut s = SelectionState::new(23, 7);
        for delta in [3, 9, -2, 7, -14, 20, -1, -7, -7, 4, isize::MIN, isize::MAX] {
            s.move_by(delta);
            assert_invariant(&s);
            assert!(s.selected() < 23);
        }
    }

    #[test]
    fn test_visible_range_and_label() {
        let mut s = SelectionState::new(40, 15);
        s.move_to(39);
        assert_eq!(s.visible_range(), 25..40);
        assert_eq!(s.position_label(), "26-40 of 40");

        let short = SelectionState::new(3, 15);
        assert_eq!(short.visible_range(), 0..3);
    }

    #[test]
    fn test_zero_page_size_is_one() {
        let mut s = SelectionState::new(4, 0);
        s.move_by(2);
        assert_eq!(s.visible_range(), 2..3);
    }
}
