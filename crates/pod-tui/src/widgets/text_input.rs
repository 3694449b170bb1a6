//! Single-line text entry built on tui-input.

use ratatui::crossterm::event::{Event, KeyCode, KeyEvent};
use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use tui_input::{backend::crossterm::EventHandler, Input};

use crate::theme::Palette;
use crate::widgets::chrome::pane_chrome;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    Confirmed(String),
    Cancelled,
    Editing,
}

pub struct TextInput {
    input: Input,
    placeholder: String,
}

impl TextInput {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            input: Input::default(),
            placeholder: placeholder.into(),
        }
    }

    /// Enter confirms, Esc cancels, everything else edits.
    pub fn handle_key(&mut self, key: KeyEvent) -> InputAction {
        match key.code {
            KeyCode::Enter => InputAction::Confirmed(self.input.value().to_string()),
            KeyCode::Esc => InputAction::Cancelled,
            _ => {
                self.input.handle_event(&Event::Key(key));
                InputAction::Editing
            }
        }
    }

    /// Draw a bordered one-line box and place the terminal cursor in it.
    pub fn draw(&self, frame: &mut Frame, area: Rect, palette: &Palette) {
        if area.height < 3 || area.width < 4 {
            return;
        }
        let area = Rect { height: 3, ..area };
        let block = pane_chrome("", palette, None);
        let inner = block.inner(area);

        // "> " prefix takes two columns
        let width = inner.width.saturating_sub(2) as usize;
        let scroll = self.input.visual_scroll(width);
        let value = self.input.value();
        let shown = if value.is_empty() {
            Span::styled(self.placeholder.clone(), palette.muted())
        } else {
            Span::styled(value.chars().skip(scroll).collect::<String>(), palette.text())
        };
        let line = Line::from(vec![Span::styled("> ", palette.accent()), shown]);
        frame.render_widget(Paragraph::new(line).block(block), area);

        let cursor_x = inner.x + 2 + self.input.visual_cursor().saturating_sub(scroll) as u16;
        let max_x = inner.x + inner.width.saturating_sub(1);
        frame.set_cursor_position((cursor_x.min(max_x), inner.y));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_typing_then_enter_confirms_value() {
        let mut input = TextInput::new("feed url");
        for ch in "https://x".chars() {
            assert_eq!(input.handle_key(key(KeyCode::Char(ch))), InputAction::Editing);
        }
        input.handle_key(key(KeyCode::Backspace));
        assert_eq!(
            input.handle_key(key(KeyCode::Enter)),
            InputAction::Confirmed("https://".to_string())
        );
    }

    #[test]
    fn test_esc_cancels() {
        let mut input = TextInput::new("");
        input.handle_key(key(KeyCode::Char('a')));
        assert_eq!(input.handle_key(key(KeyCode::Esc)), InputAction::Cancelled);
        assert_eq!(input.input.value(), "a");
    }
}
