//! The terminal session and its blocking screens.
//!
//! Every screen runs the same loop: draw, then wait for either a key or the
//! idle tick. The tick redraw keeps the footer live (download percentage,
//! playback position) while the user is not typing.

use std::future::Future;
use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;

use ratatui::crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::Rect,
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
    Frame, Terminal,
};
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::debug;

use crate::theme::{Palette, ThemeSwitch};
use crate::widgets::chrome::{draw_screen, pane_chrome};
use crate::widgets::selection::{draw_list, SelectionState};
use crate::widgets::text_input::{InputAction, TextInput};

/// Line provider for the bottom status row, called on every redraw.
pub type Footer<'a> = &'a dyn Fn(&Palette) -> Line<'static>;

/// Whether a global key handler took the key away from list navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Consumed,
    Ignored,
}

/// One list screen.
pub struct Menu<'a, T> {
    pub title: &'a str,
    pub help: &'a str,
    pub items: &'a [T],
    pub render: &'a dyn Fn(&T, &Palette) -> Line<'static>,
    pub page_size: usize,
    pub footer: Option<Footer<'a>>,
}

const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

pub struct Tui<B: Backend> {
    terminal: Terminal<B>,
    events: mpsc::Receiver<Event>,
    tick: Interval,
    theme: Arc<ThemeSwitch>,
}

impl Tui<CrosstermBackend<Stdout>> {
    /// Raw mode, alternate screen, and a blocking reader thread that forwards
    /// terminal events. The reader exits once the `Tui` is dropped.
    pub fn enter(theme: Arc<ThemeSwitch>, tick_every: Duration) -> anyhow::Result<Self> {
        debug!("tui: enabling raw mode");
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;

        let (tx, rx) = mpsc::channel::<Event>(256);
        tokio::task::spawn_blocking(move || loop {
            if tx.is_closed() {
                break;
            }
            match event::poll(Duration::from_millis(100)) {
                Ok(true) => match event::read() {
                    Ok(ev) => {
                        if tx.blocking_send(ev).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                },
                Ok(false) => {}
                Err(_) => break,
            }
        });

        let mut tick = tokio::time::interval(tick_every.max(Duration::from_millis(20)));
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Ok(Tui::new(terminal, rx, tick, theme))
    }

    pub fn restore(&mut self) -> anyhow::Result<()> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        debug!("tui: terminal restored");
        Ok(())
    }
}

/// Best-effort teardown for paths where the `Tui` is gone (e.g. a panic).
pub fn restore_terminal() {
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), LeaveAlternateScreen);
}

impl<B> Tui<B>
where
    B: Backend,
    B::Error: Send + Sync + 'static,
{
    pub fn new(
        terminal: Terminal<B>,
        events: mpsc::Receiver<Event>,
        tick: Interval,
        theme: Arc<ThemeSwitch>,
    ) -> Self {
        Self {
            terminal,
            events,
            tick,
            theme,
        }
    }

    pub fn theme(&self) -> &Arc<ThemeSwitch> {
        &self.theme
    }

    /// Next key press, or `None` when the idle tick (or a non-key event)
    /// fired first and the caller should just redraw.
    async fn next_key(&mut self) -> anyhow::Result<Option<KeyEvent>> {
        tokio::select! {
            biased;
            ev = self.events.recv() => match ev {
                Some(Event::Key(key)) if key.kind == KeyEventKind::Press => Ok(Some(key)),
                Some(_) => Ok(None),
                None => anyhow::bail!("terminal input closed"),
            },
            _ = self.tick.tick() => Ok(None),
        }
    }

    /// Present `menu.items` and return the chosen one, or `None` on Esc.
    ///
    /// `global_keys` sees every key first, together with the item under the
    /// cursor; a `Consumed` key skips list navigation. An empty list returns
    /// `None` without drawing.
    pub async fn select<'a, T>(
        &mut self,
        menu: &Menu<'a, T>,
        mut global_keys: Option<&mut dyn FnMut(KeyEvent, &T) -> KeyOutcome>,
    ) -> anyhow::Result<Option<&'a T>> {
        if menu.items.is_empty() {
            return Ok(None);
        }
        let mut state = SelectionState::new(menu.items.len(), menu.page_size);
        let page = state.page_size() as isize;

        loop {
            self.draw_menu(menu, &state)?;
            let Some(key) = self.next_key().await? else {
                continue;
            };

            if let Some(handler) = global_keys.as_deref_mut() {
                if handler(key, &menu.items[state.selected()]) == KeyOutcome::Consumed {
                    continue;
                }
            }

            match key.code {
                KeyCode::Up => state.move_by(-1),
                KeyCode::Down => state.move_by(1),
                KeyCode::PageUp => state.move_by(-page),
                KeyCode::PageDown => state.move_by(page),
                KeyCode::Home => state.move_to(0),
                KeyCode::End => state.move_to(menu.items.len() - 1),
                KeyCode::Enter => return Ok(Some(&menu.items[state.selected()])),
                KeyCode::Esc => return Ok(None),
                _ => {}
            }
        }
    }

    fn draw_menu<T>(&mut self, menu: &Menu<'_, T>, state: &SelectionState) -> anyhow::Result<()> {
        let palette = self.theme.palette();
        self.terminal.draw(|frame| {
            let areas = draw_screen(frame, &palette, menu.title, menu.help, menu.footer.is_some());
            draw_list(frame, areas.body, &palette, menu.items, menu.render, state);
            draw_footer(frame, areas.footer, &palette, menu.footer);
        })?;
        Ok(())
    }

    /// Show `lines` until any key is pressed.
    pub async fn message(
        &mut self,
        title: &str,
        lines: &[String],
        footer: Option<Footer<'_>>,
    ) -> anyhow::Result<()> {
        loop {
            let palette = self.theme.palette();
            self.terminal.draw(|frame| {
                let areas = draw_screen(frame, &palette, title, "", footer.is_some());
                let mut body: Vec<Line> = lines
                    .iter()
                    .map(|l| Line::from(Span::styled(l.clone(), palette.text())))
                    .collect();
                body.push(Line::default());
                body.push(Line::from(Span::styled("Press any key...", palette.muted())));
                frame.render_widget(
                    Paragraph::new(body)
                        .block(pane_chrome("", &palette, None))
                        .wrap(Wrap { trim: false }),
                    areas.body,
                );
                draw_footer(frame, areas.footer, &palette, footer);
            })?;
            if self.next_key().await?.is_some() {
                return Ok(());
            }
        }
    }

    /// Single-line input. `None` when cancelled with Esc; the value is trimmed.
    pub async fn prompt_text(
        &mut self,
        title: &str,
        help: &str,
        footer: Option<Footer<'_>>,
    ) -> anyhow::Result<Option<String>> {
        let mut input = TextInput::new("");
        loop {
            let palette = self.theme.palette();
            self.terminal.draw(|frame| {
                let areas = draw_screen(frame, &palette, title, help, footer.is_some());
                input.draw(frame, areas.body, &palette);
                draw_footer(frame, areas.footer, &palette, footer);
            })?;
            let Some(key) = self.next_key().await? else {
                continue;
            };
            match input.handle_key(key) {
                InputAction::Confirmed(value) => return Ok(Some(value.trim().to_string())),
                InputAction::Cancelled => return Ok(None),
                InputAction::Editing => {}
            }
        }
    }

    /// Await `fut` while redrawing a working screen on every tick.
    /// Esc abandons the wait and drops `fut`.
    pub async fn wait_for<F: Future>(
        &mut self,
        label: &str,
        fut: F,
        footer: Option<Footer<'_>>,
    ) -> anyhow::Result<Option<F::Output>> {
        tokio::pin!(fut);
        let mut frame_no = 0usize;
        loop {
            let palette = self.theme.palette();
            let spinner = SPINNER[frame_no % SPINNER.len()];
            frame_no = frame_no.wrapping_add(1);
            self.terminal.draw(|frame| {
                let areas = draw_screen(frame, &palette, label, "Esc to cancel", footer.is_some());
                frame.render_widget(
                    Paragraph::new(Line::from(Span::styled(
                        format!(" {} working...", spinner),
                        palette.secondary(),
                    ))),
                    areas.body,
                );
                draw_footer(frame, areas.footer, &palette, footer);
            })?;

            tokio::select! {
                biased;
                out = &mut fut => return Ok(Some(out)),
                ev = self.events.recv() => match ev {
                    Some(Event::Key(key))
                        if key.kind == KeyEventKind::Press && key.code == KeyCode::Esc =>
                    {
                        debug!("tui: wait for '{}' cancelled", label);
                        return Ok(None);
                    }
                    Some(_) => {}
                    None => anyhow::bail!("terminal input closed"),
                },
                _ = self.tick.tick() => {}
            }
        }
    }
}

fn draw_footer(frame: &mut Frame, area: Rect, palette: &Palette, footer: Option<Footer<'_>>) {
    if let Some(footer) = footer {
        if area.height > 0 {
            frame.render_widget(Paragraph::new(footer(palette)), area);
        }
    }
}

#[cfg(test)]
impl Tui<ratatui::backend::TestBackend> {
    /// Session fed by a fixed list of key presses. Input never closes, so
    /// once the script runs out the session just keeps redrawing.
    pub(crate) fn scripted(width: u16, height: u16, keys: &[KeyCode]) -> Self {
        use ratatui::crossterm::event::KeyModifiers;

        let (tx, rx) = mpsc::channel(keys.len().max(1));
        for code in keys {
            tx.try_send(Event::Key(KeyEvent::new(*code, KeyModifiers::NONE)))
                .unwrap();
        }
        std::mem::forget(tx);
        let terminal = Terminal::new(ratatui::backend::TestBackend::new(width, height)).unwrap();
        let tick = tokio::time::interval(Duration::from_millis(10));
        Tui::new(terminal, rx, tick, Arc::new(ThemeSwitch::default()))
    }

    pub(crate) fn screen_text(&self) -> String {
        let buf = self.terminal.backend().buffer();
        let mut out = String::new();
        for y in 0..buf.area.height {
            for x in 0..buf.area.width {
                out.push_str(buf[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;

    fn tui(width: u16, height: u16, keys: &[KeyCode]) -> Tui<TestBackend> {
        Tui::scripted(width, height, keys)
    }

    fn screen(tui: &Tui<TestBackend>) -> String {
        tui.screen_text()
    }

    fn numbers(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("item {:02}", i)).collect()
    }

    fn plain(item: &String, _: &Palette) -> Line<'static> {
        Line::from(item.clone())
    }

    fn menu<'a>(items: &'a [String], page_size: usize) -> Menu<'a, String> {
        Menu {
            title: "Pick one",
            help: "Enter to choose",
            items,
            render: &plain,
            page_size,
            footer: None,
        }
    }

    #[tokio::test]
    async fn test_select_moves_and_returns_item() {
        let items = numbers(5);
        let mut t = tui(40, 12, &[KeyCode::Down, KeyCode::Down, KeyCode::Up, KeyCode::Enter]);
        let got = t.select(&menu(&items, 3), None).await.unwrap();
        assert_eq!(got, Some(&items[1]));
    }

    #[tokio::test]
    async fn test_select_esc_cancels() {
        let items = numbers(5);
        let mut t = tui(40, 12, &[KeyCode::Down, KeyCode::Esc]);
        assert_eq!(t.select(&menu(&items, 3), None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_select_empty_list_cancels_without_input() {
        let items: Vec<String> = Vec::new();
        let mut t = tui(40, 12, &[]);
        assert_eq!(t.select(&menu(&items, 3), None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_select_paging_clamps_to_last() {
        let items = numbers(7);
        let mut t = tui(
            40,
            12,
            &[KeyCode::PageDown, KeyCode::PageDown, KeyCode::PageDown, KeyCode::Enter],
        );
        assert_eq!(t.select(&menu(&items, 3), None).await.unwrap(), Some(&items[6]));
    }

    #[tokio::test]
    async fn test_global_keys_run_first_and_can_consume() {
        let items = numbers(4);
        let mut t = tui(
            40,
            12,
            &[
                KeyCode::Down,
                KeyCode::Char('x'),
                KeyCode::Down,
                KeyCode::Char('y'),
                KeyCode::Enter,
            ],
        );
        let mut seen: Vec<(char, String)> = Vec::new();
        let mut handler = |key: KeyEvent, item: &String| match key.code {
            KeyCode::Char(c) => {
                seen.push((c, item.clone()));
                KeyOutcome::Consumed
            }
            // Down stays ordinary navigation
            _ => KeyOutcome::Ignored,
        };
        let got = t.select(&menu(&items, 3), Some(&mut handler)).await.unwrap();
        assert_eq!(got, Some(&items[2]));
        assert_eq!(
            seen,
            vec![('x', "item 01".to_string()), ('y', "item 02".to_string())]
        );
    }

    #[tokio::test]
    async fn test_select_renders_page_window_and_footer() {
        let items = numbers(40);
        let mut keys = vec![KeyCode::Down; 20];
        keys.push(KeyCode::Enter);
        let mut t = tui(60, 21, &keys);
        let footer = |_: &Palette| Line::from("now playing: nothing");
        let m = Menu {
            footer: Some(&footer),
            ..menu(&items, 15)
        };
        let got = t.select(&m, None).await.unwrap();
        assert_eq!(got, Some(&items[20]));

        let text = screen(&t);
        assert!(text.contains("Pick one"));
        assert!(text.contains("Enter to choose"));
        assert!(text.contains("7-21 of 40"));
        assert!(text.contains("▶ item 20"));
        assert!(text.contains("item 06"));
        assert!(!text.contains("item 05"));
        assert!(!text.contains("item 21"));
        assert!(text.lines().last().unwrap().contains("now playing: nothing"));
    }

    #[tokio::test]
    async fn test_prompt_text_trims_and_cancels() {
        let mut t = tui(
            40,
            12,
            &[
                KeyCode::Char(' '),
                KeyCode::Char('a'),
                KeyCode::Char('b'),
                KeyCode::Enter,
                KeyCode::Char('z'),
                KeyCode::Esc,
            ],
        );
        assert_eq!(
            t.prompt_text("Add", "feed URL", None).await.unwrap(),
            Some("ab".to_string())
        );
        assert_eq!(t.prompt_text("Add", "feed URL", None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_message_returns_on_any_key() {
        let mut t = tui(40, 12, &[KeyCode::Char('q')]);
        t.message("Oops", &["Feed refresh failed".to_string()], None)
            .await
            .unwrap();
        let text = screen(&t);
        assert!(text.contains("Feed refresh failed"));
        assert!(text.contains("Press any key..."));
    }

    #[tokio::test]
    async fn test_wait_for_returns_output() {
        let mut t = tui(40, 12, &[]);
        let out = t
            .wait_for("Fetching", async { 42 }, None)
            .await
            .unwrap();
        assert_eq!(out, Some(42));
    }

    #[tokio::test]
    async fn test_wait_for_esc_abandons_pending_future() {
        let mut t = tui(40, 12, &[KeyCode::Esc]);
        let out = t
            .wait_for("Fetching", std::future::pending::<()>(), None)
            .await
            .unwrap();
        assert_eq!(out, None);
    }

    #[tokio::test]
    async fn test_closed_input_is_an_error() {
        let (tx, rx) = mpsc::channel(1);
        drop(tx);
        let terminal = Terminal::new(TestBackend::new(40, 12)).unwrap();
        let mut tick = tokio::time::interval(Duration::from_secs(60));
        // swallow the immediate first tick so the closed channel is seen
        tick.tick().await;
        let mut t = Tui::new(terminal, rx, tick, Arc::new(ThemeSwitch::default()));
        let items = numbers(2);
        assert!(t.select(&menu(&items, 3), None).await.is_err());
    }
}
