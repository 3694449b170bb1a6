//! Top key legend and the bottom "now playing" footer.

use std::time::Duration;

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::orchestrator::{NowPlaying, PlayerState};
use crate::theme::Palette;

const KEY_LEGEND: &str =
    "↑↓ move  PgUp/PgDn page  Enter select  Esc back  p/Space pause  s stop  ←→ seek  t theme";

const TITLE_MAX_WIDTH: usize = 48;

pub fn draw_keys_bar(frame: &mut Frame, area: Rect, palette: &Palette) {
    let line = Line::from(vec![
        Span::styled(
            " p0d ",
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD | Modifier::REVERSED),
        ),
        Span::raw(" "),
        Span::styled(KEY_LEGEND, palette.muted()),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

pub fn now_playing_line(now: &NowPlaying, palette: &Palette) -> Line<'static> {
    let (icon, color) = match now.state {
        PlayerState::Idle => ("■", palette.muted),
        PlayerState::Downloading { .. } => ("↓", palette.pending),
        PlayerState::Loading => ("…", palette.pending),
        PlayerState::Playing => ("▶", palette.playing),
        PlayerState::Paused => ("⏸", palette.pending),
    };

    let mut spans = vec![
        Span::styled(
            format!(" {} {}", icon, now.state.label()),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
    ];

    if let Some(ep) = &now.episode {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            truncate_to_width(&ep.title, TITLE_MAX_WIDTH),
            palette.text(),
        ));
    }

    if matches!(now.state, PlayerState::Playing | PlayerState::Paused) {
        let time = match now.duration {
            Some(d) if !d.is_zero() => format!("{} / {}", fmt_time(now.position), fmt_time(d)),
            _ => fmt_time(now.position),
        };
        spans.push(Span::styled(format!("  {}", time), palette.secondary()));
    }

    if let Some(err) = &now.last_error {
        spans.push(Span::styled(
            format!("  error: {}", truncate_to_width(err, TITLE_MAX_WIDTH)),
            Style::default().fg(palette.error),
        ));
    }

    Line::from(spans)
}

/// `m:ss`, or `h:mm:ss` past the hour.
pub fn fmt_time(d: Duration) -> String {
    let s = d.as_secs();
    let h = s / 3600;
    let m = (s % 3600) / 60;
    let s = s % 60;
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

/// Cut `text` to at most `max` terminal columns, marking the cut with "…".
pub fn truncate_to_width(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    let budget = max.saturating_sub(1);
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(ch);
    }
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::DEFAULT;
    use pod_proto::models::Episode;

    fn text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn ep(title: &str) -> Episode {
        Episode {
            feed_title: "Feed".to_string(),
            title: title.to_string(),
            published_at: None,
            audio_url: "https://example.com/a.mp3".to_string(),
            id: None,
        }
    }

    #[test]
    fn test_fmt_time() {
        assert_eq!(fmt_time(Duration::ZERO), "0:00");
        assert_eq!(fmt_time(Duration::from_secs(83)), "1:23");
        assert_eq!(fmt_time(Duration::from_secs(3723)), "1:02:03");
    }

    #[test]
    fn test_truncate_respects_wide_chars() {
        assert_eq!(truncate_to_width("short", 10), "short");
        assert_eq!(truncate_to_width("abcdefghij", 5), "abcd…");
        // each CJK char is two columns wide
        assert_eq!(truncate_to_width("日本語のタイトル", 7), "日本語…");
    }

    #[test]
    fn test_playing_line_shows_title_and_time() {
        let now = NowPlaying {
            state: PlayerState::Playing,
            episode: Some(ep("Episode 12")),
            position: Duration::from_secs(65),
            duration: Some(Duration::from_secs(600)),
            last_error: None,
        };
        let line = text(&now_playing_line(&now, &DEFAULT));
        assert_eq!(line, " ▶ Playing  Episode 12  1:05 / 10:00");
    }

    #[test]
    fn test_downloading_line_shows_percent() {
        let now = NowPlaying {
            state: PlayerState::Downloading { percent: 37 },
            episode: Some(ep("Big one")),
            position: Duration::ZERO,
            duration: None,
            last_error: None,
        };
        assert_eq!(
            text(&now_playing_line(&now, &DEFAULT)),
            " ↓ Downloading 37%  Big one"
        );
    }

    #[test]
    fn test_idle_line_carries_last_error() {
        let now = NowPlaying {
            state: PlayerState::Idle,
            episode: None,
            position: Duration::ZERO,
            duration: None,
            last_error: Some("HTTP 404".to_string()),
        };
        assert_eq!(
            text(&now_playing_line(&now, &DEFAULT)),
            " ■ Stopped  error: HTTP 404"
        );
    }
}
