//! Color palettes and the runtime theme switch.

use std::sync::atomic::{AtomicUsize, Ordering};

use ratatui::style::{Color, Modifier, Style};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub name: &'static str,
    pub accent: Color,
    pub playing: Color,
    pub pending: Color,
    pub error: Color,
    pub primary: Color,
    pub secondary: Color,
    pub muted: Color,
    pub border: Color,
    pub selection_bg: Color,
}

pub const DEFAULT: Palette = Palette {
    name: "default",
    accent: Color::Rgb(255, 95, 95),
    playing: Color::Rgb(80, 200, 120),
    pending: Color::Rgb(255, 184, 80),
    error: Color::Rgb(255, 80, 80),
    primary: Color::Rgb(210, 210, 225),
    secondary: Color::Rgb(115, 115, 138),
    muted: Color::Rgb(72, 72, 88),
    border: Color::Rgb(120, 100, 200),
    selection_bg: Color::Rgb(28, 28, 40),
};

pub const DRACULA: Palette = Palette {
    name: "dracula",
    accent: Color::Rgb(189, 147, 249),
    playing: Color::Rgb(80, 250, 123),
    pending: Color::Rgb(241, 250, 140),
    error: Color::Rgb(255, 85, 85),
    primary: Color::Rgb(248, 248, 242),
    secondary: Color::Rgb(139, 233, 253),
    muted: Color::Rgb(98, 114, 164),
    border: Color::Rgb(68, 71, 90),
    selection_bg: Color::Rgb(68, 71, 90),
};

pub const NORD: Palette = Palette {
    name: "nord",
    accent: Color::Rgb(136, 192, 208),
    playing: Color::Rgb(163, 190, 140),
    pending: Color::Rgb(235, 203, 139),
    error: Color::Rgb(191, 97, 106),
    primary: Color::Rgb(236, 239, 244),
    secondary: Color::Rgb(216, 222, 233),
    muted: Color::Rgb(97, 110, 136),
    border: Color::Rgb(76, 86, 106),
    selection_bg: Color::Rgb(59, 66, 82),
};

pub const GRUVBOX: Palette = Palette {
    name: "gruvbox",
    accent: Color::Rgb(254, 128, 25),
    playing: Color::Rgb(184, 187, 38),
    pending: Color::Rgb(250, 189, 47),
    error: Color::Rgb(251, 73, 52),
    primary: Color::Rgb(235, 219, 178),
    secondary: Color::Rgb(189, 174, 147),
    muted: Color::Rgb(124, 111, 100),
    border: Color::Rgb(102, 92, 84),
    selection_bg: Color::Rgb(60, 56, 54),
};

pub const PALETTES: [Palette; 4] = [DEFAULT, DRACULA, NORD, GRUVBOX];

impl Palette {
    pub fn text(&self) -> Style {
        Style::default().fg(self.primary)
    }

    pub fn secondary(&self) -> Style {
        Style::default().fg(self.secondary)
    }

    pub fn muted(&self) -> Style {
        Style::default().fg(self.muted)
    }

    pub fn accent(&self) -> Style {
        Style::default().fg(self.accent).add_modifier(Modifier::BOLD)
    }

    pub fn selected(&self) -> Style {
        Style::default()
            .bg(self.selection_bg)
            .fg(self.accent)
            .add_modifier(Modifier::BOLD)
    }

    pub fn border(&self) -> Style {
        Style::default().fg(self.border)
    }
}

/// Palette index shared by every screen; `t` cycles it from anywhere.
#[derive(Debug, Default)]
pub struct ThemeSwitch {
    index: AtomicUsize,
}

impl ThemeSwitch {
    /// Unknown names fall back to the default palette.
    pub fn from_name(name: &str) -> Self {
        let index = PALETTES
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(name.trim()))
            .unwrap_or(0);
        Self {
            index: AtomicUsize::new(index),
        }
    }

    pub fn palette(&self) -> Palette {
        PALETTES[self.index.load(Ordering::Relaxed) % PALETTES.len()]
    }

    /// Advance to the next palette and return it.
    pub fn cycle(&self) -> Palette {
        let prev = self
            .index
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |i| {
                Some((i + 1) % PALETTES.len())
            })
            .unwrap_or(0);
        PALETTES[(prev + 1) % PALETTES.len()]
    }
}
