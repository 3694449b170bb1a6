//! Menu entries and the playback keys available on every screen.

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Keys handled before list navigation on every screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerAction {
    TogglePause,
    Stop,
    SeekBack,
    SeekForward,
    CycleTheme,
}

impl PlayerAction {
    /// Ctrl/Alt chords never map to a player action.
    pub fn from_key(key: KeyEvent) -> Option<Self> {
        if key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) {
            return None;
        }
        match key.code {
            KeyCode::Char('p') | KeyCode::Char(' ') => Some(PlayerAction::TogglePause),
            KeyCode::Char('s') => Some(PlayerAction::Stop),
            KeyCode::Left => Some(PlayerAction::SeekBack),
            KeyCode::Right => Some(PlayerAction::SeekForward),
            KeyCode::Char('t') => Some(PlayerAction::CycleTheme),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainAction {
    Open,
    Add,
    Remove,
    Quit,
}

impl MainAction {
    pub const ALL: [MainAction; 4] = [
        MainAction::Open,
        MainAction::Add,
        MainAction::Remove,
        MainAction::Quit,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MainAction::Open => "Open subscription",
            MainAction::Add => "Add subscription",
            MainAction::Remove => "Remove subscription",
            MainAction::Quit => "Quit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeAction {
    Play,
    Stream,
    PlayPause,
    Stop,
    SeekBack,
    SeekForward,
    MarkPlayed,
    Back,
}

impl EpisodeAction {
    pub const ALL: [EpisodeAction; 8] = [
        EpisodeAction::Play,
        EpisodeAction::Stream,
        EpisodeAction::PlayPause,
        EpisodeAction::Stop,
        EpisodeAction::SeekBack,
        EpisodeAction::SeekForward,
        EpisodeAction::MarkPlayed,
        EpisodeAction::Back,
    ];

    pub fn label(&self, seek_step_secs: u64) -> String {
        match self {
            EpisodeAction::Play => "Play".to_string(),
            EpisodeAction::Stream => "Stream (no download)".to_string(),
            EpisodeAction::PlayPause => "Play/Pause".to_string(),
            EpisodeAction::Stop => "Stop".to_string(),
            EpisodeAction::SeekBack => format!("Seek -{}s", seek_step_secs),
            EpisodeAction::SeekForward => format!("Seek +{}s", seek_step_secs),
            EpisodeAction::MarkPlayed => "Mark played".to_string(),
            EpisodeAction::Back => "Back".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_player_keys() {
        assert_eq!(
            PlayerAction::from_key(key(KeyCode::Char(' '))),
            Some(PlayerAction::TogglePause)
        );
        assert_eq!(
            PlayerAction::from_key(key(KeyCode::Char('p'))),
            Some(PlayerAction::TogglePause)
        );
        assert_eq!(
            PlayerAction::from_key(key(KeyCode::Left)),
            Some(PlayerAction::SeekBack)
        );
        assert_eq!(
            PlayerAction::from_key(key(KeyCode::Char('t'))),
            Some(PlayerAction::CycleTheme)
        );
        assert_eq!(PlayerAction::from_key(key(KeyCode::Down)), None);
        assert_eq!(PlayerAction::from_key(key(KeyCode::Enter)), None);
    }

    #[test]
    fn test_ctrl_chords_are_not_player_keys() {
        let ctrl_s = KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL);
        assert_eq!(PlayerAction::from_key(ctrl_s), None);
    }

    #[test]
    fn test_seek_labels_follow_step() {
        assert_eq!(EpisodeAction::SeekBack.label(15), "Seek -15s");
        assert_eq!(EpisodeAction::SeekForward.label(30), "Seek +30s");
    }
}
