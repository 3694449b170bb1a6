//! Domain values shared by the store, the feed parser and the TUI.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A followed feed. Unique by case-insensitive `feed_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub title: String,
    pub feed_url: String,
}

impl Subscription {
    pub fn new(title: impl Into<String>, feed_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            feed_url: feed_url.into(),
        }
    }

    /// Title for list rows; falls back to the URL for untitled feeds.
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.feed_url
        } else {
            &self.title
        }
    }
}

/// One playable feed item. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub feed_title: String,
    pub title: String,
    pub published_at: Option<DateTime<Utc>>,
    /// Enclosure URL.
    pub audio_url: String,
    pub id: Option<String>,
}

impl Episode {
    /// Identity used for played tracking.
    pub fn played_key(&self) -> &str {
        match self.id.as_deref() {
            Some(id) if !id.trim().is_empty() => id,
            _ => &self.audio_url,
        }
    }

    pub fn date_label(&self) -> String {
        self.published_at
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "---- -- --".to_string())
    }
}

/// Newest first; undated episodes go last and keep their feed order.
pub fn display_order(a: &Episode, b: &Episode) -> Ordering {
    match (a.published_at, b.published_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable sort into display order.
pub fn sort_episodes(episodes: &mut [Episode]) {
    episodes.sort_by(display_order);
}

/// Persisted per-user state (`state.json`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayState {
    #[serde(default)]
    pub played_episode_ids: BTreeSet<String>,
}

#[cfg(test)]
pub(crate) fn episode(title: &str, published: Option<&str>) -> Episode {
    Episode {
        feed_title: "Feed".to_string(),
        title: title.to_string(),
        published_at: published.map(|s| {
            DateTime::parse_from_rfc3339(s)
                .unwrap()
                .with_timezone(&Utc)
        }),
        audio_url: format!("https://cdn.example.com/{}.mp3", title),
        id: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_newest_first_undated_last_in_feed_order() {
        let mut eps = vec![
            episode("undated-a", None),
            episode("old", Some("2023-01-01T00:00:00Z")),
            episode("undated-b", None),
            episode("new", Some("2024-06-01T12:00:00Z")),
            episode("mid", Some("2023-09-15T08:00:00+02:00")),
        ];
        sort_episodes(&mut eps);
        let titles: Vec<&str> = eps.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, ["new", "mid", "old", "undated-a", "undated-b"]);
    }

    #[test]
    fn test_played_key_falls_back_to_audio_url() {
        let mut ep = episode("x", None);
        assert_eq!(ep.played_key(), "https://cdn.example.com/x.mp3");
        ep.id = Some("   ".to_string());
        assert_eq!(ep.played_key(), "https://cdn.example.com/x.mp3");
        ep.id = Some("guid-1".to_string());
        assert_eq!(ep.played_key(), "guid-1");
    }

    #[test]
    fn test_date_label() {
        assert_eq!(episode("a", None).date_label(), "---- -- --");
        assert_eq!(
            episode("a", Some("2024-02-03T23:00:00Z")).date_label(),
            "2024-02-03"
        );
    }

    #[test]
    fn test_state_json_shape() {
        let mut state = PlayState::default();
        state.played_episode_ids.insert("g1".to_string());
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, r#"{"playedEpisodeIds":["g1"]}"#);
        let empty: PlayState = serde_json::from_str("{}").unwrap();
        assert!(empty.played_episode_ids.is_empty());
    }
}
