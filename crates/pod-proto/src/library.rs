//! In-memory subscriptions and played markers for one session.

use thiserror::Error;

use crate::models::{Episode, PlayState, Subscription};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LibraryError {
    #[error("already subscribed to {feed_url}")]
    AlreadySubscribed { feed_url: String },
    #[error("feed URL is empty")]
    EmptyUrl,
}

#[derive(Debug, Clone, Default)]
pub struct Library {
    subscriptions: Vec<Subscription>,
    state: PlayState,
}

impl Library {
    pub fn new(subscriptions: Vec<Subscription>, state: PlayState) -> Self {
        let mut library = Self {
            subscriptions: Vec::with_capacity(subscriptions.len()),
            state,
        };
        // Re-adding enforces uniqueness and ordering on documents edited by hand.
        for sub in subscriptions {
            let _ = library.add(sub);
        }
        library
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    pub fn state(&self) -> &PlayState {
        &self.state
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn is_subscribed(&self, feed_url: &str) -> bool {
        let needle = feed_url.trim().to_lowercase();
        self.subscriptions
            .iter()
            .any(|s| s.feed_url.to_lowercase() == needle)
    }

    /// Insert keeping the list sorted by case-insensitive title.
    pub fn add(&mut self, mut sub: Subscription) -> Result<(), LibraryError> {
        sub.feed_url = sub.feed_url.trim().to_string();
        if sub.feed_url.is_empty() {
            return Err(LibraryError::EmptyUrl);
        }
        if self.is_subscribed(&sub.feed_url) {
            return Err(LibraryError::AlreadySubscribed {
                feed_url: sub.feed_url,
            });
        }
        let key = sub.display_title().to_lowercase();
        let pos = self
            .subscriptions
            .partition_point(|s| s.display_title().to_lowercase() <= key);
        self.subscriptions.insert(pos, sub);
        Ok(())
    }

    /// Exact-match removal. Cached episode files are left alone.
    pub fn remove(&mut self, sub: &Subscription) -> bool {
        match self.subscriptions.iter().position(|s| s == sub) {
            Some(idx) => {
                self.subscriptions.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Returns `true` if the episode was not already marked.
    pub fn mark_played(&mut self, episode: &Episode) -> bool {
        self.state
            .played_episode_ids
            .insert(episode.played_key().to_string())
    }

    pub fn is_played(&self, episode: &Episode) -> bool {
        self.state.played_episode_ids.contains(episode.played_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::episode;

    #[test]
    fn test_duplicate_differing_in_case_is_rejected() {
        let mut lib = Library::default();
        lib.add(Subscription::new("Show", "https://example.com/Feed.xml"))
            .unwrap();
        let err = lib
            .add(Subscription::new("Show again", "HTTPS://EXAMPLE.COM/feed.xml"))
            .unwrap_err();
        assert!(matches!(err, LibraryError::AlreadySubscribed { .. }));
        assert_eq!(lib.subscriptions().len(), 1);
    }

    #[test]
    fn test_sorted_by_title_ignoring_case() {
        let mut lib = Library::default();
        lib.add(Subscription::new("zebra talk", "https://z")).unwrap();
        lib.add(Subscription::new("Apple Hour", "https://a")).unwrap();
        lib.add(Subscription::new("mango", "https://m")).unwrap();
        lib.add(Subscription::new("Banana", "https://b")).unwrap();
        let titles: Vec<&str> = lib.subscriptions().iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, ["Apple Hour", "Banana", "mango", "zebra talk"]);
    }

    #[test]
    fn test_empty_url_rejected() {
        let mut lib = Library::default();
        assert_eq!(
            lib.add(Subscription::new("x", "   ")),
            Err(LibraryError::EmptyUrl)
        );
    }

    #[test]
    fn test_new_drops_duplicates_from_disk() {
        let lib = Library::new(
            vec![
                Subscription::new("B", "https://b"),
                Subscription::new("A", "https://a"),
                Subscription::new("B dup", "https://B"),
            ],
            PlayState::default(),
        );
        assert_eq!(lib.subscriptions().len(), 2);
        assert_eq!(lib.subscriptions()[0].title, "A");
    }

    #[test]
    fn test_remove_exact_match_only() {
        let mut lib = Library::default();
        let sub = Subscription::new("A", "https://a");
        lib.add(sub.clone()).unwrap();
        assert!(!lib.remove(&Subscription::new("A", "https://A")));
        assert!(lib.remove(&sub));
        assert!(lib.is_empty());
    }

    #[test]
    fn test_mark_played_is_idempotent() {
        let mut lib = Library::default();
        let ep = episode("one", None);
        assert!(lib.mark_played(&ep));
        let once = lib.state().clone();
        assert!(!lib.mark_played(&ep));
        assert_eq!(lib.state(), &once);
        assert!(lib.is_played(&ep));
    }
}
