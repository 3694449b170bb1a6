//! Whole-document persistence for subscriptions and played state, plus the
//! cache layout for downloaded episodes.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::config::PathsConfig;
use crate::models::{Episode, PlayState, Subscription};

const DEFAULT_AUDIO_EXT: &str = ".mp3";
const MAX_FEED_DIR_CHARS: usize = 50;

#[derive(Debug, Clone)]
pub struct DataStore {
    subscriptions_path: PathBuf,
    state_path: PathBuf,
    cache_dir: PathBuf,
}

impl DataStore {
    pub fn new(paths: &PathsConfig) -> Self {
        Self {
            subscriptions_path: paths.data_dir.join("subscriptions.json"),
            state_path: paths.data_dir.join("state.json"),
            cache_dir: paths.cache_dir.clone(),
        }
    }

    pub fn load_subscriptions(&self) -> Vec<Subscription> {
        load_json(&self.subscriptions_path)
    }

    pub fn save_subscriptions(&self, subs: &[Subscription]) -> anyhow::Result<()> {
        save_json(&self.subscriptions_path, &subs)
    }

    pub fn load_state(&self) -> PlayState {
        load_json(&self.state_path)
    }

    pub fn save_state(&self, state: &PlayState) -> anyhow::Result<()> {
        save_json(&self.state_path, state)
    }

    /// Stable location for an episode's audio, keyed by a hash of its URL.
    /// Creates the per-feed directory.
    pub fn cache_path_for(&self, episode: &Episode) -> anyhow::Result<PathBuf> {
        let hash = format!("{:x}", Sha256::digest(episode.audio_url.as_bytes()));
        let dir = self.cache_dir.join(safe_file_name(&episode.feed_title));
        std::fs::create_dir_all(&dir)?;
        Ok(dir.join(format!("{}{}", hash, audio_extension(&episode.audio_url))))
    }
}

/// Missing or malformed documents come back as `T::default()`.
fn load_json<T: DeserializeOwned + Default>(path: &Path) -> T {
    let Ok(content) = std::fs::read_to_string(path) else {
        return T::default();
    };
    match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            warn!("ignoring malformed {}: {}", path.display(), e);
            T::default()
        }
    }
}

fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

/// Extension from the URL path (query and fragment ignored), `.mp3` otherwise.
fn audio_extension(url: &str) -> String {
    let path = url
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .rsplit('/')
        .next()
        .unwrap_or_default();
    match path.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && (1..=5).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            format!(".{}", ext.to_ascii_lowercase())
        }
        _ => DEFAULT_AUDIO_EXT.to_string(),
    }
}

fn safe_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .take(MAX_FEED_DIR_CHARS)
        .collect();
    let cleaned = cleaned.trim_matches(['.', ' ']).to_string();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}
