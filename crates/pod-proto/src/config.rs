use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::platform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

/// Where subscriptions, state and downloaded episodes live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_seek_step")]
    pub seek_step_secs: u64,
    #[serde(default = "default_volume")]
    pub volume: f32,
    /// Explicit mpv binary; searched beside the exe and on PATH when unset.
    #[serde(default)]
    pub mpv_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_feed_timeout")]
    pub feed_timeout_secs: u64,
    /// Ceiling for a whole episode transfer. Expiry is reported as a fetch failure.
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            cache_dir: default_cache_dir(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            seek_step_secs: default_seek_step(),
            volume: default_volume(),
            mpv_path: None,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            feed_timeout_secs: default_feed_timeout(),
            download_timeout_secs: default_download_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            page_size: default_page_size(),
            tick_millis: default_tick_millis(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    platform::data_dir()
}

fn default_cache_dir() -> PathBuf {
    platform::cache_dir().join("episodes")
}

fn default_seek_step() -> u64 {
    15
}

fn default_volume() -> f32 {
    0.8
}

fn default_feed_timeout() -> u64 {
    30
}

fn default_download_timeout() -> u64 {
    30 * 60
}

fn default_user_agent() -> String {
    format!("p0d/{}", env!("CARGO_PKG_VERSION"))
}

fn default_theme() -> String {
    "default".to_string()
}

fn default_page_size() -> usize {
    15
}

fn default_tick_millis() -> u64 {
    200
}

impl Config {
    /// Load from the default location, writing defaults out on first run.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &Path) -> anyhow::Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(config_path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.playback.seek_step_secs, 15);
        assert_eq!(config.ui.page_size, 15);
        assert_eq!(config.network.download_timeout_secs, 1800);
        assert!(config.paths.cache_dir.ends_with("p0d/episodes"));
        assert!(config.network.user_agent.starts_with("p0d/"));
    }

    #[test]
    fn test_first_load_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.ui.theme, "default");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[ui]\ntheme = \"nord\"\n\n[playback]\nseek_step_secs = 30\n")
            .unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.ui.theme, "nord");
        assert_eq!(config.ui.page_size, 15);
        assert_eq!(config.playback.seek_step_secs, 30);
        assert_eq!(config.network.feed_timeout_secs, 30);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[ui\ntheme = ").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
