use std::sync::Arc;
use std::time::Duration;

use pod_proto::config::Config;
use pod_proto::feed::HttpFeedSource;
use pod_proto::library::Library;
use pod_proto::store::DataStore;
use pod_tui::engine::MpvEngine;
use pod_tui::fetcher::HttpFetcher;
use pod_tui::mpv::MpvDriver;
use pod_tui::navigation::Navigator;
use pod_tui::orchestrator::PlaybackOrchestrator;
use pod_tui::session::{restore_terminal, Tui};
use pod_tui::theme::ThemeSwitch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_dir = pod_proto::platform::data_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("p0d.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // RUST_LOG wins; otherwise debug for our crates without the HTTP client chatter.
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    eprintln!("p0d log: {}", log_path.display());
    tracing::info!("p0d starting");

    // ── Config ───────────────────────────────────────────────────────────────
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(
                "config at {:?} unreadable, using defaults: {:#}",
                Config::config_path(),
                e
            );
            Config::default()
        }
    };
    std::fs::create_dir_all(&config.paths.data_dir)?;
    std::fs::create_dir_all(&config.paths.cache_dir)?;

    // ── Library ──────────────────────────────────────────────────────────────
    let store = DataStore::new(&config.paths);
    let library = Library::new(store.load_subscriptions(), store.load_state());
    tracing::info!(
        "library: {} subscriptions, {} played",
        library.subscriptions().len(),
        library.state().played_episode_ids.len()
    );

    // ── Playback ─────────────────────────────────────────────────────────────
    let driver = MpvDriver::new(
        config.playback.mpv_path.clone(),
        config.paths.data_dir.join("mpv-stderr.log"),
        config.playback.volume,
    );
    let engine = Arc::new(MpvEngine::spawn(driver));
    let user_agent = config.network.user_agent.as_str();
    let fetcher = HttpFetcher::new(
        store.clone(),
        Duration::from_secs(config.network.download_timeout_secs),
        user_agent,
    )?;
    let feeds = HttpFeedSource::new(
        Duration::from_secs(config.network.feed_timeout_secs),
        user_agent,
    )?;
    let player = PlaybackOrchestrator::new(engine.clone(), Arc::new(fetcher));

    // ── TUI ──────────────────────────────────────────────────────────────────
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        restore_terminal();
        original_hook(panic_info);
    }));

    let theme = Arc::new(ThemeSwitch::from_name(&config.ui.theme));
    let mut navigator = Navigator::new(
        store,
        Arc::new(feeds),
        player.clone(),
        library,
        config.ui.page_size,
        config.playback.seek_step_secs,
    );

    let result = match Tui::enter(theme, Duration::from_millis(config.ui.tick_millis)) {
        Ok(mut tui) => {
            let result = navigator.run(&mut tui).await;
            if let Err(e) = tui.restore() {
                tracing::error!("terminal restore failed: {:#}", e);
            }
            result
        }
        Err(e) => {
            restore_terminal();
            Err(e)
        }
    };

    // ── Teardown ─────────────────────────────────────────────────────────────
    player.stop();
    engine.shutdown().await;
    if let Err(e) = &result {
        tracing::error!("p0d exited with error: {:#}", e);
    }
    tracing::info!("p0d stopped");
    result
}
