//! The menu graph: main menu, subscriptions, episodes, episode actions.
//!
//! The navigator owns the session's `Library`. Playback keys are routed
//! through each screen's global key hook, so they act on whatever the
//! orchestrator last started no matter where the cursor is.

use std::sync::Arc;

use pod_proto::feed::FeedSource;
use pod_proto::library::{Library, LibraryError};
use pod_proto::models::{Episode, Subscription};
use pod_proto::store::DataStore;
use ratatui::backend::Backend;
use ratatui::crossterm::event::KeyEvent;
use ratatui::text::{Line, Span};
use tracing::{debug, info, warn};

use crate::action::{EpisodeAction, MainAction, PlayerAction};
use crate::orchestrator::PlaybackOrchestrator;
use crate::session::{KeyOutcome, Menu, Tui};
use crate::theme::{Palette, ThemeSwitch};
use crate::widgets::status_bar::{now_playing_line, truncate_to_width};

const ACTION_PAGE_SIZE: usize = 10;

pub struct Navigator {
    store: DataStore,
    feeds: Arc<dyn FeedSource>,
    player: PlaybackOrchestrator,
    library: Library,
    page_size: usize,
    seek_step: u64,
}

impl Navigator {
    pub fn new(
        store: DataStore,
        feeds: Arc<dyn FeedSource>,
        player: PlaybackOrchestrator,
        library: Library,
        page_size: usize,
        seek_step: u64,
    ) -> Self {
        Self {
            store,
            feeds,
            player,
            library,
            page_size,
            seek_step,
        }
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    /// Run until Quit or Esc on the main menu. Playback is stopped on the way out.
    pub async fn run<B>(&mut self, tui: &mut Tui<B>) -> anyhow::Result<()>
    where
        B: Backend,
        B::Error: Send + Sync + 'static,
    {
        let footer = now_playing_footer(self.player.clone());
        let mut keys = self.player_keys::<MainAction>(tui.theme());
        let render = |a: &MainAction, p: &Palette| Line::from(Span::styled(a.label(), p.text()));

        loop {
            let menu = Menu {
                title: "Select an action",
                help: "Up/Down: move   Enter: select   Esc: quit",
                items: &MainAction::ALL,
                render: &render,
                page_size: ACTION_PAGE_SIZE,
                footer: Some(&footer),
            };
            let choice = tui.select(&menu, Some(&mut keys)).await?.copied();
            debug!("nav: main menu -> {:?}", choice);
            match choice {
                None | Some(MainAction::Quit) => break,
                Some(MainAction::Open) => self.open_subscription(tui).await?,
                Some(MainAction::Add) => self.add_subscription(tui).await?,
                Some(MainAction::Remove) => self.remove_subscription(tui).await?,
            }
        }

        self.player.stop();
        info!("nav: session finished");
        Ok(())
    }

    async fn open_subscription<B>(&mut self, tui: &mut Tui<B>) -> anyhow::Result<()>
    where
        B: Backend,
        B::Error: Send + Sync + 'static,
    {
        let footer = now_playing_footer(self.player.clone());
        if self.library.is_empty() {
            let lines = ["No subscriptions yet.".to_string()];
            return tui.message("Open subscription", &lines, Some(&footer)).await;
        }

        let mut keys = self.player_keys::<Subscription>(tui.theme());
        loop {
            let subs = self.library.subscriptions().to_vec();
            let menu = Menu {
                title: "Select a feed",
                help: "Up/Down: move   Enter: select   Esc: back",
                items: &subs,
                render: &subscription_row,
                page_size: self.page_size,
                footer: Some(&footer),
            };
            let Some(sub) = tui.select(&menu, Some(&mut keys)).await?.cloned() else {
                return Ok(());
            };
            self.browse_feed(tui, &sub).await?;
        }
    }

    /// Episodes are fetched again on every visit.
    async fn browse_feed<B>(&mut self, tui: &mut Tui<B>, sub: &Subscription) -> anyhow::Result<()>
    where
        B: Backend,
        B::Error: Send + Sync + 'static,
    {
        let footer = now_playing_footer(self.player.clone());
        let label = format!("Refreshing {}", sub.display_title());
        let feeds = self.feeds.clone();
        let fetched = tui
            .wait_for(&label, feeds.fetch(&sub.feed_url), Some(&footer))
            .await?;

        let episodes = match fetched {
            None => return Ok(()),
            Some(Err(e)) => {
                warn!("nav: refresh of {} failed: {:#}", sub.feed_url, e);
                let lines = [format!("Feed refresh failed: {:#}", e)];
                return tui.message(sub.display_title(), &lines, Some(&footer)).await;
            }
            Some(Ok(feed)) => feed.episodes,
        };
        if episodes.is_empty() {
            let lines = ["No playable episodes found (no enclosures).".to_string()];
            return tui.message(sub.display_title(), &lines, Some(&footer)).await;
        }
        info!("nav: {} episodes in {}", episodes.len(), sub.feed_url);

        let mut keys = self.player_keys::<Episode>(tui.theme());
        let title = format!("Episodes: {}", sub.display_title());
        loop {
            let choice = {
                let library = &self.library;
                let render = |e: &Episode, p: &Palette| episode_row(e, library.is_played(e), p);
                let menu = Menu {
                    title: &title,
                    help: "Up/Down: move   Enter: select   Esc: back",
                    items: &episodes,
                    render: &render,
                    page_size: self.page_size,
                    footer: Some(&footer),
                };
                tui.select(&menu, Some(&mut keys)).await?.cloned()
            };
            let Some(episode) = choice else {
                return Ok(());
            };
            self.episode_actions(tui, &episode).await?;
        }
    }

    async fn episode_actions<B>(
        &mut self,
        tui: &mut Tui<B>,
        episode: &Episode,
    ) -> anyhow::Result<()>
    where
        B: Backend,
        B::Error: Send + Sync + 'static,
    {
        let footer = now_playing_footer(self.player.clone());
        let mut keys = self.player_keys::<EpisodeAction>(tui.theme());
        let step = self.seek_step;
        let render =
            move |a: &EpisodeAction, p: &Palette| Line::from(Span::styled(a.label(step), p.text()));
        let help = truncate_to_width(&episode.audio_url, 100);

        loop {
            let menu = Menu {
                title: &episode.title,
                help: &help,
                items: &EpisodeAction::ALL,
                render: &render,
                page_size: ACTION_PAGE_SIZE,
                footer: Some(&footer),
            };
            let Some(action) = tui.select(&menu, Some(&mut keys)).await?.copied() else {
                return Ok(());
            };
            debug!("nav: '{}' -> {:?}", episode.title, action);

            match action {
                EpisodeAction::Play => {
                    // detached; progress and failure show up in the footer
                    drop(self.player.request_play(episode.clone()));
                }
                EpisodeAction::Stream => {
                    drop(self.player.request_stream(episode.clone()));
                }
                EpisodeAction::PlayPause => self.player.toggle_pause(),
                EpisodeAction::Stop => self.player.stop(),
                EpisodeAction::SeekBack => self.player.seek_by(-(step as f64)),
                EpisodeAction::SeekForward => self.player.seek_by(step as f64),
                EpisodeAction::MarkPlayed => {
                    if self.library.mark_played(episode) {
                        if let Err(e) = self.store.save_state(self.library.state()) {
                            warn!("nav: saving played state failed: {:#}", e);
                        }
                    }
                    let lines = ["Marked played.".to_string()];
                    tui.message(&episode.title, &lines, Some(&footer)).await?;
                }
                EpisodeAction::Back => return Ok(()),
            }
        }
    }

    async fn add_subscription<B>(&mut self, tui: &mut Tui<B>) -> anyhow::Result<()>
    where
        B: Backend,
        B::Error: Send + Sync + 'static,
    {
        let footer = now_playing_footer(self.player.clone());
        let Some(url) = tui
            .prompt_text(
                "Add subscription",
                "Paste the RSS/Atom feed URL. Enter: confirm   Esc: back",
                Some(&footer),
            )
            .await?
        else {
            return Ok(());
        };
        if url.is_empty() {
            return Ok(());
        }
        if self.library.is_subscribed(&url) {
            let lines = ["Already subscribed.".to_string()];
            return tui.message("Add subscription", &lines, Some(&footer)).await;
        }

        let feeds = self.feeds.clone();
        let fetched = tui
            .wait_for("Fetching feed", feeds.fetch(&url), Some(&footer))
            .await?;
        let line = match fetched {
            None => return Ok(()),
            Some(Err(e)) => {
                warn!("nav: subscribe to {} failed: {:#}", url, e);
                format!("Failed to subscribe: {:#}", e)
            }
            Some(Ok(feed)) => {
                let title = feed.title;
                match self.library.add(Subscription::new(title.clone(), url.clone())) {
                    Ok(()) => {
                        info!("nav: subscribed to {}", url);
                        self.save_subscriptions();
                        format!("Subscribed: {}", title)
                    }
                    Err(LibraryError::AlreadySubscribed { .. }) => {
                        "Already subscribed.".to_string()
                    }
                    Err(e) => format!("Failed to subscribe: {}", e),
                }
            }
        };
        tui.message("Add subscription", &[line], Some(&footer)).await
    }

    async fn remove_subscription<B>(&mut self, tui: &mut Tui<B>) -> anyhow::Result<()>
    where
        B: Backend,
        B::Error: Send + Sync + 'static,
    {
        let footer = now_playing_footer(self.player.clone());
        if self.library.is_empty() {
            let lines = ["No subscriptions to remove.".to_string()];
            return tui.message("Remove subscription", &lines, Some(&footer)).await;
        }

        let subs = self.library.subscriptions().to_vec();
        let mut keys = self.player_keys::<Subscription>(tui.theme());
        let menu = Menu {
            title: "Remove which feed?",
            help: "Up/Down: move   Enter: remove   Esc: back",
            items: &subs,
            render: &subscription_row,
            page_size: self.page_size,
            footer: Some(&footer),
        };
        let Some(sub) = tui.select(&menu, Some(&mut keys)).await? else {
            return Ok(());
        };

        if self.library.remove(sub) {
            info!("nav: removed {}", sub.feed_url);
            self.save_subscriptions();
        }
        let lines = ["Removed.".to_string()];
        tui.message("Remove subscription", &lines, Some(&footer)).await
    }

    fn save_subscriptions(&self) {
        if let Err(e) = self.store.save_subscriptions(self.library.subscriptions()) {
            warn!("nav: saving subscriptions failed: {:#}", e);
        }
    }

    fn player_keys<T>(&self, theme: &Arc<ThemeSwitch>) -> impl FnMut(KeyEvent, &T) -> KeyOutcome {
        let player = self.player.clone();
        let theme = theme.clone();
        let step = self.seek_step as f64;
        move |key: KeyEvent, _item: &T| {
            let Some(action) = PlayerAction::from_key(key) else {
                return KeyOutcome::Ignored;
            };
            match action {
                PlayerAction::TogglePause => player.toggle_pause(),
                PlayerAction::Stop => player.stop(),
                PlayerAction::SeekBack => player.seek_by(-step),
                PlayerAction::SeekForward => player.seek_by(step),
                PlayerAction::CycleTheme => {
                    let palette = theme.cycle();
                    debug!("nav: theme -> {}", palette.name);
                }
            }
            KeyOutcome::Consumed
        }
    }
}

fn now_playing_footer(player: PlaybackOrchestrator) -> impl Fn(&Palette) -> Line<'static> {
    move |palette: &Palette| now_playing_line(&player.now_playing(), palette)
}

fn subscription_row(sub: &Subscription, palette: &Palette) -> Line<'static> {
    Line::from(Span::styled(sub.display_title().to_string(), palette.text()))
}

fn episode_row(episode: &Episode, played: bool, palette: &Palette) -> Line<'static> {
    let mut spans = vec![
        Span::styled(episode.date_label(), palette.secondary()),
        Span::raw("  "),
    ];
    if played {
        spans.push(Span::styled("(played) ", palette.muted()));
    }
    spans.push(Span::styled(episode.title.clone(), palette.text()));
    Line::from(spans)
}
