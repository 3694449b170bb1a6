//! Serializes "fetch, then play" requests against one engine.
//!
//! Every request and every `stop()` bumps `token`. Background work re-checks
//! the token inside the same `watch` write that applies its result, so a
//! completion that lost the race is discarded atomically. The gate is held
//! across the whole stop-fetch-start sequence, so two requests never
//! interleave their engine calls.
use std::sync::Arc;
use std::time::Duration;

use pod_proto::models::Episode;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::{EngineStatus, PlaybackEngine};
use crate::fetcher::EpisodeFetcher;

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Idle,
    Downloading { episode: Episode, percent: u8 },
    /// A stream waiting for the engine; nothing is transferred.
    Queued { episode: Episode },
    /// Handed to the engine; finer state comes from the engine snapshot.
    Active { episode: Episode },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestStatus {
    pub token: u64,
    pub phase: Phase,
    /// Why the last request collapsed to idle. Cleared by the next request.
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerState {
    Idle,
    Downloading { percent: u8 },
    Loading,
    Playing,
    Paused,
}

impl PlayerState {
    pub fn label(&self) -> String {
        match self {
            PlayerState::Idle => "Stopped".to_string(),
            PlayerState::Downloading { percent } => format!("Downloading {}%", percent),
            PlayerState::Loading => "Loading".to_string(),
            PlayerState::Playing => "Playing".to_string(),
            PlayerState::Paused => "Paused".to_string(),
        }
    }
}

/// What the footer shows on each redraw.
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlaying {
    pub state: PlayerState,
    pub episode: Option<Episode>,
    pub position: Duration,
    pub duration: Option<Duration>,
    pub last_error: Option<String>,
}

enum Target {
    Download,
    Stream,
}

struct Shared {
    engine: Arc<dyn PlaybackEngine>,
    fetcher: Arc<dyn EpisodeFetcher>,
    gate: Mutex<()>,
    status: watch::Sender<RequestStatus>,
}

/// Cheap to clone; all clones drive the same player.
#[derive(Clone)]
pub struct PlaybackOrchestrator {
    shared: Arc<Shared>,
}

impl PlaybackOrchestrator {
    pub fn new(engine: Arc<dyn PlaybackEngine>, fetcher: Arc<dyn EpisodeFetcher>) -> Self {
        let (status, _) = watch::channel(RequestStatus {
            token: 0,
            phase: Phase::Idle,
            last_error: None,
        });
        Self {
            shared: Arc::new(Shared {
                engine,
                fetcher,
                gate: Mutex::new(()),
                status,
            }),
        }
    }

    /// Download (or reuse) `episode`, then play it. Returns immediately; the
    /// handle resolves once this request finished or was superseded.
    pub fn request_play(&self, episode: Episode) -> JoinHandle<anyhow::Result<()>> {
        self.launch(episode, Target::Download)
    }

    /// Play straight from the enclosure URL, skipping the cache.
    pub fn request_stream(&self, episode: Episode) -> JoinHandle<anyhow::Result<()>> {
        self.launch(episode, Target::Stream)
    }

    fn launch(&self, episode: Episode, target: Target) -> JoinHandle<anyhow::Result<()>> {
        let mut token = 0;
        self.shared.status.send_modify(|s| {
            s.token += 1;
            token = s.token;
            s.phase = match &target {
                Target::Download => Phase::Downloading {
                    episode: episode.clone(),
                    percent: 0,
                },
                Target::Stream => Phase::Queued {
                    episode: episode.clone(),
                },
            };
            s.last_error = None;
        });
        info!("player: request #{} for '{}'", token, episode.title);

        let shared = self.shared.clone();
        tokio::spawn(async move {
            let result = shared.run(token, &episode, target).await;
            if let Err(e) = &result {
                shared.fail(token, e);
            }
            result
        })
    }

    /// Stop now. An in-flight download keeps going but its result is dropped.
    pub fn stop(&self) {
        let engine = &self.shared.engine;
        self.shared.status.send_modify(|s| {
            s.token += 1;
            s.phase = Phase::Idle;
            s.last_error = None;
            engine.stop();
        });
        debug!("player: stopped");
    }

    pub fn toggle_pause(&self) {
        if self.is_active() {
            self.shared.engine.toggle_pause();
        }
    }

    pub fn seek_by(&self, delta_secs: f64) {
        if self.is_active() {
            self.shared.engine.seek_by(delta_secs);
        }
    }

    fn is_active(&self) -> bool {
        matches!(self.shared.status.borrow().phase, Phase::Active { .. })
    }

    pub fn subscribe(&self) -> watch::Receiver<RequestStatus> {
        self.shared.status.subscribe()
    }

    pub fn status(&self) -> RequestStatus {
        self.shared.status.borrow().clone()
    }

    /// Current state for display. An active request whose engine has finished
    /// or failed collapses to idle here.
    pub fn now_playing(&self) -> NowPlaying {
        let snap = self.shared.engine.snapshot();
        let mut reconciled: Option<RequestStatus> = None;
        self.shared.status.send_if_modified(|s| {
            if !matches!(s.phase, Phase::Active { .. }) {
                return false;
            }
            match &snap.status {
                EngineStatus::Failed(reason) => {
                    warn!("player: engine failed: {}", reason);
                    s.phase = Phase::Idle;
                    s.last_error = Some(reason.clone());
                }
                EngineStatus::Idle => {
                    debug!("player: playback ended");
                    s.phase = Phase::Idle;
                }
                _ => return false,
            }
            reconciled = Some(s.clone());
            true
        });
        let status = reconciled.unwrap_or_else(|| self.status());

        match status.phase {
            Phase::Idle => NowPlaying {
                state: PlayerState::Idle,
                episode: None,
                position: Duration::ZERO,
                duration: None,
                last_error: status.last_error,
            },
            Phase::Downloading { episode, percent } => NowPlaying {
                state: PlayerState::Downloading { percent },
                episode: Some(episode),
                position: Duration::ZERO,
                duration: None,
                last_error: None,
            },
            Phase::Queued { episode } => NowPlaying {
                state: PlayerState::Loading,
                episode: Some(episode),
                position: Duration::ZERO,
                duration: None,
                last_error: None,
            },
            Phase::Active { episode } => NowPlaying {
                state: match snap.status {
                    EngineStatus::Playing => PlayerState::Playing,
                    EngineStatus::Paused => PlayerState::Paused,
                    _ => PlayerState::Loading,
                },
                episode: Some(episode),
                position: snap.position,
                duration: snap.duration,
                last_error: None,
            },
        }
    }
}

impl Shared {
    async fn run(&self, token: u64, episode: &Episode, target: Target) -> anyhow::Result<()> {
        let _gate = self.gate.lock().await;
        if !self.is_current(token) {
            debug!("player: request #{} superseded before start", token);
            return Ok(());
        }
        self.engine.stop();

        let source = match target {
            Target::Download => {
                let progress = |fraction: f64| self.report_progress(token, fraction);
                Some(self.fetcher.ensure_local(episode, &progress).await?)
            }
            Target::Stream => None,
        };

        let mut outcome: anyhow::Result<()> = Ok(());
        let applied = self.status.send_if_modified(|s| {
            if s.token != token {
                return false;
            }
            outcome = match &source {
                Some(path) => self.engine.play_file(path),
                None => self.engine.play_stream(&episode.audio_url),
            };
            s.phase = match &outcome {
                Ok(()) => Phase::Active {
                    episode: episode.clone(),
                },
                Err(_) => Phase::Idle,
            };
            true
        });
        if !applied {
            info!("player: discarding stale completion of request #{}", token);
        }
        outcome
    }

    fn is_current(&self, token: u64) -> bool {
        self.status.borrow().token == token
    }

    fn report_progress(&self, token: u64, fraction: f64) {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let pct = (fraction * 100.0).floor() as u8;
        self.status.send_if_modified(|s| {
            if s.token != token {
                return false;
            }
            match &mut s.phase {
                Phase::Downloading { percent, .. } if pct > *percent => {
                    *percent = pct;
                    true
                }
                _ => false,
            }
        });
    }

    fn fail(&self, token: u64, error: &anyhow::Error) {
        warn!("player: request #{} failed: {:#}", token, error);
        self.status.send_if_modified(|s| {
            if s.token != token {
                return false;
            }
            s.phase = Phase::Idle;
            s.last_error = Some(format!("{:#}", error));
            true
        });
    }
}
