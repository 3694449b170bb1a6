//! Audio output.
//!
//! `MpvEngine` is a thin handle; a single engine task owns the mpv process and
//! consumes commands in the order they were issued. State flows back the other
//! way through a `watch` channel so `snapshot()` never blocks the render loop.
//!
//! Every `play_*`/`stop` bumps a load sequence number on the handle side before
//! the command is queued. The task only publishes while its own sequence is
//! current, so events from a file that was already replaced never overwrite
//! the state of the one the user asked for.
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::mpv::{
    MpvDriver, MpvEvent, MpvHandle, OBS_CORE_IDLE, OBS_DURATION, OBS_PAUSE, OBS_TIME_POS,
};

const HEARTBEAT: Duration = Duration::from_secs(10);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq)]
pub enum EngineStatus {
    Idle,
    Loading,
    Playing,
    Paused,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSnapshot {
    pub status: EngineStatus,
    pub position: Duration,
    /// `None` until known, and for live streams.
    pub duration: Option<Duration>,
}

impl Default for EngineSnapshot {
    fn default() -> Self {
        Self {
            status: EngineStatus::Idle,
            position: Duration::ZERO,
            duration: None,
        }
    }
}

impl EngineSnapshot {
    fn loading() -> Self {
        Self {
            status: EngineStatus::Loading,
            ..Self::default()
        }
    }
}

/// What the orchestrator needs from an audio backend. Calls only enqueue work
/// and return; progress is observed through `snapshot()`.
pub trait PlaybackEngine: Send + Sync {
    fn play_file(&self, path: &Path) -> anyhow::Result<()>;
    fn play_stream(&self, url: &str) -> anyhow::Result<()>;
    fn toggle_pause(&self);
    fn stop(&self);
    /// Relative seek, clamped to `[0, duration]`. No-op for live streams.
    fn seek_by(&self, delta_secs: f64);
    fn snapshot(&self) -> EngineSnapshot;
}

#[derive(Debug)]
enum EngineCommand {
    Load { seq: u64, source: Source },
    Stop { seq: u64 },
    TogglePause,
    SeekBy(f64),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
enum Source {
    File(PathBuf),
    Stream(String),
}

impl Source {
    fn target(&self) -> String {
        match self {
            Source::File(p) => p.to_string_lossy().into_owned(),
            Source::Stream(url) => url.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Published {
    seq: u64,
    snapshot: EngineSnapshot,
}

pub struct MpvEngine {
    cmd_tx: mpsc::UnboundedSender<EngineCommand>,
    published: std::sync::Arc<watch::Sender<Published>>,
    task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl MpvEngine {
    /// Start the engine task. mpv itself is spawned on the first load.
    pub fn spawn(driver: MpvDriver) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (published, _) = watch::channel(Published::default());
        let published = std::sync::Arc::new(published);
        let core = EngineCore::new(driver, published.clone());
        let task = tokio::spawn(core.run(cmd_rx));
        Self {
            cmd_tx,
            published,
            task: std::sync::Mutex::new(Some(task)),
        }
    }

    fn begin(&self, snapshot: EngineSnapshot, make: impl FnOnce(u64) -> EngineCommand) -> bool {
        let mut sent = false;
        self.published.send_modify(|p| {
            p.seq += 1;
            p.snapshot = snapshot;
            sent = self.cmd_tx.send(make(p.seq)).is_ok();
        });
        sent
    }

    fn load(&self, source: Source) -> anyhow::Result<()> {
        info!("engine: load {:?}", source);
        if self.begin(EngineSnapshot::loading(), |seq| EngineCommand::Load { seq, source }) {
            Ok(())
        } else {
            anyhow::bail!("playback engine is not running")
        }
    }

    /// Stop playback and terminate mpv. Waits briefly for the task to finish.
    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(EngineCommand::Shutdown);
        let task = self.task.lock().ok().and_then(|mut t| t.take());
        if let Some(task) = task {
            if tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err() {
                warn!("engine: task did not stop within {:?}", SHUTDOWN_GRACE);
            }
        }
    }

    #[cfg(test)]
    fn watch(&self) -> watch::Receiver<Published> {
        self.published.subscribe()
    }
}

impl PlaybackEngine for MpvEngine {
    fn play_file(&self, path: &Path) -> anyhow::Result<()> {
        self.load(Source::File(path.to_path_buf()))
    }

    fn play_stream(&self, url: &str) -> anyhow::Result<()> {
        self.load(Source::Stream(url.to_string()))
    }

    fn toggle_pause(&self) {
        let _ = self.cmd_tx.send(EngineCommand::TogglePause);
    }

    fn stop(&self) {
        self.begin(EngineSnapshot::default(), |seq| EngineCommand::Stop { seq });
    }

    fn seek_by(&self, delta_secs: f64) {
        let _ = self.cmd_tx.send(EngineCommand::SeekBy(delta_secs));
    }

    fn snapshot(&self) -> EngineSnapshot {
        self.published.borrow().snapshot.clone()
    }
}

/// Where an absolute seek should land, or `None` when seeking makes no sense.
pub fn seek_target(position: f64, delta: f64, duration: Option<f64>) -> Option<f64> {
    let duration = duration.filter(|d| d.is_finite() && *d > 0.0)?;
    Some((position + delta).clamp(0.0, duration))
}

fn derive_status(
    loaded: bool,
    failed: Option<&str>,
    paused: bool,
    core_idle: Option<bool>,
) -> EngineStatus {
    if let Some(reason) = failed {
        return EngineStatus::Failed(reason.to_string());
    }
    if !loaded {
        return EngineStatus::Idle;
    }
    if paused {
        return EngineStatus::Paused;
    }
    match core_idle {
        Some(false) => EngineStatus::Playing,
        _ => EngineStatus::Loading,
    }
}

struct EngineCore {
    driver: MpvDriver,
    handle: Option<MpvHandle>,
    event_tx: mpsc::Sender<MpvEvent>,
    event_rx: mpsc::Receiver<MpvEvent>,
    published: std::sync::Arc<watch::Sender<Published>>,
    seq: u64,
    source: Option<Source>,
    failed: Option<String>,
    /// mpv playlist entry of the current load, to recognise its `end-file`.
    entry_id: Option<i64>,
    obs_core_idle: Option<bool>,
    obs_pause: bool,
    obs_time_pos: Option<f64>,
    obs_duration: Option<f64>,
}

impl EngineCore {
    fn new(driver: MpvDriver, published: std::sync::Arc<watch::Sender<Published>>) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);
        Self {
            driver,
            handle: None,
            event_tx,
            event_rx,
            published,
            seq: 0,
            source: None,
            failed: None,
            entry_id: None,
            obs_core_idle: None,
            obs_pause: false,
            obs_time_pos: None,
            obs_duration: None,
        }
    }

    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<EngineCommand>) {
        info!("engine: starting event loop");
        let mut heartbeat = tokio::time::interval(HEARTBEAT);
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                // stale mpv events drain before the next command is applied
                biased;
                Some(evt) = self.event_rx.recv() => self.handle_mpv_event(evt),
                cmd = cmd_rx.recv() => match cmd {
                    None | Some(EngineCommand::Shutdown) => break,
                    Some(cmd) => {
                        debug!("engine: command {:?}", cmd);
                        self.handle_command(cmd).await;
                    }
                },
                _ = heartbeat.tick() => self.heartbeat(),
            }
        }

        info!("engine: shutting down");
        if let Some(h) = self.handle.take() {
            let _ = h.stop().await;
        }
        self.driver.kill().await;
    }

    async fn handle_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::Load { seq, source } => {
                self.seq = seq;
                self.reset_observed();
                self.failed = None;
                self.source = Some(source.clone());
                self.publish();
                if let Err(e) = self.load(&source).await {
                    error!("engine: load failed: {}", e);
                    self.failed = Some(e.to_string());
                    self.publish();
                }
            }
            EngineCommand::Stop { seq } => {
                self.seq = seq;
                self.source = None;
                self.failed = None;
                self.entry_id = None;
                self.reset_observed();
                if let Some(h) = self.handle.clone() {
                    if let Err(e) = h.stop().await {
                        warn!("engine: stop failed: {}", e);
                    }
                }
                self.publish();
            }
            EngineCommand::TogglePause => {
                if self.source.is_none() || self.failed.is_some() {
                    return;
                }
                if let Some(h) = self.handle.clone() {
                    if let Err(e) = h.set_pause(!self.obs_pause).await {
                        warn!("engine: pause toggle failed: {}", e);
                    }
                }
            }
            EngineCommand::SeekBy(delta) => {
                if self.source.is_none() || self.failed.is_some() {
                    return;
                }
                let pos = self.obs_time_pos.unwrap_or(0.0);
                let Some(target) = seek_target(pos, delta, self.obs_duration) else {
                    debug!("engine: seek ignored, duration unknown");
                    return;
                };
                if let Some(h) = self.handle.clone() {
                    match h.seek_to(target).await {
                        Ok(()) => {
                            self.obs_time_pos = Some(target);
                            self.publish();
                        }
                        Err(e) => warn!("engine: seek failed: {}", e),
                    }
                }
            }
            EngineCommand::Shutdown => {}
        }
    }

    async fn load(&mut self, source: &Source) -> anyhow::Result<()> {
        let handle = self.ensure_mpv_handle().await?;
        self.entry_id = handle.load(&source.target()).await?;
        Ok(())
    }

    async fn ensure_mpv_handle(&mut self) -> anyhow::Result<MpvHandle> {
        if self.handle.is_some() && !self.driver.process_alive() {
            warn!("engine: mpv process died, dropping handle");
            self.handle = None;
        }
        if let Some(h) = &self.handle {
            return Ok(h.clone());
        }

        let handle = self.driver.spawn_and_connect(self.event_tx.clone()).await?;
        handle.observe_all_properties().await;
        self.handle = Some(handle.clone());
        Ok(handle)
    }

    fn handle_mpv_event(&mut self, evt: MpvEvent) {
        if let Some((obs_id, data)) = evt.as_property_change() {
            match obs_id {
                OBS_CORE_IDLE => self.obs_core_idle = data.as_bool(),
                OBS_PAUSE => self.obs_pause = data.as_bool().unwrap_or(false),
                OBS_TIME_POS => self.obs_time_pos = data.as_f64(),
                OBS_DURATION => self.obs_duration = data.as_f64(),
                _ => return,
            }
            self.publish();
            return;
        }

        if evt.event_name() != Some("end-file") {
            return;
        }
        let entry = evt.raw.get("playlist_entry_id").and_then(|v| v.as_i64());
        if entry.is_some() && self.entry_id.is_some() && entry != self.entry_id {
            debug!("engine: end-file for replaced entry {:?}", entry);
            return;
        }
        let reason = evt.end_reason().unwrap_or("unknown");
        info!("engine: end-file reason={}", reason);
        match reason {
            "eof" => {
                self.source = None;
                self.reset_observed();
            }
            "error" => {
                let detail = evt.file_error().unwrap_or("playback error");
                self.failed = Some(format!("mpv: {}", detail));
            }
            _ => return,
        }
        self.publish();
    }

    fn heartbeat(&mut self) {
        if self.handle.is_some() && !self.driver.process_alive() {
            warn!("engine: heartbeat: mpv process died");
            self.handle = None;
            self.reset_observed();
            if self.source.is_some() {
                self.failed = Some("mpv exited unexpectedly".to_string());
            }
            self.publish();
        }
    }

    fn reset_observed(&mut self) {
        self.obs_core_idle = None;
        self.obs_pause = false;
        self.obs_time_pos = None;
        self.obs_duration = None;
    }

    fn current(&self) -> EngineSnapshot {
        let duration = self
            .obs_duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(Duration::from_secs_f64);
        EngineSnapshot {
            status: derive_status(
                self.source.is_some(),
                self.failed.as_deref(),
                self.obs_pause,
                self.obs_core_idle,
            ),
            position: Duration::from_secs_f64(self.obs_time_pos.unwrap_or(0.0).max(0.0)),
            duration,
        }
    }

    fn publish(&self) {
        let next = self.current();
        let seq = self.seq;
        self.published.send_if_modified(|p| {
            if p.seq != seq || p.snapshot == next {
                return false;
            }
            p.snapshot = next;
            true
        });
    }
}
