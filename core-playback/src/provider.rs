//! # Playback Provider
//!
//! The `playback-provider` plugin. Owns one [`PlaybackState`], drives a
//! [`NativeTransport`] and publishes [`PlaybackEvent`]s.
//!
//! ## Concurrency
//!
//! Every operation that touches the transport or the queue runs inside the
//! provider's [`OperationLock`], so a burst like skip-next followed by
//! skip-previous is applied strictly in call order and never interleaves.
//! The state mutex is only held for short synchronous sections, never across
//! a transport call.
//!
//! Transport callbacks are consumed by a background task started on plugin
//! initialization. Progress and status reports bypass the operation lock;
//! end-of-track handling goes through it like any other queue operation.
//!
//! ## Failure handling
//!
//! A failing transport call moves the status to `error`, publishes an
//! `error` event and returns [`PlaybackError::TransportFailure`]. Calling
//! `play` again recovers. `stop` is the exception: it logs transport
//! failures and always leaves the local state cleared.

use async_trait::async_trait;
use bridge_traits::storage::SettingsStore;
use core_async::sync::broadcast::{self, error::RecvError};
use core_async::sync::OperationLock;
use core_async::task::{self, JoinHandle};
use core_library::models::{QueueItem, RepeatMode, Track};
use core_plugins::{Plugin, PluginCategory, PluginManifest};
use core_runtime::events::{EventBus, PlaybackEvent};
use core_runtime::PlaybackStatus;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::PlaybackConfig;
use crate::error::{PlaybackError, Result};
use crate::events::{as_millis, EventHandler, Reaction};
use crate::queue::{PreviousAction, QueueHandler, QueueManager, Removal, TrackEndAction};
use crate::state::PlaybackState;
use crate::traits::{NativeTransport, StreamResolver, TransportError, TransportEvent, TransportSource};

/// Manifest id of the built-in provider.
pub const PLAYBACK_PROVIDER_ID: &str = "native-playback";

/// Capabilities advertised by [`PlaybackProvider::manifest`].
pub const PLAYBACK_CAPABILITIES: [&str; 6] = [
    "play",
    "pause",
    "seek",
    "volume-control",
    "queue-management",
    "background-play",
];

pub struct PlaybackProvider {
    inner: Arc<ProviderInner>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

struct ProviderInner {
    config: PlaybackConfig,
    transport: Arc<dyn NativeTransport>,
    resolver: Arc<dyn StreamResolver>,
    settings: RwLock<Option<Arc<dyn SettingsStore>>>,
    state: Arc<Mutex<PlaybackState>>,
    lock: OperationLock,
    queue: QueueHandler,
    handler: EventHandler,
    events: EventBus,
}

impl PlaybackProvider {
    pub fn new(
        transport: Arc<dyn NativeTransport>,
        resolver: Arc<dyn StreamResolver>,
        events: EventBus,
        config: PlaybackConfig,
    ) -> Self {
        let queue = QueueManager::new(config.restart_threshold);
        Self::with_queue_manager(transport, resolver, events, config, queue)
    }

    /// Same as [`new`](Self::new) with a caller-supplied queue manager
    /// (e.g. a seeded shuffle).
    pub fn with_queue_manager(
        transport: Arc<dyn NativeTransport>,
        resolver: Arc<dyn StreamResolver>,
        events: EventBus,
        config: PlaybackConfig,
        queue: QueueManager,
    ) -> Self {
        let state = Arc::new(Mutex::new(PlaybackState::new(config.default_volume)));
        let inner = ProviderInner {
            handler: EventHandler::new(Arc::clone(&state), events.clone()),
            queue: QueueHandler::new(queue, events.clone()),
            lock: OperationLock::new("playback"),
            settings: RwLock::new(None),
            config,
            transport,
            resolver,
            state,
            events,
        };
        Self {
            inner: Arc::new(inner),
            listener: Mutex::new(None),
        }
    }

    /// Load the initial volume from, and persist volume changes to, `store`.
    ///
    /// The volume is read from the store on initialize.
    pub fn with_settings_store(self, store: Arc<dyn SettingsStore>) -> Self {
        self.attach_settings_store(store);
        self
    }

    /// Attach or replace the settings store on a provider that may already
    /// be shared.
    pub fn attach_settings_store(&self, store: Arc<dyn SettingsStore>) {
        *self.inner.settings.write() = Some(store);
    }

    pub fn has_settings_store(&self) -> bool {
        self.inner.settings.read().is_some()
    }

    pub fn manifest() -> PluginManifest {
        PluginManifest::new(
            PLAYBACK_PROVIDER_ID,
            "Native Playback",
            env!("CARGO_PKG_VERSION"),
            PluginCategory::PlaybackProvider,
        )
        .with_description("Queue-aware playback on the host audio engine")
        .with_capabilities(PLAYBACK_CAPABILITIES)
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Replace whatever is playing with `track`.
    ///
    /// A track that is already queued is played at its queue position;
    /// anything else is appended to the queue first. Emits `track-change`
    /// followed by `duration-change`.
    pub async fn play(
        &self,
        track: Track,
        stream_url: impl Into<String>,
        start_position: Option<Duration>,
        headers: Option<HashMap<String, String>>,
    ) -> Result<()> {
        let source = TransportSource::new(stream_url).with_headers(headers.unwrap_or_default());
        let inner = &*self.inner;
        inner
            .lock
            .with_lock(move || async move {
                let index = {
                    let mut state = inner.state.lock();
                    match state.index_of(&track.id) {
                        Some(index) => index,
                        None => inner.queue.add(&mut state, vec![track], None),
                    }
                };
                inner.start_track(index, source, start_position).await
            })
            .await
    }

    /// No-op unless currently `playing`.
    pub async fn pause(&self) -> Result<()> {
        let inner = &*self.inner;
        inner
            .lock
            .with_lock(move || async move {
                if inner.status() != PlaybackStatus::Playing {
                    return Ok(());
                }
                if let Err(err) = inner.transport.pause().await {
                    return Err(inner.fail("pause", err));
                }
                inner.handler.set_status(PlaybackStatus::Paused);
                Ok(())
            })
            .await
    }

    /// No-op unless currently `paused`.
    pub async fn resume(&self) -> Result<()> {
        let inner = &*self.inner;
        inner
            .lock
            .with_lock(move || async move {
                if inner.status() != PlaybackStatus::Paused {
                    return Ok(());
                }
                if let Err(err) = inner.transport.play().await {
                    return Err(inner.fail("play", err));
                }
                inner.handler.set_status(PlaybackStatus::Playing);
                Ok(())
            })
            .await
    }

    /// Reset the transport and clear queue and playback state.
    ///
    /// Always succeeds: transport failures are logged and local state is
    /// cleared regardless.
    pub async fn stop(&self) -> Result<()> {
        let inner = &*self.inner;
        inner
            .lock
            .with_lock(move || async move { inner.stop_locked().await })
            .await;
        Ok(())
    }

    /// Seek within the current track.
    ///
    /// The local position is updated as soon as the transport accepts the
    /// seek; the next progress report may briefly disagree.
    pub async fn seek(&self, position: Duration) -> Result<()> {
        let inner = &*self.inner;
        inner
            .lock
            .with_lock(move || async move { inner.seek_locked(position).await })
            .await
    }

    /// Clamp to `[0, 1]`, apply and persist.
    pub async fn set_volume(&self, volume: f32) -> Result<()> {
        let volume = PlaybackConfig::clamp_volume(volume);
        let inner = &*self.inner;
        inner
            .lock
            .with_lock(move || async move {
                if let Err(err) = inner.transport.set_volume(volume).await {
                    return Err(inner.fail("set_volume", err));
                }
                inner.state.lock().volume = volume;
                inner.persist_volume(volume).await;
                Ok(())
            })
            .await
    }

    /// Clamp to the configured rate range and apply.
    pub async fn set_playback_rate(&self, rate: f32) -> Result<()> {
        let inner = &*self.inner;
        let rate = inner.config.clamp_rate(rate);
        inner
            .lock
            .with_lock(move || async move {
                if let Err(err) = inner.transport.set_rate(rate).await {
                    return Err(inner.fail("set_rate", err));
                }
                inner.state.lock().rate = rate;
                Ok(())
            })
            .await
    }

    // ========================================================================
    // Queue
    // ========================================================================

    /// Replace the queue and start playing `start_index`. An empty list is
    /// the same as [`clear_queue`](Self::clear_queue).
    pub async fn set_queue(&self, tracks: Vec<Track>, start_index: usize) -> Result<()> {
        let inner = &*self.inner;
        inner
            .lock
            .with_lock(move || async move {
                let (start, previous) = {
                    let mut state = inner.state.lock();
                    let previous = state.status;
                    (inner.queue.set_queue(&mut state, tracks, start_index)?, previous)
                };
                match start {
                    Some(index) => inner.load_index(index, None).await,
                    None => {
                        inner.reset_transport().await;
                        inner.publish_cleared(previous);
                        Ok(())
                    }
                }
            })
            .await
    }

    /// Insert tracks at `at`, or append. Playback is not interrupted.
    pub async fn add_to_queue(&self, tracks: Vec<Track>, at: Option<usize>) -> Result<()> {
        let inner = &*self.inner;
        inner
            .lock
            .with_lock(move || async move {
                let mut state = inner.state.lock();
                inner.queue.add(&mut state, tracks, at);
                Ok(())
            })
            .await
    }

    /// Remove one queue entry. Removing the playing entry stops playback.
    pub async fn remove_from_queue(&self, index: usize) -> Result<()> {
        let inner = &*self.inner;
        inner
            .lock
            .with_lock(move || async move {
                let (removal, previous) = {
                    let mut state = inner.state.lock();
                    let previous = state.status;
                    (inner.queue.remove(&mut state, index)?, previous)
                };
                if let Removal::Active(track) = removal {
                    info!(track_id = %track.id, "Removed the playing track");
                    inner.reset_transport().await;
                    inner.publish_cleared(previous);
                }
                Ok(())
            })
            .await
    }

    /// Empty the queue. Same effect as [`stop`](Self::stop).
    pub async fn clear_queue(&self) -> Result<()> {
        self.stop().await
    }

    /// Advance to the next track. With nothing left to play (and repeat not
    /// `all`), playback stops and [`PlaybackError::NoNextTrack`] is returned.
    pub async fn skip_to_next(&self) -> Result<()> {
        let inner = &*self.inner;
        inner
            .lock
            .with_lock(move || async move {
                let next = {
                    let state = inner.state.lock();
                    inner.queue.manager().next_index(&state)
                };
                match next {
                    Some(index) => inner.load_index(index, None).await,
                    None => {
                        inner.stop_locked().await;
                        Err(PlaybackError::NoNextTrack)
                    }
                }
            })
            .await
    }

    /// Past the restart threshold, restart the current track; otherwise move
    /// to the previous one (or restart at index 0).
    pub async fn skip_to_previous(&self) -> Result<()> {
        let inner = &*self.inner;
        inner
            .lock
            .with_lock(move || async move {
                let action = {
                    let state = inner.state.lock();
                    inner.queue.manager().previous(&state)
                };
                match action {
                    Some(PreviousAction::Restart) => inner.seek_locked(Duration::ZERO).await,
                    Some(PreviousAction::Load(index)) => inner.load_index(index, None).await,
                    None => Err(PlaybackError::NoTrackLoaded),
                }
            })
            .await
    }

    /// Jump to an arbitrary queue index.
    pub async fn skip_to(&self, index: usize) -> Result<()> {
        let inner = &*self.inner;
        inner
            .lock
            .with_lock(move || async move {
                {
                    let state = inner.state.lock();
                    inner.queue.manager().check_index(&state, index)?;
                }
                inner.load_index(index, None).await
            })
            .await
    }

    /// Returns the new shuffle flag.
    pub async fn toggle_shuffle(&self) -> bool {
        let inner = &*self.inner;
        inner
            .lock
            .with_lock(move || async move {
                let mut state = inner.state.lock();
                inner.queue.toggle_shuffle(&mut state)
            })
            .await
    }

    pub async fn set_repeat_mode(&self, mode: RepeatMode) {
        let inner = &*self.inner;
        inner
            .lock
            .with_lock(move || async move {
                let mut state = inner.state.lock();
                inner.queue.set_repeat(&mut state, mode);
            })
            .await;
        debug!(mode = %mode, "Repeat mode set");
    }

    /// `off -> one -> all -> off`. Returns the new mode.
    pub async fn cycle_repeat_mode(&self) -> RepeatMode {
        let inner = &*self.inner;
        inner
            .lock
            .with_lock(move || async move {
                let mut state = inner.state.lock();
                inner.queue.cycle_repeat(&mut state)
            })
            .await
    }

    // ========================================================================
    // Read access
    // ========================================================================

    /// Copy of the current state.
    pub fn snapshot(&self) -> PlaybackState {
        self.inner.state.lock().clone()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.inner.status()
    }

    pub fn current_track(&self) -> Option<Track> {
        self.inner.state.lock().current_track.clone()
    }

    pub fn queue_items(&self) -> Vec<QueueItem> {
        self.inner.state.lock().queue_items()
    }

    pub fn position(&self) -> Duration {
        self.inner.state.lock().position
    }

    pub fn volume(&self) -> f32 {
        self.inner.state.lock().volume
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    fn start_listener(&self) {
        let mut listener = self.listener.lock();
        if listener.is_some() {
            return;
        }
        let receiver = self.inner.transport.subscribe();
        let inner = Arc::clone(&self.inner);
        *listener = Some(task::spawn(listen(inner, receiver)));
        debug!("Transport listener started");
    }

    fn stop_listener(&self) {
        if let Some(handle) = self.listener.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for PlaybackProvider {
    fn drop(&mut self) {
        self.stop_listener();
    }
}

impl fmt::Debug for PlaybackProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("PlaybackProvider")
            .field("status", &state.status)
            .field("queue_len", &state.queue.len())
            .field("current_index", &state.current_index)
            .finish()
    }
}

#[async_trait]
impl Plugin for PlaybackProvider {
    async fn on_initialize(&self) -> core_plugins::Result<()> {
        let volume = self.inner.load_volume().await;
        if let Err(err) = self.inner.transport.set_volume(volume).await {
            warn!(error = %err, "Failed to apply initial volume");
        }
        self.inner.state.lock().volume = volume;
        self.start_listener();
        info!(volume, "Playback provider initialized");
        Ok(())
    }

    async fn on_deactivate(&self) -> core_plugins::Result<()> {
        self.pause().await?;
        Ok(())
    }

    async fn on_destroy(&self) -> core_plugins::Result<()> {
        self.stop().await?;
        self.stop_listener();
        info!("Playback provider destroyed");
        Ok(())
    }
}

/// Consume transport callbacks until the channel closes or the task is
/// aborted.
async fn listen(inner: Arc<ProviderInner>, mut receiver: broadcast::Receiver<TransportEvent>) {
    loop {
        match receiver.recv().await {
            Ok(event) => {
                if inner.handler.handle(event) == Reaction::TrackEnded {
                    inner.on_track_end().await;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Transport listener lagged; callbacks dropped");
            }
            Err(RecvError::Closed) => {
                debug!("Transport callback channel closed");
                break;
            }
        }
    }
}

impl ProviderInner {
    fn status(&self) -> PlaybackStatus {
        self.state.lock().status
    }

    /// Transport failure: status `error`, `error` event, typed error back.
    fn fail(&self, operation: &'static str, err: TransportError) -> PlaybackError {
        let error = PlaybackError::transport(operation, err.0);
        self.report(&error);
        error
    }

    fn report(&self, error: &PlaybackError) {
        warn!(error = %error, "Playback operation failed");
        self.handler.set_status(PlaybackStatus::Error);
        let _ = self
            .events
            .emit_playback(PlaybackEvent::error(error.to_string(), error.is_transient()));
    }

    /// Resolve the stream for the queued track at `index` and play it.
    async fn load_index(&self, index: usize, start: Option<Duration>) -> Result<()> {
        let track = {
            let state = self.state.lock();
            state
                .queue
                .get(index)
                .cloned()
                .ok_or(PlaybackError::QueueIndexOutOfRange {
                    index,
                    len: state.queue.len(),
                })?
        };

        let source = match self.resolver.resolve(&track).await {
            Ok(source) => source,
            Err(err) => {
                let error = PlaybackError::StreamResolution {
                    track_id: track.id.clone(),
                    message: err.to_string(),
                };
                self.report(&error);
                return Err(error);
            }
        };
        self.start_track(index, source, start).await
    }

    /// Reset, load, optionally seek, play; then publish the new track.
    async fn start_track(
        &self,
        index: usize,
        source: TransportSource,
        start: Option<Duration>,
    ) -> Result<()> {
        let track = {
            let mut state = self.state.lock();
            state.select(Some(index));
            state
                .current_track
                .clone()
                .ok_or(PlaybackError::QueueIndexOutOfRange {
                    index,
                    len: state.queue.len(),
                })?
        };
        debug!(track_id = %track.id, index, source = ?source, "Loading track");
        self.handler.set_status(PlaybackStatus::Loading);

        if let Err(err) = self.transport.reset().await {
            return Err(self.fail("reset", err));
        }
        if let Err(err) = self.transport.load(&source).await {
            return Err(self.fail("load", err));
        }
        if let Some(position) = start.filter(|p| !p.is_zero()) {
            if let Err(err) = self.transport.seek(position).await {
                return Err(self.fail("seek", err));
            }
        }
        if let Err(err) = self.transport.play().await {
            return Err(self.fail("play", err));
        }

        let duration = {
            let mut state = self.state.lock();
            state.duration = track.duration;
            let position = start.unwrap_or_default();
            state.position = if track.duration.is_zero() {
                position
            } else {
                position.min(track.duration)
            };
            state.duration
        };

        let _ = self
            .events
            .emit_playback(PlaybackEvent::track_changed(Some(track.clone()), Some(index)));
        let _ = self
            .events
            .emit_playback(PlaybackEvent::duration_changed(as_millis(duration)));
        self.handler.set_status(PlaybackStatus::Playing);

        info!(track_id = %track.id, index, "Track started");
        Ok(())
    }

    async fn seek_locked(&self, position: Duration) -> Result<()> {
        let (duration, has_track) = {
            let state = self.state.lock();
            (state.duration, state.current_track.is_some())
        };
        if !has_track {
            return Err(PlaybackError::NoTrackLoaded);
        }
        let position = if duration.is_zero() {
            position
        } else {
            position.min(duration)
        };

        if let Err(err) = self.transport.seek(position).await {
            return Err(self.fail("seek", err));
        }

        self.state.lock().position = position;
        let _ = self.events.emit_playback(PlaybackEvent::position_changed(
            as_millis(position),
            as_millis(duration),
        ));
        Ok(())
    }

    async fn stop_locked(&self) {
        self.reset_transport().await;
        let previous = {
            let mut state = self.state.lock();
            let previous = state.status;
            self.queue.clear(&mut state);
            previous
        };
        self.publish_cleared(previous);
        info!("Playback stopped");
    }

    /// Transport reset whose failure is logged and otherwise ignored.
    async fn reset_transport(&self) {
        if let Err(err) = self.transport.reset().await {
            warn!(error = %err, "Transport reset failed; clearing local state anyway");
        }
    }

    /// Announce that nothing is loaded any more. `previous` is the status
    /// before the state was reset to idle.
    fn publish_cleared(&self, previous: PlaybackStatus) {
        if previous != PlaybackStatus::Idle {
            let _ = self
                .events
                .emit_playback(PlaybackEvent::status_changed(PlaybackStatus::Idle));
        }
        let _ = self
            .events
            .emit_playback(PlaybackEvent::track_changed(None, None));
    }

    /// The transport finished the loaded track.
    async fn on_track_end(&self) {
        let inner = self;
        let result = self
            .lock
            .with_lock(move || async move {
                let action = {
                    let state = inner.state.lock();
                    inner.queue.manager().on_track_end(&state)
                };
                debug!(action = ?action, "Handling end of track");
                match action {
                    TrackEndAction::Restart => inner.restart_current().await,
                    TrackEndAction::Advance(index) => inner.load_index(index, None).await,
                    TrackEndAction::Wrap => inner.load_index(0, None).await,
                    TrackEndAction::Stop => {
                        inner.stop_locked().await;
                        let _ = inner.events.emit_playback(PlaybackEvent::ended());
                        Ok(())
                    }
                }
            })
            .await;

        if let Err(err) = result {
            warn!(error = %err, "Failed to continue after track end");
        }
    }

    async fn restart_current(&self) -> Result<()> {
        self.seek_locked(Duration::ZERO).await?;
        if let Err(err) = self.transport.play().await {
            return Err(self.fail("play", err));
        }
        self.handler.set_status(PlaybackStatus::Playing);
        Ok(())
    }

    async fn load_volume(&self) -> f32 {
        let default = self.config.default_volume;
        let Some(store) = self.settings.read().clone() else {
            return default;
        };
        match store.get_f64(&self.config.volume_settings_key).await {
            Ok(Some(volume)) => PlaybackConfig::clamp_volume(volume as f32),
            Ok(None) => default,
            Err(err) => {
                warn!(error = %err, "Failed to load persisted volume");
                default
            }
        }
    }

    async fn persist_volume(&self, volume: f32) {
        let Some(store) = self.settings.read().clone() else {
            return;
        };
        if let Err(err) = store
            .set_f64(&self.config.volume_settings_key, f64::from(volume))
            .await
        {
            warn!(error = %err, "Failed to persist volume");
        }
    }
}
