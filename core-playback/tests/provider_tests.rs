//! PlaybackProvider behaviour against a recording fake transport.

use async_trait::async_trait;
use bridge_traits::storage::{MemorySettingsStore, SettingsStore};
use core_library::models::{RepeatMode, Track};
use core_playback::{
    NativeTransport, PlaybackConfig, PlaybackError, PlaybackProvider, QueueManager,
    StreamResolver, TransportError, TransportEvent, TransportSource,
};
use core_plugins::{Plugin, PluginRegistry, RegistryConfig};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent, Receiver};
use core_runtime::PlaybackStatus;
use mockall::mock;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

// ============================================================================
// Fakes
// ============================================================================

struct FakeTransport {
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<&'static str>>,
    load_delay: Duration,
    sender: broadcast::Sender<TransportEvent>,
}

impl FakeTransport {
    fn new() -> Arc<Self> {
        Self::with_load_delay(Duration::ZERO)
    }

    fn with_load_delay(load_delay: Duration) -> Arc<Self> {
        let (sender, _) = broadcast::channel(64);
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            load_delay,
            sender,
        })
    }

    fn fail(&self, operation: &'static str) {
        self.failing.lock().insert(operation);
    }

    fn heal(&self) {
        self.failing.lock().clear();
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn forget_calls(&self) {
        self.calls.lock().clear();
    }

    fn emit(&self, event: TransportEvent) {
        let _ = self.sender.send(event);
    }

    fn record(&self, operation: &'static str, detail: String) -> Result<(), TransportError> {
        let entry = if detail.is_empty() {
            operation.to_string()
        } else {
            format!("{operation}:{detail}")
        };
        self.calls.lock().push(entry);
        if self.failing.lock().contains(operation) {
            return Err(TransportError::new(format!("{operation} exploded")));
        }
        Ok(())
    }
}

#[async_trait]
impl NativeTransport for FakeTransport {
    async fn reset(&self) -> Result<(), TransportError> {
        self.record("reset", String::new())
    }

    async fn load(&self, source: &TransportSource) -> Result<(), TransportError> {
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }
        self.record("load", source.url.clone())
    }

    async fn play(&self) -> Result<(), TransportError> {
        self.record("play", String::new())
    }

    async fn pause(&self) -> Result<(), TransportError> {
        self.record("pause", String::new())
    }

    async fn seek(&self, position: Duration) -> Result<(), TransportError> {
        self.record("seek", position.as_millis().to_string())
    }

    async fn set_volume(&self, volume: f32) -> Result<(), TransportError> {
        self.record("set_volume", volume.to_string())
    }

    async fn set_rate(&self, rate: f32) -> Result<(), TransportError> {
        self.record("set_rate", rate.to_string())
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.sender.subscribe()
    }
}

mock! {
    pub Resolver {}

    #[async_trait]
    impl StreamResolver for Resolver {
        async fn resolve(&self, track: &Track) -> core_playback::Result<TransportSource>;
    }
}

fn cdn_resolver() -> Arc<MockResolver> {
    let mut resolver = MockResolver::new();
    resolver
        .expect_resolve()
        .returning(|track| Ok(TransportSource::new(format!("https://cdn.test/{}.mp3", track.id))));
    Arc::new(resolver)
}

// ============================================================================
// Helpers
// ============================================================================

fn track(id: &str, secs: u64) -> Track {
    Track::new(id, id.to_uppercase(), "local").with_duration(Duration::from_secs(secs))
}

fn tracks(ids: &[&str]) -> Vec<Track> {
    ids.iter().map(|id| track(id, 200)).collect()
}

struct Harness {
    provider: PlaybackProvider,
    transport: Arc<FakeTransport>,
    events: Receiver<CoreEvent>,
}

fn harness_with(transport: Arc<FakeTransport>) -> Harness {
    let bus = EventBus::new(256);
    let events = bus.subscribe();
    let provider = PlaybackProvider::with_queue_manager(
        transport.clone(),
        cdn_resolver(),
        bus,
        PlaybackConfig::default(),
        QueueManager::with_seed(Duration::from_secs(3), 42),
    );
    Harness {
        provider,
        transport,
        events,
    }
}

fn harness() -> Harness {
    harness_with(FakeTransport::new())
}

impl Harness {
    fn drain(&mut self) -> Vec<PlaybackEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            if let CoreEvent::Playback(event) = event {
                out.push(event);
            }
        }
        out
    }

    fn kinds(&mut self) -> Vec<&'static str> {
        self.drain().iter().map(|e| e.kind()).collect()
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

// ============================================================================
// Transport
// ============================================================================

#[tokio::test]
async fn test_play_loads_and_emits_track_then_duration() {
    let mut h = harness();

    h.provider
        .play(track("a", 215), "https://cdn.test/a.mp3?sig=1", Some(Duration::from_secs(30)), None)
        .await
        .unwrap();

    assert_eq!(
        h.transport.calls(),
        vec!["reset", "load:https://cdn.test/a.mp3?sig=1", "seek:30000", "play"]
    );

    let state = h.provider.snapshot();
    assert_eq!(state.status, PlaybackStatus::Playing);
    assert_eq!(state.current_track.as_ref().unwrap().id, "a");
    assert_eq!(state.current_index, Some(0));
    assert_eq!(state.duration, Duration::from_secs(215));
    assert_eq!(state.position, Duration::from_secs(30));
    assert!(state.is_consistent());

    let kinds: Vec<&str> = h
        .kinds()
        .into_iter()
        .filter(|k| *k == "track-change" || *k == "duration-change")
        .collect();
    assert_eq!(kinds, vec!["track-change", "duration-change"]);
}

#[tokio::test]
async fn test_play_failure_sets_error_and_replay_recovers() {
    let mut h = harness();
    h.transport.fail("load");

    let err = h
        .provider
        .play(track("a", 100), "https://cdn.test/a.mp3", None, None)
        .await
        .unwrap_err();
    assert!(err.is_transport_failure());
    assert_eq!(h.provider.status(), PlaybackStatus::Error);

    let events = h.drain();
    assert!(events.iter().any(|e| matches!(
        e,
        PlaybackEvent::Error {
            recoverable: true,
            ..
        }
    )));
    assert!(!events.iter().any(|e| e.kind() == "track-change"));

    h.transport.heal();
    h.provider
        .play(track("a", 100), "https://cdn.test/a.mp3", None, None)
        .await
        .unwrap();
    assert_eq!(h.provider.status(), PlaybackStatus::Playing);
    // Re-playing a queued track does not duplicate it
    assert_eq!(h.provider.queue_items().len(), 1);
}

#[tokio::test]
async fn test_pause_and_resume_are_idempotent() {
    let h = harness();

    h.provider.pause().await.unwrap();
    h.provider.resume().await.unwrap();
    assert!(h.transport.calls().is_empty());

    h.provider.set_queue(tracks(&["a"]), 0).await.unwrap();
    h.transport.forget_calls();

    h.provider.pause().await.unwrap();
    h.provider.pause().await.unwrap();
    assert_eq!(h.provider.status(), PlaybackStatus::Paused);
    h.provider.resume().await.unwrap();
    h.provider.resume().await.unwrap();
    assert_eq!(h.provider.status(), PlaybackStatus::Playing);

    assert_eq!(h.transport.calls(), vec!["pause", "play"]);
}

#[tokio::test]
async fn test_stop_clears_state_even_when_reset_fails() {
    let mut h = harness();
    h.provider.set_queue(tracks(&["a", "b"]), 1).await.unwrap();
    h.provider.set_repeat_mode(RepeatMode::All).await;
    h.drain();
    h.transport.fail("reset");

    h.provider.stop().await.unwrap();

    let state = h.provider.snapshot();
    assert!(state.current_track.is_none());
    assert!(state.queue.is_empty());
    assert_eq!(state.position, Duration::ZERO);
    assert_eq!(state.status, PlaybackStatus::Idle);
    assert_eq!(state.repeat_mode, RepeatMode::All);

    let kinds = h.kinds();
    assert!(kinds.contains(&"status-change"));
    assert!(kinds.contains(&"track-change"));
    assert!(!kinds.contains(&"error"));
}

#[tokio::test]
async fn test_seek_updates_position_optimistically() {
    let h = harness();
    assert!(matches!(
        h.provider.seek(Duration::from_secs(1)).await,
        Err(PlaybackError::NoTrackLoaded)
    ));

    h.provider.set_queue(tracks(&["a"]), 0).await.unwrap();
    h.provider.seek(Duration::from_secs(42)).await.unwrap();
    assert_eq!(h.provider.position(), Duration::from_secs(42));

    // Clamped to the known duration
    h.provider.seek(Duration::from_secs(999)).await.unwrap();
    assert_eq!(h.provider.position(), Duration::from_secs(200));
}

#[tokio::test]
async fn test_volume_and_rate_are_clamped() {
    let h = harness();
    h.provider.set_volume(1.8).await.unwrap();
    h.provider.set_volume(-1.0).await.unwrap();
    h.provider.set_playback_rate(5.0).await.unwrap();
    h.provider.set_playback_rate(0.1).await.unwrap();

    assert_eq!(
        h.transport.calls(),
        vec!["set_volume:1", "set_volume:0", "set_rate:2", "set_rate:0.5"]
    );
    assert_eq!(h.provider.volume(), 0.0);
    assert_eq!(h.provider.snapshot().rate, 0.5);
}

#[tokio::test]
async fn test_volume_is_persisted_and_restored() {
    let store = Arc::new(MemorySettingsStore::new());
    store.set_f64("playback.volume", 0.35).await.unwrap();

    let transport = FakeTransport::new();
    let provider = PlaybackProvider::new(
        transport.clone(),
        cdn_resolver(),
        EventBus::new(16),
        PlaybackConfig::default(),
    )
    .with_settings_store(store.clone());

    provider.on_initialize().await.unwrap();
    assert_eq!(provider.volume(), 0.35);
    assert_eq!(transport.calls(), vec!["set_volume:0.35"]);

    provider.set_volume(0.8).await.unwrap();
    let stored = store.get_f64("playback.volume").await.unwrap().unwrap();
    assert!((stored - 0.8).abs() < 1e-6);
}

#[tokio::test]
async fn test_settings_store_attaches_to_shared_provider() {
    let store = Arc::new(MemorySettingsStore::new());
    store.set_f64("playback.volume", 0.6).await.unwrap();

    let provider = Arc::new(PlaybackProvider::new(
        FakeTransport::new(),
        cdn_resolver(),
        EventBus::new(16),
        PlaybackConfig::default(),
    ));
    let shared = Arc::clone(&provider);
    assert!(!shared.has_settings_store());

    shared.attach_settings_store(store.clone());
    assert!(provider.has_settings_store());

    provider.on_initialize().await.unwrap();
    assert_eq!(provider.volume(), 0.6);

    provider.set_volume(0.25).await.unwrap();
    let stored = store.get_f64("playback.volume").await.unwrap().unwrap();
    assert!((stored - 0.25).abs() < 1e-6);
}

// ============================================================================
// Queue
// ============================================================================

#[tokio::test]
async fn test_set_queue_starts_requested_track() {
    let h = harness();
    h.provider.set_queue(tracks(&["a", "b", "c"]), 2).await.unwrap();

    assert_eq!(h.provider.current_track().unwrap().id, "c");
    assert!(h.transport.calls().contains(&"load:https://cdn.test/c.mp3".to_string()));

    let err = h.provider.set_queue(tracks(&["x"]), 4).await.unwrap_err();
    assert_eq!(err, PlaybackError::QueueIndexOutOfRange { index: 4, len: 1 });
    // Rejected queue leaves the old one in place
    assert_eq!(h.provider.queue_items().len(), 3);
}

#[tokio::test]
async fn test_add_to_queue_shifts_active_index() {
    let h = harness();
    h.provider.set_queue(tracks(&["a", "b"]), 1).await.unwrap();
    h.transport.forget_calls();

    h.provider.add_to_queue(tracks(&["x"]), Some(0)).await.unwrap();
    h.provider.add_to_queue(tracks(&["y"]), None).await.unwrap();

    let items = h.provider.queue_items();
    let order: Vec<&str> = items.iter().map(|i| i.track.id.as_str()).collect();
    assert_eq!(order, vec!["x", "a", "b", "y"]);
    assert!(items[2].is_active);
    assert_eq!(h.provider.current_track().unwrap().id, "b");
    assert!(h.transport.calls().is_empty());
}

#[tokio::test]
async fn test_remove_current_resets_to_idle() {
    let h = harness();
    h.provider.set_queue(tracks(&["a", "b", "c"]), 1).await.unwrap();
    h.provider.seek(Duration::from_secs(12)).await.unwrap();

    h.provider.remove_from_queue(1).await.unwrap();

    let state = h.provider.snapshot();
    assert!(state.current_track.is_none());
    assert_eq!(state.position, Duration::ZERO);
    assert_eq!(state.status, PlaybackStatus::Idle);
    assert_eq!(state.queue.len(), 2);
    assert!(state.is_consistent());
}

#[tokio::test]
async fn test_skip_to_previous_restart_rule() {
    let h = harness();
    h.provider.set_queue(tracks(&["a", "b"]), 1).await.unwrap();

    h.provider.seek(Duration::from_secs(5)).await.unwrap();
    h.provider.skip_to_previous().await.unwrap();
    assert_eq!(h.provider.snapshot().current_index, Some(1));
    assert_eq!(h.provider.position(), Duration::ZERO);

    h.provider.seek(Duration::from_secs(2)).await.unwrap();
    h.provider.skip_to_previous().await.unwrap();
    assert_eq!(h.provider.snapshot().current_index, Some(0));

    // At the head of the queue it restarts instead
    h.provider.skip_to_previous().await.unwrap();
    assert_eq!(h.provider.snapshot().current_index, Some(0));
}

#[tokio::test]
async fn test_skip_to_next_at_end_stops() {
    let h = harness();
    h.provider.set_queue(tracks(&["a", "b"]), 0).await.unwrap();

    h.provider.skip_to_next().await.unwrap();
    assert_eq!(h.provider.current_track().unwrap().id, "b");

    let err = h.provider.skip_to_next().await.unwrap_err();
    assert_eq!(err, PlaybackError::NoNextTrack);
    assert!(h.provider.current_track().is_none());
    assert_eq!(h.provider.status(), PlaybackStatus::Idle);
}

#[tokio::test]
async fn test_skip_to_next_wraps_with_repeat_all() {
    let h = harness();
    h.provider.set_queue(tracks(&["a", "b"]), 1).await.unwrap();
    assert_eq!(h.provider.cycle_repeat_mode().await, RepeatMode::One);
    assert_eq!(h.provider.cycle_repeat_mode().await, RepeatMode::All);

    h.provider.skip_to_next().await.unwrap();
    assert_eq!(h.provider.snapshot().current_index, Some(0));
}

#[tokio::test]
async fn test_skip_to_validates_index() {
    let h = harness();
    h.provider.set_queue(tracks(&["a", "b", "c"]), 0).await.unwrap();
    h.provider.skip_to(2).await.unwrap();
    assert_eq!(h.provider.current_track().unwrap().id, "c");
    assert!(h.provider.skip_to(3).await.unwrap_err().is_invalid_state());
}

#[tokio::test]
async fn test_shuffle_round_trip() {
    let h = harness();
    let order = ["a", "b", "c", "d", "e", "f"];
    h.provider.set_queue(tracks(&order), 2).await.unwrap();

    assert!(h.provider.toggle_shuffle().await);
    assert_eq!(h.provider.current_track().unwrap().id, "c");
    assert_eq!(h.provider.snapshot().current_index, Some(0));

    assert!(!h.provider.toggle_shuffle().await);
    let restored: Vec<String> = h
        .provider
        .queue_items()
        .into_iter()
        .map(|i| i.track.id)
        .collect();
    assert_eq!(restored, order.to_vec());
    assert_eq!(h.provider.snapshot().current_index, Some(2));
}

#[tokio::test]
async fn test_rapid_skips_apply_in_call_order() {
    let h = harness_with(FakeTransport::with_load_delay(Duration::from_millis(20)));
    h.provider.set_queue(tracks(&["a", "b", "c"]), 0).await.unwrap();
    h.transport.forget_calls();

    let (next, previous) = tokio::join!(h.provider.skip_to_next(), h.provider.skip_to_previous());
    next.unwrap();
    previous.unwrap();

    assert_eq!(
        h.transport.calls(),
        vec![
            "reset",
            "load:https://cdn.test/b.mp3",
            "play",
            "reset",
            "load:https://cdn.test/a.mp3",
            "play",
        ]
    );
    let state = h.provider.snapshot();
    assert_eq!(state.current_index, Some(0));
    assert!(state.is_consistent());
}

#[tokio::test]
async fn test_resolver_failure_surfaces_as_error() {
    let mut resolver = MockResolver::new();
    resolver
        .expect_resolve()
        .returning(|_| Err(PlaybackError::NoTrackLoaded));
    let provider = PlaybackProvider::new(
        FakeTransport::new(),
        Arc::new(resolver),
        EventBus::new(16),
        PlaybackConfig::default(),
    );

    let err = provider.set_queue(tracks(&["a"]), 0).await.unwrap_err();
    assert!(matches!(err, PlaybackError::StreamResolution { .. }));
    assert_eq!(provider.status(), PlaybackStatus::Error);
}

// ============================================================================
// Transport callbacks
// ============================================================================

#[tokio::test]
async fn test_track_end_advances_and_wraps_silently() {
    let mut h = harness();
    h.provider.on_initialize().await.unwrap();
    h.provider.set_queue(tracks(&["a", "b"]), 0).await.unwrap();
    h.provider.set_repeat_mode(RepeatMode::All).await;

    h.transport.emit(TransportEvent::QueueEnded);
    wait_until(|| h.provider.snapshot().current_index == Some(1)).await;

    h.drain();
    h.transport.emit(TransportEvent::QueueEnded);
    wait_until(|| h.provider.snapshot().current_index == Some(0)).await;

    let kinds = h.kinds();
    assert!(!kinds.contains(&"ended"));
    assert!(kinds.contains(&"track-change"));
}

#[tokio::test]
async fn test_track_end_without_repeat_reports_ended() {
    let mut h = harness();
    h.provider.on_initialize().await.unwrap();
    h.provider.set_queue(tracks(&["a"]), 0).await.unwrap();
    h.drain();

    h.transport.emit(TransportEvent::QueueEnded);
    wait_until(|| h.provider.current_track().is_none()).await;

    assert!(h.kinds().contains(&"ended"));
}

#[tokio::test]
async fn test_repeat_one_restarts_track() {
    let h = harness();
    h.provider.on_initialize().await.unwrap();
    h.provider.set_queue(tracks(&["a", "b"]), 0).await.unwrap();
    h.provider.set_repeat_mode(RepeatMode::One).await;
    h.provider.seek(Duration::from_secs(150)).await.unwrap();
    h.transport.forget_calls();

    h.transport.emit(TransportEvent::QueueEnded);
    wait_until(|| h.transport.calls().len() >= 2).await;

    assert_eq!(h.transport.calls(), vec!["seek:0", "play"]);
    assert_eq!(h.provider.snapshot().current_index, Some(0));
    assert_eq!(h.provider.position(), Duration::ZERO);
}

#[tokio::test]
async fn test_progress_callbacks_update_state() {
    let mut h = harness();
    h.provider.on_initialize().await.unwrap();
    h.provider.set_queue(tracks(&["a"]), 0).await.unwrap();
    h.drain();

    h.transport.emit(TransportEvent::Progress {
        position: Duration::from_secs(10),
        duration: Duration::from_secs(200),
        buffered: Duration::from_secs(30),
    });
    wait_until(|| h.provider.position() == Duration::from_secs(10)).await;

    // Duration matches the track metadata: no duration-change
    assert_eq!(h.kinds(), vec!["position-change"]);
}

// ============================================================================
// Registry integration
// ============================================================================

#[tokio::test]
async fn test_provider_runs_as_registry_plugin() {
    let registry = PluginRegistry::new(RegistryConfig::default());
    let transport = FakeTransport::new();
    let bus = EventBus::new(16);
    let resolver = cdn_resolver();

    registry
        .register(PlaybackProvider::manifest(), move |_| {
            Ok(Arc::new(PlaybackProvider::new(
                transport,
                resolver,
                bus,
                PlaybackConfig::default(),
            )))
        })
        .unwrap();

    let id = core_playback::PLAYBACK_PROVIDER_ID;
    registry.initialize(id).await.unwrap();
    registry.activate(id).await.unwrap();
    assert!(registry.is_active(id));

    let provider = registry.get_plugin_as::<PlaybackProvider>(id).unwrap();
    provider.set_queue(tracks(&["a"]), 0).await.unwrap();
    assert_eq!(provider.status(), PlaybackStatus::Playing);

    registry.deactivate(id).await.unwrap();
    assert_eq!(provider.status(), PlaybackStatus::Paused);
}
