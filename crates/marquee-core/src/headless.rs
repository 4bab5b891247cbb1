//! Headless implementations of the host seams
//!
//! [`HeadlessSurface`], [`HeadlessFullscreen`] and [`ScriptedEngine`] keep
//! their state in memory, record the calls made on them and let a driver
//! inject events. The CLI uses them to dry-run sessions; the test suites use
//! them as the host.

use crate::{
    config::StreamConfig,
    engine::{AdaptiveEngine, EngineError, EngineEvent, EngineListener, EngineProvider},
    subscription::{lock_unpoisoned, ListenerSet, Subscription},
    surface::{
        FullscreenListener, FullscreenPlatform, MediaError, PlaybackSurface, SurfaceEvent,
        SurfaceListener,
    },
    SurfaceId,
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::debug;

// =============================================================================
// Fullscreen
// =============================================================================

/// In-memory document fullscreen state
#[derive(Default)]
pub struct HeadlessFullscreen {
    fullscreen: Mutex<bool>,
    listeners: ListenerSet<FullscreenListener>,
}

impl HeadlessFullscreen {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Change the flag as platform UI would (for example the Escape key)
    pub fn set_fullscreen(&self, fullscreen: bool) {
        {
            let mut current = lock_unpoisoned(&self.fullscreen);
            if *current == fullscreen {
                return;
            }
            *current = fullscreen;
        }
        for listener in self.listeners.snapshot() {
            listener(fullscreen);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

#[async_trait]
impl FullscreenPlatform for HeadlessFullscreen {
    fn is_fullscreen(&self) -> bool {
        *lock_unpoisoned(&self.fullscreen)
    }

    async fn exit_fullscreen(&self) -> std::result::Result<(), String> {
        self.set_fullscreen(false);
        Ok(())
    }

    fn subscribe(&self, listener: FullscreenListener) -> Subscription {
        self.listeners.add(listener)
    }
}

// =============================================================================
// Surface
// =============================================================================

#[derive(Debug)]
struct SurfaceState {
    source: Option<String>,
    poster: Option<String>,
    current_time: f64,
    duration: f64,
    volume: f64,
    paused: bool,
    media_error: Option<MediaError>,
    play_requests: usize,
    fullscreen_requests: usize,
    reject_play: Option<String>,
    reject_fullscreen: Option<String>,
}

impl Default for SurfaceState {
    fn default() -> Self {
        Self {
            source: None,
            poster: None,
            current_time: 0.0,
            duration: f64::NAN,
            volume: 1.0,
            paused: true,
            media_error: None,
            play_requests: 0,
            fullscreen_requests: 0,
            reject_play: None,
            reject_fullscreen: None,
        }
    }
}

/// In-memory media element
pub struct HeadlessSurface {
    id: SurfaceId,
    native_types: Vec<String>,
    state: Mutex<SurfaceState>,
    listeners: ListenerSet<SurfaceListener>,
    fullscreen: Option<Arc<HeadlessFullscreen>>,
}

impl HeadlessSurface {
    /// A surface with no native stream support
    pub fn new() -> Arc<Self> {
        Arc::new(Self::build(Vec::new(), None))
    }

    /// A surface that natively decodes the given MIME types
    pub fn with_native_types<I, S>(types: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self::build(types.into_iter().map(Into::into).collect(), None))
    }

    /// A surface whose fullscreen requests drive `platform`
    pub fn with_fullscreen(native_types: Vec<String>, platform: Arc<HeadlessFullscreen>) -> Arc<Self> {
        Arc::new(Self::build(native_types, Some(platform)))
    }

    fn build(native_types: Vec<String>, fullscreen: Option<Arc<HeadlessFullscreen>>) -> Self {
        Self {
            id: SurfaceId::new(),
            native_types,
            state: Mutex::new(SurfaceState::default()),
            listeners: ListenerSet::new(),
            fullscreen,
        }
    }

    /// Deliver an event to subscribers
    pub fn emit(&self, event: SurfaceEvent) {
        for listener in self.listeners.snapshot() {
            listener(event);
        }
    }

    pub fn set_duration(&self, duration: f64) {
        lock_unpoisoned(&self.state).duration = duration;
    }

    /// Move the playhead forward as playback would
    pub fn advance(&self, seconds: f64) {
        let mut state = lock_unpoisoned(&self.state);
        let next = state.current_time + seconds;
        state.current_time = if state.duration.is_finite() {
            next.min(state.duration)
        } else {
            next
        };
    }

    /// Set a media error and emit `Error`
    pub fn fail(&self, code: u16, message: impl Into<String>) {
        lock_unpoisoned(&self.state).media_error = Some(MediaError {
            code,
            message: message.into(),
        });
        self.emit(SurfaceEvent::Error);
    }

    /// First frame available: clears the media error and emits `LoadedData`
    pub fn finish_loading(&self) {
        lock_unpoisoned(&self.state).media_error = None;
        self.emit(SurfaceEvent::LoadedData);
    }

    /// Reject future `play()` calls with `reason`; `None` accepts them again
    pub fn reject_play(&self, reason: Option<&str>) {
        lock_unpoisoned(&self.state).reject_play = reason.map(str::to_string);
    }

    pub fn reject_fullscreen(&self, reason: Option<&str>) {
        lock_unpoisoned(&self.state).reject_fullscreen = reason.map(str::to_string);
    }

    pub fn source(&self) -> Option<String> {
        lock_unpoisoned(&self.state).source.clone()
    }

    pub fn poster(&self) -> Option<String> {
        lock_unpoisoned(&self.state).poster.clone()
    }

    pub fn is_paused(&self) -> bool {
        lock_unpoisoned(&self.state).paused
    }

    pub fn play_requests(&self) -> usize {
        lock_unpoisoned(&self.state).play_requests
    }

    pub fn fullscreen_requests(&self) -> usize {
        lock_unpoisoned(&self.state).fullscreen_requests
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

#[async_trait]
impl PlaybackSurface for HeadlessSurface {
    fn id(&self) -> SurfaceId {
        self.id
    }

    fn can_play_type(&self, mime: &str) -> bool {
        self.native_types.iter().any(|t| t.eq_ignore_ascii_case(mime))
    }

    fn set_source(&self, url: Option<&str>) {
        {
            let mut state = lock_unpoisoned(&self.state);
            state.source = url.map(str::to_string);
            state.current_time = 0.0;
            state.duration = f64::NAN;
            state.paused = true;
        }
        if url.is_some() {
            self.emit(SurfaceEvent::LoadStart);
        }
    }

    fn set_poster(&self, poster_url: Option<&str>) {
        lock_unpoisoned(&self.state).poster = poster_url.map(str::to_string);
    }

    async fn play(&self) -> std::result::Result<(), String> {
        let rejection = {
            let mut state = lock_unpoisoned(&self.state);
            state.play_requests += 1;
            match state.reject_play.clone() {
                Some(reason) => Some(reason),
                None => {
                    state.paused = false;
                    None
                }
            }
        };

        match rejection {
            Some(reason) => Err(reason),
            None => {
                self.emit(SurfaceEvent::Play);
                Ok(())
            }
        }
    }

    fn pause(&self) {
        let was_playing = {
            let mut state = lock_unpoisoned(&self.state);
            let was_playing = !state.paused;
            state.paused = true;
            was_playing
        };
        if was_playing {
            self.emit(SurfaceEvent::Pause);
        }
    }

    fn current_time(&self) -> f64 {
        lock_unpoisoned(&self.state).current_time
    }

    fn set_current_time(&self, time: f64) {
        let mut state = lock_unpoisoned(&self.state);
        let upper = if state.duration.is_finite() { state.duration } else { f64::MAX };
        state.current_time = time.clamp(0.0, upper);
    }

    fn duration(&self) -> f64 {
        lock_unpoisoned(&self.state).duration
    }

    fn volume(&self) -> f64 {
        lock_unpoisoned(&self.state).volume
    }

    fn set_volume(&self, volume: f64) {
        lock_unpoisoned(&self.state).volume = volume;
    }

    async fn request_fullscreen(&self) -> std::result::Result<(), String> {
        let rejection = {
            let mut state = lock_unpoisoned(&self.state);
            state.fullscreen_requests += 1;
            state.reject_fullscreen.clone()
        };

        if let Some(reason) = rejection {
            return Err(reason);
        }
        if let Some(platform) = &self.fullscreen {
            platform.set_fullscreen(true);
        }
        Ok(())
    }

    fn media_error(&self) -> Option<MediaError> {
        lock_unpoisoned(&self.state).media_error.clone()
    }

    fn subscribe(&self, listener: SurfaceListener) -> Subscription {
        self.listeners.add(listener)
    }
}

// =============================================================================
// Engine
// =============================================================================

#[derive(Debug, Default)]
struct EngineState {
    source: Option<String>,
    media_attached: bool,
    loading: bool,
    destroyed: bool,
    start_load_calls: usize,
    stop_load_calls: usize,
    recover_calls: usize,
}

/// Engine driven by explicit event injection
pub struct ScriptedEngine {
    config: StreamConfig,
    state: Mutex<EngineState>,
    listeners: ListenerSet<EngineListener>,
}

impl ScriptedEngine {
    pub fn new(config: StreamConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            state: Mutex::new(EngineState::default()),
            listeners: ListenerSet::new(),
        })
    }

    /// Deliver an event to subscribers; a destroyed engine stays silent
    pub fn emit(&self, event: EngineEvent) {
        if self.is_destroyed() {
            return;
        }
        for listener in self.listeners.snapshot() {
            listener(&event);
        }
    }

    pub fn emit_error(&self, error: EngineError) {
        self.emit(EngineEvent::Error(error));
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn source(&self) -> Option<String> {
        lock_unpoisoned(&self.state).source.clone()
    }

    pub fn is_media_attached(&self) -> bool {
        lock_unpoisoned(&self.state).media_attached
    }

    pub fn is_loading(&self) -> bool {
        lock_unpoisoned(&self.state).loading
    }

    pub fn is_destroyed(&self) -> bool {
        lock_unpoisoned(&self.state).destroyed
    }

    pub fn start_load_calls(&self) -> usize {
        lock_unpoisoned(&self.state).start_load_calls
    }

    pub fn stop_load_calls(&self) -> usize {
        lock_unpoisoned(&self.state).stop_load_calls
    }

    pub fn recover_calls(&self) -> usize {
        lock_unpoisoned(&self.state).recover_calls
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl AdaptiveEngine for ScriptedEngine {
    fn load_source(&self, url: &str) {
        let mut state = lock_unpoisoned(&self.state);
        state.source = Some(url.to_string());
        state.loading = true;
    }

    fn attach_media(&self, _surface: Arc<dyn PlaybackSurface>) {
        lock_unpoisoned(&self.state).media_attached = true;
        self.emit(EngineEvent::MediaAttached);
    }

    fn start_load(&self) {
        let mut state = lock_unpoisoned(&self.state);
        state.start_load_calls += 1;
        state.loading = true;
    }

    fn stop_load(&self) {
        let mut state = lock_unpoisoned(&self.state);
        state.stop_load_calls += 1;
        state.loading = false;
    }

    fn recover_media_error(&self) {
        lock_unpoisoned(&self.state).recover_calls += 1;
    }

    fn destroy(&self) {
        {
            let mut state = lock_unpoisoned(&self.state);
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.loading = false;
            state.media_attached = false;
        }
        self.listeners.clear();
        debug!("Scripted engine destroyed");
    }

    fn subscribe(&self, listener: EngineListener) -> Subscription {
        self.listeners.add(listener)
    }
}

/// Provider handing out [`ScriptedEngine`]s and remembering them
pub struct ScriptedEngineProvider {
    supported: bool,
    created: Mutex<Vec<Arc<ScriptedEngine>>>,
}

impl ScriptedEngineProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            supported: true,
            created: Mutex::new(Vec::new()),
        })
    }

    /// A provider whose platform lacks the APIs the library needs
    pub fn unsupported() -> Arc<Self> {
        Arc::new(Self {
            supported: false,
            created: Mutex::new(Vec::new()),
        })
    }

    pub fn created_count(&self) -> usize {
        lock_unpoisoned(&self.created).len()
    }

    pub fn last_engine(&self) -> Option<Arc<ScriptedEngine>> {
        lock_unpoisoned(&self.created).last().cloned()
    }

    /// Engines created and not yet destroyed
    pub fn live_engines(&self) -> usize {
        lock_unpoisoned(&self.created)
            .iter()
            .filter(|engine| !engine.is_destroyed())
            .count()
    }
}

impl EngineProvider for ScriptedEngineProvider {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn create(&self, config: &StreamConfig) -> Arc<dyn AdaptiveEngine> {
        let engine = ScriptedEngine::new(config.clone());
        lock_unpoisoned(&self.created).push(engine.clone());
        engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::HLS_MIME_TYPE;

    #[test]
    fn test_surface_native_types() {
        let surface = HeadlessSurface::with_native_types([HLS_MIME_TYPE]);
        assert!(surface.can_play_type("application/vnd.apple.mpegURL"));
        assert!(!HeadlessSurface::new().can_play_type(HLS_MIME_TYPE));
    }

    #[test]
    fn test_surface_seek_clamped_to_duration() {
        let surface = HeadlessSurface::new();
        surface.set_duration(120.0);
        surface.set_current_time(500.0);
        assert_eq!(surface.current_time(), 120.0);
        surface.set_current_time(-4.0);
        assert_eq!(surface.current_time(), 0.0);
    }

    #[tokio::test]
    async fn test_surface_play_rejection() {
        let surface = HeadlessSurface::new();
        surface.reject_play(Some("NotAllowedError"));
        assert_eq!(surface.play().await, Err("NotAllowedError".to_string()));
        assert!(surface.is_paused());
        assert_eq!(surface.play_requests(), 1);
    }

    #[test]
    fn test_destroyed_engine_is_silent() {
        let engine = ScriptedEngine::new(StreamConfig::default());
        let hits = Arc::new(Mutex::new(0));
        let counter = hits.clone();
        let _sub = engine.subscribe(Arc::new(move |_: &EngineEvent| *counter.lock().unwrap() += 1));

        engine.emit(EngineEvent::ManifestParsed { levels: 2 });
        engine.destroy();
        engine.emit(EngineEvent::ManifestParsed { levels: 2 });

        assert_eq!(*hits.lock().unwrap(), 1);
        assert_eq!(engine.listener_count(), 0);
    }

    #[test]
    fn test_fullscreen_change_notifies() {
        let platform = HeadlessFullscreen::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let _sub = platform.subscribe(Arc::new(move |fs: bool| log.lock().unwrap().push(fs)));

        platform.set_fullscreen(true);
        platform.set_fullscreen(true);
        platform.set_fullscreen(false);

        assert_eq!(*seen.lock().unwrap(), vec![true, false]);
    }
}
