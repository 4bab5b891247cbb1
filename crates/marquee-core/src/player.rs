//! Video player component
//!
//! [`VideoPlayer`] owns everything bound to one surface: the session manager,
//! the state store, the controller and the control bar. Loading a new source
//! always disposes the previous session before the replacement is attached.

use crate::{
    config::PlayerConfig,
    controller::PlaybackController,
    controls::TransportControls,
    engine::EngineProvider,
    messages::Messages,
    session::{ErrorCallback, StreamSession, StreamSessionManager},
    state_store::PlaybackStateStore,
    subscription::TeardownList,
    surface::{FullscreenPlatform, PlaybackSurface, SurfaceEvent},
    EngineKind, Error, PlaybackSource, Result, TransportState,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, instrument};

/// Host notification without payload
pub type Callback = Arc<dyn Fn() + Send + Sync>;

/// Host callbacks for player events
#[derive(Clone, Default)]
pub struct PlayerCallbacks {
    pub on_error: Option<ErrorCallback>,
    pub on_load_start: Option<Callback>,
    pub on_loaded_data: Option<Callback>,
    pub on_play: Option<Callback>,
    pub on_pause: Option<Callback>,
    pub on_ended: Option<Callback>,
}

impl PlayerCallbacks {
    pub fn on_error(mut self, callback: impl Fn(&Error) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub fn on_load_start(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_load_start = Some(Arc::new(callback));
        self
    }

    pub fn on_loaded_data(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_loaded_data = Some(Arc::new(callback));
        self
    }

    pub fn on_play(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_play = Some(Arc::new(callback));
        self
    }

    pub fn on_pause(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_pause = Some(Arc::new(callback));
        self
    }

    pub fn on_ended(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_ended = Some(Arc::new(callback));
        self
    }

    fn dispatch(&self, event: SurfaceEvent, surface: &dyn PlaybackSurface, messages: &Messages) {
        let callback = match event {
            SurfaceEvent::LoadStart => &self.on_load_start,
            SurfaceEvent::LoadedData => &self.on_loaded_data,
            SurfaceEvent::Play => &self.on_play,
            SurfaceEvent::Pause => &self.on_pause,
            SurfaceEvent::Ended => &self.on_ended,
            SurfaceEvent::Error => {
                if let (Some(on_error), Some(media_error)) = (&self.on_error, surface.media_error()) {
                    on_error(&Error::MediaIssue(messages.surface_error(Some(&media_error.message))));
                }
                return;
            }
            SurfaceEvent::TimeUpdate => return,
        };
        if let Some(callback) = callback {
            callback();
        }
    }
}

/// What the host should draw over the surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Overlay {
    None,
    Loading { label: String },
    Error { title: String, message: String },
}

/// One surface with its session, state and controls
pub struct VideoPlayer {
    surface: Arc<dyn PlaybackSurface>,
    fullscreen: Option<Arc<dyn FullscreenPlatform>>,
    messages: Messages,
    manager: StreamSessionManager,
    store: PlaybackStateStore,
    controller: PlaybackController,
    controls: TransportControls,
    subscriptions: TeardownList,
}

impl VideoPlayer {
    /// Build a player. Without a provider only native playback is possible.
    pub fn new(
        config: PlayerConfig,
        surface: Arc<dyn PlaybackSurface>,
        fullscreen: Option<Arc<dyn FullscreenPlatform>>,
        provider: Option<Arc<dyn EngineProvider>>,
        callbacks: PlayerCallbacks,
    ) -> Result<Self> {
        config.validate()?;

        let messages = Messages::for_locale(config.locale);
        let mut manager = StreamSessionManager::new(config.stream.clone(), provider).with_messages(messages);
        if let Some(on_error) = &callbacks.on_error {
            manager = manager.with_error_callback(on_error.clone());
        }

        let store = PlaybackStateStore::new(messages, config.poll_interval());
        let controller = manager.controller(surface.id());
        let mut controls = TransportControls::new(controller.clone(), store.subscribe(), config.controls.clone());
        if let Some(platform) = &fullscreen {
            controls = controls.with_fullscreen(platform.clone());
        }

        let mut subscriptions = TeardownList::new();
        subscriptions.push(manager.subscribe(store.session_listener()));

        let host = callbacks.clone();
        let weak_surface = Arc::downgrade(&surface);
        subscriptions.push(surface.subscribe(Arc::new(move |event: SurfaceEvent| {
            if let Some(surface) = weak_surface.upgrade() {
                host.dispatch(event, surface.as_ref(), &messages);
            }
        })));

        Ok(Self {
            surface,
            fullscreen,
            messages,
            manager,
            store,
            controller,
            controls,
            subscriptions,
        })
    }

    /// Play a new source, replacing the current one
    ///
    /// The state store keeps observing the surface across the swap, so
    /// events the surface fires while the new session attaches are applied
    /// and a rejected source leaves the running session observed.
    #[instrument(skip(self, source), fields(url = %source.url))]
    pub fn load(&mut self, source: PlaybackSource) -> Result<EngineKind> {
        if !self.store.is_attached() {
            self.store.attach(self.surface.clone(), self.fullscreen.clone());
        }
        let engine_kind = self.manager.attach(source, self.surface.clone())?.engine_kind();
        info!(engine_kind = %engine_kind, "Source loaded");
        Ok(engine_kind)
    }

    /// Stop playback and release the session, listeners and timers
    pub fn unload(&mut self) {
        self.manager.dispose(self.surface.id());
        self.store.release();
        self.controls.release();
    }

    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    pub fn controls(&self) -> &TransportControls {
        &self.controls
    }

    pub fn session(&self) -> Option<&StreamSession> {
        self.manager.session(self.surface.id())
    }

    pub fn surface(&self) -> &Arc<dyn PlaybackSurface> {
        &self.surface
    }

    pub fn state(&self) -> TransportState {
        self.store.snapshot()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<TransportState> {
        self.store.subscribe()
    }

    pub async fn toggle_fullscreen(&self) -> Result<()> {
        self.controls.toggle_fullscreen().await
    }

    pub fn clear_error(&self) {
        self.store.clear_error();
    }

    /// Sample the surface now instead of waiting for the poll
    pub fn refresh(&self) {
        self.store.reconcile(self.surface.as_ref(), self.fullscreen.as_deref());
    }

    pub fn overlay(&self) -> Overlay {
        let state = self.store.snapshot();
        if let Some(message) = state.error {
            return Overlay::Error {
                title: self.messages.error_title.to_string(),
                message,
            };
        }
        if state.is_loading {
            return Overlay::Loading {
                label: self.messages.loading.to_string(),
            };
        }
        Overlay::None
    }
}

impl Drop for VideoPlayer {
    fn drop(&mut self) {
        self.unload();
        self.subscriptions.run();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessFullscreen, HeadlessSurface, ScriptedEngineProvider};
    use crate::surface::HLS_MIME_TYPE;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_native_load_and_overlay() {
        let surface = HeadlessSurface::with_native_types([HLS_MIME_TYPE]);
        let mut player = VideoPlayer::new(
            PlayerConfig::default(),
            surface.clone(),
            None,
            None,
            PlayerCallbacks::default(),
        )
        .unwrap();

        let kind = player.load(PlaybackSource::new("https://cdn.example.com/a/index.m3u8")).unwrap();
        assert_eq!(kind, EngineKind::NativeCapable);
        assert_eq!(
            player.overlay(),
            Overlay::Loading {
                label: "Đang tải video...".into()
            }
        );

        surface.finish_loading();
        assert_eq!(player.overlay(), Overlay::None);
    }

    #[tokio::test]
    async fn test_store_observes_surface_during_source_swap() {
        let surface = HeadlessSurface::with_native_types([HLS_MIME_TYPE]);
        let mut player = VideoPlayer::new(
            PlayerConfig::default(),
            surface.clone(),
            None,
            None,
            PlayerCallbacks::default(),
        )
        .unwrap();
        player.load(PlaybackSource::new("https://cdn.example.com/a/index.m3u8")).unwrap();

        // Listeners on the surface at the moment the new source starts loading
        let counts = Arc::new(Mutex::new(Vec::new()));
        let (log, weak_surface) = (counts.clone(), Arc::downgrade(&surface));
        let _sub = surface.subscribe(Arc::new(move |event: SurfaceEvent| {
            if let (SurfaceEvent::LoadStart, Some(surface)) = (event, weak_surface.upgrade()) {
                log.lock().unwrap().push(surface.listener_count());
            }
        }));

        player.load(PlaybackSource::new("https://cdn.example.com/b/index.m3u8")).unwrap();

        // Host callbacks, the store and this test
        assert_eq!(*counts.lock().unwrap(), vec![3]);
        assert!(player.state().is_loading);
    }

    #[tokio::test]
    async fn test_rejected_source_keeps_session_observed() {
        let surface = HeadlessSurface::with_native_types([HLS_MIME_TYPE]);
        let mut player = VideoPlayer::new(
            PlayerConfig::default(),
            surface.clone(),
            None,
            None,
            PlayerCallbacks::default(),
        )
        .unwrap();
        player.load(PlaybackSource::new("https://cdn.example.com/a/index.m3u8")).unwrap();

        assert!(matches!(
            player.load(PlaybackSource::new("  ")),
            Err(Error::InvalidSource(_))
        ));
        assert!(player.session().unwrap().is_attached());

        surface.play().await.unwrap();
        assert!(player.state().is_playing);
        surface.pause();
        assert!(!player.state().is_playing);
    }

    #[tokio::test]
    async fn test_host_callbacks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (a, b, c) = (seen.clone(), seen.clone(), seen.clone());
        let callbacks = PlayerCallbacks::default()
            .on_play(move || a.lock().unwrap().push("play".to_string()))
            .on_pause(move || b.lock().unwrap().push("pause".to_string()))
            .on_error(move |e| c.lock().unwrap().push(e.to_string()));
        let surface = HeadlessSurface::with_native_types([HLS_MIME_TYPE]);
        let mut player =
            VideoPlayer::new(PlayerConfig::default(), surface.clone(), None, None, callbacks).unwrap();
        player.load(PlaybackSource::new("https://cdn.example.com/a/index.m3u8")).unwrap();

        player.controller().play().await.unwrap();
        player.controller().pause();
        surface.fail(2, "MEDIA_ERR_NETWORK");

        let seen = seen.lock().unwrap();
        assert_eq!(seen[..2], ["play".to_string(), "pause".to_string()]);
        assert!(seen[2].contains("Video error: MEDIA_ERR_NETWORK"));
        assert_eq!(
            player.overlay(),
            Overlay::Error {
                title: "Lỗi phát video".into(),
                message: "Video error: MEDIA_ERR_NETWORK".into()
            }
        );
    }

    #[tokio::test]
    async fn test_clear_error() {
        let surface = HeadlessSurface::with_native_types([HLS_MIME_TYPE]);
        let mut player = VideoPlayer::new(
            PlayerConfig::default(),
            surface.clone(),
            None,
            None,
            PlayerCallbacks::default(),
        )
        .unwrap();
        player.load(PlaybackSource::new("https://cdn.example.com/a/index.m3u8")).unwrap();

        surface.fail(4, "MEDIA_ERR_SRC_NOT_SUPPORTED");
        assert!(player.state().error.is_some());
        player.clear_error();
        assert_eq!(player.state().error, None);
    }

    #[tokio::test]
    async fn test_toggle_fullscreen_round_trip() {
        let platform = HeadlessFullscreen::new();
        let surface = HeadlessSurface::with_fullscreen(vec![HLS_MIME_TYPE.to_string()], platform.clone());
        let mut player = VideoPlayer::new(
            PlayerConfig::default(),
            surface.clone(),
            Some(platform.clone()),
            None,
            PlayerCallbacks::default(),
        )
        .unwrap();
        player.load(PlaybackSource::new("https://cdn.example.com/a/index.m3u8")).unwrap();

        player.toggle_fullscreen().await.unwrap();
        assert!(player.state().is_fullscreen);
        player.toggle_fullscreen().await.unwrap();
        assert!(!player.state().is_fullscreen);
        assert_eq!(surface.fullscreen_requests(), 1);
    }

    #[tokio::test]
    async fn test_unload_releases_everything() {
        let provider = ScriptedEngineProvider::new();
        let surface = HeadlessSurface::new();
        let mut player = VideoPlayer::new(
            PlayerConfig::default(),
            surface.clone(),
            None,
            Some(provider.clone()),
            PlayerCallbacks::default(),
        )
        .unwrap();
        player.load(PlaybackSource::new("https://cdn.example.com/a/index.m3u8")).unwrap();
        // Store listener plus host callbacks
        assert_eq!(surface.listener_count(), 2);

        player.unload();
        assert_eq!(provider.live_engines(), 0);
        assert_eq!(surface.listener_count(), 1);
        assert!(!player.controller().is_attached());

        drop(player);
        assert_eq!(surface.listener_count(), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = PlayerConfig::default();
        config.controls.edge_zone_fraction = 0.7;
        let result = VideoPlayer::new(config, HeadlessSurface::new(), None, None, PlayerCallbacks::default());
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }
}
