//! Reactive transport state
//!
//! [`PlaybackStateStore`] folds three inputs into one [`TransportState`]
//! slot published over a `tokio::sync::watch` channel:
//!
//! ```text
//!   surface events ──┐
//!   fullscreen change ┼──► reconcile ──► watch<TransportState> ──► UI
//!   1 Hz poll ───────┘                ▲
//!   session events ───────────────────┘
//! ```
//!
//! Everything acquired by [`PlaybackStateStore::attach`] is released by
//! [`PlaybackStateStore::release`], on a fatal session error, and on drop.

use crate::{
    finite_or_zero,
    messages::Messages,
    normalize_volume,
    session::{SessionEvent, SessionListener},
    subscription::{lock_unpoisoned, Subscription, TeardownList},
    surface::{FullscreenPlatform, PlaybackSurface, SurfaceEvent},
    EngineKind, SurfaceId, TransportState,
};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

struct StoreInner {
    state: watch::Sender<TransportState>,
    messages: Messages,
    attachment: Mutex<TeardownList>,
    /// Surface whose session events this store follows
    surface_id: Mutex<Option<SurfaceId>>,
}

impl StoreInner {
    fn update(&self, apply: impl FnOnce(&mut TransportState)) {
        self.state.send_if_modified(|state| {
            let before = state.clone();
            apply(state);
            *state != before
        });
    }

    fn release(&self) {
        let mut attachment = lock_unpoisoned(&self.attachment).take();
        if !attachment.is_empty() {
            debug!(released = attachment.len(), "Releasing state store attachment");
        }
        attachment.run();
    }

    /// Sample the live surface. Poll reads always reflect the surface at
    /// sample time, so they never regress an event-derived value.
    fn reconcile(&self, surface: &dyn PlaybackSurface, fullscreen: Option<&dyn FullscreenPlatform>) {
        let duration = finite_or_zero(surface.duration());
        let mut current_time = finite_or_zero(surface.current_time());
        if duration > 0.0 {
            current_time = current_time.min(duration);
        }
        let volume = normalize_volume(surface.volume());
        let is_fullscreen = fullscreen.map(|f| f.is_fullscreen());

        self.update(|state| {
            state.current_time = current_time;
            state.duration = duration;
            state.volume = volume;
            if let Some(is_fullscreen) = is_fullscreen {
                state.is_fullscreen = is_fullscreen;
            }
        });
    }

    fn on_surface_event(&self, event: SurfaceEvent, surface: &dyn PlaybackSurface) {
        match event {
            SurfaceEvent::Play => self.update(|s| s.is_playing = true),
            SurfaceEvent::Pause | SurfaceEvent::Ended => self.update(|s| s.is_playing = false),
            SurfaceEvent::LoadStart => self.update(|s| s.is_loading = true),
            SurfaceEvent::LoadedData => self.update(|s| {
                s.is_loading = false;
                s.error = None;
            }),
            SurfaceEvent::Error => {
                if let Some(media_error) = surface.media_error() {
                    let message = self.messages.surface_error(Some(&media_error.message));
                    warn!(code = media_error.code, message = %media_error.message, "Surface reported an error");
                    self.update(|s| {
                        s.error = Some(message);
                        s.is_loading = false;
                    });
                }
            }
            SurfaceEvent::TimeUpdate => self.reconcile(surface, None),
        }
    }

    fn on_session_event(&self, event: &SessionEvent) {
        if *lock_unpoisoned(&self.surface_id) != Some(event.surface_id()) {
            return;
        }

        match event {
            SessionEvent::Loading { .. } => self.update(|s| {
                s.is_loading = true;
                s.is_playing = false;
                s.error = None;
            }),
            // Native loading ends with the surface's `LoadedData`
            SessionEvent::Ready {
                engine_kind: EngineKind::LibraryDriven,
                ..
            } => self.update(|s| s.is_loading = false),
            SessionEvent::Fatal { message, .. } => {
                let message = message.clone();
                self.update(|s| {
                    s.error = Some(message);
                    s.is_loading = false;
                    s.is_playing = false;
                });
                self.release();
            }
            _ => {}
        }
    }
}

/// Owner of the [`TransportState`] slot for one player
pub struct PlaybackStateStore {
    inner: Arc<StoreInner>,
    poll_interval: Duration,
}

impl PlaybackStateStore {
    pub fn new(messages: Messages, poll_interval: Duration) -> Self {
        let (state, _) = watch::channel(TransportState::default());
        Self {
            inner: Arc::new(StoreInner {
                state,
                messages,
                attachment: Mutex::new(TeardownList::new()),
                surface_id: Mutex::new(None),
            }),
            poll_interval,
        }
    }

    /// Observe a surface: its events, platform fullscreen changes, the
    /// periodic poll and the session events of that surface. Any previous
    /// attachment is released first.
    pub fn attach(
        &self,
        surface: Arc<dyn PlaybackSurface>,
        fullscreen: Option<Arc<dyn FullscreenPlatform>>,
    ) {
        self.inner.release();
        *lock_unpoisoned(&self.inner.surface_id) = Some(surface.id());

        let mut acquired = Vec::new();

        let inner = Arc::downgrade(&self.inner);
        let weak_surface = Arc::downgrade(&surface);
        acquired.push(surface.subscribe(Arc::new(move |event: SurfaceEvent| {
            if let (Some(inner), Some(surface)) = (inner.upgrade(), weak_surface.upgrade()) {
                inner.on_surface_event(event, surface.as_ref());
            }
        })));

        if let Some(platform) = &fullscreen {
            let inner = Arc::downgrade(&self.inner);
            acquired.push(platform.subscribe(Arc::new(move |is_fullscreen: bool| {
                if let Some(inner) = inner.upgrade() {
                    inner.update(|s| s.is_fullscreen = is_fullscreen);
                }
            })));
        }

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let task = runtime.spawn(poll_loop(
                    Arc::downgrade(&self.inner),
                    Arc::downgrade(&surface),
                    fullscreen.as_ref().map(Arc::downgrade),
                    self.poll_interval,
                ));
                acquired.push(Subscription::from_task(task));
            }
            Err(_) => warn!("No async runtime, transport state will not be polled"),
        }

        self.inner.reconcile(surface.as_ref(), fullscreen.as_deref());

        let mut attachment = lock_unpoisoned(&self.inner.attachment);
        for subscription in acquired {
            attachment.push(subscription);
        }
    }

    /// Release every listener and the poll timer. Safe to repeat.
    pub fn release(&self) {
        self.inner.release();
    }

    pub fn is_attached(&self) -> bool {
        !lock_unpoisoned(&self.inner.attachment).is_empty()
    }

    /// Surface the store was last attached to. Session events of other
    /// surfaces are ignored; a released store still follows this one.
    pub fn surface_id(&self) -> Option<SurfaceId> {
        *lock_unpoisoned(&self.inner.surface_id)
    }

    /// Sample the surface now, outside the poll schedule
    pub fn reconcile(&self, surface: &dyn PlaybackSurface, fullscreen: Option<&dyn FullscreenPlatform>) {
        self.inner.reconcile(surface, fullscreen);
    }

    pub fn snapshot(&self) -> TransportState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TransportState> {
        self.inner.state.subscribe()
    }

    pub fn clear_error(&self) {
        self.inner.update(|s| s.error = None);
    }

    /// Listener to register with the session manager; only events of the
    /// attached surface's session are applied
    pub fn session_listener(&self) -> SessionListener {
        let inner = Arc::downgrade(&self.inner);
        Arc::new(move |event: &SessionEvent| {
            if let Some(inner) = inner.upgrade() {
                inner.on_session_event(event);
            }
        })
    }
}

impl Drop for PlaybackStateStore {
    fn drop(&mut self) {
        self.inner.release();
    }
}

async fn poll_loop(
    inner: Weak<StoreInner>,
    surface: Weak<dyn PlaybackSurface>,
    fullscreen: Option<Weak<dyn FullscreenPlatform>>,
    period: Duration,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let (Some(inner), Some(surface)) = (inner.upgrade(), surface.upgrade()) else {
            break;
        };
        let platform = fullscreen.as_ref().and_then(Weak::upgrade);
        inner.reconcile(surface.as_ref(), platform.as_deref());
    }
}
