//! Stream Session Manager - owns the playback path bound to each surface
//!
//! Coordinates:
//! - Choosing the native or library-driven path for a source
//! - Engine creation, configuration and event subscription
//! - Fatal-error recovery and escalation
//! - Teardown of everything a session acquired
//!
//! At most one session is attached to a surface. Attaching a new source
//! disposes the previous session first; disposal is synchronous and
//! idempotent.

use crate::{
    backend::{fail_session, LibraryBackend, NativeBackend, PlaybackBackend},
    config::StreamConfig,
    controller::{ControlBinding, PlaybackController},
    engine::{EngineError, EngineProvider},
    manifest::detect_source_format,
    messages::Messages,
    recovery::{DegradedCause, ErrorClassifier, RecoveryAction, SessionHealth},
    subscription::{lock_unpoisoned, ListenerSet, Subscription, TeardownList},
    surface::PlaybackSurface,
    EngineKind, Error, PlaybackSource, Result, SessionId, StreamErrorKind, SurfaceId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, info, instrument};

/// Notifications about session lifecycle
///
/// Every event names the surface its session is bound to, so one manager
/// can serve several players.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A source is being attached
    Loading {
        session_id: SessionId,
        surface_id: SurfaceId,
    },
    /// The stream is ready to play
    Ready {
        session_id: SessionId,
        surface_id: SurfaceId,
        engine_kind: EngineKind,
    },
    /// A recovery action was started
    Recovering {
        session_id: SessionId,
        surface_id: SurfaceId,
        cause: DegradedCause,
    },
    Recovered {
        session_id: SessionId,
        surface_id: SurfaceId,
    },
    LevelSwitched {
        session_id: SessionId,
        surface_id: SurfaceId,
        level: usize,
    },
    /// The autoplay request was refused; the session stays healthy
    AutoplayRejected {
        session_id: SessionId,
        surface_id: SurfaceId,
        reason: String,
    },
    /// The session ended on an error; `message` is ready for display
    Fatal {
        session_id: SessionId,
        surface_id: SurfaceId,
        kind: StreamErrorKind,
        message: String,
    },
    Disposed {
        session_id: SessionId,
        surface_id: SurfaceId,
    },
}

impl SessionEvent {
    pub fn session_id(&self) -> SessionId {
        match self {
            SessionEvent::Loading { session_id, .. }
            | SessionEvent::Ready { session_id, .. }
            | SessionEvent::Recovering { session_id, .. }
            | SessionEvent::Recovered { session_id, .. }
            | SessionEvent::LevelSwitched { session_id, .. }
            | SessionEvent::AutoplayRejected { session_id, .. }
            | SessionEvent::Fatal { session_id, .. }
            | SessionEvent::Disposed { session_id, .. } => *session_id,
        }
    }

    /// Surface the emitting session is bound to
    pub fn surface_id(&self) -> SurfaceId {
        match self {
            SessionEvent::Loading { surface_id, .. }
            | SessionEvent::Ready { surface_id, .. }
            | SessionEvent::Recovering { surface_id, .. }
            | SessionEvent::Recovered { surface_id, .. }
            | SessionEvent::LevelSwitched { surface_id, .. }
            | SessionEvent::AutoplayRejected { surface_id, .. }
            | SessionEvent::Fatal { surface_id, .. }
            | SessionEvent::Disposed { surface_id, .. } => *surface_id,
        }
    }
}

/// Listener for session events
pub type SessionListener = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Caller-supplied callback for session-fatal errors
pub type ErrorCallback = Arc<dyn Fn(&Error) + Send + Sync>;

#[derive(Debug)]
struct SessionStatus {
    attached: bool,
    classifier: ErrorClassifier,
    last_fatal_error: Option<StreamErrorKind>,
    autoplay_issued: bool,
}

/// State shared between a session and the callbacks it registered
pub(crate) struct SessionShared {
    status: Mutex<SessionStatus>,
    teardown: Mutex<TeardownList>,
}

impl SessionShared {
    fn new() -> Self {
        Self {
            status: Mutex::new(SessionStatus {
                attached: true,
                classifier: ErrorClassifier::new(),
                last_fatal_error: None,
                autoplay_issued: false,
            }),
            teardown: Mutex::new(TeardownList::new()),
        }
    }

    fn register(&self, subscription: Subscription) {
        if !lock_unpoisoned(&self.status).attached {
            subscription.dispose();
            return;
        }
        lock_unpoisoned(&self.teardown).push(subscription);
    }

    /// Returns false if the session was already disposed
    fn dispose(&self) -> bool {
        {
            let mut status = lock_unpoisoned(&self.status);
            if !status.attached {
                return false;
            }
            status.attached = false;
        }

        // Release outside the lock; disposers may re-enter the session
        let mut entries = lock_unpoisoned(&self.teardown).take();
        entries.run();
        true
    }
}

/// Everything a backend needs to run a session
#[derive(Clone)]
pub(crate) struct SessionContext {
    session_id: SessionId,
    surface_id: SurfaceId,
    source: Arc<PlaybackSource>,
    shared: Weak<SessionShared>,
    events: Arc<ListenerSet<SessionListener>>,
    on_error: Option<ErrorCallback>,
    messages: Messages,
}

impl SessionContext {
    pub(crate) fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub(crate) fn surface_id(&self) -> SurfaceId {
        self.surface_id
    }

    pub(crate) fn source(&self) -> &PlaybackSource {
        &self.source
    }

    pub(crate) fn messages(&self) -> &Messages {
        &self.messages
    }

    /// Add a disposer to the session's teardown list
    pub(crate) fn register(&self, subscription: Subscription) {
        match self.shared.upgrade() {
            Some(shared) => shared.register(subscription),
            None => subscription.dispose(),
        }
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        for listener in self.events.snapshot() {
            listener(&event);
        }
    }

    pub(crate) fn report_error(&self, error: &Error) {
        if let Some(callback) = &self.on_error {
            callback(error);
        }
    }

    /// True exactly once per session
    pub(crate) fn claim_autoplay(&self) -> bool {
        let Some(shared) = self.shared.upgrade() else {
            return false;
        };
        let mut status = lock_unpoisoned(&shared.status);
        if status.autoplay_issued || !status.attached {
            return false;
        }
        status.autoplay_issued = true;
        true
    }

    pub(crate) fn classify(&self, error: &EngineError) -> RecoveryAction {
        match self.shared.upgrade() {
            Some(shared) => {
                let mut status = lock_unpoisoned(&shared.status);
                if !status.attached {
                    return RecoveryAction::Ignore;
                }
                status.classifier.on_error(error)
            }
            None => RecoveryAction::Ignore,
        }
    }

    pub(crate) fn record_progress(&self) -> Option<DegradedCause> {
        let shared = self.shared.upgrade()?;
        let mut status = lock_unpoisoned(&shared.status);
        status.classifier.on_progress()
    }

    pub(crate) fn mark_fatal(&self, kind: StreamErrorKind) {
        if let Some(shared) = self.shared.upgrade() {
            lock_unpoisoned(&shared.status).last_fatal_error = Some(kind);
        }
    }

    /// Dispose the session; emits `Disposed` the first time only
    pub(crate) fn dispose(&self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        if shared.dispose() {
            debug!(session_id = %self.session_id, "Session disposed");
            self.emit(SessionEvent::Disposed {
                session_id: self.session_id,
                surface_id: self.surface_id,
            });
        }
    }
}

/// One playback path bound to one surface and one source
pub struct StreamSession {
    id: SessionId,
    surface_id: SurfaceId,
    source: Arc<PlaybackSource>,
    engine_kind: EngineKind,
    shared: Arc<SessionShared>,
    events: Arc<ListenerSet<SessionListener>>,
}

impl StreamSession {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn surface_id(&self) -> SurfaceId {
        self.surface_id
    }

    pub fn source(&self) -> &PlaybackSource {
        &self.source
    }

    pub fn engine_kind(&self) -> EngineKind {
        self.engine_kind
    }

    pub fn is_attached(&self) -> bool {
        lock_unpoisoned(&self.shared.status).attached
    }

    pub fn health(&self) -> SessionHealth {
        lock_unpoisoned(&self.shared.status).classifier.health()
    }

    pub fn last_fatal_error(&self) -> Option<StreamErrorKind> {
        lock_unpoisoned(&self.shared.status).last_fatal_error
    }

    /// Release listeners, loads, timers and the engine. Safe to repeat.
    pub fn dispose(&self) {
        if self.shared.dispose() {
            info!(session_id = %self.id, surface_id = %self.surface_id, "Session disposed");
            let event = SessionEvent::Disposed {
                session_id: self.id,
                surface_id: self.surface_id,
            };
            for listener in self.events.snapshot() {
                listener(&event);
            }
        }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("id", &self.id)
            .field("surface_id", &self.surface_id)
            .field("engine_kind", &self.engine_kind)
            .field("attached", &self.is_attached())
            .field("health", &self.health())
            .finish()
    }
}

/// Creates, tracks and disposes stream sessions, one per surface
pub struct StreamSessionManager {
    config: StreamConfig,
    messages: Messages,
    provider: Option<Arc<dyn EngineProvider>>,
    sessions: HashMap<SurfaceId, StreamSession>,
    bindings: HashMap<SurfaceId, ControlBinding>,
    listeners: Arc<ListenerSet<SessionListener>>,
    on_error: Option<ErrorCallback>,
}

impl StreamSessionManager {
    /// Create a manager. Without a provider only native playback is possible.
    pub fn new(config: StreamConfig, provider: Option<Arc<dyn EngineProvider>>) -> Self {
        Self {
            config,
            messages: Messages::default(),
            provider,
            sessions: HashMap::new(),
            bindings: HashMap::new(),
            listeners: Arc::new(ListenerSet::new()),
            on_error: None,
        }
    }

    pub fn with_messages(mut self, messages: Messages) -> Self {
        self.messages = messages;
        self
    }

    /// Callback invoked with every session-fatal error
    pub fn with_error_callback(mut self, callback: ErrorCallback) -> Self {
        self.on_error = Some(callback);
        self
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Subscribe to session events of every surface
    pub fn subscribe(&self, listener: SessionListener) -> Subscription {
        self.listeners.add(listener)
    }

    /// Command handle for a surface; stays valid across source changes
    pub fn controller(&mut self, surface_id: SurfaceId) -> PlaybackController {
        PlaybackController::new(self.bindings.entry(surface_id).or_default().clone())
    }

    /// The session currently bound to a surface, attached or failed
    pub fn session(&self, surface_id: SurfaceId) -> Option<&StreamSession> {
        self.sessions.get(&surface_id)
    }

    /// Number of attached sessions
    pub fn live_sessions(&self) -> usize {
        self.sessions.values().filter(|s| s.is_attached()).count()
    }

    /// Attach a source to a surface, replacing any previous session on it
    #[instrument(skip(self, source, surface), fields(surface_id = %surface.id(), url = %source.url))]
    pub fn attach(
        &mut self,
        source: PlaybackSource,
        surface: Arc<dyn PlaybackSurface>,
    ) -> Result<&StreamSession> {
        if source.url.trim().is_empty() {
            return Err(Error::InvalidSource("empty URL".to_string()));
        }

        let surface_id = surface.id();
        self.dispose(surface_id);

        let session_id = SessionId::new();
        self.emit(SessionEvent::Loading {
            session_id,
            surface_id,
        });

        let format = detect_source_format(&source.url);
        let backend: Arc<dyn PlaybackBackend> = if surface.can_play_type(format.mime_type()) {
            Arc::new(NativeBackend::new(surface.clone()))
        } else {
            match &self.provider {
                Some(provider) if provider.is_supported() && format.supports_library_playback() => {
                    let engine = provider.create(&self.config);
                    Arc::new(LibraryBackend::new(surface.clone(), engine))
                }
                _ => return Err(self.reject_unsupported(session_id, surface_id, &source)),
            }
        };

        let engine_kind = backend.kind();
        info!(session_id = %session_id, engine_kind = %engine_kind, "Attaching session");

        let shared = Arc::new(SessionShared::new());
        let ctx = SessionContext {
            session_id,
            surface_id,
            source: Arc::new(source),
            shared: Arc::downgrade(&shared),
            events: self.listeners.clone(),
            on_error: self.on_error.clone(),
            messages: self.messages,
        };

        let session = StreamSession {
            id: session_id,
            surface_id,
            source: ctx.source.clone(),
            engine_kind,
            shared,
            events: self.listeners.clone(),
        };

        backend.clone().attach(&ctx);

        // Controller routing is released before anything else
        let binding = self.bindings.entry(surface_id).or_default().clone();
        binding.bind(backend);
        ctx.register(Subscription::new(move || binding.unbind()));

        let session = match self.sessions.entry(surface_id) {
            std::collections::hash_map::Entry::Occupied(mut slot) => {
                slot.insert(session);
                slot.into_mut()
            }
            std::collections::hash_map::Entry::Vacant(slot) => slot.insert(session),
        };
        Ok(session)
    }

    /// Dispose the session on a surface, if any. Safe to repeat.
    #[instrument(skip(self))]
    pub fn dispose(&mut self, surface_id: SurfaceId) {
        if let Some(session) = self.sessions.remove(&surface_id) {
            session.dispose();
        }
    }

    /// Dispose every session
    pub fn dispose_all(&mut self) {
        for (_, session) in self.sessions.drain() {
            session.dispose();
        }
    }

    /// Report a session-fatal error raised outside an engine, for example
    /// by the native surface. Disposes the session on that surface.
    pub fn fail(&mut self, surface_id: SurfaceId, error: Error) {
        let Some(session) = self.sessions.get(&surface_id) else {
            return;
        };
        if !session.is_attached() {
            return;
        }

        let ctx = SessionContext {
            session_id: session.id,
            surface_id,
            source: session.source.clone(),
            shared: Arc::downgrade(&session.shared),
            events: self.listeners.clone(),
            on_error: self.on_error.clone(),
            messages: self.messages,
        };
        fail_session(&ctx, error);
    }

    fn reject_unsupported(
        &self,
        session_id: SessionId,
        surface_id: SurfaceId,
        source: &PlaybackSource,
    ) -> Error {
        let error = Error::Unsupported {
            url: source.url.clone(),
        };
        tracing::error!(session_id = %session_id, url = %source.url, "No playback path for source");

        self.emit(SessionEvent::Fatal {
            session_id,
            surface_id,
            kind: StreamErrorKind::Unsupported,
            message: self.messages.unsupported.to_string(),
        });
        if let Some(callback) = &self.on_error {
            callback(&error);
        }
        error
    }

    fn emit(&self, event: SessionEvent) {
        for listener in self.listeners.snapshot() {
            listener(&event);
        }
    }
}

impl Drop for StreamSessionManager {
    fn drop(&mut self) {
        self.dispose_all();
    }
}
