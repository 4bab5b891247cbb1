//! Playback backends
//!
//! A session runs on exactly one backend, picked once at attach time:
//! - [`NativeBackend`]: the surface plays the URL itself
//! - [`LibraryBackend`]: an [`AdaptiveEngine`] loads the stream and feeds the surface
//!
//! Both register everything they acquire with the session so that disposal
//! releases it.

use crate::{
    engine::{AdaptiveEngine, EngineError, EngineEvent},
    recovery::RecoveryAction,
    session::{SessionContext, SessionEvent},
    subscription::Subscription,
    surface::PlaybackSurface,
    EngineKind, Error,
};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

/// Shared contract of the two playback paths
pub(crate) trait PlaybackBackend: Send + Sync {
    fn kind(&self) -> EngineKind;

    /// Surface all transport commands are delegated to
    fn surface(&self) -> &Arc<dyn PlaybackSurface>;

    /// Start loading the session's source
    fn attach(self: Arc<Self>, ctx: &SessionContext);
}

/// The surface decodes the stream natively
pub(crate) struct NativeBackend {
    surface: Arc<dyn PlaybackSurface>,
}

impl NativeBackend {
    pub(crate) fn new(surface: Arc<dyn PlaybackSurface>) -> Self {
        Self { surface }
    }
}

impl PlaybackBackend for NativeBackend {
    fn kind(&self) -> EngineKind {
        EngineKind::NativeCapable
    }

    fn surface(&self) -> &Arc<dyn PlaybackSurface> {
        &self.surface
    }

    fn attach(self: Arc<Self>, ctx: &SessionContext) {
        let source = ctx.source();
        self.surface.set_poster(source.poster_url.as_deref());
        self.surface.set_source(Some(&source.url));

        let surface = self.surface.clone();
        ctx.register(Subscription::new(move || surface.set_source(None)));

        ctx.emit(SessionEvent::Ready {
            session_id: ctx.session_id(),
            surface_id: ctx.surface_id(),
            engine_kind: EngineKind::NativeCapable,
        });

        if source.auto_play && ctx.claim_autoplay() {
            request_autoplay(ctx, self.surface.clone());
        }
    }
}

/// An adaptive-streaming engine feeds the surface
pub(crate) struct LibraryBackend {
    surface: Arc<dyn PlaybackSurface>,
    engine: Arc<dyn AdaptiveEngine>,
}

impl LibraryBackend {
    pub(crate) fn new(surface: Arc<dyn PlaybackSurface>, engine: Arc<dyn AdaptiveEngine>) -> Self {
        Self { surface, engine }
    }
}

impl PlaybackBackend for LibraryBackend {
    fn kind(&self) -> EngineKind {
        EngineKind::LibraryDriven
    }

    fn surface(&self) -> &Arc<dyn PlaybackSurface> {
        &self.surface
    }

    fn attach(self: Arc<Self>, ctx: &SessionContext) {
        let source = ctx.source();
        self.surface.set_poster(source.poster_url.as_deref());

        // Registered first so it is released last
        let engine = self.engine.clone();
        ctx.register(Subscription::new(move || engine.destroy()));
        let engine = self.engine.clone();
        ctx.register(Subscription::new(move || engine.stop_load()));

        let handler = EngineEventHandler {
            ctx: ctx.clone(),
            engine: Arc::downgrade(&self.engine),
            surface: self.surface.clone(),
        };
        let listener = self.engine.subscribe(Arc::new(move |event: &EngineEvent| handler.handle(event)));
        ctx.register(listener);

        self.engine.load_source(&source.url);
        self.engine.attach_media(self.surface.clone());
    }
}

/// Reacts to engine events for one library-driven session
struct EngineEventHandler {
    ctx: SessionContext,
    engine: Weak<dyn AdaptiveEngine>,
    surface: Arc<dyn PlaybackSurface>,
}

impl EngineEventHandler {
    fn handle(&self, event: &EngineEvent) {
        let session_id = self.ctx.session_id();

        match event {
            EngineEvent::MediaAttached => {
                debug!(session_id = %session_id, "Media attached to engine");
            }
            EngineEvent::ManifestParsed { levels } => {
                info!(session_id = %session_id, levels, "Manifest parsed");
                self.on_progress();
                self.ctx.emit(SessionEvent::Ready {
                    session_id,
                    surface_id: self.ctx.surface_id(),
                    engine_kind: EngineKind::LibraryDriven,
                });

                if self.ctx.source().auto_play && self.ctx.claim_autoplay() {
                    request_autoplay(&self.ctx, self.surface.clone());
                }
            }
            EngineEvent::LevelLoaded { .. } | EngineEvent::FragmentLoaded { .. } => {
                self.on_progress();
            }
            EngineEvent::LevelSwitched { level } => {
                debug!(session_id = %session_id, level, "Level switched");
                self.ctx.emit(SessionEvent::LevelSwitched {
                    session_id,
                    surface_id: self.ctx.surface_id(),
                    level: *level,
                });
            }
            EngineEvent::Error(err) => self.on_error(err),
        }
    }

    fn on_progress(&self) {
        if let Some(cause) = self.ctx.record_progress() {
            info!(session_id = %self.ctx.session_id(), cause = ?cause, "Session recovered");
            self.ctx.emit(SessionEvent::Recovered {
                session_id: self.ctx.session_id(),
                surface_id: self.ctx.surface_id(),
            });
        }
    }

    fn on_error(&self, err: &EngineError) {
        let session_id = self.ctx.session_id();

        if !err.fatal {
            warn!(
                session_id = %session_id,
                error_type = %err.error_type,
                details = %err.details,
                "Non-fatal engine error"
            );
            return;
        }

        error!(
            session_id = %session_id,
            error_type = %err.error_type,
            details = %err.details,
            reason = ?err.reason,
            "Fatal engine error"
        );

        match self.ctx.classify(err) {
            RecoveryAction::Ignore => {}
            RecoveryAction::RestartLoad => {
                info!(session_id = %session_id, "Fatal network error, restarting load");
                self.ctx.emit(SessionEvent::Recovering {
                    session_id,
                    surface_id: self.ctx.surface_id(),
                    cause: crate::DegradedCause::NetworkIssue,
                });
                if let Some(engine) = self.engine.upgrade() {
                    engine.start_load();
                }
            }
            RecoveryAction::RecoverMedia => {
                info!(session_id = %session_id, "Fatal media error, recovering decoder");
                self.ctx.emit(SessionEvent::Recovering {
                    session_id,
                    surface_id: self.ctx.surface_id(),
                    cause: crate::DegradedCause::MediaIssue,
                });
                if let Some(engine) = self.engine.upgrade() {
                    engine.recover_media_error();
                }
            }
            RecoveryAction::Fail(error) => fail_session(&self.ctx, error),
        }
    }
}

/// Tear the session down and report a session-fatal error
pub(crate) fn fail_session(ctx: &SessionContext, error: Error) {
    error!(
        session_id = %ctx.session_id(),
        code = error.error_code(),
        error = %error,
        "Session failed"
    );

    let kind = error.kind().unwrap_or(crate::StreamErrorKind::Other);
    ctx.mark_fatal(kind);
    ctx.dispose();

    ctx.emit(SessionEvent::Fatal {
        session_id: ctx.session_id(),
        surface_id: ctx.surface_id(),
        kind,
        message: ctx.messages().playback_failed.to_string(),
    });
    ctx.report_error(&error);
}

/// Issue the autoplay `play()`; a refusal is reported, never fatal
fn request_autoplay(ctx: &SessionContext, surface: Arc<dyn PlaybackSurface>) {
    let session_id = ctx.session_id();
    let surface_id = ctx.surface_id();
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        warn!(session_id = %session_id, "No async runtime, autoplay skipped");
        return;
    };

    let events = ctx.clone();
    let task = runtime.spawn(async move {
        if let Err(reason) = surface.play().await {
            warn!(session_id = %session_id, reason = %reason, "Autoplay rejected");
            events.emit(SessionEvent::AutoplayRejected {
                session_id,
                surface_id,
                reason,
            });
        }
    });
    ctx.register(Subscription::from_task(task));
}
