//! Uniform command surface over whichever backend a session picked

use crate::{backend::PlaybackBackend, finite_or_zero, normalize_volume, EngineKind, Error, Result};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Slot through which controllers reach the backend attached to one surface
///
/// The session manager binds it on attach and clears it from the session's
/// teardown list, so a controller handed out once keeps working across
/// source changes.
#[derive(Clone, Default)]
pub(crate) struct ControlBinding {
    slot: Arc<RwLock<Option<Arc<dyn PlaybackBackend>>>>,
}

impl ControlBinding {
    pub(crate) fn bind(&self, backend: Arc<dyn PlaybackBackend>) {
        *self.slot.write().unwrap_or_else(|p| p.into_inner()) = Some(backend);
    }

    pub(crate) fn unbind(&self) {
        *self.slot.write().unwrap_or_else(|p| p.into_inner()) = None;
    }

    fn current(&self) -> Option<Arc<dyn PlaybackBackend>> {
        self.slot.read().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

/// Imperative playback handle
///
/// Without an attached session reads return zero and mutators do nothing.
#[derive(Clone)]
pub struct PlaybackController {
    binding: ControlBinding,
}

impl PlaybackController {
    pub(crate) fn new(binding: ControlBinding) -> Self {
        Self { binding }
    }

    /// A controller that is never attached
    pub fn detached() -> Self {
        Self::new(ControlBinding::default())
    }

    pub fn is_attached(&self) -> bool {
        self.binding.current().is_some()
    }

    pub fn engine_kind(&self) -> Option<EngineKind> {
        self.binding.current().map(|b| b.kind())
    }

    /// Request playback. Success means the request was accepted, not that
    /// audio is playing.
    pub async fn play(&self) -> Result<()> {
        let Some(backend) = self.binding.current() else {
            return Ok(());
        };

        let surface = backend.surface().clone();
        surface.play().await.map_err(|reason| {
            warn!(reason = %reason, "Play request rejected");
            Error::PlaybackRejected(reason)
        })
    }

    pub fn pause(&self) {
        if let Some(backend) = self.binding.current() {
            backend.surface().pause();
        }
    }

    pub fn current_time(&self) -> f64 {
        self.binding
            .current()
            .map(|b| finite_or_zero(b.surface().current_time()))
            .unwrap_or(0.0)
    }

    /// Duration in seconds, `0` while unknown
    pub fn duration(&self) -> f64 {
        self.binding
            .current()
            .map(|b| finite_or_zero(b.surface().duration()))
            .unwrap_or(0.0)
    }

    /// Seek, clamped to `[0, duration]` once the duration is known
    pub fn set_current_time(&self, time: f64) {
        let Some(backend) = self.binding.current() else {
            return;
        };
        if time.is_nan() {
            return;
        }

        let duration = finite_or_zero(backend.surface().duration());
        let target = if duration > 0.0 {
            time.clamp(0.0, duration)
        } else {
            time.max(0.0)
        };
        debug!(target, "Seek");
        backend.surface().set_current_time(target);
    }

    pub fn volume(&self) -> f64 {
        self.binding
            .current()
            .map(|b| normalize_volume(b.surface().volume()))
            .unwrap_or(0.0)
    }

    /// Set the volume, clamped to `[0, 1]`
    pub fn set_volume(&self, volume: f64) {
        if volume.is_nan() {
            return;
        }
        if let Some(backend) = self.binding.current() {
            backend.surface().set_volume(volume.clamp(0.0, 1.0));
        }
    }

    /// Ask the surface to go fullscreen. A denial is returned, never retried.
    pub async fn request_fullscreen(&self) -> Result<()> {
        let Some(backend) = self.binding.current() else {
            return Ok(());
        };

        let surface = backend.surface().clone();
        surface.request_fullscreen().await.map_err(|reason| {
            warn!(reason = %reason, "Fullscreen request denied");
            Error::FullscreenDenied(reason)
        })
    }
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("engine_kind", &self.engine_kind())
            .finish()
    }
}
