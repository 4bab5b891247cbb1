//! Host-provided playback surface and fullscreen platform
//!
//! The surface is the embeddable media element the host renders into. It
//! owns decoding on the native path and receives engine output on the
//! library path; either way every transport command ends up here.

use crate::{subscription::Subscription, SurfaceId};
use async_trait::async_trait;
use std::sync::Arc;

/// MIME type the surface is asked about for HLS manifests
pub const HLS_MIME_TYPE: &str = "application/vnd.apple.mpegurl";

/// Discrete events emitted by a playback surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    Play,
    Pause,
    Ended,
    LoadStart,
    LoadedData,
    /// The surface's media error is set; read it via [`PlaybackSurface::media_error`]
    Error,
    TimeUpdate,
}

/// Listener for surface events
pub type SurfaceListener = Arc<dyn Fn(SurfaceEvent) + Send + Sync>;

/// Listener for fullscreen changes; receives the new fullscreen flag
pub type FullscreenListener = Arc<dyn Fn(bool) + Send + Sync>;

/// Media error reported by the surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaError {
    pub code: u16,
    pub message: String,
}

/// The host's media rendering element
#[async_trait]
pub trait PlaybackSurface: Send + Sync {
    /// Stable identity of this surface
    fn id(&self) -> SurfaceId;

    /// Whether the surface can decode this MIME type without help
    fn can_play_type(&self, mime: &str) -> bool;

    /// Point the surface at a URL, or clear it
    fn set_source(&self, url: Option<&str>);

    fn set_poster(&self, poster_url: Option<&str>);

    /// Request playback. Resolves when the request is accepted; rejects when
    /// the platform refuses it (for example autoplay policy).
    async fn play(&self) -> std::result::Result<(), String>;

    fn pause(&self);

    fn current_time(&self) -> f64;

    fn set_current_time(&self, time: f64);

    /// `NaN` while unknown
    fn duration(&self) -> f64;

    fn volume(&self) -> f64;

    fn set_volume(&self, volume: f64);

    async fn request_fullscreen(&self) -> std::result::Result<(), String>;

    /// The last media error, if any
    fn media_error(&self) -> Option<MediaError>;

    fn subscribe(&self, listener: SurfaceListener) -> Subscription;
}

/// Document-level fullscreen API
#[async_trait]
pub trait FullscreenPlatform: Send + Sync {
    fn is_fullscreen(&self) -> bool;

    async fn exit_fullscreen(&self) -> std::result::Result<(), String>;

    /// Fires on every fullscreen change, including ones made through
    /// platform UI rather than this crate
    fn subscribe(&self, listener: FullscreenListener) -> Subscription;
}
