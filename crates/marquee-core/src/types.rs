//! Core types for Marquee

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a stream session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a playback surface supplied by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceId(pub Uuid);

impl SurfaceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SurfaceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What to play. Never mutated once a session exists for it; a new value
/// means a new session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSource {
    /// Stream URL (usually an HLS manifest)
    pub url: String,
    /// Poster image shown before the first frame
    pub poster_url: Option<String>,
    /// Start playback as soon as the stream is ready
    pub auto_play: bool,
}

impl PlaybackSource {
    /// Create a source for a URL with no poster and autoplay off
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            poster_url: None,
            auto_play: false,
        }
    }

    pub fn with_poster(mut self, poster_url: impl Into<String>) -> Self {
        self.poster_url = Some(poster_url.into());
        self
    }

    pub fn with_auto_play(mut self, auto_play: bool) -> Self {
        self.auto_play = auto_play;
        self
    }
}

/// Which playback path a session runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineKind {
    /// The surface decodes the stream itself
    NativeCapable,
    /// An adaptive-streaming engine feeds the surface
    LibraryDriven,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::NativeCapable => write!(f, "native"),
            EngineKind::LibraryDriven => write!(f, "library"),
        }
    }
}

/// Snapshot of the transport as the UI sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportState {
    pub is_playing: bool,
    /// Seconds, always within `[0, duration]` once the duration is known
    pub current_time: f64,
    /// Seconds, `0` while unknown
    pub duration: f64,
    /// `[0, 1]`
    pub volume: f64,
    pub is_fullscreen: bool,
    pub is_loading: bool,
    /// Localized message for the error overlay
    pub error: Option<String>,
}

impl Default for TransportState {
    fn default() -> Self {
        Self {
            is_playing: false,
            current_time: 0.0,
            duration: 0.0,
            volume: 1.0,
            is_fullscreen: false,
            is_loading: false,
            error: None,
        }
    }
}

impl TransportState {
    /// Playback progress in percent, `0` while the duration is unknown
    pub fn progress_percent(&self) -> f64 {
        if self.duration > 0.0 {
            (self.current_time / self.duration * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        }
    }
}

/// Normalize a time value read from a surface: non-finite or negative
/// readings become `0`.
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Normalize a volume read from a surface into `[0, 1]`; non-finite
/// readings become `0`.
pub fn normalize_volume(volume: f64) -> f64 {
    if volume.is_finite() {
        volume.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Format seconds as `MM:SS`, or `HH:MM:SS` from one hour on
pub fn format_time(time: f64) -> String {
    if !time.is_finite() {
        return "00:00".to_string();
    }

    let total = time.max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}
