//! Error types for Marquee Core

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for playback operations
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of playback failures as seen by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamErrorKind {
    /// Neither native nor library playback is available for the source
    Unsupported,
    /// Manifest or segment fetch failure
    NetworkIssue,
    /// Decode or demux failure
    MediaIssue,
    /// A `play()` request was refused by the platform
    PlaybackRejected,
    /// A fullscreen request was refused by the platform
    FullscreenDenied,
    /// Any other fatal engine failure
    Other,
}

impl std::fmt::Display for StreamErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamErrorKind::Unsupported => write!(f, "unsupported"),
            StreamErrorKind::NetworkIssue => write!(f, "network"),
            StreamErrorKind::MediaIssue => write!(f, "media"),
            StreamErrorKind::PlaybackRejected => write!(f, "playback-rejected"),
            StreamErrorKind::FullscreenDenied => write!(f, "fullscreen-denied"),
            StreamErrorKind::Other => write!(f, "other"),
        }
    }
}

/// Player error types
#[derive(Error, Debug)]
pub enum Error {
    // Session errors
    #[error("No playback path available for {url}")]
    Unsupported { url: String },

    #[error("Network error: {0}")]
    NetworkIssue(String),

    #[error("Media error: {0}")]
    MediaIssue(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Invalid playback source: {0}")]
    InvalidSource(String),

    // Per-call errors
    #[error("Playback rejected: {0}")]
    PlaybackRejected(String),

    #[error("Fullscreen denied: {0}")]
    FullscreenDenied(String),

    // Manifest errors
    #[error("Failed to fetch manifest: {0}")]
    ManifestFetch(String),

    #[error("Failed to parse manifest: {0}")]
    ManifestParse(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Maps session-level errors onto the stream error taxonomy
    pub fn kind(&self) -> Option<StreamErrorKind> {
        match self {
            Error::Unsupported { .. } => Some(StreamErrorKind::Unsupported),
            Error::NetworkIssue(_) => Some(StreamErrorKind::NetworkIssue),
            Error::MediaIssue(_) => Some(StreamErrorKind::MediaIssue),
            Error::Engine(_) => Some(StreamErrorKind::Other),
            Error::PlaybackRejected(_) => Some(StreamErrorKind::PlaybackRejected),
            Error::FullscreenDenied(_) => Some(StreamErrorKind::FullscreenDenied),
            _ => None,
        }
    }

    /// Returns true if this error ends the stream session it occurred in
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Error::Unsupported { .. }
                | Error::NetworkIssue(_)
                | Error::MediaIssue(_)
                | Error::Engine(_)
        )
    }

    /// Returns the error code for logs
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Unsupported { .. } => "UNSUPPORTED",
            Error::NetworkIssue(_) => "NETWORK",
            Error::MediaIssue(_) => "MEDIA",
            Error::Engine(_) => "ENGINE",
            Error::InvalidSource(_) => "INVALID_SOURCE",
            Error::PlaybackRejected(_) => "PLAYBACK_REJECTED",
            Error::FullscreenDenied(_) => "FULLSCREEN_DENIED",
            Error::ManifestFetch(_) => "MANIFEST_FETCH",
            Error::ManifestParse(_) => "MANIFEST_PARSE",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Io(_) => "IO",
            Error::Json(_) => "JSON",
        }
    }
}
