//! Adaptive-streaming engine seam
//!
//! An engine loads the manifest, picks quality levels, fetches fragments and
//! feeds them into a playback surface. Implementations are supplied by the
//! host (for example a JS streaming library behind bindings, or the
//! [`headless`](crate::headless) engine).

use crate::{config::StreamConfig, subscription::Subscription, surface::PlaybackSurface};
use std::sync::Arc;

/// Engine error class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineErrorType {
    Network,
    Media,
    Mux,
    KeySystem,
    Other,
}

impl std::fmt::Display for EngineErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineErrorType::Network => write!(f, "networkError"),
            EngineErrorType::Media => write!(f, "mediaError"),
            EngineErrorType::Mux => write!(f, "muxError"),
            EngineErrorType::KeySystem => write!(f, "keySystemError"),
            EngineErrorType::Other => write!(f, "otherError"),
        }
    }
}

/// Error payload emitted by an engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    pub error_type: EngineErrorType,
    /// Engine-specific detail code, e.g. `manifestLoadTimeOut`
    pub details: String,
    /// Whether the engine stopped on this error
    pub fatal: bool,
    pub reason: Option<String>,
}

impl EngineError {
    pub fn fatal(error_type: EngineErrorType, details: impl Into<String>) -> Self {
        Self {
            error_type,
            details: details.into(),
            fatal: true,
            reason: None,
        }
    }

    pub fn non_fatal(error_type: EngineErrorType, details: impl Into<String>) -> Self {
        Self {
            error_type,
            details: details.into(),
            fatal: false,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Reason if given, otherwise the detail code
    pub fn describe(&self) -> String {
        self.reason.clone().unwrap_or_else(|| self.details.clone())
    }
}

/// Lifecycle events emitted by an engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    MediaAttached,
    ManifestParsed { levels: usize },
    LevelLoaded { level: usize },
    LevelSwitched { level: usize },
    FragmentLoaded { sequence: u64 },
    Error(EngineError),
}

impl EngineEvent {
    /// Events showing the load pipeline is moving again
    pub fn is_progress(&self) -> bool {
        matches!(
            self,
            EngineEvent::ManifestParsed { .. }
                | EngineEvent::LevelLoaded { .. }
                | EngineEvent::FragmentLoaded { .. }
        )
    }
}

/// Listener for engine events
pub type EngineListener = Arc<dyn Fn(&EngineEvent) + Send + Sync>;

/// One live adaptive-streaming engine instance
///
/// Methods take `&self`; implementations use interior mutability so that
/// listeners may call back into the engine while it is dispatching.
pub trait AdaptiveEngine: Send + Sync {
    fn load_source(&self, url: &str);

    fn attach_media(&self, surface: Arc<dyn PlaybackSurface>);

    /// (Re)start the load pipeline from the current position
    fn start_load(&self);

    fn stop_load(&self);

    /// Rebuild the decode pipeline in place
    fn recover_media_error(&self);

    /// Release the engine; it emits nothing afterwards
    fn destroy(&self);

    fn subscribe(&self, listener: EngineListener) -> Subscription;
}

/// Factory for engines; absent or unsupported means no library path
pub trait EngineProvider: Send + Sync {
    fn is_supported(&self) -> bool;

    fn create(&self, config: &StreamConfig) -> Arc<dyn AdaptiveEngine>;
}
