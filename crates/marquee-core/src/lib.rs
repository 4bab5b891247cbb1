//! Marquee Core - Adaptive HLS playback for Marquee
//!
//! This crate provides the playback subsystem of a movie streaming client:
//! - Attaching an HLS source to a playback surface, natively or through an
//!   adaptive-streaming engine
//! - Fatal-error recovery for network and media failures
//! - A uniform playback controller independent of the engine kind
//! - Reactive transport state for the UI
//! - On-screen transport controls with tap-zone seeking and auto-hide
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          VideoPlayer                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │  Transport   │─►│   Playback   │  │   Playback   │           │
//! │  │   Controls   │  │  Controller  │  │  StateStore  │◄─ 1 Hz    │
//! │  └──────────────┘  └──────┬───────┘  └──────▲───────┘           │
//! │                           │                 │ events            │
//! │                    ┌──────┴─────────────────┴──┐                │
//! │                    │   StreamSessionManager    │                │
//! │                    └──────┬─────────────┬──────┘                │
//! │                           │             │                       │
//! │                    ┌──────┴──────┐ ┌────┴────────┐              │
//! │                    │   Native    │ │  Library    │              │
//! │                    │   Surface   │ │  Engine     │              │
//! │                    └─────────────┘ └─────────────┘              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The host supplies the [`PlaybackSurface`], [`FullscreenPlatform`] and
//! [`EngineProvider`] seams; [`headless`] has in-memory versions of all three.

mod backend;
pub mod catalog;
pub mod config;
pub mod controller;
pub mod controls;
pub mod engine;
pub mod error;
pub mod headless;
pub mod manifest;
pub mod messages;
pub mod player;
pub mod recovery;
pub mod session;
pub mod state_store;
pub mod subscription;
pub mod surface;
pub mod types;

pub use catalog::{EpisodeData, EpisodeServer, MovieDetail, MovieDetailResponse, StreamTarget};
pub use config::{ControlsConfig, PlayerConfig, StreamConfig};
pub use controller::PlaybackController;
pub use controls::{ControlAction, TapFeedback, TapZone, TransportControls};
pub use engine::{AdaptiveEngine, EngineError, EngineErrorType, EngineEvent, EngineProvider};
pub use error::{Error, Result, StreamErrorKind};
pub use manifest::{detect_source_format, HlsProbe, ManifestSummary, SourceFormat};
pub use messages::{Locale, Messages};
pub use player::{Overlay, PlayerCallbacks, VideoPlayer};
pub use recovery::{DegradedCause, SessionHealth};
pub use session::{SessionEvent, StreamSession, StreamSessionManager};
pub use state_store::PlaybackStateStore;
pub use subscription::{Subscription, TeardownList};
pub use surface::{FullscreenPlatform, PlaybackSurface, SurfaceEvent};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the playback library
pub fn init() {
    tracing::info!(version = VERSION, "Marquee Core initialized");
}
