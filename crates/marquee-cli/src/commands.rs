//! CLI command implementations

use crate::output::{self, OutputFormat};
use marquee_core::{
    headless::{HeadlessFullscreen, HeadlessSurface, ScriptedEngineProvider},
    surface::HLS_MIME_TYPE,
    EngineError, EngineErrorType, EngineEvent, EngineKind, EngineProvider, HlsProbe, ManifestSummary,
    MovieDetailResponse, Overlay, PlaybackSource, PlayerCallbacks, PlayerConfig, SessionHealth,
    StreamErrorKind, StreamTarget, TransportState, VideoPlayer,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tabled::Tabled;
use tracing::{info, warn};
use url::Url;

// =============================================================================
// Probe
// =============================================================================

#[derive(Tabled)]
struct VariantRow {
    quality: &'static str,
    bandwidth: u64,
    resolution: String,
    codecs: String,
    uri: String,
}

/// Fetch a manifest and print its summary
pub async fn probe(manifest_url: &str, format: &str) -> anyhow::Result<()> {
    let url = Url::parse(manifest_url)?;
    let config = PlayerConfig::default();
    let probe = HlsProbe::new(&config.stream)?;
    let summary = probe.probe(&url).await?;

    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", output::to_json(&summary)),
        OutputFormat::Table => match &summary {
            ManifestSummary::Master { variants, .. } => {
                let rows: Vec<VariantRow> = variants
                    .iter()
                    .map(|v| VariantRow {
                        quality: v.quality_name(),
                        bandwidth: v.bandwidth,
                        resolution: v
                            .resolution
                            .map(|(w, h)| format!("{}x{}", w, h))
                            .unwrap_or_else(|| "-".to_string()),
                        codecs: v.codecs.clone().unwrap_or_else(|| "-".to_string()),
                        uri: v.uri.to_string(),
                    })
                    .collect();
                println!("{}", output::table(&rows));
            }
            ManifestSummary::Media { .. } => print_summary(&summary),
        },
        OutputFormat::Text => print_summary(&summary),
    }

    Ok(())
}

fn print_summary(summary: &ManifestSummary) {
    match summary {
        ManifestSummary::Master { url, variants } => {
            println!("Master playlist: {}", url);
            println!("  Variants: {}", variants.len());
            for (i, v) in variants.iter().enumerate() {
                println!(
                    "  {}. {} - {}bps {}",
                    i + 1,
                    v.quality_name(),
                    v.bandwidth,
                    v.codecs.as_deref().unwrap_or("")
                );
            }
        }
        ManifestSummary::Media {
            url,
            segments,
            duration_secs,
            is_live,
        } => {
            println!("Media playlist: {}", url);
            println!("  Segments: {}", segments);
            println!("  Live: {}", is_live);
            if let Some(duration) = duration_secs {
                println!("  Duration: {}", marquee_core::format_time(*duration));
            }
        }
    }
}

// =============================================================================
// Episodes
// =============================================================================

#[derive(Tabled, Serialize)]
struct EpisodeRow {
    server: String,
    index: usize,
    name: String,
    target: &'static str,
    url: String,
}

/// List servers and episodes with their stream targets
pub fn episodes(file: &Path, format: &str) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(file)?;
    let detail = MovieDetailResponse::from_json_str(&content)?;

    let rows: Vec<EpisodeRow> = detail
        .episodes
        .iter()
        .flat_map(|server| {
            server.server_data.iter().enumerate().map(|(index, data)| {
                let (target, url) = match data.stream_target() {
                    Some(StreamTarget::Hls(url)) => ("hls", url),
                    Some(StreamTarget::Embed(url)) => ("embed", url),
                    None => ("none", String::new()),
                };
                EpisodeRow {
                    server: server.server_name.clone(),
                    index,
                    name: data.name.clone(),
                    target,
                    url,
                }
            })
        })
        .collect();

    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", output::to_json(&rows)),
        OutputFormat::Table => println!("{}", output::table(&rows)),
        OutputFormat::Text => {
            println!("{} ({})", detail.movie.name, detail.movie.origin_name);
            for server in &detail.episodes {
                println!("\n{}:", server.server_name);
                for row in rows.iter().filter(|r| r.server == server.server_name) {
                    println!("  {:>3}. {:<12} [{}] {}", row.index + 1, row.name, row.target, row.url);
                }
            }
        }
    }

    Ok(())
}

// =============================================================================
// Config
// =============================================================================

fn load_config(file: Option<&Path>) -> anyhow::Result<PlayerConfig> {
    Ok(match file {
        Some(path) => PlayerConfig::from_file(path)?,
        None => PlayerConfig::default(),
    })
}

/// Print the effective configuration
pub fn config(file: Option<&Path>, format: &str) -> anyhow::Result<()> {
    let config = load_config(file)?;

    match OutputFormat::from(format) {
        OutputFormat::Json | OutputFormat::Table => println!("{}", config.to_json()),
        OutputFormat::Text => {
            let stream = &config.stream;
            println!("Stream:");
            println!(
                "  Buffer: forward {}s (max {}s), back {}s, hole {}s, {} bytes",
                stream.forward_buffer_ceiling_seconds,
                stream.max_buffer_ceiling_seconds,
                stream.back_buffer_retention_seconds,
                stream.buffer_hole_tolerance_seconds,
                stream.max_buffer_size_bytes
            );
            println!(
                "  Manifest: {}ms timeout, {} retries, {}ms delay",
                stream.manifest_load_timeout_ms, stream.manifest_load_max_retries, stream.manifest_load_retry_delay_ms
            );
            println!(
                "  Level: {}ms timeout, {} retries, {}ms delay",
                stream.level_load_timeout_ms, stream.level_load_max_retries, stream.level_load_retry_delay_ms
            );
            println!(
                "  Fragment: {}ms timeout, {} retries, {}ms delay",
                stream.fragment_load_timeout_ms, stream.fragment_load_max_retries, stream.fragment_load_retry_delay_ms
            );
            let controls = &config.controls;
            println!("Controls:");
            println!(
                "  Skip {}s, auto-hide {}ms, tap feedback {}ms, edge zones {:.0}%",
                controls.skip_seconds,
                controls.auto_hide_delay_ms,
                controls.tap_feedback_ms,
                controls.edge_zone_fraction * 100.0
            );
            println!("Poll interval: {}ms", config.poll_interval_ms);
            println!("Locale: {:?}", config.locale);
        }
    }

    Ok(())
}

// =============================================================================
// Simulate
// =============================================================================

/// Fatal failure to inject into a headless session
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum FailKind {
    Network,
    Media,
    Other,
}

impl FailKind {
    fn engine_error(self) -> EngineError {
        match self {
            FailKind::Network => EngineError::fatal(EngineErrorType::Network, "fragLoadError"),
            FailKind::Media => EngineError::fatal(EngineErrorType::Media, "bufferAppendError"),
            FailKind::Other => EngineError::fatal(EngineErrorType::Other, "internalException"),
        }
    }

    fn media_error(self) -> (u16, &'static str) {
        match self {
            FailKind::Network => (2, "MEDIA_ERR_NETWORK"),
            FailKind::Media => (3, "MEDIA_ERR_DECODE"),
            FailKind::Other => (4, "MEDIA_ERR_SRC_NOT_SUPPORTED"),
        }
    }
}

pub struct SimulateOptions {
    pub native: bool,
    pub library: bool,
    pub failures: Vec<FailKind>,
    pub autoplay: bool,
    pub config: Option<PathBuf>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulationReport {
    url: String,
    engine_kind: Option<EngineKind>,
    attached: bool,
    health: Option<SessionHealth>,
    last_fatal_error: Option<StreamErrorKind>,
    reported_errors: Vec<String>,
    overlay: Option<String>,
    state: TransportState,
}

/// Drive a headless player through attach, manifest load and failures
pub async fn simulate(url: &str, options: SimulateOptions, format: &str) -> anyhow::Result<()> {
    let config = load_config(options.config.as_deref())?;

    let native_types: Vec<String> = if options.native {
        vec![HLS_MIME_TYPE.to_string()]
    } else {
        Vec::new()
    };
    let platform = HeadlessFullscreen::new();
    let surface = HeadlessSurface::with_fullscreen(native_types, platform.clone());
    let provider = options.library.then(ScriptedEngineProvider::new);

    let reported = Arc::new(Mutex::new(Vec::new()));
    let sink = reported.clone();
    let callbacks = PlayerCallbacks::default().on_error(move |e| {
        if let Ok(mut errors) = sink.lock() {
            errors.push(format!("{}: {}", e.error_code(), e));
        }
    });

    let mut player = VideoPlayer::new(
        config,
        surface.clone(),
        Some(platform),
        provider.clone().map(|p| p as Arc<dyn EngineProvider>),
        callbacks,
    )?;

    let source = PlaybackSource::new(url).with_auto_play(options.autoplay);
    let engine_kind = match player.load(source) {
        Ok(kind) => Some(kind),
        Err(e) => {
            warn!(error = %e, "Attach failed");
            None
        }
    };

    match engine_kind {
        Some(EngineKind::LibraryDriven) => {
            if let Some(engine) = provider.as_ref().and_then(|p| p.last_engine()) {
                engine.emit(EngineEvent::ManifestParsed { levels: 3 });
                engine.emit(EngineEvent::LevelLoaded { level: 0 });
                for failure in &options.failures {
                    info!(failure = ?failure, "Injecting engine error");
                    engine.emit_error(failure.engine_error());
                }
            }
        }
        Some(EngineKind::NativeCapable) => {
            surface.finish_loading();
            for failure in &options.failures {
                info!(failure = ?failure, "Injecting surface error");
                let (code, message) = failure.media_error();
                surface.fail(code, message);
            }
        }
        None => {}
    }

    // Let the autoplay request settle
    tokio::time::sleep(Duration::from_millis(20)).await;
    player.refresh();

    let session = player.session();
    let overlay = match player.overlay() {
        Overlay::None => None,
        Overlay::Loading { label } => Some(label),
        Overlay::Error { title, message } => Some(format!("{}: {}", title, message)),
    };
    let reported_errors = reported.lock().map(|e| e.clone()).unwrap_or_default();
    let report = SimulationReport {
        url: url.to_string(),
        engine_kind,
        attached: session.map(|s| s.is_attached()).unwrap_or(false),
        health: session.map(|s| s.health()),
        last_fatal_error: session.and_then(|s| s.last_fatal_error()),
        reported_errors,
        overlay,
        state: player.state(),
    };

    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", output::to_json(&report)),
        OutputFormat::Table | OutputFormat::Text => print_report(&report),
    }

    player.unload();
    Ok(())
}

fn print_report(report: &SimulationReport) {
    println!("Session: {}", report.url);
    match report.engine_kind {
        Some(kind) => println!("  Engine: {}", kind),
        None => println!("  Engine: none"),
    }
    println!("  Attached: {}", report.attached);
    if let Some(health) = report.health {
        println!("  Health: {}", health);
    }
    if let Some(kind) = report.last_fatal_error {
        println!("  Fatal error: {}", kind);
    }
    for error in &report.reported_errors {
        println!("  Reported: {}", error);
    }

    let state = &report.state;
    println!("\nTransport:");
    println!("  Playing: {}", state.is_playing);
    println!("  Loading: {}", state.is_loading);
    println!(
        "  Time: {} / {}",
        marquee_core::format_time(state.current_time),
        marquee_core::format_time(state.duration)
    );
    println!("  Volume: {:.0}%", state.volume * 100.0);
    println!("  Fullscreen: {}", state.is_fullscreen);
    if let Some(overlay) = &report.overlay {
        println!("  Overlay: {}", overlay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_kind_maps_to_engine_types() {
        assert_eq!(FailKind::Network.engine_error().error_type, EngineErrorType::Network);
        assert_eq!(FailKind::Media.engine_error().error_type, EngineErrorType::Media);
        assert!(FailKind::Other.engine_error().fatal);
    }
}
