//! Source format detection and HLS manifest probing
//!
//! Sessions only need [`SourceFormat`] to decide between the native and the
//! library path. [`HlsProbe`] fetches and summarizes a manifest for tooling;
//! it never feeds a playback session.

use crate::{config::StreamConfig, error::Error, surface::HLS_MIME_TYPE, Result};
use m3u8_rs::{MasterPlaylist, MediaPlaylist};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

/// Container format of a playback source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SourceFormat {
    Hls,
    Progressive { mime: &'static str },
}

impl SourceFormat {
    /// MIME type handed to the surface's capability check
    pub fn mime_type(&self) -> &'static str {
        match self {
            SourceFormat::Hls => HLS_MIME_TYPE,
            SourceFormat::Progressive { mime } => *mime,
        }
    }

    /// Only HLS can be driven by an adaptive-streaming engine
    pub fn supports_library_playback(&self) -> bool {
        matches!(self, SourceFormat::Hls)
    }
}

/// Detect the source format from the URL path
pub fn detect_source_format(url: &str) -> SourceFormat {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_lowercase(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_lowercase(),
    };

    if path.ends_with(".m3u8") || path.ends_with(".m3u") {
        return SourceFormat::Hls;
    }
    if path.ends_with(".mp4") || path.ends_with(".m4v") {
        return SourceFormat::Progressive { mime: "video/mp4" };
    }
    if path.ends_with(".webm") {
        return SourceFormat::Progressive { mime: "video/webm" };
    }
    if path.ends_with(".mov") {
        return SourceFormat::Progressive { mime: "video/quicktime" };
    }

    // Default to HLS
    SourceFormat::Hls
}

/// One variant of a master playlist
#[derive(Debug, Clone, Serialize)]
pub struct VariantSummary {
    pub bandwidth: u64,
    pub resolution: Option<(u64, u64)>,
    pub frame_rate: Option<f64>,
    pub codecs: Option<String>,
    pub uri: Url,
}

impl VariantSummary {
    /// Quality tier label from the variant height
    pub fn quality_name(&self) -> &'static str {
        match self.resolution.map(|(_, h)| h) {
            None => "audio/unknown",
            Some(0..=240) => "240p",
            Some(241..=360) => "360p",
            Some(361..=480) => "480p",
            Some(481..=720) => "720p",
            Some(721..=1080) => "1080p",
            Some(1081..=1440) => "1440p",
            Some(_) => "4K",
        }
    }
}

/// Result of probing a manifest
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ManifestSummary {
    Master {
        url: Url,
        variants: Vec<VariantSummary>,
    },
    Media {
        url: Url,
        segments: usize,
        /// Total duration for VOD playlists
        duration_secs: Option<f64>,
        is_live: bool,
    },
}

/// Fetches and parses HLS manifests
pub struct HlsProbe {
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl HlsProbe {
    /// Build a probe using the manifest budget of a stream config
    pub fn new(config: &StreamConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.manifest_load_timeout())
            .build()
            .map_err(|e| Error::ManifestFetch(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_retries: config.manifest_load_max_retries,
            retry_delay: config.manifest_load_retry_delay(),
        })
    }

    pub fn with_client(client: Client, config: &StreamConfig) -> Self {
        Self {
            client,
            max_retries: config.manifest_load_max_retries,
            retry_delay: config.manifest_load_retry_delay(),
        }
    }

    /// Fetch and summarize a manifest
    #[instrument(skip(self))]
    pub async fn probe(&self, url: &Url) -> Result<ManifestSummary> {
        let content = self.fetch(url).await?;
        summarize(&content, url)
    }

    async fn fetch(&self, url: &Url) -> Result<String> {
        let mut attempt = 0;
        loop {
            debug!(url = %url, attempt, "Fetching HLS manifest");

            match self.fetch_once(url).await {
                Ok(content) => return Ok(content),
                Err(e) if attempt < self.max_retries => {
                    warn!(url = %url, attempt, error = %e, "Manifest fetch failed, retrying");
                    attempt += 1;
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, url: &Url) -> Result<String> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::ManifestFetch(e.to_string()))?;

        response
            .text()
            .await
            .map_err(|e| Error::ManifestFetch(e.to_string()))
    }
}

/// Parse manifest text fetched from `url`
pub fn summarize(content: &str, url: &Url) -> Result<ManifestSummary> {
    if !content.trim_start().starts_with("#EXTM3U") {
        return Err(Error::ManifestParse("missing #EXTM3U header".to_string()));
    }

    // Detect if master or media playlist
    if content.contains("#EXT-X-STREAM-INF") {
        let parsed = m3u8_rs::parse_master_playlist_res(content.as_bytes())
            .map_err(|e| Error::ManifestParse(format!("Failed to parse HLS master: {:?}", e)))?;
        summarize_master(&parsed, url)
    } else {
        let parsed = m3u8_rs::parse_media_playlist_res(content.as_bytes())
            .map_err(|e| Error::ManifestParse(format!("Failed to parse HLS media: {:?}", e)))?;
        Ok(summarize_media(&parsed, url))
    }
}

fn summarize_master(master: &MasterPlaylist, base_url: &Url) -> Result<ManifestSummary> {
    let mut variants = Vec::with_capacity(master.variants.len());

    for variant in &master.variants {
        let uri = base_url
            .join(&variant.uri)
            .map_err(|e| Error::ManifestParse(format!("Invalid URI '{}': {}", variant.uri, e)))?;

        variants.push(VariantSummary {
            bandwidth: variant.bandwidth,
            resolution: variant.resolution.map(|r| (r.width, r.height)),
            frame_rate: variant.frame_rate,
            codecs: variant.codecs.clone(),
            uri,
        });
    }

    // Sort by bandwidth
    variants.sort_by_key(|v| v.bandwidth);

    Ok(ManifestSummary::Master {
        url: base_url.clone(),
        variants,
    })
}

fn summarize_media(media: &MediaPlaylist, url: &Url) -> ManifestSummary {
    let is_live = !media.end_list;
    let duration_secs = if media.end_list {
        Some(media.segments.iter().map(|s| s.duration as f64).sum())
    } else {
        None
    };

    ManifestSummary::Media {
        url: url.clone(),
        segments: media.segments.len(),
        duration_secs,
        is_live,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-STREAM-INF:BANDWIDTH=2800000,RESOLUTION=1280x720,CODECS=\"avc1.64001f,mp4a.40.2\"
720p/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360,CODECS=\"avc1.4d401e,mp4a.40.2\"
360p/index.m3u8
";

    const MEDIA: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:6
#EXT-X-MEDIA-SEQUENCE:0
#EXTINF:6.0,
seg0.ts
#EXTINF:6.0,
seg1.ts
#EXTINF:4.5,
seg2.ts
#EXT-X-ENDLIST
";

    #[test]
    fn test_detect_hls() {
        assert_eq!(detect_source_format("https://example.com/master.m3u8"), SourceFormat::Hls);
        assert_eq!(
            detect_source_format("https://example.com/vod/index.m3u8?token=abc"),
            SourceFormat::Hls
        );
    }

    #[test]
    fn test_detect_progressive() {
        let format = detect_source_format("https://example.com/trailer.mp4");
        assert_eq!(format.mime_type(), "video/mp4");
        assert!(!format.supports_library_playback());
    }

    #[test]
    fn test_unknown_defaults_to_hls() {
        assert_eq!(detect_source_format("https://example.com/stream"), SourceFormat::Hls);
        assert_eq!(SourceFormat::Hls.mime_type(), HLS_MIME_TYPE);
    }

    #[test]
    fn test_summarize_master() {
        let url = Url::parse("https://cdn.example.com/movie/master.m3u8").unwrap();
        let summary = summarize(MASTER, &url).unwrap();

        match summary {
            ManifestSummary::Master { variants, .. } => {
                assert_eq!(variants.len(), 2);
                assert_eq!(variants[0].bandwidth, 800_000);
                assert_eq!(variants[0].quality_name(), "360p");
                assert_eq!(
                    variants[1].uri.as_str(),
                    "https://cdn.example.com/movie/720p/index.m3u8"
                );
            }
            other => panic!("expected master playlist, got {:?}", other),
        }
    }

    #[test]
    fn test_summarize_media() {
        let url = Url::parse("https://cdn.example.com/movie/720p/index.m3u8").unwrap();
        match summarize(MEDIA, &url).unwrap() {
            ManifestSummary::Media { segments, duration_secs, is_live, .. } => {
                assert_eq!(segments, 3);
                assert!(!is_live);
                assert!((duration_secs.unwrap() - 16.5).abs() < 1e-6);
            }
            other => panic!("expected media playlist, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_non_playlist() {
        let url = Url::parse("https://cdn.example.com/index.html").unwrap();
        assert!(matches!(summarize("<html></html>", &url), Err(Error::ManifestParse(_))));
    }
}
