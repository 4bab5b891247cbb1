//! Player configuration
//!
//! Every field has a default; hosts only override what they need, either in
//! code or from a JSON document.

use crate::{messages::Locale, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Adaptive-streaming engine configuration, passed to the engine on creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StreamConfig {
    /// Forward buffer target (seconds)
    pub forward_buffer_ceiling_seconds: f64,
    /// Hard ceiling the forward buffer may grow to (seconds)
    pub max_buffer_ceiling_seconds: f64,
    /// Played media kept behind the playhead (seconds)
    pub back_buffer_retention_seconds: f64,
    /// Gaps up to this size are jumped over (seconds)
    pub buffer_hole_tolerance_seconds: f64,
    /// Buffer size limit (bytes)
    pub max_buffer_size_bytes: u64,
    pub manifest_load_timeout_ms: u64,
    pub manifest_load_max_retries: u32,
    pub manifest_load_retry_delay_ms: u64,
    pub level_load_timeout_ms: u64,
    pub level_load_max_retries: u32,
    pub level_load_retry_delay_ms: u64,
    pub fragment_load_timeout_ms: u64,
    pub fragment_load_max_retries: u32,
    pub fragment_load_retry_delay_ms: u64,
    /// Let the engine demux on a background worker
    pub enable_worker: bool,
    pub low_latency_mode: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            forward_buffer_ceiling_seconds: 30.0,
            max_buffer_ceiling_seconds: 600.0,
            back_buffer_retention_seconds: 90.0,
            buffer_hole_tolerance_seconds: 0.5,
            max_buffer_size_bytes: 60 * 1000 * 1000, // 60 MB
            manifest_load_timeout_ms: 10_000,
            manifest_load_max_retries: 1,
            manifest_load_retry_delay_ms: 1_000,
            level_load_timeout_ms: 10_000,
            level_load_max_retries: 4,
            level_load_retry_delay_ms: 1_000,
            fragment_load_timeout_ms: 20_000,
            fragment_load_max_retries: 6,
            fragment_load_retry_delay_ms: 1_000,
            enable_worker: true,
            low_latency_mode: false,
        }
    }
}

impl StreamConfig {
    /// Reject values no engine could honor
    pub fn validate(&self) -> Result<()> {
        let buffers = [
            ("forwardBufferCeilingSeconds", self.forward_buffer_ceiling_seconds),
            ("maxBufferCeilingSeconds", self.max_buffer_ceiling_seconds),
            ("backBufferRetentionSeconds", self.back_buffer_retention_seconds),
            ("bufferHoleToleranceSeconds", self.buffer_hole_tolerance_seconds),
        ];
        for (name, value) in buffers {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        if self.max_buffer_ceiling_seconds < self.forward_buffer_ceiling_seconds {
            return Err(Error::InvalidConfig(
                "maxBufferCeilingSeconds is below forwardBufferCeilingSeconds".to_string(),
            ));
        }

        let timeouts = [
            ("manifestLoadTimeoutMs", self.manifest_load_timeout_ms),
            ("levelLoadTimeoutMs", self.level_load_timeout_ms),
            ("fragmentLoadTimeoutMs", self.fragment_load_timeout_ms),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                return Err(Error::InvalidConfig(format!("{} must be greater than zero", name)));
            }
        }

        Ok(())
    }

    pub fn manifest_load_timeout(&self) -> Duration {
        Duration::from_millis(self.manifest_load_timeout_ms)
    }

    pub fn manifest_load_retry_delay(&self) -> Duration {
        Duration::from_millis(self.manifest_load_retry_delay_ms)
    }
}

/// Transport controls behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ControlsConfig {
    /// Seconds moved by one skip
    pub skip_seconds: f64,
    /// Idle time before controls hide while playing
    pub auto_hide_delay_ms: u64,
    /// How long tap-zone feedback stays on screen
    pub tap_feedback_ms: u64,
    /// Width of each edge tap zone as a fraction of the surface
    pub edge_zone_fraction: f64,
    /// Tap zones are only active on touch devices
    pub touch_device: bool,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            skip_seconds: 10.0,
            auto_hide_delay_ms: 3_000,
            tap_feedback_ms: 800,
            edge_zone_fraction: 0.3,
            touch_device: false,
        }
    }
}

impl ControlsConfig {
    pub fn auto_hide_delay(&self) -> Duration {
        Duration::from_millis(self.auto_hide_delay_ms)
    }

    pub fn tap_feedback_duration(&self) -> Duration {
        Duration::from_millis(self.tap_feedback_ms)
    }
}

/// Complete player configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerConfig {
    pub stream: StreamConfig,
    pub controls: ControlsConfig,
    /// Transport sampling period
    pub poll_interval_ms: u64,
    pub locale: Locale,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            stream: StreamConfig::default(),
            controls: ControlsConfig::default(),
            poll_interval_ms: 1_000,
            locale: Locale::default(),
        }
    }
}

impl PlayerConfig {
    /// Parse a JSON document; missing fields keep their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PlayerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        self.stream.validate()?;

        if self.poll_interval_ms == 0 {
            return Err(Error::InvalidConfig("pollIntervalMs must be greater than zero".to_string()));
        }
        let fraction = self.controls.edge_zone_fraction;
        if !(0.0..0.5).contains(&fraction) {
            return Err(Error::InvalidConfig(format!(
                "edgeZoneFraction must be in [0, 0.5), got {}",
                fraction
            )));
        }
        if !self.controls.skip_seconds.is_finite() || self.controls.skip_seconds <= 0.0 {
            return Err(Error::InvalidConfig("skipSeconds must be positive".to_string()));
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_defaults() {
        let config = StreamConfig::default();
        assert_eq!(config.forward_buffer_ceiling_seconds, 30.0);
        assert_eq!(config.back_buffer_retention_seconds, 90.0);
        assert_eq!(config.buffer_hole_tolerance_seconds, 0.5);
        assert_eq!(config.manifest_load_max_retries, 1);
        assert_eq!(config.level_load_max_retries, 4);
        assert_eq!(config.fragment_load_max_retries, 6);
        assert_eq!(config.fragment_load_timeout_ms, 20_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = PlayerConfig::from_json_str(
            r#"{ "stream": { "fragmentLoadMaxRetries": 2 }, "controls": { "touchDevice": true } }"#,
        )
        .unwrap();

        assert_eq!(config.stream.fragment_load_max_retries, 2);
        assert_eq!(config.stream.level_load_max_retries, 4);
        assert!(config.controls.touch_device);
        assert_eq!(config.controls.skip_seconds, 10.0);
        assert_eq!(config.poll_interval_ms, 1_000);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = PlayerConfig::default();
        config.stream.buffer_hole_tolerance_seconds = -1.0;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let mut config = PlayerConfig::default();
        config.stream.manifest_load_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = PlayerConfig::default();
        config.controls.edge_zone_fraction = 0.6;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_roundtrip_uses_camel_case() {
        let json = PlayerConfig::default().to_json();
        assert!(json.contains("forwardBufferCeilingSeconds"));
        assert!(json.contains("autoHideDelayMs"));
    }
}
