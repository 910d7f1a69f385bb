//! Normalizer configuration.

use vnorm_models::encoding::{
    DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH, DEFAULT_CRF, DEFAULT_PRESET, DEFAULT_VIDEO_CODEC,
};
use vnorm_models::{EncoderSettings, MAX_DURATION_MS};

/// Default scheduling backend.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:3001";

/// Normalizer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizerConfig {
    /// Target canvas width in pixels
    pub canvas_width: u32,
    /// Target canvas height in pixels
    pub canvas_height: u32,
    /// Longest duration that passes through untouched
    pub max_duration_ms: u64,
    /// Video encoder passed to `-c:v`
    pub video_codec: String,
    /// x264 preset
    pub preset: String,
    /// Constant rate factor
    pub crf: u8,
    /// Kill engine executions after this many seconds; unset means no limit
    pub exec_timeout_secs: Option<u64>,
    /// Scheduling backend base URL
    pub backend_url: String,
    /// Emit JSON logs instead of ANSI text
    pub json_logs: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            canvas_width: DEFAULT_CANVAS_WIDTH,
            canvas_height: DEFAULT_CANVAS_HEIGHT,
            max_duration_ms: MAX_DURATION_MS,
            video_codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            crf: DEFAULT_CRF,
            exec_timeout_secs: None,
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            json_logs: false,
        }
    }
}

impl NormalizerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary key lookup. Unparseable values fall
    /// back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            canvas_width: lookup("VNORM_CANVAS_WIDTH")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.canvas_width),
            canvas_height: lookup("VNORM_CANVAS_HEIGHT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.canvas_height),
            max_duration_ms: lookup("VNORM_MAX_DURATION_MS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_duration_ms),
            video_codec: lookup("VNORM_VIDEO_CODEC").unwrap_or(defaults.video_codec),
            preset: lookup("VNORM_PRESET").unwrap_or(defaults.preset),
            crf: lookup("VNORM_CRF")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.crf),
            exec_timeout_secs: lookup("VNORM_EXEC_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0),
            backend_url: lookup("BACKEND_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.backend_url),
            json_logs: lookup("LOG_FORMAT")
                .map(|v| v.to_lowercase() == "json")
                .unwrap_or(false),
        }
    }

    /// Encoder settings derived from this config.
    pub fn encoder_settings(&self) -> EncoderSettings {
        let mut settings = EncoderSettings::default()
            .with_canvas(self.canvas_width, self.canvas_height)
            .with_crf(self.crf);
        settings.codec = self.video_codec.clone();
        settings.preset = self.preset.clone();
        settings.exec_timeout_secs = self.exec_timeout_secs;
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = NormalizerConfig::from_lookup(lookup(&[]));
        assert_eq!(config, NormalizerConfig::default());
        assert_eq!(config.max_duration_ms, 139_999);
        assert_eq!(config.backend_url, "http://localhost:3001");
        assert_eq!(config.exec_timeout_secs, None);
    }

    #[test]
    fn test_overrides() {
        let config = NormalizerConfig::from_lookup(lookup(&[
            ("VNORM_CANVAS_WIDTH", "1080"),
            ("VNORM_CANVAS_HEIGHT", "1920"),
            ("VNORM_CRF", "18"),
            ("VNORM_EXEC_TIMEOUT_SECS", "600"),
            ("BACKEND_URL", "https://scheduler.example.com/"),
            ("LOG_FORMAT", "JSON"),
        ]));
        assert_eq!(config.canvas_width, 1080);
        assert_eq!(config.canvas_height, 1920);
        assert_eq!(config.crf, 18);
        assert_eq!(config.exec_timeout_secs, Some(600));
        assert_eq!(config.backend_url, "https://scheduler.example.com");
        assert!(config.json_logs);

        let settings = config.encoder_settings();
        assert_eq!(settings.canvas_width, 1080);
        assert_eq!(settings.crf, 18);
        assert_eq!(settings.exec_timeout_secs, Some(600));
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let config = NormalizerConfig::from_lookup(lookup(&[
            ("VNORM_CANVAS_WIDTH", "wide"),
            ("VNORM_EXEC_TIMEOUT_SECS", "0"),
        ]));
        assert_eq!(config.canvas_width, 720);
        assert_eq!(config.exec_timeout_secs, None);
    }
}
