//! Encoder settings for the normalizing re-encode.

use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "fast";
/// Default CRF (Constant Rate Factor)
pub const DEFAULT_CRF: u8 = 23;
/// Default pixel format, widely playable
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";

/// Target canvas for normalized output.
pub const DEFAULT_CANVAS_WIDTH: u32 = 720;
pub const DEFAULT_CANVAS_HEIGHT: u32 = 1280;

/// Settings for the normalizing encode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderSettings {
    /// Output canvas width in pixels
    #[serde(default = "default_canvas_width")]
    pub canvas_width: u32,

    /// Output canvas height in pixels
    #[serde(default = "default_canvas_height")]
    pub canvas_height: u32,

    /// Video codec (e.g., "libx264")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset (e.g., "fast", "medium")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant Rate Factor (quality, 0-51, lower is better)
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Upper bound on a single engine execution, in seconds. `None` waits forever.
    #[serde(default)]
    pub exec_timeout_secs: Option<u64>,
}

fn default_canvas_width() -> u32 {
    DEFAULT_CANVAS_WIDTH
}
fn default_canvas_height() -> u32 {
    DEFAULT_CANVAS_HEIGHT
}
fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_crf() -> u8 {
    DEFAULT_CRF
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            canvas_width: DEFAULT_CANVAS_WIDTH,
            canvas_height: DEFAULT_CANVAS_HEIGHT,
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            crf: DEFAULT_CRF,
            exec_timeout_secs: None,
        }
    }
}

impl EncoderSettings {
    /// Returns new settings with a different output canvas.
    pub fn with_canvas(mut self, width: u32, height: u32) -> Self {
        self.canvas_width = width;
        self.canvas_height = height;
        self
    }

    /// Returns new settings with updated CRF.
    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = crf;
        self
    }

    /// Video encoder arguments. Audio is always stream-copied.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-pix_fmt".to_string(),
            DEFAULT_PIXEL_FORMAT.to_string(),
            "-c:a".to_string(),
            "copy".to_string(),
        ]
    }
}
