//! FFmpeg video filter definitions.

use std::fmt;

use vnorm_models::encoding::{DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH};
use vnorm_models::EncoderSettings;

/// Letterbox filter: fit inside the canvas preserving aspect, then pad
/// centered with black.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterSpec {
    pub canvas_width: u32,
    pub canvas_height: u32,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self {
            canvas_width: DEFAULT_CANVAS_WIDTH,
            canvas_height: DEFAULT_CANVAS_HEIGHT,
        }
    }
}

impl FilterSpec {
    pub fn new(canvas_width: u32, canvas_height: u32) -> Self {
        Self {
            canvas_width,
            canvas_height,
        }
    }

    /// Canvas taken from encoder settings.
    pub fn from_settings(settings: &EncoderSettings) -> Self {
        Self::new(settings.canvas_width, settings.canvas_height)
    }

    /// Filter graph text for `-vf`.
    pub fn to_filter(&self) -> String {
        filter_letterbox(self.canvas_width, self.canvas_height)
    }
}

impl fmt::Display for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_filter())
    }
}

/// Build the scale+pad letterbox filter for a `width`x`height` canvas.
///
/// For sources wider than the canvas this scales to the canvas width and
/// pads top and bottom; narrower sources are scaled to the canvas height and
/// padded left and right.
pub fn filter_letterbox(width: u32, height: u32) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:black,\
         setsar=1",
        w = width,
        h = height
    )
}
