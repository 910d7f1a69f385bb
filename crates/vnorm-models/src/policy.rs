//! Shape policy constants and decision record.

use serde::{Deserialize, Serialize};

use crate::AspectRatio;

/// Longest duration accepted without truncation, in milliseconds.
pub const MAX_DURATION_MS: u64 = 139_999;

/// Narrowest ratio considered vertical (height/width >= 16/9).
pub const VERTICAL_THRESHOLD: AspectRatio = AspectRatio::PORTRAIT;

/// Outcome of checking a video's geometry against the platform shape.
///
/// `needs_reformat` is always `!is_vertical || exceeds_max_duration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyDecision {
    is_vertical: bool,
    exceeds_max_duration: bool,
    needs_reformat: bool,
}

impl PolicyDecision {
    pub const fn new(is_vertical: bool, exceeds_max_duration: bool) -> Self {
        Self {
            is_vertical,
            exceeds_max_duration,
            needs_reformat: !is_vertical || exceeds_max_duration,
        }
    }

    pub fn is_vertical(&self) -> bool {
        self.is_vertical
    }

    pub fn exceeds_max_duration(&self) -> bool {
        self.exceeds_max_duration
    }

    pub fn needs_reformat(&self) -> bool {
        self.needs_reformat
    }

    /// Human-readable reasons, used in consent prompts.
    pub fn reasons(&self) -> Vec<&'static str> {
        let mut reasons = Vec::new();
        if !self.is_vertical {
            reasons.push("not a 9:16 vertical video");
        }
        if self.exceeds_max_duration {
            reasons.push("longer than the maximum duration");
        }
        reasons
    }
}
