//! Shape policy: does a video need reformatting before upload?

use vnorm_models::policy::VERTICAL_THRESHOLD;
use vnorm_models::{AspectRatio, Geometry, PolicyDecision, MAX_DURATION_MS};

/// Pure decision over probed geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatPolicy {
    /// Narrowest ratio that counts as vertical
    pub threshold: AspectRatio,
    /// Longest accepted duration (inclusive)
    pub max_duration_ms: u64,
}

impl Default for FormatPolicy {
    fn default() -> Self {
        Self {
            threshold: VERTICAL_THRESHOLD,
            max_duration_ms: MAX_DURATION_MS,
        }
    }
}

impl FormatPolicy {
    pub fn new(max_duration_ms: u64) -> Self {
        Self {
            max_duration_ms,
            ..Self::default()
        }
    }

    /// Vertical means `height / width >= 16 / 9`; over-length means
    /// strictly longer than the maximum.
    pub fn decide(&self, geometry: &Geometry) -> PolicyDecision {
        let is_vertical = self
            .threshold
            .is_at_least_as_tall(geometry.width, geometry.height);
        let exceeds_max_duration = geometry.duration_ms > self.max_duration_ms;
        PolicyDecision::new(is_vertical, exceeds_max_duration)
    }
}

/// Decide with the platform defaults.
pub fn decide(geometry: &Geometry) -> PolicyDecision {
    FormatPolicy::default().decide(geometry)
}
