//! Aspect ratio definitions.

use serde::{Deserialize, Serialize};

/// Width:height aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    /// Standard portrait (9:16) for Shorts/Reels/TikTok
    pub const PORTRAIT: AspectRatio = AspectRatio::new(9, 16);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether a `width`x`height` frame is at least as tall as this ratio.
    ///
    /// Compares `height / width >= self.height / self.width` with integer
    /// cross-multiplication so the boundary is exact.
    pub fn is_at_least_as_tall(&self, width: u32, height: u32) -> bool {
        u64::from(height) * u64::from(self.width) >= u64::from(width) * u64::from(self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_portrait_boundary_is_exact() {
        let portrait = AspectRatio::PORTRAIT;
        assert!(portrait.is_at_least_as_tall(720, 1280));
        assert!(portrait.is_at_least_as_tall(1080, 1920));
        assert!(!portrait.is_at_least_as_tall(721, 1280));
        assert!(!portrait.is_at_least_as_tall(1000, 1000));
        assert!(!portrait.is_at_least_as_tall(1920, 1080));
    }

    #[test]
    fn test_custom_ratio() {
        let four_five = AspectRatio::new(4, 5);
        assert!(four_five.is_at_least_as_tall(1080, 1350));
        assert!(!four_five.is_at_least_as_tall(1080, 1349));
    }
}
