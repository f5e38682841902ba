use std::fmt;

use serde::{Deserialize, Serialize};

/// One output size the Qwen endpoints accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SizeBucket {
    pub width: u32,
    pub height: u32,
}

impl SizeBucket {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn ratio(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }

    /// Square buckets count as landscape.
    pub fn is_landscape(&self) -> bool {
        self.width >= self.height
    }
}

impl fmt::Display for SizeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

pub const SQUARE: SizeBucket = SizeBucket::new(1328, 1328);
/// 3:4, used for text-to-image and as the fallback ratio.
pub const DEFAULT_PORTRAIT: SizeBucket = SizeBucket::new(1140, 1472);

pub const CATALOG: [SizeBucket; 7] = [
    SQUARE,
    SizeBucket::new(1664, 928),  // 16:9
    SizeBucket::new(928, 1664),  // 9:16
    SizeBucket::new(1472, 1140), // 4:3
    DEFAULT_PORTRAIT,
    SizeBucket::new(1584, 1056), // 3:2
    SizeBucket::new(1056, 1584), // 2:3
];

pub const DEFAULT_ORIENTATION_PENALTY: f64 = 0.05;

/// Picks the catalog entry whose aspect ratio is closest to an observed image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometrySelector {
    /// Added to the ratio distance of buckets whose orientation differs from the input.
    pub orientation_penalty: f64,
}

impl Default for GeometrySelector {
    fn default() -> Self {
        Self {
            orientation_penalty: DEFAULT_ORIENTATION_PENALTY,
        }
    }
}

impl GeometrySelector {
    pub fn new(orientation_penalty: f64) -> Self {
        Self {
            orientation_penalty,
        }
    }

    /// Non-positive dimensions are treated as an image of the default portrait ratio.
    pub fn select(&self, width: i64, height: i64) -> SizeBucket {
        let (target, landscape) = if width > 0 && height > 0 {
            (width as f64 / height as f64, width >= height)
        } else {
            (DEFAULT_PORTRAIT.ratio(), DEFAULT_PORTRAIT.is_landscape())
        };

        let mut best = CATALOG[0];
        let mut best_score = f64::INFINITY;
        for bucket in CATALOG {
            let mut score = (bucket.ratio() - target).abs();
            if bucket.is_landscape() != landscape {
                score += self.orientation_penalty;
            }
            // strict comparison keeps the first of equally scored buckets
            if score < best_score {
                best_score = score;
                best = bucket;
            }
        }
        best
    }
}

pub fn select_bucket(width: i64, height: i64) -> SizeBucket {
    GeometrySelector::default().select(width, height)
}
