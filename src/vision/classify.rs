//! Pixel color classification.
//!
//! One sampled pixel maps to one of four categories. The decision order is
//! deliberate: red/blue dominance is checked before the white/grey split,
//! because a red or blue button can have a green channel above the white
//! threshold under bright lighting.

use serde::{Deserialize, Serialize};

/// Channel difference required to call a pixel red- or blue-dominant.
pub const COLOR_DIFFERENTIAL: u8 = 70;

/// Minimum green channel to call a non-dominant pixel white instead of grey.
pub const WHITE_THRESHOLD: u8 = 140;

/// Discrete color state of a sampled target region.
///
/// `Unknown` is the indeterminate/neutral reading. It is never a valid tap
/// target and gates the whole frame out of gameplay processing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ColorCategory {
    White,
    Red,
    Blue,
    Unknown,
}

impl ColorCategory {
    /// One-character glyph for the per-tap console trace.
    pub fn glyph(self) -> char {
        match self {
            ColorCategory::White => 'W',
            ColorCategory::Red => 'R',
            ColorCategory::Blue => 'B',
            ColorCategory::Unknown => '.',
        }
    }

    /// Canonical display color, or `None` for `Unknown`.
    pub fn canonical_rgb(self) -> Option<[u8; 3]> {
        match self {
            ColorCategory::White => Some([255, 255, 255]),
            ColorCategory::Red => Some([255, 0, 0]),
            ColorCategory::Blue => Some([0, 0, 255]),
            ColorCategory::Unknown => None,
        }
    }
}

impl std::fmt::Display for ColorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColorCategory::White => write!(f, "white"),
            ColorCategory::Red => write!(f, "red"),
            ColorCategory::Blue => write!(f, "blue"),
            ColorCategory::Unknown => write!(f, "unknown"),
        }
    }
}

/// Classifies one pixel by its channel intensities.
pub fn classify(r: u8, g: u8, b: u8) -> ColorCategory {
    if r as u16 > b as u16 + COLOR_DIFFERENTIAL as u16 {
        ColorCategory::Red
    } else if b as u16 > r as u16 + COLOR_DIFFERENTIAL as u16 {
        ColorCategory::Blue
    } else if g > WHITE_THRESHOLD {
        ColorCategory::White
    } else {
        ColorCategory::Unknown
    }
}
