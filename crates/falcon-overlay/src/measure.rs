//! Text measuring for label backgrounds.

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use imageproc::drawing::text_size;

use crate::error::{OverlayError, OverlayResult};

/// Measures the rendered width of a label.
pub trait TextMeasure: Send + Sync {
    fn text_width(&self, text: &str, size_px: f32) -> f32;
}

/// Width estimate from a fixed per-character advance.
///
/// Used when no font is configured; deterministic so overlays stay
/// comparable.
#[derive(Debug, Clone, Copy)]
pub struct FixedAdvance {
    /// Advance as a fraction of the font size
    pub em_ratio: f32,
}

impl Default for FixedAdvance {
    fn default() -> Self {
        Self { em_ratio: 0.6 }
    }
}

impl TextMeasure for FixedAdvance {
    fn text_width(&self, text: &str, size_px: f32) -> f32 {
        text.chars().count() as f32 * size_px * self.em_ratio
    }
}

/// Font-backed measuring; the same font is used for rasterising.
#[derive(Clone)]
pub struct FontMeasure {
    font: FontArc,
}

impl FontMeasure {
    pub fn new(font: FontArc) -> Self {
        Self { font }
    }

    /// Load a TTF/OTF font from disk.
    pub fn from_file(path: impl AsRef<Path>) -> OverlayResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let font = FontArc::try_from_vec(bytes)
            .map_err(|_| OverlayError::InvalidFont(path.to_path_buf()))?;
        Ok(Self { font })
    }

    pub fn font(&self) -> &FontArc {
        &self.font
    }
}

impl TextMeasure for FontMeasure {
    fn text_width(&self, text: &str, size_px: f32) -> f32 {
        text_size(PxScale::from(size_px), &self.font, text).0 as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_advance_counts_chars_not_bytes() {
        let m = FixedAdvance::default();
        // The emoji is one char but four bytes.
        assert_eq!(m.text_width("🧯 ab", 10.0), 4.0 * 6.0);
    }

    #[test]
    fn test_invalid_font_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not a font").unwrap();
        let err = FontMeasure::from_file(file.path()).err().unwrap();
        assert!(matches!(err, OverlayError::InvalidFont(_)));
    }
}
