//! Text measuring.

use std::sync::Arc;

/// Font selection for measuring and rasterizing.
#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    pub family: String,
    pub size: f32,
    pub bold: bool,
    pub italic: bool,
}

impl FontSpec {
    pub fn new(family: &str, size: f32) -> Self {
        Self { family: family.to_string(), size, bold: false, italic: false }
    }
}

/// Vertical metrics, both distances positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineMetrics {
    pub ascent: f32,
    pub descent: f32,
}

/// Rasterized glyph coverage.
#[derive(Debug)]
pub struct GlyphBitmap {
    pub width: u32,
    pub height: u32,
    /// Left side bearing.
    pub xmin: i32,
    /// Bottom of the bitmap relative to the baseline, up positive.
    pub ymin: i32,
    pub advance: f32,
    /// One coverage byte per pixel, row-major.
    pub coverage: Vec<u8>,
}

/// Source of glyph advances, line metrics and optionally glyph bitmaps.
pub trait TextMeasurer {
    fn advance(&self, ch: char, font: &FontSpec) -> f32;

    fn line_metrics(&self, font: &FontSpec) -> LineMetrics;

    fn measure(&self, text: &str, font: &FontSpec) -> f32 {
        text.chars().map(|c| self.advance(c, font)).sum()
    }

    /// `None` when no outline data is available; the rasterizer then draws
    /// a box for the glyph.
    fn glyph(&self, _ch: char, _font: &FontSpec) -> Option<Arc<GlyphBitmap>> {
        None
    }
}

/// Fixed-advance measurer used when no font file is available. Every
/// character advances `0.55 * size`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonospaceMeasurer;

impl MonospaceMeasurer {
    pub const ADVANCE: f32 = 0.55;
    pub const ASCENT: f32 = 0.8;
    pub const DESCENT: f32 = 0.2;
}

impl TextMeasurer for MonospaceMeasurer {
    fn advance(&self, ch: char, font: &FontSpec) -> f32 {
        if ch.is_control() {
            0.0
        } else {
            font.size * Self::ADVANCE
        }
    }

    fn line_metrics(&self, font: &FontSpec) -> LineMetrics {
        LineMetrics { ascent: font.size * Self::ASCENT, descent: font.size * Self::DESCENT }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monospace() {
        let m = MonospaceMeasurer;
        let font = FontSpec::new("any", 20.0);
        assert_eq!(m.measure("abcd", &font), 44.0);
        assert_eq!(m.measure("", &font), 0.0);
        assert_eq!(m.line_metrics(&font), LineMetrics { ascent: 16.0, descent: 4.0 });
        assert!(m.glyph('a', &font).is_none());
    }
}
