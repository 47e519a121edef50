//! Text for the TinyUI engine: BBCode parsing, styles, measuring, line
//! layout and CPU rasterization into RGBA pixels for upload.

pub mod bbcode;
pub mod font;
pub mod layout;
pub mod measure;
pub mod raster;
pub mod style;

pub use bbcode::{parse as parse_bbcode, Segment, Tag, MAX_TAG_DEPTH};
pub use font::{FontCache, LoadedFont};
pub use layout::{layout, layout_bbcode, layout_plain, LineInfo, RenderUnit, TextLayout};
pub use measure::{FontSpec, GlyphBitmap, LineMetrics, MonospaceMeasurer, TextMeasurer};
pub use raster::rasterize;
pub use style::{OffsetY, RunStyle, Stroke, TextAlign, TextStyle};

use common::PixelBuffer;

/// A measurer shared by every text node of an engine.
pub struct TextSystem {
    measurer: Box<dyn TextMeasurer>,
}

impl TextSystem {
    pub fn new(measurer: Box<dyn TextMeasurer>) -> Self {
        Self { measurer }
    }

    /// Fixed-advance metrics and box glyphs; deterministic for tests.
    pub fn monospace() -> Self {
        Self::new(Box::new(MonospaceMeasurer))
    }

    /// System fonts through [`FontCache`]. There are none on the web; see
    /// [`TextSystem::with_fonts`].
    pub fn with_system_fonts() -> Self {
        Self::new(Box::new(FontCache::new()))
    }

    /// System fonts plus embedded `(family, data)` pairs. The first font that
    /// parses is the default when the system has none.
    pub fn with_fonts<'a>(fonts: impl IntoIterator<Item = (&'a str, &'a [u8])>) -> Self {
        Self::new(Box::new(FontCache::with_fonts(fonts)))
    }

    pub fn measurer(&self) -> &dyn TextMeasurer {
        self.measurer.as_ref()
    }

    pub fn layout(&self, text: &str, style: &TextStyle) -> TextLayout {
        layout::layout(text, style, self.measurer.as_ref())
    }

    pub fn rasterize(&self, layout: &TextLayout) -> PixelBuffer {
        raster::rasterize(layout, self.measurer.as_ref())
    }
}

impl Default for TextSystem {
    fn default() -> Self {
        Self::with_system_fonts()
    }
}
