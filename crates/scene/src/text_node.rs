//! Text node state.

use gpu::TextureKey;
use text::{TextLayout, TextStyle, TextSystem};

/// A block of text, laid out on every change and rasterized into a texture
/// by the engine before it is drawn.
#[derive(Debug)]
pub struct TextNode {
    text: String,
    style: TextStyle,
    layout: TextLayout,
    raster_dirty: bool,
    texture: Option<TextureKey>,
}

impl TextNode {
    pub(crate) fn new(text: &str, style: TextStyle, system: &TextSystem) -> Self {
        let layout = system.layout(text, &style);
        Self { text: text.to_string(), style, layout, raster_dirty: true, texture: None }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn style(&self) -> &TextStyle {
        &self.style
    }

    pub fn layout(&self) -> &TextLayout {
        &self.layout
    }

    /// Texture holding the last rasterization, if any.
    pub fn texture(&self) -> Option<TextureKey> {
        self.texture
    }

    /// Whether the texture no longer matches the layout.
    pub fn is_raster_dirty(&self) -> bool {
        self.raster_dirty
    }

    /// Record that `texture` now holds the current layout.
    pub fn set_rasterized(&mut self, texture: TextureKey) {
        self.texture = Some(texture);
        self.raster_dirty = false;
    }

    pub(crate) fn take_texture(&mut self) -> Option<TextureKey> {
        self.raster_dirty = true;
        self.texture.take()
    }

    /// Returns `false` when nothing changed.
    pub(crate) fn set_text(&mut self, text: &str, system: &TextSystem) -> bool {
        if self.text == text {
            return false;
        }
        self.text = text.to_string();
        self.relayout(system);
        true
    }

    pub(crate) fn set_style(&mut self, style: TextStyle, system: &TextSystem) -> bool {
        if self.style == style {
            return false;
        }
        self.style = style;
        self.relayout(system);
        true
    }

    pub(crate) fn relayout(&mut self, system: &TextSystem) {
        self.layout = system.layout(&self.text, &self.style);
        self.raster_dirty = true;
    }
}
