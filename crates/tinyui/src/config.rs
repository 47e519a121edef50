//! Engine configuration.

use common::Color;
use serde::{Deserialize, Serialize};
use text::TextStyle;

/// WebGL context creation attributes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextAttributes {
    pub alpha: bool,
    pub antialias: bool,
    pub premultiplied_alpha: bool,
    pub preserve_drawing_buffer: bool,
    pub depth: bool,
    pub stencil: bool,
}

impl Default for ContextAttributes {
    fn default() -> Self {
        Self {
            alpha: true,
            antialias: true,
            premultiplied_alpha: false,
            preserve_drawing_buffer: false,
            depth: false,
            stencil: true,
        }
    }
}

/// Font file contents registered under a family name.
#[derive(Clone, PartialEq, Eq)]
pub struct FontData {
    pub family: String,
    pub data: Vec<u8>,
}

impl std::fmt::Debug for FontData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontData")
            .field("family", &self.family)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Engine options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Whether touch input is dispatched. Mouse input always is.
    pub handle_touch_events: bool,
    /// Make every `render` a patch render that leaves GL state untouched.
    pub save_gl_state: bool,
    /// Clear color for owned-context renders.
    pub clear_color: Color,
    /// `"webgl2"` or `"webgl"`.
    pub context_id: String,
    pub context_attributes: ContextAttributes,
    /// How long a stopped touch event suppresses the matching mouse event.
    pub touch_replay_window_ms: f64,
    /// Initial drawing buffer size; read from the GL viewport when unset.
    pub drawing_buffer_size: Option<(u32, u32)>,
    /// Style given to text nodes created without one.
    pub default_text_style: TextStyle,
    /// Fonts added to the system ones by [`crate::Engine::new`]. Browsers
    /// expose no font files, so text there uses fixed-advance box glyphs
    /// unless at least one font is given here.
    #[serde(skip)]
    pub fonts: Vec<FontData>,
}

impl EngineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_touch_events(mut self, enabled: bool) -> Self {
        self.handle_touch_events = enabled;
        self
    }

    pub fn with_saved_gl_state(mut self, enabled: bool) -> Self {
        self.save_gl_state = enabled;
        self
    }

    pub fn with_clear_color(mut self, color: Color) -> Self {
        self.clear_color = color;
        self
    }

    pub fn with_context_id(mut self, id: &str) -> Self {
        self.context_id = id.to_string();
        self
    }

    pub fn with_context_attributes(mut self, attributes: ContextAttributes) -> Self {
        self.context_attributes = attributes;
        self
    }

    pub fn with_touch_replay_window(mut self, ms: f64) -> Self {
        self.touch_replay_window_ms = ms;
        self
    }

    pub fn with_drawing_buffer_size(mut self, width: u32, height: u32) -> Self {
        self.drawing_buffer_size = Some((width, height));
        self
    }

    pub fn with_default_text_style(mut self, style: TextStyle) -> Self {
        self.default_text_style = style;
        self
    }

    /// Embed a TrueType or OpenType font under `family`.
    pub fn with_font(mut self, family: &str, data: impl Into<Vec<u8>>) -> Self {
        self.fonts.push(FontData { family: family.to_string(), data: data.into() });
        self
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            handle_touch_events: true,
            save_gl_state: false,
            clear_color: Color::TRANSPARENT,
            context_id: "webgl2".to_string(),
            context_attributes: ContextAttributes::default(),
            touch_replay_window_ms: 300.0,
            drawing_buffer_size: None,
            default_text_style: TextStyle::default(),
            fonts: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = EngineOptions::default();
        assert!(options.handle_touch_events);
        assert!(!options.save_gl_state);
        assert_eq!(options.context_id, "webgl2");
        assert_eq!(options.touch_replay_window_ms, 300.0);
    }

    #[test]
    fn test_options_builder() {
        let options = EngineOptions::new()
            .with_saved_gl_state(true)
            .with_touch_events(false)
            .with_drawing_buffer_size(640, 480);
        assert!(options.save_gl_state);
        assert!(!options.handle_touch_events);
        assert_eq!(options.drawing_buffer_size, Some((640, 480)));
    }

    #[test]
    fn test_fonts_are_not_serialized() {
        let options = EngineOptions::new().with_font("Body", vec![0u8; 64]);
        assert_eq!(options.fonts[0].family, "Body");
        assert!(format!("{:?}", options.fonts[0]).contains("bytes: 64"));

        let json = serde_json::to_string(&options).unwrap();
        assert!(!json.contains("fonts"));
        let back: EngineOptions = serde_json::from_str(&json).unwrap();
        assert!(back.fonts.is_empty());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let options: EngineOptions = serde_json::from_str(r#"{"save_gl_state": true}"#).unwrap();
        assert!(options.save_gl_state);
        assert_eq!(options.context_id, "webgl2");
    }
}
