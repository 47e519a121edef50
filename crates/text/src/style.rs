//! Text styles: the base style of a text node and the per-run style that
//! BBCode tags resolve into.

use crate::bbcode::Tag;
use crate::measure::FontSpec;
use common::Color;
use serde::{Deserialize, Serialize};

pub const MIN_SIZE_RATIO: f32 = 0.1;
pub const MAX_SIZE_RATIO: f32 = 5.0;
pub const MIN_LINE_THICKNESS: f32 = 0.01;
pub const MAX_LINE_THICKNESS: f32 = 1.0;
pub const DEFAULT_LINE_THICKNESS: f32 = 0.08;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Outline drawn around every glyph of a text node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub color: Color,
    pub width: f32,
}

/// Style of a whole text node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub font_family: String,
    pub font_size: f32,
    pub color: Color,
    pub bold: bool,
    pub italic: bool,
    pub align: TextAlign,
    /// Multiplier applied to the font size.
    pub line_height: f32,
    pub max_width: Option<f32>,
    pub word_wrap: bool,
    pub stroke: Option<Stroke>,
    pub bbcode_enabled: bool,
    /// Extra advance after every character, in pixels.
    pub letter_spacing: f32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_family: "sans-serif".to_string(),
            font_size: 16.0,
            color: Color::BLACK,
            bold: false,
            italic: false,
            align: TextAlign::Left,
            line_height: 1.2,
            max_width: None,
            word_wrap: true,
            stroke: None,
            bbcode_enabled: false,
            letter_spacing: 0.0,
        }
    }
}

impl TextStyle {
    /// Width lines are wrapped at, if wrapping applies.
    pub fn wrap_width(&self) -> Option<f32> {
        if self.word_wrap {
            self.max_width.filter(|w| *w > 0.0)
        } else {
            None
        }
    }
}

/// Vertical draw offset of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum OffsetY {
    Pixels(f32),
    /// Percentage of the line height.
    Percent(f32),
}

impl OffsetY {
    pub fn resolve(&self, line_height: f32) -> f32 {
        match *self {
            OffsetY::Pixels(px) => px,
            OffsetY::Percent(pct) => line_height * pct / 100.0,
        }
    }
}

/// Fully resolved style of one run of text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStyle {
    pub font_family: String,
    pub font_size: f32,
    pub color: Color,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    /// 0..=1, multiplies every color the run draws.
    pub opacity: f32,
    pub hidden: bool,
    pub background: Option<Color>,
    pub offset_x: f32,
    pub offset_y: OffsetY,
    /// Draw glyph outlines only, in the run color.
    pub hollow: bool,
    pub outline: Option<Color>,
    pub outline_back: Option<Color>,
    /// Fraction of the font size used for decoration and outline widths.
    pub line_thickness: f32,
    /// Node-wide outline width in pixels, used when `outline` comes from the
    /// base style.
    pub outline_width: Option<f32>,
    pub letter_spacing: f32,
}

impl RunStyle {
    pub fn from_base(base: &TextStyle) -> Self {
        Self {
            font_family: base.font_family.clone(),
            font_size: base.font_size,
            color: base.color,
            bold: base.bold,
            italic: base.italic,
            underline: false,
            strikethrough: false,
            opacity: 1.0,
            hidden: false,
            background: None,
            offset_x: 0.0,
            offset_y: OffsetY::Pixels(0.0),
            hollow: false,
            outline: base.stroke.map(|s| s.color),
            outline_back: None,
            line_thickness: DEFAULT_LINE_THICKNESS,
            outline_width: base.stroke.map(|s| s.width),
            letter_spacing: base.letter_spacing,
        }
    }

    /// Apply `tags` in order on top of the base style. Unknown tags and
    /// unparseable values are ignored.
    pub fn resolve(base: &TextStyle, tags: &[Tag]) -> Self {
        let mut style = Self::from_base(base);
        for tag in tags {
            style.apply(base, tag);
        }
        style
    }

    fn apply(&mut self, base: &TextStyle, tag: &Tag) {
        let value = tag.value.as_deref().map(str::trim);
        let number = || value.and_then(|v| v.parse::<f32>().ok()).filter(|n| n.is_finite());
        let color = || value.and_then(Color::parse);

        match tag.name.as_str() {
            "b" => self.bold = true,
            "i" => self.italic = true,
            "u" => self.underline = true,
            "s" => self.strikethrough = true,
            "size" => {
                if let Some(ratio) = number() {
                    self.font_size = base.font_size * ratio.clamp(MIN_SIZE_RATIO, MAX_SIZE_RATIO);
                }
            }
            "font" => {
                if let Some(family) = value.filter(|v| !v.is_empty()) {
                    self.font_family = family.to_string();
                }
            }
            "color" => {
                if let Some(c) = color() {
                    self.color = c;
                }
            }
            "opacity" => {
                if let Some(n) = number() {
                    self.opacity = n.clamp(0.0, 100.0) / 100.0;
                }
            }
            "hide" => self.hidden = true,
            "background" => {
                if let Some(c) = color() {
                    self.background = Some(c);
                }
            }
            "offsetx" => {
                if let Some(n) = number() {
                    self.offset_x = n;
                }
            }
            "offsety" => {
                if let Some(v) = value {
                    let (digits, percent) = match v.strip_suffix('%') {
                        Some(d) => (d.trim(), true),
                        None => (v.strip_suffix("px").unwrap_or(v).trim(), false),
                    };
                    if let Some(n) = digits.parse::<f32>().ok().filter(|n| n.is_finite()) {
                        self.offset_y = if percent { OffsetY::Percent(n) } else { OffsetY::Pixels(n) };
                    }
                }
            }
            "stroke" => self.hollow = true,
            "outline" => {
                self.outline = Some(color().unwrap_or(Color::BLACK));
                self.outline_width = None;
            }
            "outlineback" => self.outline_back = Some(color().unwrap_or(Color::BLACK)),
            "linethickness" => {
                if let Some(n) = number() {
                    self.line_thickness = n.clamp(MIN_LINE_THICKNESS, MAX_LINE_THICKNESS);
                }
            }
            _ => {}
        }
    }

    pub fn font(&self) -> FontSpec {
        FontSpec {
            family: self.font_family.clone(),
            size: self.font_size,
            bold: self.bold,
            italic: self.italic,
        }
    }

    /// Underline, strikethrough and hollow stroke width in pixels.
    pub fn thickness_px(&self) -> f32 {
        (self.font_size * self.line_thickness).max(1.0)
    }

    /// Outline width in pixels.
    pub fn outline_px(&self) -> f32 {
        self.outline_width.unwrap_or_else(|| self.thickness_px())
    }

    /// `color` with the run opacity applied.
    pub fn paint(&self, color: Color) -> Color {
        color.with_alpha_factor(self.opacity)
    }

    /// Pixels an outline or stroke may spill past the glyph box.
    pub fn bleed(&self) -> f32 {
        let mut bleed: f32 = 0.0;
        if self.outline.is_some() || self.outline_back.is_some() {
            bleed = bleed.max(self.outline_px());
        }
        if self.hollow {
            bleed = bleed.max(self.thickness_px());
        }
        bleed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(tags: &[Tag]) -> RunStyle {
        RunStyle::resolve(&TextStyle::default(), tags)
    }

    #[test]
    fn test_flags() {
        let s = resolve(&[Tag::new("b"), Tag::new("i"), Tag::new("u"), Tag::new("s"), Tag::new("hide"), Tag::new("stroke")]);
        assert!(s.bold && s.italic && s.underline && s.strikethrough && s.hidden && s.hollow);
    }

    #[test]
    fn test_size_ratio_clamped() {
        assert_eq!(resolve(&[Tag::with_value("size", "2")]).font_size, 32.0);
        assert_eq!(resolve(&[Tag::with_value("size", "100")]).font_size, 80.0);
        assert!((resolve(&[Tag::with_value("size", "0")]).font_size - 1.6).abs() < 1e-5);
        assert_eq!(resolve(&[Tag::with_value("size", "big")]).font_size, 16.0);
    }

    #[test]
    fn test_opacity_and_thickness_clamped() {
        assert_eq!(resolve(&[Tag::with_value("opacity", "50")]).opacity, 0.5);
        assert_eq!(resolve(&[Tag::with_value("opacity", "250")]).opacity, 1.0);
        assert_eq!(resolve(&[Tag::with_value("opacity", "-3")]).opacity, 0.0);
        assert_eq!(resolve(&[Tag::with_value("lineThickness", "9")]).line_thickness, 1.0);
        assert_eq!(resolve(&[Tag::with_value("linethickness", "0")]).line_thickness, 0.01);
    }

    #[test]
    fn test_colors() {
        let s = resolve(&[
            Tag::with_value("color", "#ff0000"),
            Tag::with_value("background", "blue"),
            Tag::with_value("outline", "rgb(0, 255, 0)"),
            Tag::new("outlineback"),
        ]);
        assert_eq!(s.color, Color::rgb(255, 0, 0));
        assert_eq!(s.background, Some(Color::rgb(0, 0, 255)));
        assert_eq!(s.outline, Some(Color::rgb(0, 255, 0)));
        assert_eq!(s.outline_back, Some(Color::BLACK));

        let bad = resolve(&[Tag::with_value("color", "nope")]);
        assert_eq!(bad.color, Color::BLACK);
    }

    #[test]
    fn test_offsets() {
        let s = resolve(&[Tag::with_value("offsetx", "3"), Tag::with_value("offsety", "-50%")]);
        assert_eq!(s.offset_x, 3.0);
        assert_eq!(s.offset_y, OffsetY::Percent(-50.0));
        assert_eq!(s.offset_y.resolve(20.0), -10.0);

        let px = resolve(&[Tag::with_value("offsety", "4px")]);
        assert_eq!(px.offset_y, OffsetY::Pixels(4.0));
    }

    #[test]
    fn test_later_tags_win() {
        let s = resolve(&[Tag::with_value("color", "red"), Tag::with_value("color", "blue")]);
        assert_eq!(s.color, Color::rgb(0, 0, 255));
    }

    #[test]
    fn test_base_stroke_becomes_outline() {
        let base = TextStyle {
            stroke: Some(Stroke { color: Color::WHITE, width: 3.0 }),
            ..TextStyle::default()
        };
        let s = RunStyle::from_base(&base);
        assert_eq!(s.outline, Some(Color::WHITE));
        assert_eq!(s.outline_px(), 3.0);
        assert_eq!(s.bleed(), 3.0);
    }
}
