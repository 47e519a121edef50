//! CPU rasterization of a [`TextLayout`].
//!
//! Layers are drawn across the whole block, back to front:
//! outline-back, background, hollow stroke, outline, then fill with
//! underline and strikethrough. A later run's outline can never cover an
//! earlier run's fill.

use crate::layout::{LineInfo, RenderUnit, TextLayout};
use crate::measure::TextMeasurer;
use common::{Color, PixelBuffer};

/// Horizontal shear for synthesized italics.
const ITALIC_SHEAR: f32 = 0.2;

/// Coverage mask placed in buffer pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphMask {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
    pub coverage: Vec<u8>,
}

impl GlyphMask {
    fn solid(left: i32, top: i32, width: u32, height: u32) -> Self {
        Self { left, top, width, height, coverage: vec![255; (width * height) as usize] }
    }

    #[inline]
    fn at(&self, x: i32, y: i32) -> u8 {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return 0;
        }
        self.coverage[(y as u32 * self.width + x as u32) as usize]
    }

    /// Shear rows right in proportion to their height above `baseline`.
    fn sheared(&self, baseline: i32) -> Self {
        let shift = |row: i32| ((baseline - (self.top + row)) as f32 * ITALIC_SHEAR).round() as i32;
        let (s0, s1) = (shift(self.height as i32 - 1), shift(0));
        let (min, max) = (s0.min(s1), s0.max(s1));
        let width = self.width + (max - min) as u32;
        let mut coverage = vec![0; (width * self.height) as usize];
        for y in 0..self.height as i32 {
            let dx = shift(y) - min;
            for x in 0..self.width as i32 {
                coverage[(y * width as i32 + x + dx) as usize] = self.at(x, y);
            }
        }
        Self { left: self.left + min, top: self.top, width, height: self.height, coverage }
    }

    /// Union with a copy shifted `offset` pixels right.
    fn emboldened(&self, offset: u32) -> Self {
        let width = self.width + offset;
        let mut coverage = vec![0; (width * self.height) as usize];
        for y in 0..self.height as i32 {
            for x in 0..width as i32 {
                let v = self.at(x, y).max(self.at(x - offset as i32, y));
                coverage[(y * width as i32 + x) as usize] = v;
            }
        }
        Self { coverage, width, ..*self }
    }

    /// Max coverage within a disc of `radius` pixels.
    pub fn dilate(&self, radius: f32) -> Self {
        let r = radius.ceil().max(0.0) as i32;
        if r == 0 {
            return self.clone();
        }
        let r2 = radius * radius;
        let offsets: Vec<(i32, i32)> = (-r..=r)
            .flat_map(|dy| (-r..=r).map(move |dx| (dx, dy)))
            .filter(|(dx, dy)| (dx * dx + dy * dy) as f32 <= r2 + 0.5)
            .collect();

        let width = self.width + 2 * r as u32;
        let height = self.height + 2 * r as u32;
        let mut coverage = vec![0; (width * height) as usize];
        for y in 0..height as i32 {
            for x in 0..width as i32 {
                let mut v = 0;
                for (dx, dy) in &offsets {
                    v = v.max(self.at(x - r + dx, y - r + dy));
                    if v == 255 {
                        break;
                    }
                }
                coverage[(y * width as i32 + x) as usize] = v;
            }
        }
        Self { left: self.left - r, top: self.top - r, width, height, coverage }
    }

    /// `self` with `inner` cut out.
    fn subtract(&self, inner: &GlyphMask) -> Self {
        let mut out = self.clone();
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                let covered = inner.at(x + self.left - inner.left, y + self.top - inner.top);
                let i = (y * self.width as i32 + x) as usize;
                out.coverage[i] = out.coverage[i].saturating_sub(covered);
            }
        }
        out
    }

    fn draw(&self, buffer: &mut PixelBuffer, color: Color) {
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                buffer.blend_coverage(self.left + x, self.top + y, color, self.at(x, y));
            }
        }
    }
}

struct PlacedUnit<'a> {
    line: &'a LineInfo,
    unit: &'a RenderUnit,
    /// Pen origin of the unit in buffer pixels.
    x: f32,
    baseline: f32,
    glyphs: Vec<GlyphMask>,
}

/// Render `layout` into a new buffer of [`TextLayout::pixel_size`]. The block
/// origin sits at `(bleed, bleed)`.
pub fn rasterize(layout: &TextLayout, measurer: &dyn TextMeasurer) -> PixelBuffer {
    let (width, height) = layout.pixel_size();
    let mut buffer = PixelBuffer::new(width, height);

    let units: Vec<PlacedUnit<'_>> = layout
        .units()
        .filter(|(_, unit)| !unit.style.hidden)
        .map(|(line, unit)| place_unit(layout.bleed, line, unit, measurer))
        .collect();

    for p in &units {
        if let Some(color) = p.unit.style.outline_back {
            let r = p.unit.style.outline_px();
            for glyph in &p.glyphs {
                glyph.dilate(r).draw(&mut buffer, p.unit.style.paint(color));
            }
        }
    }

    for p in &units {
        if let Some(color) = p.unit.style.background {
            let top = layout.bleed + p.line.y;
            buffer.fill_rect(p.x, top, p.unit.width, p.line.height, p.unit.style.paint(color));
        }
    }

    for p in &units {
        if p.unit.style.hollow {
            let r = p.unit.style.thickness_px();
            let color = p.unit.style.paint(p.unit.style.color);
            for glyph in &p.glyphs {
                glyph.dilate(r).subtract(glyph).draw(&mut buffer, color);
            }
        }
    }

    for p in &units {
        if let Some(color) = p.unit.style.outline {
            let r = p.unit.style.outline_px();
            for glyph in &p.glyphs {
                glyph.dilate(r).draw(&mut buffer, p.unit.style.paint(color));
            }
        }
    }

    for p in &units {
        let style = &p.unit.style;
        let color = style.paint(style.color);
        if !style.hollow {
            for glyph in &p.glyphs {
                glyph.draw(&mut buffer, color);
            }
        }
        let t = style.thickness_px();
        if style.underline {
            let y = p.baseline + p.unit.descent * 0.5 - t / 2.0;
            buffer.fill_rect(p.x, y, p.unit.width, t, color);
        }
        if style.strikethrough {
            let y = p.baseline - p.unit.ascent * 0.3 - t / 2.0;
            buffer.fill_rect(p.x, y, p.unit.width, t, color);
        }
    }

    buffer
}

fn place_unit<'a>(
    bleed: f32,
    line: &'a LineInfo,
    unit: &'a RenderUnit,
    measurer: &dyn TextMeasurer,
) -> PlacedUnit<'a> {
    let style = &unit.style;
    let font = style.font();
    let x = bleed + unit.x + style.offset_x;
    let baseline = bleed + line.baseline + style.offset_y.resolve(line.height);
    let base_i = baseline.round() as i32;
    let bold_offset = (style.font_size / 24.0).round().max(1.0) as u32;

    let mut glyphs = Vec::new();
    let mut pen = x;
    for ch in unit.text.chars() {
        let advance = measurer.advance(ch, &font);
        let mask = match measurer.glyph(ch, &font) {
            Some(g) if g.width > 0 && g.height > 0 => Some(GlyphMask {
                left: pen.round() as i32 + g.xmin,
                top: base_i - (g.height as i32 + g.ymin),
                width: g.width,
                height: g.height,
                coverage: g.coverage.clone(),
            }),
            Some(_) => None,
            None if ch.is_whitespace() || ch.is_control() => None,
            None => {
                let w = (advance * 0.7).ceil().max(1.0) as u32;
                let h = (unit.ascent * 0.7).ceil().max(1.0) as u32;
                Some(GlyphMask::solid((pen + advance * 0.15).round() as i32, base_i - h as i32, w, h))
            }
        };
        if let Some(mut mask) = mask {
            if style.italic {
                mask = mask.sheared(base_i);
            }
            if style.bold {
                mask = mask.emboldened(bold_offset);
            }
            glyphs.push(mask);
        }
        pen += advance + style.letter_spacing;
    }

    PlacedUnit { line, unit, x, baseline, glyphs }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::layout;
    use crate::measure::MonospaceMeasurer;
    use crate::style::TextStyle;

    fn style() -> TextStyle {
        TextStyle { font_size: 20.0, line_height: 1.0, bbcode_enabled: true, ..TextStyle::default() }
    }

    fn render(text: &str) -> (TextLayout, PixelBuffer) {
        let l = layout(text, &style(), &MonospaceMeasurer);
        let buffer = rasterize(&l, &MonospaceMeasurer);
        (l, buffer)
    }

    #[test]
    fn test_buffer_matches_layout_size() {
        let (l, buffer) = render("ab");
        assert_eq!((buffer.width, buffer.height), l.pixel_size());
        assert_eq!((buffer.width, buffer.height), (22, 20));
    }

    #[test]
    fn test_fill_draws_glyph_boxes() {
        let (_, buffer) = render("[color=red]a[/color]");
        // baseline at 16, box 8px wide starting near x = 2
        assert_eq!(buffer.get_pixel(5, 12), Color::rgb(255, 0, 0));
        assert_eq!(buffer.get_pixel(5, 18).a, 0);
    }

    #[test]
    fn test_hidden_draws_nothing() {
        let (_, buffer) = render("[hide][background=blue]a[/background][/hide]");
        assert!(buffer.as_bytes().iter().all(|b| *b == 0));
    }

    #[test]
    fn test_background_behind_fill() {
        let (_, buffer) = render("[background=blue][color=red]a[/color][/background]");
        assert_eq!(buffer.get_pixel(5, 12), Color::rgb(255, 0, 0));
        assert_eq!(buffer.get_pixel(0, 1), Color::rgb(0, 0, 255));
    }

    #[test]
    fn test_outline_does_not_cover_neighbour_fill() {
        // the second glyph's outline would reach into the first glyph
        let (_, buffer) = render("[color=red]a[/color][outline=lime][lineThickness=0.3]b[/lineThickness][/outline]");
        let bleed = 6;
        assert_eq!(buffer.get_pixel(bleed + 9, bleed + 12), Color::rgb(255, 0, 0));
        // outline shows around the second glyph
        assert_eq!(buffer.get_pixel(bleed + 12, bleed + 12), Color::rgb(0, 255, 0));
    }

    #[test]
    fn test_hollow_leaves_inside_empty() {
        let (_, buffer) = render("[stroke]a[/stroke]");
        assert_eq!(buffer.get_pixel(5, 12).a, 0);
        assert!(buffer.as_bytes().iter().any(|b| *b != 0));
    }

    #[test]
    fn test_underline() {
        let (_, buffer) = render("[u]a[/u]");
        // descent 4, thickness 1.6: line centred at y = 18
        assert_eq!(buffer.get_pixel(0, 18).a, 255);
    }

    #[test]
    fn test_dilate_grows_mask() {
        let mask = GlyphMask::solid(10, 10, 2, 2);
        let grown = mask.dilate(1.0);
        assert_eq!((grown.left, grown.top, grown.width, grown.height), (9, 9, 4, 4));
        assert_eq!(grown.at(0, 1), 255);
        assert_eq!(grown.at(0, 0), 0);
        let ring = grown.subtract(&mask);
        assert_eq!(ring.at(1, 1), 0);
        assert_eq!(ring.at(0, 1), 255);
    }
}
