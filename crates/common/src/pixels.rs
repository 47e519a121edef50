//! CPU-side RGBA8 images.

use crate::color::Color;

/// Straight-alpha RGBA pixel buffer, rows top to bottom.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// RGBA pixel data (4 bytes per pixel).
    pub data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let size = width as usize * height as usize * 4;
        Self {
            width,
            height,
            data: vec![0; size],
        }
    }

    /// Wrap existing RGBA bytes. Returns `None` if the length does not match.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != width as usize * height as usize * 4 {
            return None;
        }
        Some(Self { width, height, data })
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn fill(&mut self, color: Color) {
        for px in self.data.chunks_exact_mut(4) {
            px.copy_from_slice(&[color.r, color.g, color.b, color.a]);
        }
    }

    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * 4)
    }

    /// Out-of-bounds reads are transparent.
    pub fn get_pixel(&self, x: u32, y: u32) -> Color {
        match self.offset(x, y) {
            Some(o) => Color::rgba(self.data[o], self.data[o + 1], self.data[o + 2], self.data[o + 3]),
            None => Color::TRANSPARENT,
        }
    }

    /// Out-of-bounds writes are ignored.
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Color) {
        if let Some(o) = self.offset(x, y) {
            self.data[o..o + 4].copy_from_slice(&[color.r, color.g, color.b, color.a]);
        }
    }

    /// Source-over blend of `color` onto the pixel.
    pub fn blend_pixel(&mut self, x: u32, y: u32, color: Color) {
        if color.a == 0 {
            return;
        }
        if self.offset(x, y).is_none() {
            return;
        }
        let blended = color.blend_over(self.get_pixel(x, y));
        self.set_pixel(x, y, blended);
    }

    /// Blend `color` scaled by an 8-bit coverage value (glyph masks, edges).
    pub fn blend_coverage(&mut self, x: i32, y: i32, color: Color, coverage: u8) {
        if x < 0 || y < 0 || coverage == 0 {
            return;
        }
        let a = (color.a as u32 * coverage as u32 + 127) / 255;
        self.blend_pixel(x as u32, y as u32, Color { a: a as u8, ..color });
    }

    /// Blend a solid rectangle, clipped to the buffer. Fractional edges are
    /// rounded to whole pixels.
    pub fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Color) {
        let x0 = x.round().max(0.0) as u32;
        let y0 = y.round().max(0.0) as u32;
        let x1 = ((x + width).round().max(0.0) as u32).min(self.width);
        let y1 = ((y + height).round().max(0.0) as u32).min(self.height);
        for py in y0..y1 {
            for px in x0..x1 {
                self.blend_pixel(px, py, color);
            }
        }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}
