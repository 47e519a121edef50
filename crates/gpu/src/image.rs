//! Encoded image decoding.

use common::PixelBuffer;

/// Decode PNG/JPEG/GIF/... bytes into straight-alpha RGBA.
pub fn decode_image(bytes: &[u8]) -> Result<PixelBuffer, String> {
    let format = ::image::guess_format(bytes).map_err(|e| e.to_string())?;
    let img = ::image::load_from_memory_with_format(bytes, format).map_err(|e| e.to_string())?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    PixelBuffer::from_rgba(width, height, rgba.into_raw())
        .ok_or_else(|| format!("decoded buffer size mismatch for {width}x{height}"))
}

/// Encode an RGBA buffer as PNG. Used by tests and the demo tool.
pub fn encode_png(pixels: &PixelBuffer) -> Result<Vec<u8>, String> {
    let img = ::image::RgbaImage::from_raw(pixels.width, pixels.height, pixels.data.clone())
        .ok_or_else(|| "pixel buffer size mismatch".to_string())?;
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, ::image::ImageFormat::Png)
        .map_err(|e| e.to_string())?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Color;

    #[test]
    fn test_png_decodes_to_rgba() {
        let mut src = PixelBuffer::new(3, 2);
        src.set_pixel(2, 1, Color::rgba(10, 20, 30, 40));
        let png = encode_png(&src).unwrap();

        let decoded = decode_image(&png).unwrap();
        assert_eq!(decoded.width, 3);
        assert_eq!(decoded.height, 2);
        assert_eq!(decoded.get_pixel(2, 1), Color::rgba(10, 20, 30, 40));
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(decode_image(b"definitely not an image").is_err());
    }
}
