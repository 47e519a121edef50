//! RGBA colors and CSS-style color strings.
//!
//! Graphics fills and BBCode `[color=...]` tags both accept the same set of
//! notations: `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`, `rgb()`/`rgba()`,
//! `hsl()`/`hsla()` and a table of named colors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// RGBA color with 8-bit straight-alpha components.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    #[inline]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// `0xRRGGBB` as used by graphics fill calls.
    #[inline]
    pub const fn from_rgb_u32(rgb: u32) -> Self {
        Self::rgb((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8)
    }

    pub fn from_f32(r: f32, g: f32, b: f32, a: f32) -> Self {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self::rgba(q(r), q(g), q(b), q(a))
    }

    /// Parse any supported CSS notation. Whitespace and case are ignored.
    pub fn parse(input: &str) -> Option<Self> {
        let s = input.trim();
        if s.is_empty() {
            return None;
        }
        if let Some(hex) = s.strip_prefix('#') {
            return Self::from_hex(hex);
        }
        let lower = s.to_ascii_lowercase();
        if let Some((func, args)) = split_function(&lower) {
            return match func {
                "rgb" | "rgba" => parse_rgb(args),
                "hsl" | "hsla" => parse_hsl(args),
                _ => None,
            };
        }
        Self::from_name(&lower)
    }

    /// Hex digits without the leading `#`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

        match hex.len() {
            3 => Some(Self::rgb(nibble(0)?, nibble(1)?, nibble(2)?)),
            4 => Some(Self::rgba(nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?)),
            6 => Some(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Self::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let c = match name {
            "transparent" => Self::TRANSPARENT,
            "black" => Self::BLACK,
            "white" => Self::WHITE,
            "red" => Self::rgb(255, 0, 0),
            "green" => Self::rgb(0, 128, 0),
            "blue" => Self::rgb(0, 0, 255),
            "yellow" => Self::rgb(255, 255, 0),
            "cyan" | "aqua" => Self::rgb(0, 255, 255),
            "magenta" | "fuchsia" => Self::rgb(255, 0, 255),
            "gray" | "grey" => Self::rgb(128, 128, 128),
            "silver" => Self::rgb(192, 192, 192),
            "maroon" => Self::rgb(128, 0, 0),
            "olive" => Self::rgb(128, 128, 0),
            "lime" => Self::rgb(0, 255, 0),
            "teal" => Self::rgb(0, 128, 128),
            "navy" => Self::rgb(0, 0, 128),
            "purple" => Self::rgb(128, 0, 128),
            "orange" => Self::rgb(255, 165, 0),
            "pink" => Self::rgb(255, 192, 203),
            "brown" => Self::rgb(165, 42, 42),
            "gold" => Self::rgb(255, 215, 0),
            "crimson" => Self::rgb(220, 20, 60),
            "darkgray" | "darkgrey" => Self::rgb(169, 169, 169),
            "lightgray" | "lightgrey" => Self::rgb(211, 211, 211),
            "orangered" => Self::rgb(255, 69, 0),
            "skyblue" => Self::rgb(135, 206, 235),
            "steelblue" => Self::rgb(70, 130, 180),
            "tomato" => Self::rgb(255, 99, 71),
            "violet" => Self::rgb(238, 130, 238),
            _ => return None,
        };
        Some(c)
    }

    /// Normalized components for shader uniforms.
    #[inline]
    pub fn to_f32_array(&self) -> [f32; 4] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        ]
    }

    /// Same color with its alpha multiplied by `factor`.
    #[must_use]
    pub fn with_alpha_factor(&self, factor: f32) -> Color {
        let a = (self.a as f32 * factor.clamp(0.0, 1.0)).round() as u8;
        Color { a, ..*self }
    }

    /// Source-over compositing of `self` onto `background`.
    pub fn blend_over(&self, background: Color) -> Color {
        let fg_a = self.a as f32 / 255.0;
        let bg_a = background.a as f32 / 255.0;
        let out_a = fg_a + bg_a * (1.0 - fg_a);
        if out_a <= 0.0 {
            return Color::TRANSPARENT;
        }

        let mix = |fg: u8, bg: u8| {
            let v = (fg as f32 * fg_a + bg as f32 * bg_a * (1.0 - fg_a)) / out_a;
            v.round().clamp(0.0, 255.0) as u8
        };

        Color::rgba(
            mix(self.r, background.r),
            mix(self.g, background.g),
            mix(self.b, background.b),
            (out_a * 255.0).round() as u8,
        )
    }
}

impl FromStr for Color {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::parse(s).ok_or_else(|| ParseColorError(s.to_string()))
    }
}

/// Returned by [`Color::from_str`] for unrecognized input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseColorError(pub String);

impl fmt::Display for ParseColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid color: {:?}", self.0)
    }
}

impl std::error::Error for ParseColorError {}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

fn split_function(s: &str) -> Option<(&str, &str)> {
    let open = s.find('(')?;
    let inner = s[open + 1..].strip_suffix(')')?;
    Some((s[..open].trim(), inner))
}

fn split_args(args: &str) -> Vec<&str> {
    args.split(|c: char| c == ',' || c == '/' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .collect()
}

fn parse_channel(part: &str) -> Option<u8> {
    if let Some(pct) = part.strip_suffix('%') {
        let v: f32 = pct.parse().ok()?;
        Some((v.clamp(0.0, 100.0) * 2.55).round() as u8)
    } else {
        let v: f32 = part.parse().ok()?;
        Some(v.round().clamp(0.0, 255.0) as u8)
    }
}

fn parse_alpha(part: &str) -> Option<u8> {
    let v = if let Some(pct) = part.strip_suffix('%') {
        pct.parse::<f32>().ok()? / 100.0
    } else {
        part.parse::<f32>().ok()?
    };
    Some((v.clamp(0.0, 1.0) * 255.0).round() as u8)
}

fn parse_percent(part: &str) -> Option<f32> {
    let v: f32 = part.strip_suffix('%').unwrap_or(part).parse().ok()?;
    Some(v.clamp(0.0, 100.0) / 100.0)
}

fn parse_rgb(args: &str) -> Option<Color> {
    let parts = split_args(args);
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let a = match parts.get(3) {
        Some(p) => parse_alpha(p)?,
        None => 255,
    };
    Some(Color::rgba(
        parse_channel(parts[0])?,
        parse_channel(parts[1])?,
        parse_channel(parts[2])?,
        a,
    ))
}

fn parse_hsl(args: &str) -> Option<Color> {
    let parts = split_args(args);
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let h: f32 = parts[0].strip_suffix("deg").unwrap_or(parts[0]).parse().ok()?;
    let s = parse_percent(parts[1])?;
    let l = parse_percent(parts[2])?;
    let a = match parts.get(3) {
        Some(p) => parse_alpha(p)?,
        None => 255,
    };
    let [r, g, b] = hsl_to_rgb(h, s, l);
    Some(Color::rgba(r, g, b, a))
}

/// `h` in degrees, `s` and `l` in `0..=1`.
pub fn hsl_to_rgb(h: f32, s: f32, l: f32) -> [u8; 3] {
    let h = h.rem_euclid(360.0) / 360.0;
    if s == 0.0 {
        let v = (l * 255.0).round() as u8;
        return [v, v, v];
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;

    let hue = |mut t: f32| {
        if t < 0.0 {
            t += 1.0;
        }
        if t > 1.0 {
            t -= 1.0;
        }
        let v = if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * (2.0 / 3.0 - t) * 6.0
        } else {
            p
        };
        (v * 255.0).round() as u8
    };

    [hue(h + 1.0 / 3.0), hue(h), hue(h - 1.0 / 3.0)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_forms() {
        assert_eq!(Color::parse("#f00"), Some(Color::rgb(255, 0, 0)));
        assert_eq!(Color::parse("#ff000080"), Some(Color::rgba(255, 0, 0, 128)));
        assert_eq!(Color::parse("#00FF00"), Some(Color::rgb(0, 255, 0)));
        assert_eq!(Color::parse("#12345"), None);
        assert_eq!(Color::parse("#gg0000"), None);
    }

    #[test]
    fn test_functional_forms() {
        assert_eq!(Color::parse("rgb(10, 20, 30)"), Some(Color::rgb(10, 20, 30)));
        assert_eq!(Color::parse("RGBA(255,0,0,0.5)"), Some(Color::rgba(255, 0, 0, 128)));
        assert_eq!(Color::parse("rgb(100% 0% 0%)"), Some(Color::rgb(255, 0, 0)));
        assert_eq!(Color::parse("hsl(120, 100%, 50%)"), Some(Color::rgb(0, 255, 0)));
        assert_eq!(Color::parse("hsla(0, 0%, 100%, 0)"), Some(Color::rgba(255, 255, 255, 0)));
        assert_eq!(Color::parse("rgb(1,2)"), None);
    }

    #[test]
    fn test_named() {
        assert_eq!(Color::parse("Red"), Some(Color::rgb(255, 0, 0)));
        assert_eq!("gold".parse::<Color>(), Ok(Color::rgb(255, 215, 0)));
        assert!("notacolor".parse::<Color>().is_err());
    }

    #[test]
    fn test_from_rgb_u32() {
        assert_eq!(Color::from_rgb_u32(0xff8000), Color::rgb(255, 128, 0));
    }

    #[test]
    fn test_blend_over() {
        let half_red = Color::rgba(255, 0, 0, 128);
        let out = half_red.blend_over(Color::WHITE);
        assert_eq!(out.a, 255);
        assert_eq!(out.r, 255);
        assert!(out.g > 120 && out.g < 135);
        assert_eq!(Color::TRANSPARENT.blend_over(Color::TRANSPARENT), Color::TRANSPARENT);
    }
}
