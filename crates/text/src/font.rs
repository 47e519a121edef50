//! Font loading and glyph rasterization with `fontdue`.

use crate::measure::{FontSpec, GlyphBitmap, LineMetrics, MonospaceMeasurer, TextMeasurer};
use fontdue::{Font, FontSettings};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// A parsed font with a glyph cache.
pub struct LoadedFont {
    font: Font,
    glyph_cache: RwLock<HashMap<(char, u32), Arc<GlyphBitmap>>>,
}

impl LoadedFont {
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let font = Font::from_bytes(data, FontSettings::default()).ok()?;
        Some(Self { font, glyph_cache: RwLock::new(HashMap::new()) })
    }

    /// Rasterize `ch` at `size` pixels. Sizes are quantized to 0.1px for
    /// caching.
    pub fn rasterize(&self, ch: char, size: f32) -> Arc<GlyphBitmap> {
        let key = (ch, (size * 10.0) as u32);
        if let Some(bitmap) = self.glyph_cache.read().get(&key) {
            return bitmap.clone();
        }

        let (metrics, coverage) = self.font.rasterize(ch, size);
        let bitmap = Arc::new(GlyphBitmap {
            width: metrics.width as u32,
            height: metrics.height as u32,
            xmin: metrics.xmin,
            ymin: metrics.ymin,
            advance: metrics.advance_width,
            coverage,
        });
        self.glyph_cache.write().insert(key, bitmap.clone());
        bitmap
    }

    pub fn advance(&self, ch: char, size: f32) -> f32 {
        self.font.metrics(ch, size).advance_width
    }

    pub fn line_metrics(&self, size: f32) -> LineMetrics {
        match self.font.horizontal_line_metrics(size) {
            Some(m) => LineMetrics { ascent: m.ascent, descent: -m.descent },
            None => MonospaceMeasurer.line_metrics(&FontSpec::new("", size)),
        }
    }

    pub fn cached_glyphs(&self) -> usize {
        self.glyph_cache.read().len()
    }
}

/// Fonts by lowercased family name, with generic-family lookup on the local
/// filesystem and a fixed-advance fallback when nothing can be loaded.
pub struct FontCache {
    fonts: RwLock<HashMap<String, Arc<LoadedFont>>>,
    missing: RwLock<HashSet<String>>,
    default_font: Option<Arc<LoadedFont>>,
    system_lookup: bool,
}

impl FontCache {
    /// Cache that looks for system fonts and picks a default sans-serif.
    pub fn new() -> Self {
        let mut cache = Self::empty();
        cache.system_lookup = true;
        cache.default_font = cache.load_generic("sans-serif");
        if cache.default_font.is_none() {
            debug!("no system font found, using fixed-advance metrics");
        }
        cache
    }

    /// Cache holding only explicitly added fonts.
    pub fn empty() -> Self {
        Self {
            fonts: RwLock::new(HashMap::new()),
            missing: RwLock::new(HashSet::new()),
            default_font: None,
            system_lookup: false,
        }
    }

    /// System lookup plus embedded `(family, data)` pairs, for targets such
    /// as the web where no font files can be read. Data that does not parse
    /// is skipped.
    pub fn with_fonts<'a>(fonts: impl IntoIterator<Item = (&'a str, &'a [u8])>) -> Self {
        let mut cache = Self::new();
        for (family, data) in fonts {
            if !cache.add_font(family, data) {
                warn!(family, "skipping font data that does not parse");
            }
        }
        cache
    }

    /// Register font data under `family`. The first registered font becomes
    /// the default when none was found on the system.
    pub fn add_font(&mut self, family: &str, data: &[u8]) -> bool {
        let Some(font) = LoadedFont::from_bytes(data).map(Arc::new) else {
            return false;
        };
        let family = family.to_lowercase();
        self.missing.write().remove(&family);
        if self.default_font.is_none() {
            self.default_font = Some(font.clone());
        }
        self.fonts.write().insert(family, font);
        true
    }

    pub fn add_font_file(&mut self, family: &str, path: &str) -> bool {
        match std::fs::read(path) {
            Ok(data) => self.add_font(family, &data),
            Err(_) => false,
        }
    }

    pub fn has_default_font(&self) -> bool {
        self.default_font.is_some()
    }

    /// Font for `family`, falling back to the default font.
    pub fn get_font(&self, family: &str) -> Option<Arc<LoadedFont>> {
        let family = family.to_lowercase();
        if let Some(font) = self.fonts.read().get(&family) {
            return Some(font.clone());
        }
        if self.system_lookup && !self.missing.read().contains(&family) {
            match self.load_generic(generic_family(&family)) {
                Some(font) => {
                    self.fonts.write().insert(family, font.clone());
                    return Some(font);
                }
                None => {
                    self.missing.write().insert(family);
                }
            }
        }
        self.default_font.clone()
    }

    fn load_generic(&self, generic: &str) -> Option<Arc<LoadedFont>> {
        system_font_paths(generic)
            .iter()
            .filter_map(|path| std::fs::read(path).ok())
            .find_map(|data| LoadedFont::from_bytes(&data))
            .map(Arc::new)
    }

    pub fn len(&self) -> usize {
        self.fonts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.read().is_empty()
    }
}

impl Default for FontCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TextMeasurer for FontCache {
    fn advance(&self, ch: char, font: &FontSpec) -> f32 {
        match self.get_font(&font.family) {
            Some(f) => f.advance(ch, font.size),
            None => MonospaceMeasurer.advance(ch, font),
        }
    }

    fn line_metrics(&self, font: &FontSpec) -> LineMetrics {
        match self.get_font(&font.family) {
            Some(f) => f.line_metrics(font.size),
            None => MonospaceMeasurer.line_metrics(font),
        }
    }

    fn glyph(&self, ch: char, font: &FontSpec) -> Option<Arc<GlyphBitmap>> {
        self.get_font(&font.family).map(|f| f.rasterize(ch, font.size))
    }
}

fn generic_family(family: &str) -> &'static str {
    if family.contains("mono") || family.contains("courier") {
        "monospace"
    } else if family.contains("serif") && !family.contains("sans") {
        "serif"
    } else {
        "sans-serif"
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn system_font_paths(generic: &str) -> Vec<&'static str> {
    let mut paths = match generic {
        "serif" => vec![
            "/usr/share/fonts/truetype/dejavu/DejaVuSerif.ttf",
            "/usr/share/fonts/TTF/DejaVuSerif.ttf",
            "/usr/share/fonts/truetype/liberation/LiberationSerif-Regular.ttf",
        ],
        "monospace" => vec![
            "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf",
            "/usr/share/fonts/TTF/DejaVuSansMono.ttf",
            "/usr/share/fonts/truetype/liberation/LiberationMono-Regular.ttf",
        ],
        _ => vec![
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/TTF/DejaVuSans.ttf",
            "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        ],
    };

    #[cfg(target_os = "macos")]
    paths.extend(match generic {
        "serif" => ["/System/Library/Fonts/Times.ttc", "/Library/Fonts/Georgia.ttf"],
        "monospace" => ["/System/Library/Fonts/Menlo.ttc", "/System/Library/Fonts/Courier.ttc"],
        _ => ["/System/Library/Fonts/Helvetica.ttc", "/Library/Fonts/Arial.ttf"],
    });

    #[cfg(target_os = "windows")]
    paths.extend(match generic {
        "serif" => ["C:\\Windows\\Fonts\\times.ttf", "C:\\Windows\\Fonts\\georgia.ttf"],
        "monospace" => ["C:\\Windows\\Fonts\\consola.ttf", "C:\\Windows\\Fonts\\cour.ttf"],
        _ => ["C:\\Windows\\Fonts\\arial.ttf", "C:\\Windows\\Fonts\\segoeui.ttf"],
    });

    paths.dedup();
    paths
}

#[cfg(target_arch = "wasm32")]
fn system_font_paths(_generic: &str) -> Vec<&'static str> {
    Vec::new()
}
