//! Line breaking and placement.
//!
//! Both engines build a flat list of word pieces (each word with its
//! trailing spaces) and explicit breaks, then pack the pieces greedily into
//! lines. A piece that cannot fit on an empty line is split grapheme by
//! grapheme. Adjacent pieces with equal styles merge into one
//! [`RenderUnit`].

use crate::bbcode;
use crate::measure::TextMeasurer;
use crate::style::{RunStyle, TextAlign, TextStyle};
use serde::Serialize;
use unicode_segmentation::UnicodeSegmentation;

const FIT_EPSILON: f32 = 0.01;

/// A maximal run of text with one style on one line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderUnit {
    pub text: String,
    pub style: RunStyle,
    /// Left edge relative to the block, alignment applied.
    pub x: f32,
    /// Advance width including trailing spaces.
    pub width: f32,
    pub ascent: f32,
    pub descent: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineInfo {
    pub units: Vec<RenderUnit>,
    /// Top of the line box.
    pub y: f32,
    /// Width without trailing spaces.
    pub width: f32,
    pub height: f32,
    /// Baseline, relative to the block top.
    pub baseline: f32,
}

impl LineInfo {
    pub fn text(&self) -> String {
        self.units.iter().map(|u| u.text.as_str()).collect()
    }
}

/// A laid-out text block.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TextLayout {
    pub lines: Vec<LineInfo>,
    pub width: f32,
    pub height: f32,
    /// Padding needed around the block so outlines are not clipped.
    pub bleed: f32,
}

impl TextLayout {
    /// Lines joined with `\n`.
    pub fn text(&self) -> String {
        self.lines.iter().map(LineInfo::text).collect::<Vec<_>>().join("\n")
    }

    /// Raster size including bleed on every side, at least 1x1.
    pub fn pixel_size(&self) -> (u32, u32) {
        let w = (self.width + 2.0 * self.bleed).ceil().max(1.0);
        let h = (self.height + 2.0 * self.bleed).ceil().max(1.0);
        (w as u32, h as u32)
    }

    pub fn units(&self) -> impl Iterator<Item = (&LineInfo, &RenderUnit)> {
        self.lines.iter().flat_map(|l| l.units.iter().map(move |u| (l, u)))
    }
}

/// Lay out `text` with the engine `style.bbcode_enabled` selects.
pub fn layout(text: &str, style: &TextStyle, measurer: &dyn TextMeasurer) -> TextLayout {
    if style.bbcode_enabled {
        layout_bbcode(text, style, measurer)
    } else {
        layout_plain(text, style, measurer)
    }
}

/// Lay out `text` literally in the base style.
pub fn layout_plain(text: &str, style: &TextStyle, measurer: &dyn TextMeasurer) -> TextLayout {
    let run = RunStyle::from_base(style);
    let mut packer = Packer::new(measurer, style.wrap_width());
    push_text(&mut packer, text, &run);
    finish(packer.finish(), style, measurer)
}

/// Parse `text` as BBCode and lay out its segments.
pub fn layout_bbcode(text: &str, style: &TextStyle, measurer: &dyn TextMeasurer) -> TextLayout {
    let mut packer = Packer::new(measurer, style.wrap_width());
    for segment in bbcode::parse(text) {
        let run = RunStyle::resolve(style, &segment.tags);
        push_text(&mut packer, &segment.text, &run);
    }
    finish(packer.finish(), style, measurer)
}

fn push_text(packer: &mut Packer<'_>, text: &str, style: &RunStyle) {
    for (i, paragraph) in text.split('\n').enumerate() {
        if i > 0 {
            packer.line_break();
        }
        let paragraph = paragraph.strip_suffix('\r').unwrap_or(paragraph);
        for piece in paragraph.split_inclusive(' ') {
            packer.push_piece(piece, style);
        }
    }
}

/// Advance of `text` in `style`, letter spacing included.
pub fn run_width(measurer: &dyn TextMeasurer, text: &str, style: &RunStyle) -> f32 {
    let spacing = style.letter_spacing * text.chars().count() as f32;
    measurer.measure(text, &style.font()) + spacing
}

struct Packer<'a> {
    measurer: &'a dyn TextMeasurer,
    max_width: Option<f32>,
    lines: Vec<Vec<RenderUnit>>,
    current: Vec<RenderUnit>,
    current_width: f32,
}

impl<'a> Packer<'a> {
    fn new(measurer: &'a dyn TextMeasurer, max_width: Option<f32>) -> Self {
        Self { measurer, max_width, lines: Vec::new(), current: Vec::new(), current_width: 0.0 }
    }

    fn line_break(&mut self) {
        self.lines.push(std::mem::take(&mut self.current));
        self.current_width = 0.0;
    }

    fn push_piece(&mut self, piece: &str, style: &RunStyle) {
        let Some(max) = self.max_width else {
            self.append(piece, style);
            return;
        };
        let fit = run_width(self.measurer, piece.trim_end_matches(' '), style);
        if self.current_width + fit <= max + FIT_EPSILON {
            self.append(piece, style);
        } else if fit <= max + FIT_EPSILON {
            self.line_break();
            self.append(piece, style);
        } else {
            for grapheme in piece.graphemes(true) {
                let w = run_width(self.measurer, grapheme, style);
                let blank = grapheme.trim().is_empty();
                if !blank && !self.current.is_empty() && self.current_width + w > max + FIT_EPSILON {
                    self.line_break();
                }
                self.append(grapheme, style);
            }
        }
    }

    fn append(&mut self, text: &str, style: &RunStyle) {
        if text.is_empty() {
            return;
        }
        let width = run_width(self.measurer, text, style);
        self.current_width += width;
        if let Some(last) = self.current.last_mut() {
            if last.style == *style {
                last.text.push_str(text);
                last.width += width;
                return;
            }
        }
        let metrics = self.measurer.line_metrics(&style.font());
        self.current.push(RenderUnit {
            text: text.to_string(),
            style: style.clone(),
            x: 0.0,
            width,
            ascent: metrics.ascent,
            descent: metrics.descent,
        });
    }

    fn finish(mut self) -> Vec<Vec<RenderUnit>> {
        self.lines.push(std::mem::take(&mut self.current));
        self.lines
    }
}

fn finish(lines: Vec<Vec<RenderUnit>>, style: &TextStyle, measurer: &dyn TextMeasurer) -> TextLayout {
    let base = RunStyle::from_base(style);
    let base_metrics = measurer.line_metrics(&base.font());

    let mut out = TextLayout::default();
    let mut y = 0.0;
    for units in lines {
        let (mut ascent, mut descent, mut size) = (0.0f32, 0.0f32, 0.0f32);
        for unit in &units {
            ascent = ascent.max(unit.ascent);
            descent = descent.max(unit.descent);
            size = size.max(unit.style.font_size);
        }
        if units.is_empty() {
            ascent = base_metrics.ascent;
            descent = base_metrics.descent;
            size = style.font_size;
        }
        let height = size * style.line_height;
        let baseline = y + (height - (ascent + descent)) / 2.0 + ascent;

        let full: f32 = units.iter().map(|u| u.width).sum();
        let trailing = units
            .last()
            .map(|u| {
                let trimmed = u.text.trim_end_matches(' ');
                run_width(measurer, &u.text[trimmed.len()..], &u.style)
            })
            .unwrap_or(0.0);
        let width = (full - trailing).max(0.0);

        out.width = out.width.max(width);
        out.lines.push(LineInfo { units, y, width, height, baseline });
        y += height;
    }
    out.height = y;

    for line in &mut out.lines {
        let mut x = match style.align {
            TextAlign::Left => 0.0,
            TextAlign::Center => (out.width - line.width) / 2.0,
            TextAlign::Right => out.width - line.width,
        };
        for unit in &mut line.units {
            unit.x = x;
            x += unit.width;
            out.bleed = out.bleed.max(unit.style.bleed());
        }
    }
    out.bleed = out.bleed.ceil();
    out
}
