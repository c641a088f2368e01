//! Block / line / span reconstruction from raw character geometry.
//!
//! pdfium hands out characters in content-stream order with their boxes and
//! font attributes, but no grouping. The grouping here mirrors what a layout
//! aware reader would produce: characters sharing a baseline band form a line,
//! runs of one font inside a line form spans, and vertically adjacent lines of
//! one column and font size form a block.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{BLOCK_GAP_RATIO, FONT_SIZE_TOLERANCE, GRID_SCALE};
use crate::types::{Address, BoundingBox, Glyph};

/// A character as read from the PDF, in points with a top-left origin.
#[derive(Debug, Clone, PartialEq)]
pub struct RawChar {
    pub ch: char,
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub font_size: f32,
    pub font_name: String,
}

/// Characters in these general categories are not printable: control,
/// format, private-use, unassigned and separators.
static NON_PRINTABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\p{Cc}\p{Cf}\p{Co}\p{Cn}\p{Zl}\p{Zp}\p{Zs}]$")
        .expect("non-printable category pattern is valid")
});

/// Printable by Unicode general category; the plain ASCII space is the one
/// separator that counts as printable.
pub fn is_printable(c: char) -> bool {
    if c == ' ' {
        return true;
    }
    let mut buf = [0u8; 4];
    !NON_PRINTABLE.is_match(c.encode_utf8(&mut buf))
}

/// Scale a coordinate onto the 0..1000 grid, truncating toward zero.
pub fn normalize(value: f32, extent: f32) -> i32 {
    if extent <= 0.0 {
        return 0;
    }
    (value / extent * GRID_SCALE) as i32
}

#[derive(Debug, Clone, Copy)]
struct Extent {
    left: f32,
    top: f32,
    right: f32,
    bottom: f32,
    font_size: f32,
}

impl Extent {
    fn height(&self) -> f32 {
        (self.bottom - self.top).max(0.0)
    }
}

fn extent_of(chars: &[&RawChar]) -> Extent {
    // Whitespace boxes are unreliable, measure the inked characters when there are any
    let inked: Vec<&RawChar> = chars.iter().copied().filter(|c| !c.ch.is_whitespace()).collect();
    let source: &[&RawChar] = if inked.is_empty() { chars } else { &inked };

    let mut extent = Extent {
        left: f32::MAX,
        top: f32::MAX,
        right: f32::MIN,
        bottom: f32::MIN,
        font_size: 0.0,
    };
    for c in source {
        extent.left = extent.left.min(c.left);
        extent.top = extent.top.min(c.top);
        extent.right = extent.right.max(c.right);
        extent.bottom = extent.bottom.max(c.bottom);
        extent.font_size = extent.font_size.max(c.font_size);
    }
    extent
}

fn starts_new_line(current: &[&RawChar], next: &RawChar) -> bool {
    if current.is_empty() || next.ch.is_whitespace() {
        return false;
    }
    if current.iter().all(|c| c.ch.is_whitespace()) {
        return false;
    }
    let line = extent_of(current);
    let centre = (next.top + next.bottom) / 2.0;
    centre < line.top || centre > line.bottom || next.right <= line.left
}

fn split_lines(chars: &[RawChar]) -> Vec<Vec<&RawChar>> {
    let mut lines = Vec::new();
    let mut current: Vec<&RawChar> = Vec::new();

    for ch in chars {
        if ch.ch == '\r' || ch.ch == '\n' {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            continue;
        }
        if starts_new_line(&current, ch) {
            lines.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines.retain(|line| line.iter().any(|c| !c.ch.is_whitespace()));
    lines
}

fn split_spans<'a>(line: &[&'a RawChar]) -> Vec<Vec<&'a RawChar>> {
    let mut spans: Vec<Vec<&RawChar>> = Vec::new();
    for &ch in line {
        let same_font = spans.last().and_then(|span| span.last()).is_some_and(|prev| {
            prev.font_name == ch.font_name && (prev.font_size - ch.font_size).abs() <= 0.01
        });
        match spans.last_mut() {
            Some(span) if same_font => span.push(ch),
            _ => spans.push(vec![ch]),
        }
    }
    spans
}

fn starts_new_block(prev: &Extent, next: &Extent) -> bool {
    let gap = next.top - prev.bottom;
    gap > BLOCK_GAP_RATIO * prev.height()
        || next.top < prev.top
        || next.left > prev.right
        || next.right < prev.left
        || (next.font_size - prev.font_size).abs() > FONT_SIZE_TOLERANCE
}

/// Group one page's characters and assign addresses. Only printable
/// characters are returned; indices are assigned before filtering.
pub fn segment_page(page: usize, chars: &[RawChar], width: f32, height: f32) -> Vec<Glyph> {
    let lines = split_lines(chars);

    let mut blocks: Vec<Vec<Vec<&RawChar>>> = Vec::new();
    let mut prev_extent: Option<Extent> = None;
    for line in lines {
        let extent = extent_of(&line);
        let new_block = prev_extent.map_or(true, |prev| starts_new_block(&prev, &extent));
        match blocks.last_mut() {
            Some(block) if !new_block => block.push(line),
            _ => blocks.push(vec![line]),
        }
        prev_extent = Some(extent);
    }

    let mut glyphs = Vec::with_capacity(chars.len());
    for (b, block) in blocks.iter().enumerate() {
        for (l, line) in block.iter().enumerate() {
            for (s, span) in split_spans(line).iter().enumerate() {
                for c in span.iter().filter(|c| is_printable(c.ch)) {
                    glyphs.push(Glyph {
                        ch: c.ch,
                        bbox: BoundingBox::new(
                            normalize(c.left, width),
                            normalize(c.top, height),
                            normalize(c.right, width),
                            normalize(c.bottom, height),
                        ),
                        address: Address::new(page, b, l, s),
                    });
                }
            }
        }
    }
    glyphs
}
