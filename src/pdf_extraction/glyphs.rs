// Geometric extraction: per-page glyphs on the 0..1000 grid plus a raster
use image::{DynamicImage, RgbImage};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::pdfium_loader::with_pdfium;
use super::structure::{segment_page, RawChar};
use crate::types::{Error, Glyph, Result};

#[derive(Debug, Clone)]
pub struct Page {
    pub index: usize,
    /// Page size in PDF points.
    pub width: f32,
    pub height: f32,
    /// Raster at one pixel per point.
    pub image: RgbImage,
    /// Printable glyphs in reading order.
    pub glyphs: Vec<Glyph>,
}

impl Page {
    /// The character stream the tokenizer sees; char `i` is `glyphs[i]`.
    pub fn text(&self) -> String {
        self.glyphs.iter().map(|g| g.ch).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Document {
    pub pages: Vec<Page>,
}

impl Document {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Anything that can turn a path into pages of glyphs.
pub trait DocumentSource {
    fn load(&self, path: &Path) -> Result<Document>;
}

pub struct PdfiumExtractor {
    lib_dir: PathBuf,
}

impl PdfiumExtractor {
    pub fn new(lib_dir: impl Into<PathBuf>) -> Self {
        Self { lib_dir: lib_dir.into() }
    }
}

impl DocumentSource for PdfiumExtractor {
    fn load(&self, path: &Path) -> Result<Document> {
        with_pdfium(&self.lib_dir, |pdfium| {
            let document = pdfium
                .load_pdf_from_file(path, None)
                .map_err(|e| Error::Pdf(format!("{}: {}", path.display(), e)))?;

            let mut pages = Vec::with_capacity(document.pages().len() as usize);
            for (index, page) in document.pages().iter().enumerate() {
                pages.push(read_page(index, &page)?);
            }
            info!(pages = pages.len(), path = %path.display(), "extracted glyph geometry");
            Ok(Document { pages })
        })
    }
}

fn read_page(index: usize, page: &PdfPage) -> Result<Page> {
    let width = page.width().value;
    let height = page.height().value;

    let text = page.text()?;
    let mut raw = Vec::new();
    let mut last_right: Option<(f32, f32, f32)> = None;

    for ch in text.chars().iter() {
        let Some(c) = ch.unicode_char() else {
            continue;
        };
        let font_size = ch.scaled_font_size().value;
        let font_name = ch.font_name();

        // PDF space is bottom-up, flip to a top-left origin
        let (left, top, right, bottom) = match ch.loose_bounds() {
            Ok(rect) => (
                rect.left().value,
                height - rect.top().value,
                rect.right().value,
                height - rect.bottom().value,
            ),
            // Generated characters carry no box, park them at the previous glyph's right edge
            Err(_) => match last_right {
                Some((x, top, bottom)) => (x, top, x, bottom),
                None => continue,
            },
        };
        last_right = Some((right, top, bottom));

        raw.push(RawChar {
            ch: c,
            left,
            top,
            right,
            bottom,
            font_size,
            font_name,
        });
    }

    let glyphs = segment_page(index, &raw, width, height);
    debug!(page = index, chars = raw.len(), glyphs = glyphs.len(), "segmented page");

    let render_config = PdfRenderConfig::new()
        .set_target_size(width.round() as i32, height.round() as i32);
    let bitmap = page.render_with_config(&render_config)?;
    let image = DynamicImage::from(bitmap.as_image()).to_rgb8();

    Ok(Page {
        index,
        width,
        height,
        image,
        glyphs,
    })
}
