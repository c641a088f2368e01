// Core types for paper2audio
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// DocLayNet layout classes, in model label-id order.
///
/// The derived `Ord` follows the id order, which is also the tie-break used
/// when two labels receive the same number of votes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    Caption,
    Footnote,
    Formula,
    #[serde(rename = "List-item")]
    ListItem,
    #[serde(rename = "Page-footer")]
    PageFooter,
    #[serde(rename = "Page-header")]
    PageHeader,
    Picture,
    #[serde(rename = "Section-header")]
    SectionHeader,
    Table,
    Text,
    Title,
}

impl Label {
    pub const COUNT: usize = 11;

    pub const ALL: [Label; Label::COUNT] = [
        Label::Caption,
        Label::Footnote,
        Label::Formula,
        Label::ListItem,
        Label::PageFooter,
        Label::PageHeader,
        Label::Picture,
        Label::SectionHeader,
        Label::Table,
        Label::Text,
        Label::Title,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Label::Caption => "Caption",
            Label::Footnote => "Footnote",
            Label::Formula => "Formula",
            Label::ListItem => "List-item",
            Label::PageFooter => "Page-footer",
            Label::PageHeader => "Page-header",
            Label::Picture => "Picture",
            Label::SectionHeader => "Section-header",
            Label::Table => "Table",
            Label::Text => "Text",
            Label::Title => "Title",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Label::ALL
            .iter()
            .copied()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| Error::UnknownLabel(s.to_string()))
    }
}

/// Box on the 0..1000 page grid, top-left origin.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl BoundingBox {
    pub const fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Values the layout model accepts: every coordinate inside 0..=1000.
    pub fn clamped(&self) -> [i64; 4] {
        let clamp = |v: i32| i64::from(v.clamp(0, 1000));
        [clamp(self.x0), clamp(self.y0), clamp(self.x1), clamp(self.y1)]
    }
}

/// Position of a glyph in the page/block/line/span decomposition.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    pub page: usize,
    pub block: usize,
    pub line: usize,
    pub span: usize,
}

impl Address {
    pub const fn new(page: usize, block: usize, line: usize, span: usize) -> Self {
        Self { page, block, line, span }
    }

    pub fn block_key(&self) -> (usize, usize) {
        (self.page, self.block)
    }

    pub fn line_key(&self) -> (usize, usize, usize) {
        (self.page, self.block, self.line)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Glyph {
    pub ch: char,
    pub bbox: BoundingBox,
    pub address: Address,
}

/// The unit handed to the renderers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledBlock {
    pub label: Label,
    pub text: String,
}

impl LabeledBlock {
    pub fn new(label: Label, text: impl Into<String>) -> Self {
        Self { label, text: text.into() }
    }
}

// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Unknown layout label: {0}")]
    UnknownLabel(String),

    #[error("Model produced label id {0} which is not in the label table")]
    UnknownLabelId(u32),

    #[error("Token offsets {start}..{end} fall outside page {page} with {len} glyphs")]
    OffsetOutOfRange {
        page: usize,
        start: usize,
        end: usize,
        len: usize,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Speech synthesis error: {0}")]
    Synthesis(String),

    #[error("Playback error: {0}")]
    Playback(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<pdfium_render::prelude::PdfiumError> for Error {
    fn from(err: pdfium_render::prelude::PdfiumError) -> Self {
        Error::Pdf(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
