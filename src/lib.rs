// paper2audio library - layout-labelled blocks from academic PDFs
pub mod audio;
pub mod config;
pub mod pdf_extraction;
pub mod render;
pub mod theme;
pub mod types;

pub use pdf_extraction::{LayoutPipeline, PipelineOptions};
pub use types::{Error, Label, LabeledBlock, Result};
