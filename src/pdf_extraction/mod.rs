// PDF layout extraction module
pub mod aggregator;
pub mod glyphs;
pub mod layoutlm_extraction;
pub mod pdfium_loader;
pub mod pipeline;
pub mod postprocess;
pub mod structure;
pub mod tokenizer;

pub use aggregator::{Granularity, LabelTally, SpanTallies, SpanTexts};
pub use glyphs::{Document, DocumentSource, Page, PdfiumExtractor};
pub use layoutlm_extraction::{LabelTable, LayoutClassifier, ModelWindow, OnnxLayoutModel, TokenClassifier};
pub use pipeline::{LayoutPipeline, PipelineOptions};
pub use postprocess::strip_citations;
pub use tokenizer::{LayoutTokenizer, TokenWindow, WindowTokenizer};
