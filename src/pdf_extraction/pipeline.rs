// Extract -> Classify -> Aggregate -> Trim -> Merge -> StripCitations
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

use super::aggregator::{aggregate_page, Granularity, SpanTexts};
use super::glyphs::{Document, DocumentSource};
use super::layoutlm_extraction::{LayoutClassifier, TokenClassifier};
use super::postprocess::{merge_consecutive, strip_block_citations, trim_front_matter};
use super::tokenizer::WindowTokenizer;
use crate::types::{Label, LabeledBlock, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    pub granularity: Granularity,
    /// Units whose dominant label is listed here are dropped.
    pub exclude: BTreeSet<Label>,
    /// Section-header text at which emission stops for the rest of the document.
    pub stop_at_section: Option<String>,
    pub merge_consecutive: bool,
    pub remove_citations: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            granularity: Granularity::Line,
            exclude: BTreeSet::new(),
            stop_at_section: None,
            merge_consecutive: false,
            remove_citations: false,
        }
    }
}

impl PipelineOptions {
    /// What both CLI renderers use for academic papers.
    pub fn for_papers() -> Self {
        Self {
            granularity: Granularity::Block,
            exclude: [
                Label::Footnote,
                Label::PageHeader,
                Label::PageFooter,
                Label::Table,
                Label::Formula,
                Label::Picture,
            ]
            .into_iter()
            .collect(),
            stop_at_section: Some("References".to_string()),
            merge_consecutive: true,
            remove_citations: true,
        }
    }
}

pub struct LayoutPipeline<T, C> {
    classifier: LayoutClassifier<T, C>,
}

impl<T: WindowTokenizer, C: TokenClassifier> LayoutPipeline<T, C> {
    pub fn new(tokenizer: T, oracle: C) -> Self {
        Self {
            classifier: LayoutClassifier::new(tokenizer, oracle),
        }
    }

    /// Read `path` with `source` and run the whole pipeline.
    pub fn extract_layout(
        &mut self,
        source: &dyn DocumentSource,
        path: &Path,
        options: &PipelineOptions,
    ) -> Result<Vec<LabeledBlock>> {
        let document = source.load(path)?;
        let blocks = self.process(&document, options)?;
        if blocks.is_empty() {
            warn!(path = %path.display(), "no title or abstract found, nothing to emit");
        }
        Ok(blocks)
    }

    /// Classify and aggregate page by page, then apply the sequence policies.
    pub fn process(&mut self, document: &Document, options: &PipelineOptions) -> Result<Vec<LabeledBlock>> {
        let total = document.page_count();
        let mut blocks = Vec::new();

        for page in &document.pages {
            let start = Instant::now();
            let tallies = self.classifier.classify_page(page)?;
            let texts = SpanTexts::from_glyphs(&page.glyphs);
            let flow = aggregate_page(&tallies, &texts, options, &mut blocks);
            info!(
                page = page.index + 1,
                total,
                blocks = blocks.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "classified page"
            );
            if flow.is_break() {
                info!(section = ?options.stop_at_section, page = page.index + 1, "reached stop section");
                break;
            }
        }

        Ok(postprocess(blocks, options))
    }
}

/// Trim, then optionally merge and strip citations, in that order.
pub fn postprocess(blocks: Vec<LabeledBlock>, options: &PipelineOptions) -> Vec<LabeledBlock> {
    let mut blocks = trim_front_matter(blocks);
    if options.merge_consecutive {
        blocks = merge_consecutive(blocks);
    }
    if options.remove_citations {
        blocks = strip_block_citations(blocks);
    }
    blocks
}
