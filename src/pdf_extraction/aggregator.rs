//! Majority-vote aggregation of per-character labels.
//!
//! Votes are collected per span address in an ordered map, then folded
//! span → line → block while walking the map in address order. Text always
//! comes from the glyphs themselves, so classification never changes what is
//! said, only how it is labelled.

use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap};
use std::ops::ControlFlow;

use super::pipeline::PipelineOptions;
use crate::types::{Address, Glyph, Label, LabeledBlock};

/// Unit of emission.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// One block per (page, block, line).
    #[default]
    Line,
    /// One block per (page, block).
    Block,
}

/// Vote counts per label.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct LabelTally {
    counts: [u32; Label::COUNT],
}

impl LabelTally {
    pub fn add(&mut self, label: Label, votes: u32) {
        self.counts[label.index()] += votes;
    }

    pub fn merge(&mut self, other: &LabelTally) {
        for (count, extra) in self.counts.iter_mut().zip(other.counts.iter()) {
            *count += extra;
        }
    }

    pub fn count(&self, label: Label) -> u32 {
        self.counts[label.index()]
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().sum()
    }

    /// Label with the most votes; equal counts go to the lowest label id.
    pub fn dominant(&self) -> Option<Label> {
        let mut best: Option<(Label, u32)> = None;
        for label in Label::ALL {
            let count = self.count(label);
            if count == 0 {
                continue;
            }
            if best.map_or(true, |(_, top)| count > top) {
                best = Some((label, count));
            }
        }
        best.map(|(label, _)| label)
    }
}

/// Votes per span address. Entries exist only for spans that received a vote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpanTallies {
    spans: BTreeMap<Address, LabelTally>,
}

impl SpanTallies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vote(&mut self, address: Address, label: Label) {
        match self.spans.entry(address) {
            btree_map::Entry::Occupied(mut entry) => entry.get_mut().add(label, 1),
            btree_map::Entry::Vacant(entry) => {
                let mut tally = LabelTally::default();
                tally.add(label, 1);
                entry.insert(tally);
            }
        }
    }

    pub fn get(&self, address: &Address) -> Option<&LabelTally> {
        self.spans.get(address)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &LabelTally)> {
        self.spans.iter()
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

/// Exact text of every span, keyed by address.
#[derive(Debug, Clone, Default)]
pub struct SpanTexts {
    spans: BTreeMap<Address, String>,
}

impl SpanTexts {
    pub fn from_glyphs(glyphs: &[Glyph]) -> Self {
        let mut spans: BTreeMap<Address, String> = BTreeMap::new();
        for glyph in glyphs {
            spans.entry(glyph.address).or_insert_with(String::new).push(glyph.ch);
        }
        Self { spans }
    }

    pub fn get(&self, address: &Address) -> Option<&str> {
        self.spans.get(address).map(String::as_str)
    }
}

struct LineFold {
    key: (usize, usize, usize),
    tally: LabelTally,
    text: String,
}

struct BlockFold {
    key: (usize, usize),
    lines: Vec<LineFold>,
}

impl BlockFold {
    fn tally(&self) -> LabelTally {
        let mut tally = LabelTally::default();
        for line in &self.lines {
            tally.merge(&line.tally);
        }
        tally
    }

    fn text(&self) -> String {
        self.lines.iter().map(|l| l.text.as_str()).collect::<Vec<_>>().join(" ")
    }
}

fn fold_blocks(tallies: &SpanTallies, texts: &SpanTexts) -> Vec<BlockFold> {
    let mut blocks: Vec<BlockFold> = Vec::new();

    for (address, tally) in tallies.iter() {
        if blocks.last().map(|b| b.key) != Some(address.block_key()) {
            blocks.push(BlockFold {
                key: address.block_key(),
                lines: Vec::new(),
            });
        }
        let Some(block) = blocks.last_mut() else {
            continue;
        };

        if block.lines.last().map(|l| l.key) != Some(address.line_key()) {
            block.lines.push(LineFold {
                key: address.line_key(),
                tally: LabelTally::default(),
                text: String::new(),
            });
        }
        if let Some(line) = block.lines.last_mut() {
            line.tally.merge(tally);
            line.text.push_str(texts.get(address).unwrap_or_default());
        }
    }
    blocks
}

fn emit(label: Label, text: String, options: &PipelineOptions, out: &mut Vec<LabeledBlock>) -> ControlFlow<()> {
    if label == Label::SectionHeader && options.stop_at_section.as_deref() == Some(text.trim()) {
        return ControlFlow::Break(());
    }
    if !options.exclude.contains(&label) {
        out.push(LabeledBlock { label, text });
    }
    ControlFlow::Continue(())
}

/// Fold one page's votes into labelled units and append them to `out`.
///
/// Returns `Break` when the stop section was reached; the stop header and
/// everything after it on the page are not emitted.
pub fn aggregate_page(
    tallies: &SpanTallies,
    texts: &SpanTexts,
    options: &PipelineOptions,
    out: &mut Vec<LabeledBlock>,
) -> ControlFlow<()> {
    for block in fold_blocks(tallies, texts) {
        match options.granularity {
            Granularity::Line => {
                for line in block.lines {
                    if let Some(label) = line.tally.dominant() {
                        emit(label, line.text, options, out)?;
                    }
                }
            }
            Granularity::Block => {
                if let Some(label) = block.tally().dominant() {
                    emit(label, block.text(), options, out)?;
                }
            }
        }
    }
    ControlFlow::Continue(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;

    fn glyphs(items: &[(Address, &str)]) -> Vec<Glyph> {
        items
            .iter()
            .flat_map(|(address, text)| {
                text.chars().map(move |ch| Glyph {
                    ch,
                    bbox: BoundingBox::default(),
                    address: *address,
                })
            })
            .collect()
    }

    fn votes(tallies: &mut SpanTallies, address: Address, label: Label, n: usize) {
        for _ in 0..n {
            tallies.vote(address, label);
        }
    }

    fn options(granularity: Granularity) -> PipelineOptions {
        PipelineOptions {
            granularity,
            ..PipelineOptions::default()
        }
    }

    #[test]
    fn test_dominant_label() {
        let mut tally = LabelTally::default();
        assert_eq!(tally.dominant(), None);
        tally.add(Label::Text, 3);
        tally.add(Label::Title, 5);
        assert_eq!(tally.dominant(), Some(Label::Title));
        assert_eq!(tally.total(), 8);
    }

    #[test]
    fn test_tie_goes_to_lowest_label_id() {
        let mut tally = LabelTally::default();
        tally.add(Label::Title, 4);
        tally.add(Label::Text, 4);
        tally.add(Label::Caption, 1);
        assert_eq!(tally.dominant(), Some(Label::Text));

        tally.add(Label::SectionHeader, 4);
        assert_eq!(tally.dominant(), Some(Label::SectionHeader));
    }

    #[test]
    fn test_span_votes_accumulate() {
        let mut tallies = SpanTallies::new();
        let addr = Address::new(0, 1, 2, 0);
        votes(&mut tallies, addr, Label::Text, 2);
        votes(&mut tallies, addr, Label::Caption, 1);
        let tally = tallies.get(&addr).unwrap();
        assert_eq!(tally.count(Label::Text), 2);
        assert_eq!(tally.count(Label::Caption), 1);
        assert_eq!(tallies.len(), 1);
    }

    #[test]
    fn test_block_granularity_joins_lines_with_space_and_spans_without() {
        let a = Address::new(0, 0, 0, 0);
        let b = Address::new(0, 0, 0, 1);
        let c = Address::new(0, 0, 1, 0);
        let texts = SpanTexts::from_glyphs(&glyphs(&[(a, "Deep "), (b, "nets"), (c, "work")]));

        let mut tallies = SpanTallies::new();
        votes(&mut tallies, a, Label::Text, 2);
        votes(&mut tallies, b, Label::Text, 1);
        votes(&mut tallies, c, Label::Caption, 2);

        let mut out = Vec::new();
        let flow = aggregate_page(&tallies, &texts, &options(Granularity::Block), &mut out);
        assert!(flow.is_continue());
        assert_eq!(out, vec![LabeledBlock::new(Label::Text, "Deep nets work")]);
    }

    #[test]
    fn test_line_granularity_votes_per_line() {
        let a = Address::new(0, 0, 0, 0);
        let c = Address::new(0, 0, 1, 0);
        let texts = SpanTexts::from_glyphs(&glyphs(&[(a, "Figure 1"), (c, "body")]));

        let mut tallies = SpanTallies::new();
        votes(&mut tallies, a, Label::Caption, 3);
        votes(&mut tallies, c, Label::Text, 1);

        let mut out = Vec::new();
        let _ = aggregate_page(&tallies, &texts, &options(Granularity::Line), &mut out);
        assert_eq!(
            out,
            vec![
                LabeledBlock::new(Label::Caption, "Figure 1"),
                LabeledBlock::new(Label::Text, "body"),
            ]
        );
    }

    #[test]
    fn test_spans_without_votes_contribute_no_text() {
        let a = Address::new(0, 0, 0, 0);
        let b = Address::new(0, 0, 0, 1);
        let texts = SpanTexts::from_glyphs(&glyphs(&[(a, "kept"), (b, " dropped")]));

        let mut tallies = SpanTallies::new();
        votes(&mut tallies, a, Label::Text, 1);

        let mut out = Vec::new();
        let _ = aggregate_page(&tallies, &texts, &options(Granularity::Block), &mut out);
        assert_eq!(out[0].text, "kept");
    }

    #[test]
    fn test_excluded_labels_are_dropped() {
        let a = Address::new(0, 0, 0, 0);
        let b = Address::new(0, 1, 0, 0);
        let texts = SpanTexts::from_glyphs(&glyphs(&[(a, "arXiv preprint"), (b, "Body")]));

        let mut tallies = SpanTallies::new();
        votes(&mut tallies, a, Label::PageHeader, 1);
        votes(&mut tallies, b, Label::Text, 1);

        let mut opts = options(Granularity::Block);
        opts.exclude.insert(Label::PageHeader);
        let mut out = Vec::new();
        let _ = aggregate_page(&tallies, &texts, &opts, &mut out);
        assert_eq!(out, vec![LabeledBlock::new(Label::Text, "Body")]);
    }

    #[test]
    fn test_stop_section_halts_emission() {
        let a = Address::new(2, 0, 0, 0);
        let b = Address::new(2, 1, 0, 0);
        let c = Address::new(2, 2, 0, 0);
        let texts = SpanTexts::from_glyphs(&glyphs(&[(a, "Conclusion text"), (b, " References "), (c, "[1] A. Author")]));

        let mut tallies = SpanTallies::new();
        votes(&mut tallies, a, Label::Text, 1);
        votes(&mut tallies, b, Label::SectionHeader, 1);
        votes(&mut tallies, c, Label::Text, 1);

        let mut opts = options(Granularity::Block);
        opts.stop_at_section = Some("References".to_string());
        let mut out = Vec::new();
        let flow = aggregate_page(&tallies, &texts, &opts, &mut out);
        assert!(flow.is_break());
        assert_eq!(out, vec![LabeledBlock::new(Label::Text, "Conclusion text")]);
    }

    #[test]
    fn test_stop_section_is_case_sensitive_and_needs_section_header() {
        let a = Address::new(0, 0, 0, 0);
        let b = Address::new(0, 1, 0, 0);
        let texts = SpanTexts::from_glyphs(&glyphs(&[(a, "REFERENCES"), (b, "References")]));

        let mut tallies = SpanTallies::new();
        votes(&mut tallies, a, Label::SectionHeader, 1);
        votes(&mut tallies, b, Label::Text, 1);

        let mut opts = options(Granularity::Block);
        opts.stop_at_section = Some("References".to_string());
        let mut out = Vec::new();
        assert!(aggregate_page(&tallies, &texts, &opts, &mut out).is_continue());
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_emission_follows_address_order() {
        let later = Address::new(0, 3, 0, 0);
        let earlier = Address::new(0, 1, 0, 0);
        let texts = SpanTexts::from_glyphs(&glyphs(&[(later, "second"), (earlier, "first")]));

        let mut tallies = SpanTallies::new();
        votes(&mut tallies, later, Label::Text, 1);
        votes(&mut tallies, earlier, Label::Text, 1);

        let mut out = Vec::new();
        let _ = aggregate_page(&tallies, &texts, &options(Granularity::Block), &mut out);
        let texts: Vec<&str> = out.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }
}
