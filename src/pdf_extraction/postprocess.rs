// Document-level clean-up of the aggregated block sequence
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

use crate::types::{Label, LabeledBlock};

/// Parenthetical author-year clusters: `(Smith, 2020)`, `(Smith and Lee 2019a)`,
/// `(Smith et al., 2020, p. 4; Jones & Lee, 2019)`.
static AUTHOR_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)\(([; ]*((?:\p{Uppercase_Letter}[\p{Alphabetic}'`-]+)",
        r"(?:,? (?:(?:and |& )?(?:\p{Uppercase_Letter}[\p{Alphabetic}'`-]+)|(?:et al.?)))*",
        r"(?:, *(?:19|20)[0-9][0-9][a-f,]?(?:, p.? [0-9]+)?",
        r"| *\((?:19|20)[0-9][0-9][a-f,]?(?:, p.? [0-9]+)?\))))+\)",
    ))
    .expect("author-year citation pattern is valid")
});

/// Bracketed numeric citation lists: `[3]`, `[12, 7]`.
static NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[0-9, ]+\]").expect("numeric citation pattern is valid"));

/// Drop the author list and running headers between the title and the abstract.
///
/// Everything from the first Section-header starting with "abstract"
/// (case-insensitive) is kept; before it, only Title blocks survive. A
/// document with neither yields an empty sequence.
pub fn trim_front_matter(blocks: Vec<LabeledBlock>) -> Vec<LabeledBlock> {
    let mut kept = Vec::new();
    let mut iter = blocks.into_iter();

    while let Some(block) = iter.next() {
        if block.label == Label::SectionHeader && block.text.to_lowercase().starts_with("abstract") {
            kept.push(block);
            kept.extend(iter.by_ref());
            break;
        }
        if block.label == Label::Title {
            kept.push(block);
        }
    }
    kept
}

/// Join neighbours with the same label unless the earlier one already ends a
/// sentence. Rejoins paragraphs split across columns and pages.
pub fn merge_consecutive(blocks: Vec<LabeledBlock>) -> Vec<LabeledBlock> {
    let mut merged: Vec<LabeledBlock> = Vec::with_capacity(blocks.len());
    for block in blocks {
        match merged.last_mut() {
            Some(prev) if prev.label == block.label && !prev.text.ends_with('.') => {
                prev.text.push(' ');
                prev.text.push_str(&block.text);
            }
            _ => merged.push(block),
        }
    }
    merged
}

fn strip_once(text: &str) -> Cow<'_, str> {
    match AUTHOR_YEAR.replace_all(text, "") {
        Cow::Borrowed(s) => NUMERIC.replace_all(s, ""),
        Cow::Owned(s) => Cow::Owned(NUMERIC.replace_all(&s, "").into_owned()),
    }
}

/// Delete inline citations. Nothing is inserted in their place, so the
/// surrounding spaces stay as they were.
pub fn strip_citations(text: &str) -> String {
    let mut current = text.to_string();
    // A deletion can expose a new cluster (`[1, [2]]`), repeat until stable
    loop {
        let next = strip_once(&current);
        if next == current {
            return current;
        }
        current = next.into_owned();
    }
}

pub fn strip_block_citations(blocks: Vec<LabeledBlock>) -> Vec<LabeledBlock> {
    blocks
        .into_iter()
        .map(|block| LabeledBlock {
            text: strip_citations(&block.text),
            label: block.label,
        })
        .collect()
}
