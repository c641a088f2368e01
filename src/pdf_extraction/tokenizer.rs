// Layout tokenizer: page text -> fixed-length overlapping token windows
use std::path::Path;
use tokenizers::tokenizer::Tokenizer;
use tokenizers::{PaddingParams, PaddingStrategy, TruncationParams};
use tracing::debug;

use crate::config::{MAX_SEQUENCE_LENGTH, WINDOW_STRIDE};
use crate::types::{Error, Result};

/// One model-sized chunk of a page.
///
/// `offsets[j]` is the half-open character range of the page text covered by
/// token `j`; special and padding tokens cover an empty range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenWindow {
    pub input_ids: Vec<i64>,
    pub attention_mask: Vec<i64>,
    pub offsets: Vec<(usize, usize)>,
}

impl TokenWindow {
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }
}

pub trait WindowTokenizer {
    /// Split `text` into windows covering every character at least once.
    fn windows(&self, text: &str) -> Result<Vec<TokenWindow>>;
}

/// Wraps a HuggingFace `tokenizer.json` (XLM-R for LayoutXLM).
pub struct LayoutTokenizer {
    tokenizer: Tokenizer,
}

impl LayoutTokenizer {
    pub fn from_file(path: &Path) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| Error::Tokenizer(format!("{}: {}", path.display(), e)))?;
        Self::with_tokenizer(tokenizer)
    }

    pub fn with_tokenizer(mut tokenizer: Tokenizer) -> Result<Self> {
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQUENCE_LENGTH,
                stride: WINDOW_STRIDE,
                ..Default::default()
            }))
            .map_err(|e| Error::Tokenizer(e.to_string()))?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::Fixed(MAX_SEQUENCE_LENGTH),
            ..Default::default()
        }));
        Ok(Self { tokenizer })
    }
}

impl WindowTokenizer for LayoutTokenizer {
    fn windows(&self, text: &str) -> Result<Vec<TokenWindow>> {
        let encoding = self
            .tokenizer
            .encode_char_offsets(text, true)
            .map_err(|e| Error::Tokenizer(e.to_string()))?;

        let to_window = |enc: &tokenizers::Encoding| TokenWindow {
            input_ids: enc.get_ids().iter().map(|&id| i64::from(id)).collect(),
            attention_mask: enc.get_attention_mask().iter().map(|&m| i64::from(m)).collect(),
            offsets: enc.get_offsets().to_vec(),
        };

        let mut windows = vec![to_window(&encoding)];
        windows.extend(encoding.get_overflowing().iter().map(to_window));
        debug!(chars = text.chars().count(), windows = windows.len(), "tokenized page");
        Ok(windows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_len() {
        let window = TokenWindow {
            input_ids: vec![0, 42, 2],
            attention_mask: vec![1, 1, 1],
            offsets: vec![(0, 0), (0, 3), (0, 0)],
        };
        assert_eq!(window.len(), 3);
        assert!(!window.is_empty());
    }

    #[test]
    fn test_missing_tokenizer_file_is_tokenizer_error() {
        let err = LayoutTokenizer::from_file(Path::new("models/absent.json")).err().unwrap();
        assert!(matches!(err, Error::Tokenizer(_)));
    }
}
