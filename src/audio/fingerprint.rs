// Content fingerprints: the cache key for synthesized audio
use serde_json::json;
use std::fmt;

use crate::types::{Label, LabeledBlock};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hex MD5 of `{"text": .., "voice_name": ..}` as JSON.
    pub fn of(text: &str, voice_name: &str) -> Self {
        let key = json!({ "text": text, "voice_name": voice_name }).to_string();
        Self(format!("{:x}", md5::compute(key)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One block scheduled for narration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPart {
    pub label: Label,
    pub text: String,
    pub voice_name: String,
    /// Always derived from `text` and `voice_name`.
    pub fingerprint: Fingerprint,
}

impl AudioPart {
    pub fn new(block: LabeledBlock, voice_name: &str) -> Self {
        let fingerprint = Fingerprint::of(&block.text, voice_name);
        Self {
            label: block.label,
            text: block.text,
            voice_name: voice_name.to_string(),
            fingerprint,
        }
    }
}

pub fn prepare_parts(blocks: Vec<LabeledBlock>, voice_name: &str) -> Vec<AudioPart> {
    blocks.into_iter().map(|b| AudioPart::new(b, voice_name)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_md5_of_json_key() {
        let expected = format!("{:x}", md5::compute(br#"{"text":"Hello World","voice_name":"en-US-Wavenet-D"}"#));
        assert_eq!(Fingerprint::of("Hello World", "en-US-Wavenet-D").as_str(), expected);
    }

    #[test]
    fn test_fingerprint_depends_on_text_and_voice() {
        let base = Fingerprint::of("Hello", "en-US-Wavenet-D");
        assert_eq!(base, Fingerprint::of("Hello", "en-US-Wavenet-D"));
        assert_ne!(base, Fingerprint::of("Hello.", "en-US-Wavenet-D"));
        assert_ne!(base, Fingerprint::of("Hello", "en-GB-Wavenet-A"));
        assert_eq!(base.as_str().len(), 32);
    }

    #[test]
    fn test_prepare_parts_keeps_order() {
        let parts = prepare_parts(
            vec![
                LabeledBlock::new(Label::Title, "T"),
                LabeledBlock::new(Label::Text, "B"),
            ],
            "voice",
        );
        assert_eq!(parts[0].label, Label::Title);
        assert_eq!(parts[1].fingerprint, Fingerprint::of("B", "voice"));
    }
}
