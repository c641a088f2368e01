// Playback: announce each part on the console and play its artifact
use async_trait::async_trait;
use crossterm::{
    queue,
    style::{Attribute, Print, ResetColor, SetAttribute, SetForegroundColor},
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tracing::{debug, warn};

use super::fingerprint::AudioPart;
use super::generator::{ArtifactState, SynthesisRun};
use crate::config::PlayerConfig;
use crate::theme::NarrationTheme;
use crate::types::{Error, Result};

#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Play one artifact to completion.
    async fn play(&self, path: &Path) -> Result<()>;
}

/// Plays through an external program, `ffplay` by default.
pub struct ExternalPlayer {
    program: PathBuf,
    args: Vec<String>,
}

impl ExternalPlayer {
    pub fn from_config(config: &PlayerConfig) -> Result<Self> {
        let program = which::which(&config.program)
            .map_err(|e| Error::Playback(format!("{} not found: {e}", config.program)))?;
        debug!(program = %program.display(), "using audio player");
        Ok(Self {
            program,
            args: config.args.clone(),
        })
    }
}

#[async_trait]
impl AudioPlayer for ExternalPlayer {
    async fn play(&self, path: &Path) -> Result<()> {
        let status = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;
        if !status.success() {
            return Err(Error::Playback(format!(
                "{} exited with {status} for {}",
                self.program.display(),
                path.display()
            )));
        }
        Ok(())
    }
}

/// Label in bold, then the text colored by label.
pub fn announce(out: &mut impl Write, part: &AudioPart) -> Result<()> {
    queue!(
        out,
        SetForegroundColor(NarrationTheme::label()),
        SetAttribute(Attribute::Bold),
        Print(part.label.as_str()),
        SetAttribute(Attribute::Reset),
        ResetColor,
        Print("\n"),
        SetForegroundColor(NarrationTheme::text_for(part.label)),
        SetAttribute(Attribute::Italic),
        Print(&part.text),
        SetAttribute(Attribute::Reset),
        ResetColor,
        Print("\n\n")
    )?;
    out.flush()?;
    Ok(())
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NarrationReport {
    pub played: usize,
    pub skipped: usize,
}

/// Play `parts` in document order. Each part waits for its own artifact;
/// parts whose synthesis failed are skipped.
pub async fn narrate(
    parts: &[AudioPart],
    run: &SynthesisRun,
    player: &dyn AudioPlayer,
    out: &mut impl Write,
) -> Result<NarrationReport> {
    let mut report = NarrationReport::default();
    for part in parts {
        match run.wait_for(&part.fingerprint).await {
            ArtifactState::Ready(path) => {
                announce(out, part)?;
                player.play(&path).await?;
                report.played += 1;
            }
            state => {
                warn!(label = %part.label, fingerprint = %part.fingerprint, ?state, "skipping part");
                report.skipped += 1;
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::cache::AudioCache;
    use crate::audio::generator::AudioGenerator;
    use crate::audio::tts::SpeechSynthesizer;
    use crate::types::{Label, LabeledBlock};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    struct TextSynth;

    #[async_trait]
    impl SpeechSynthesizer for TextSynth {
        async fn synthesize(&self, text: &str, _voice_name: &str) -> Result<Vec<u8>> {
            if text == "broken" {
                return Err(Error::Synthesis("rejected".to_string()));
            }
            Ok(text.as_bytes().to_vec())
        }
    }

    #[derive(Default)]
    struct RecordingPlayer {
        played: Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl AudioPlayer for RecordingPlayer {
        async fn play(&self, path: &Path) -> Result<()> {
            let bytes = std::fs::read(path)?;
            self.played.lock().unwrap().push(bytes);
            Ok(())
        }
    }

    #[test]
    fn test_announce_prints_label_and_text() {
        let part = AudioPart::new(LabeledBlock::new(Label::SectionHeader, "1 Introduction"), "v");
        let mut out = Vec::new();
        announce(&mut out, &part).unwrap();
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("Section-header"));
        assert!(printed.contains("1 Introduction"));
        assert!(printed.find("Section-header") < printed.find("1 Introduction"));
    }

    #[tokio::test]
    async fn test_narrate_plays_in_order_and_skips_failures() {
        let tmp = TempDir::new().unwrap();
        let generator = AudioGenerator::new(Arc::new(TextSynth), AudioCache::new(tmp.path()), 2);
        let parts: Vec<AudioPart> = ["first", "broken", "third", "first"]
            .iter()
            .map(|t| AudioPart::new(LabeledBlock::new(Label::Text, *t), "v"))
            .collect();

        let run = generator.start(&parts);
        let player = RecordingPlayer::default();
        let mut out = Vec::new();
        let report = narrate(&parts, &run, &player, &mut out).await.unwrap();
        run.finish().await;

        assert_eq!(report, NarrationReport { played: 3, skipped: 1 });
        let played = player.played.lock().unwrap().clone();
        assert_eq!(played, vec![b"first".to_vec(), b"third".to_vec(), b"first".to_vec()]);
        assert!(!String::from_utf8(out).unwrap().contains("broken"));
    }
}
