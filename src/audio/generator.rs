// Background speech synthesis with per-artifact completion signals
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::cache::AudioCache;
use super::fingerprint::{AudioPart, Fingerprint};
use super::tts::SpeechSynthesizer;
use crate::types::Result;

/// Lifecycle of one artifact. Moves from `Pending` to exactly one terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactState {
    Pending,
    Ready(PathBuf),
    Failed(String),
}

impl ArtifactState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ArtifactState::Pending)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SynthesisStats {
    pub synthesized: usize,
    pub cached: usize,
    pub failed: usize,
}

impl SynthesisStats {
    fn absorb(&mut self, other: SynthesisStats) {
        self.synthesized += other.synthesized;
        self.cached += other.cached;
        self.failed += other.failed;
    }
}

struct Job {
    fingerprint: Fingerprint,
    text: String,
    voice_name: String,
    state: watch::Sender<ArtifactState>,
}

pub struct AudioGenerator {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    cache: AudioCache,
    workers: usize,
}

impl AudioGenerator {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, cache: AudioCache, workers: usize) -> Self {
        Self {
            synthesizer,
            cache,
            workers: workers.max(1),
        }
    }

    /// Queue every distinct fingerprint in `parts` and start the workers.
    /// Must be called inside a tokio runtime.
    pub fn start(&self, parts: &[AudioPart]) -> SynthesisRun {
        let mut signals = HashMap::new();
        let mut queue = VecDeque::new();

        for part in parts {
            if signals.contains_key(&part.fingerprint) {
                continue;
            }
            let (tx, rx) = watch::channel(ArtifactState::Pending);
            signals.insert(part.fingerprint.clone(), rx);
            queue.push_back(Job {
                fingerprint: part.fingerprint.clone(),
                text: part.text.clone(),
                voice_name: part.voice_name.clone(),
                state: tx,
            });
        }

        info!(parts = parts.len(), unique = queue.len(), workers = self.workers, "starting synthesis");
        let queue = Arc::new(Mutex::new(queue));
        let workers = (0..self.workers)
            .map(|id| {
                let worker = Worker {
                    id,
                    queue: Arc::clone(&queue),
                    synthesizer: Arc::clone(&self.synthesizer),
                    cache: self.cache.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        SynthesisRun { signals, workers }
    }
}

struct Worker {
    id: usize,
    queue: Arc<Mutex<VecDeque<Job>>>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    cache: AudioCache,
}

impl Worker {
    async fn run(self) -> SynthesisStats {
        let mut stats = SynthesisStats::default();
        loop {
            let job = self.queue.lock().await.pop_front();
            let Some(job) = job else { break };

            if let Some(path) = self.cache.lookup(&job.fingerprint).await {
                debug!(worker = self.id, fingerprint = %job.fingerprint, "cache hit");
                stats.cached += 1;
                job.state.send_replace(ArtifactState::Ready(path));
                continue;
            }

            match self.produce(&job).await {
                Ok(path) => {
                    debug!(worker = self.id, fingerprint = %job.fingerprint, "synthesized");
                    stats.synthesized += 1;
                    job.state.send_replace(ArtifactState::Ready(path));
                }
                Err(e) => {
                    warn!(worker = self.id, fingerprint = %job.fingerprint, error = %e, "synthesis failed");
                    stats.failed += 1;
                    job.state.send_replace(ArtifactState::Failed(e.to_string()));
                }
            }
        }
        stats
    }

    async fn produce(&self, job: &Job) -> Result<PathBuf> {
        let audio = self.synthesizer.synthesize(&job.text, &job.voice_name).await?;
        self.cache.store(&job.fingerprint, &audio).await
    }
}

/// Handle to a running synthesis batch.
pub struct SynthesisRun {
    signals: HashMap<Fingerprint, watch::Receiver<ArtifactState>>,
    workers: Vec<JoinHandle<SynthesisStats>>,
}

impl SynthesisRun {
    pub fn signal(&self, fingerprint: &Fingerprint) -> Option<watch::Receiver<ArtifactState>> {
        self.signals.get(fingerprint).cloned()
    }

    /// Block until `fingerprint` reaches a terminal state.
    pub async fn wait_for(&self, fingerprint: &Fingerprint) -> ArtifactState {
        let Some(mut rx) = self.signal(fingerprint) else {
            return ArtifactState::Failed(format!("{fingerprint} was never scheduled"));
        };
        let state = match rx.wait_for(ArtifactState::is_terminal).await {
            Ok(state) => state.clone(),
            Err(_) => ArtifactState::Failed("synthesis worker stopped".to_string()),
        };
        state
    }

    /// Wait for every worker to drain the queue.
    pub async fn finish(self) -> SynthesisStats {
        let mut total = SynthesisStats::default();
        for handle in self.workers {
            match handle.await {
                Ok(stats) => total.absorb(stats),
                Err(e) => warn!(error = %e, "synthesis worker panicked"),
            }
        }
        info!(
            synthesized = total.synthesized,
            cached = total.cached,
            failed = total.failed,
            "synthesis finished"
        );
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Error, Label, LabeledBlock};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct EchoSynth {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SpeechSynthesizer for EchoSynth {
        async fn synthesize(&self, text: &str, _voice_name: &str) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if text.contains("fail") {
                return Err(Error::Synthesis("quota exceeded".to_string()));
            }
            Ok(text.as_bytes().to_vec())
        }
    }

    fn parts(texts: &[&str]) -> Vec<AudioPart> {
        texts
            .iter()
            .map(|t| AudioPart::new(LabeledBlock::new(Label::Text, *t), "voice"))
            .collect()
    }

    #[tokio::test]
    async fn test_duplicates_are_synthesized_once() {
        let tmp = TempDir::new().unwrap();
        let synth = Arc::new(EchoSynth { calls: AtomicUsize::new(0) });
        let generator = AudioGenerator::new(synth.clone(), AudioCache::new(tmp.path()), 2);

        let parts = parts(&["same", "other", "same"]);
        let run = generator.start(&parts);
        for part in &parts {
            assert!(matches!(run.wait_for(&part.fingerprint).await, ArtifactState::Ready(_)));
        }
        let stats = run.finish().await;

        assert_eq!(synth.calls.load(Ordering::SeqCst), 2);
        assert_eq!(stats, SynthesisStats { synthesized: 2, cached: 0, failed: 0 });
    }

    #[tokio::test]
    async fn test_failure_marks_only_that_artifact() {
        let tmp = TempDir::new().unwrap();
        let synth = Arc::new(EchoSynth { calls: AtomicUsize::new(0) });
        let generator = AudioGenerator::new(synth, AudioCache::new(tmp.path()), 1);

        let parts = parts(&["fail here", "fine"]);
        let run = generator.start(&parts);

        assert!(matches!(run.wait_for(&parts[0].fingerprint).await, ArtifactState::Failed(_)));
        match run.wait_for(&parts[1].fingerprint).await {
            ArtifactState::Ready(path) => assert_eq!(std::fs::read(path).unwrap(), b"fine"),
            other => panic!("unexpected state {other:?}"),
        }
        let stats = run.finish().await;
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test]
    async fn test_unscheduled_fingerprint_fails() {
        let tmp = TempDir::new().unwrap();
        let synth = Arc::new(EchoSynth { calls: AtomicUsize::new(0) });
        let generator = AudioGenerator::new(synth, AudioCache::new(tmp.path()), 1);
        let run = generator.start(&[]);
        let stray = Fingerprint::of("nothing", "voice");
        assert!(matches!(run.wait_for(&stray).await, ArtifactState::Failed(_)));
        assert_eq!(run.finish().await, SynthesisStats::default());
    }

    struct VoiceSynth;

    #[async_trait]
    impl SpeechSynthesizer for VoiceSynth {
        async fn synthesize(&self, text: &str, voice_name: &str) -> Result<Vec<u8>> {
            Ok(format!("{voice_name}|{text}").into_bytes())
        }
    }

    #[tokio::test]
    async fn test_artifact_matches_the_voice_in_its_fingerprint() {
        let tmp = TempDir::new().unwrap();
        let cache = AudioCache::new(tmp.path());
        let generator = AudioGenerator::new(Arc::new(VoiceSynth), cache.clone(), 2);

        let block = LabeledBlock::new(Label::Text, "Hello");
        let parts = vec![
            AudioPart::new(block.clone(), "en-US-Wavenet-D"),
            AudioPart::new(block, "en-GB-Wavenet-A"),
        ];
        let run = generator.start(&parts);
        for part in &parts {
            assert!(matches!(run.wait_for(&part.fingerprint).await, ArtifactState::Ready(_)));
        }
        run.finish().await;

        let us = cache.artifact_path(&Fingerprint::of("Hello", "en-US-Wavenet-D"));
        let gb = cache.artifact_path(&Fingerprint::of("Hello", "en-GB-Wavenet-A"));
        assert_eq!(std::fs::read(us).unwrap(), b"en-US-Wavenet-D|Hello");
        assert_eq!(std::fs::read(gb).unwrap(), b"en-GB-Wavenet-A|Hello");
    }
}
