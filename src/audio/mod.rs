// Audio collaborator: synthesis, artifact cache, playback
pub mod cache;
pub mod fingerprint;
pub mod generator;
pub mod player;
pub mod tts;

pub use cache::AudioCache;
pub use fingerprint::{prepare_parts, AudioPart, Fingerprint};
pub use generator::{ArtifactState, AudioGenerator, SynthesisRun, SynthesisStats};
pub use player::{announce, narrate, AudioPlayer, ExternalPlayer, NarrationReport};
pub use tts::{sanitize_for_speech, GoogleTts, SpeechSynthesizer};
