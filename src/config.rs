// Configuration constants and config file for paper2audio
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::types::{Error, Result};

// Layout model input geometry
pub const MAX_SEQUENCE_LENGTH: usize = 384;
pub const WINDOW_STRIDE: usize = 128;
pub const GRID_SCALE: f32 = 1000.0;
pub const MODEL_IMAGE_SIZE: u32 = 224;

// Structure reconstruction thresholds (PDF points / ratios)
pub const BLOCK_GAP_RATIO: f32 = 0.8;
pub const FONT_SIZE_TOLERANCE: f32 = 0.5;

// Audio defaults
pub const DEFAULT_VOICE: &str = "en-US-Wavenet-D";
pub const DEFAULT_CACHE_DIR: &str = ".cache";
pub const DEFAULT_LANGUAGE_CODE: &str = "en-US";
pub const SYNTHESIS_WORKERS: usize = 2;
pub const TTS_ENDPOINT: &str = "https://texttospeech.googleapis.com/v1beta1/text:synthesize";

pub const CONFIG_ENV: &str = "PAPER2AUDIO_CONFIG";

// Get library path from environment or use default
pub fn pdfium_library_path() -> PathBuf {
    env::var("PAPER2AUDIO_PDFIUM_PATH")
        .unwrap_or_else(|_| "./lib".to_string())
        .into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// ONNX export of the token classification model.
    pub model_path: PathBuf,
    /// `tokenizer.json` matching the model vocabulary.
    pub tokenizer_path: PathBuf,
    /// Model `config.json` holding `id2label`.
    pub label_config_path: PathBuf,
    pub intra_threads: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/layoutxlm_doclaynet.onnx"),
            tokenizer_path: PathBuf::from("models/tokenizer.json"),
            label_config_path: PathBuf::from("models/config.json"),
            intra_threads: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    pub endpoint: String,
    pub language_code: String,
    /// Environment variable holding an API key.
    pub api_key_env: String,
    /// Environment variable holding an OAuth bearer token, used when no key is set.
    pub access_token_env: String,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            endpoint: TTS_ENDPOINT.to_string(),
            language_code: DEFAULT_LANGUAGE_CODE.to_string(),
            api_key_env: "GOOGLE_API_KEY".to_string(),
            access_token_env: "GOOGLE_OAUTH_ACCESS_TOKEN".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            program: "ffplay".to_string(),
            args: vec![
                "-nodisp".to_string(),
                "-autoexit".to_string(),
                "-loglevel".to_string(),
                "quiet".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pdfium_path: Option<PathBuf>,
    pub models: ModelConfig,
    pub tts: TtsConfig,
    pub player: PlayerConfig,
}

impl AppConfig {
    /// Load from an explicit path, `$PAPER2AUDIO_CONFIG`, or the user config dir.
    /// A missing default file is not an error; a missing explicit one is.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => env::var_os(CONFIG_ENV)
                .map(PathBuf::from)
                .or_else(|| default_config_path().filter(|p| p.exists())),
        };

        let mut config = match path {
            Some(path) => {
                debug!(path = %path.display(), "loading config");
                let raw = std::fs::read_to_string(&path)?;
                Self::from_toml(&raw)?
            }
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))
    }

    fn apply_env(&mut self) {
        if let Ok(path) = env::var("PAPER2AUDIO_PDFIUM_PATH") {
            self.pdfium_path = Some(path.into());
        }
        if let Ok(path) = env::var("PAPER2AUDIO_MODEL") {
            self.models.model_path = path.into();
        }
        if let Ok(path) = env::var("PAPER2AUDIO_TOKENIZER") {
            self.models.tokenizer_path = path.into();
        }
        if let Ok(path) = env::var("PAPER2AUDIO_LABELS") {
            self.models.label_config_path = path.into();
        }
    }

    pub fn pdfium_path(&self) -> PathBuf {
        self.pdfium_path.clone().unwrap_or_else(pdfium_library_path)
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("paper2audio").join("config.toml"))
}
