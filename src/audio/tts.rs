// Google Cloud Text-to-Speech over REST
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::debug;

use crate::config::TtsConfig;
use crate::types::{Error, Result};

/// Turns text into encoded audio bytes.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice_name: &str) -> Result<Vec<u8>>;
}

/// The TTS endpoint only takes ASCII: newlines become spaces, anything else
/// outside ASCII is dropped.
pub fn sanitize_for_speech(text: &str) -> String {
    text.chars()
        .map(|c| if c == '\n' { ' ' } else { c })
        .filter(char::is_ascii)
        .collect()
}

#[derive(Debug, Clone)]
enum Credentials {
    ApiKey(String),
    Bearer(String),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig,
}

#[derive(Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: String,
}

pub struct GoogleTts {
    client: reqwest::Client,
    endpoint: String,
    language_code: String,
    credentials: Credentials,
}

impl GoogleTts {
    /// Read credentials from the environment variables named in `config`.
    pub fn from_config(config: &TtsConfig) -> Result<Self> {
        let credentials = match (env::var(&config.api_key_env), env::var(&config.access_token_env)) {
            (Ok(key), _) if !key.is_empty() => Credentials::ApiKey(key),
            (_, Ok(token)) if !token.is_empty() => Credentials::Bearer(token),
            _ => {
                return Err(Error::Synthesis(format!(
                    "no credentials: set {} or {}",
                    config.api_key_env, config.access_token_env
                )))
            }
        };

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
            language_code: config.language_code.clone(),
            credentials,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTts {
    async fn synthesize(&self, text: &str, voice_name: &str) -> Result<Vec<u8>> {
        let text = sanitize_for_speech(text);
        let body = SynthesizeRequest {
            input: SynthesisInput { text: &text },
            voice: VoiceSelection {
                language_code: &self.language_code,
                name: voice_name,
            },
            audio_config: AudioConfig { audio_encoding: "ALAW" },
        };

        let request = self.client.post(&self.endpoint).json(&body);
        let request = match &self.credentials {
            Credentials::ApiKey(key) => request.query(&[("key", key)]),
            Credentials::Bearer(token) => request.bearer_auth(token),
        };

        let response = request
            .send()
            .await
            .map_err(|e| Error::Synthesis(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Synthesis(format!("{status}: {detail}")));
        }

        let payload: SynthesizeResponse = response
            .json()
            .await
            .map_err(|e| Error::Synthesis(e.to_string()))?;
        let audio = STANDARD
            .decode(payload.audio_content)
            .map_err(|e| Error::Synthesis(format!("bad audioContent: {e}")))?;
        debug!(chars = text.len(), bytes = audio.len(), voice = voice_name, "synthesized speech");
        Ok(audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_drops_non_ascii_and_newlines() {
        assert_eq!(sanitize_for_speech("naïve\nBayes — works"), "nave Bayes  works");
    }

    #[test]
    fn test_request_shape() {
        let body = SynthesizeRequest {
            input: SynthesisInput { text: "Hi" },
            voice: VoiceSelection {
                language_code: "en-US",
                name: "en-US-Wavenet-D",
            },
            audio_config: AudioConfig { audio_encoding: "ALAW" },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["input"]["text"], "Hi");
        assert_eq!(json["voice"]["languageCode"], "en-US");
        assert_eq!(json["voice"]["name"], "en-US-Wavenet-D");
        assert_eq!(json["audioConfig"]["audioEncoding"], "ALAW");
    }

    #[test]
    fn test_missing_credentials() {
        let config = TtsConfig {
            api_key_env: "PAPER2AUDIO_TEST_UNSET_KEY".to_string(),
            access_token_env: "PAPER2AUDIO_TEST_UNSET_TOKEN".to_string(),
            ..TtsConfig::default()
        };
        assert!(matches!(GoogleTts::from_config(&config), Err(Error::Synthesis(_))));
    }
}
