//! Speech-synthesis seam and the ElevenLabs provider.
//!
//! Unlike recognition there is no fallback provider here: the ElevenLabs
//! client is constructed unconditionally and a missing key surfaces at
//! synthesis time.

use crate::error::VoiceError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Maximum text input size for a single synthesis request (64 KiB).
const MAX_TTS_INPUT_BYTES: usize = 64 * 1024;

/// Request timeout for synthesis calls.
const TTS_TIMEOUT: Duration = Duration::from_secs(60);

const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io/v1";

/// Default voice ("Rachel") and model used when none are configured.
const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";
const DEFAULT_MODEL_ID: &str = "eleven_turbo_v2_5";

/// Seam for rendering text to audio.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn provider(&self) -> &'static str;

    /// Renders `text` to raw audio bytes ready for room publication.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, VoiceError>;
}

/// Hosted synthesis via the ElevenLabs text-to-speech API.
pub struct ElevenLabsTts {
    client: Client,
    api_key: String,
    voice_id: String,
    model_id: String,
}

impl ElevenLabsTts {
    /// Builds the client. The key is optional at construction so that a
    /// missing `ELEVEN_API_KEY` degrades at request time rather than at
    /// startup; an empty key simply fails the first synthesis call.
    pub fn new(api_key: Option<&str>) -> Result<Self, VoiceError> {
        Ok(Self {
            client: Client::builder().timeout(TTS_TIMEOUT).build()?,
            api_key: api_key.unwrap_or_default().to_string(),
            voice_id: DEFAULT_VOICE_ID.to_string(),
            model_id: DEFAULT_MODEL_ID.to_string(),
        })
    }

    pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = voice_id.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsTts {
    fn provider(&self) -> &'static str {
        "elevenlabs"
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, VoiceError> {
        if text.len() > MAX_TTS_INPUT_BYTES {
            return Err(VoiceError::Tts(format!(
                "text exceeds maximum size: {} bytes (limit: {} bytes)",
                text.len(),
                MAX_TTS_INPUT_BYTES
            )));
        }

        let response = self
            .client
            .post(format!(
                "{ELEVENLABS_BASE_URL}/text-to-speech/{}",
                self.voice_id
            ))
            .header("xi-api-key", &self.api_key)
            .json(&SynthesisRequest {
                text,
                model_id: &self.model_id,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(VoiceError::Tts(format!(
                "synthesis failed with {status}: {detail}"
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructs_without_a_key() {
        // Missing key degrades at request time, never at startup.
        assert!(ElevenLabsTts::new(None).is_ok());
    }

    #[tokio::test]
    async fn oversized_text_is_rejected() {
        let tts = ElevenLabsTts::new(Some("el-key")).unwrap();
        let text = "a".repeat(MAX_TTS_INPUT_BYTES + 1);
        let err = tts.synthesize(&text).await.unwrap_err();
        assert!(matches!(err, VoiceError::Tts(_)));
    }
}
