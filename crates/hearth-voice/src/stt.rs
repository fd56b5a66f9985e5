//! Speech-recognition seam, the two hosted providers, and the
//! primary-with-fallback selection rule.

use crate::error::VoiceError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Maximum audio input size for a single transcription request (10 MiB).
const MAX_STT_INPUT_BYTES: usize = 10 * 1024 * 1024;

/// Request timeout for transcription calls.
const STT_TIMEOUT: Duration = Duration::from_secs(120);

const DEEPGRAM_LISTEN_URL: &str = "https://api.deepgram.com/v1/listen";
const WHISPER_TRANSCRIPTION_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Default Deepgram model.
const DEEPGRAM_MODEL: &str = "nova-3";

/// Seam for turning heard audio into text.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    fn provider(&self) -> &'static str;

    async fn transcribe(&self, audio: &[u8]) -> Result<String, VoiceError>;
}

fn check_input_size(audio: &[u8]) -> Result<(), VoiceError> {
    if audio.len() > MAX_STT_INPUT_BYTES {
        return Err(VoiceError::Stt(format!(
            "audio data exceeds maximum size: {} bytes (limit: {} bytes)",
            audio.len(),
            MAX_STT_INPUT_BYTES
        )));
    }
    Ok(())
}

/// Primary recognizer, backed by Deepgram's prerecorded listen API.
///
/// Construction fails without an API key; the caller is expected to fall
/// back to [`WhisperStt`].
pub struct DeepgramStt {
    client: Client,
    api_key: String,
    model: String,
}

impl DeepgramStt {
    pub fn new(api_key: Option<&str>) -> Result<Self, VoiceError> {
        let api_key = match api_key {
            Some(key) if !key.trim().is_empty() => key.to_string(),
            _ => {
                return Err(VoiceError::Config(
                    "Deepgram API key is not set".to_string(),
                ))
            }
        };

        Ok(Self {
            client: Client::builder().timeout(STT_TIMEOUT).build()?,
            api_key,
            model: DEEPGRAM_MODEL.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(Debug, Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(Debug, Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(Debug, Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

#[async_trait]
impl SpeechRecognizer for DeepgramStt {
    fn provider(&self) -> &'static str {
        "deepgram"
    }

    async fn transcribe(&self, audio: &[u8]) -> Result<String, VoiceError> {
        check_input_size(audio)?;

        let response = self
            .client
            .post(format!("{DEEPGRAM_LISTEN_URL}?model={}", self.model))
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", "audio/wav")
            .body(audio.to_vec())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(VoiceError::Stt(format!(
                "Deepgram transcription failed with {status}: {detail}"
            )));
        }

        let parsed: DeepgramResponse = response.json().await?;
        let transcript = parsed
            .results
            .channels
            .first()
            .and_then(|c| c.alternatives.first())
            .map(|a| a.transcript.trim().to_string())
            .unwrap_or_default();

        Ok(transcript)
    }
}

/// Secondary recognizer, backed by OpenAI's Whisper transcription API.
pub struct WhisperStt {
    client: Client,
    api_key: String,
}

impl WhisperStt {
    pub fn new(api_key: impl Into<String>) -> Result<Self, VoiceError> {
        Ok(Self {
            client: Client::builder().timeout(STT_TIMEOUT).build()?,
            api_key: api_key.into(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct WhisperResponse {
    text: String,
}

#[async_trait]
impl SpeechRecognizer for WhisperStt {
    fn provider(&self) -> &'static str {
        "openai-whisper"
    }

    async fn transcribe(&self, audio: &[u8]) -> Result<String, VoiceError> {
        check_input_size(audio)?;

        let part = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| VoiceError::Stt(format!("invalid audio part: {e}")))?;
        let form = reqwest::multipart::Form::new()
            .text("model", "whisper-1")
            .part("file", part);

        let response = self
            .client
            .post(WHISPER_TRANSCRIPTION_URL)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(VoiceError::Stt(format!(
                "Whisper transcription failed with {status}: {detail}"
            )));
        }

        let parsed: WhisperResponse = response.json().await?;
        Ok(parsed.text.trim().to_string())
    }
}

/// Selects the speech-recognition backend: Deepgram when its key is
/// available, otherwise Whisper. One construction attempt each, no
/// retry. A primary failure is logged and execution degrades to the
/// secondary provider.
pub fn select_recognizer(
    deepgram_api_key: Option<&str>,
    openai_api_key: &str,
) -> Result<Arc<dyn SpeechRecognizer>, VoiceError> {
    match DeepgramStt::new(deepgram_api_key) {
        Ok(stt) => {
            info!("using Deepgram STT");
            Ok(Arc::new(stt))
        }
        Err(e) => {
            warn!("failed to initialize Deepgram STT: {e}; falling back to OpenAI Whisper");
            Ok(Arc::new(WhisperStt::new(openai_api_key)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deepgram_requires_key() {
        assert!(DeepgramStt::new(None).is_err());
        assert!(DeepgramStt::new(Some("")).is_err());
        assert!(DeepgramStt::new(Some("dg-key")).is_ok());
    }

    #[test]
    fn selection_prefers_deepgram_when_key_present() {
        let recognizer = select_recognizer(Some("dg-key"), "sk-test").unwrap();
        assert_eq!(recognizer.provider(), "deepgram");
    }

    #[test]
    fn selection_falls_back_to_whisper_without_key() {
        let recognizer = select_recognizer(None, "sk-test").unwrap();
        assert_eq!(recognizer.provider(), "openai-whisper");
    }

    #[test]
    fn deepgram_response_parses() {
        let parsed: DeepgramResponse = serde_json::from_str(
            r#"{"results": {"channels": [{"alternatives": [{"transcript": " hello there "}]}]}}"#,
        )
        .unwrap();
        let transcript = parsed.results.channels[0].alternatives[0]
            .transcript
            .trim();
        assert_eq!(transcript, "hello there");
    }

    #[tokio::test]
    async fn oversized_audio_is_rejected() {
        let stt = DeepgramStt::new(Some("dg-key")).unwrap();
        let audio = vec![0u8; MAX_STT_INPUT_BYTES + 1];
        let err = stt.transcribe(&audio).await.unwrap_err();
        assert!(matches!(err, VoiceError::Stt(_)));
    }
}
