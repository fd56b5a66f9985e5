//! Voice backends for the Hearth storytelling agent.
//!
//! Everything real-time lives on the other side of a seam: LiveKit
//! carries the audio, hosted providers do recognition, synthesis, and
//! language generation. This crate holds the seams (`LanguageModel`,
//! `SpeechRecognizer`, `SpeechSynthesizer`, `RoomHandle`) and the thin
//! HTTP clients behind them. The session logic in `hearth-session`
//! depends only on the traits, never on a provider.

pub mod config;
pub mod error;
pub mod llm;
pub mod room;
pub mod stt;
pub mod tts;

pub use config::LiveKitConfig;
pub use error::VoiceError;
pub use llm::{Generation, GenerationRequest, LanguageModel, OpenAiLlm};
pub use room::{LiveKitRoom, RoomHandle, RoomService, TranscriptionEvent};
pub use stt::{select_recognizer, DeepgramStt, SpeechRecognizer, WhisperStt};
pub use tts::{ElevenLabsTts, SpeechSynthesizer};
