//! The persona interface and the context a persona acts through.

use crate::error::SessionError;
use crate::metrics::MetricsEvent;
use hearth_types::{CapabilityCall, CapabilitySpec, ChatTurn, SessionData};
use hearth_voice::{
    Generation, GenerationRequest, LanguageModel, RoomHandle, SpeechSynthesizer,
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::warn;

/// A hand-off directive: the persona to activate next and the line
/// spoken while switching. Produced by a capability, consumed
/// immediately by the session, never retained.
pub struct Transition {
    pub next: Box<dyn Persona>,
    pub utterance: String,
}

/// What a capability invocation did to the session.
pub enum CapabilityOutcome {
    /// The current persona stays active.
    Continue,
    /// Speak the transition line, then activate the new persona.
    Handoff(Transition),
    /// The capability ended the session; the room is already gone.
    Terminate,
}

/// Per-persona backend overrides. `None` fields inherit the session
/// defaults.
#[derive(Clone, Default)]
pub struct BackendOverrides {
    pub llm: Option<Arc<dyn LanguageModel>>,
    pub tts: Option<Arc<dyn SpeechSynthesizer>>,
}

/// A named mode of the conversational agent: its own instructions, an
/// activation hook, and a set of capabilities the language model may
/// invoke. At most one persona is active per session at any instant.
#[async_trait]
pub trait Persona: Send + Sync {
    fn name(&self) -> &'static str;

    /// Instruction text (system prompt) for this persona.
    fn instructions(&self) -> &str;

    /// Capabilities advertised to the language model while this persona
    /// is active.
    fn capabilities(&self) -> Vec<CapabilitySpec>;

    /// Backends this persona substitutes for the session defaults.
    fn overrides(&self) -> BackendOverrides {
        BackendOverrides::default()
    }

    /// Called when the persona becomes active.
    async fn on_enter(&self, ctx: &mut SessionCtx<'_>) -> Result<(), SessionError>;

    /// Dispatches a capability invocation by name.
    async fn on_capability(
        &self,
        call: &CapabilityCall,
        ctx: &mut SessionCtx<'_>,
    ) -> Result<CapabilityOutcome, SessionError>;
}

/// The session surface a persona acts through: the shared record, reply
/// generation, speech output, interruption, and room teardown. Backends
/// are already resolved against the persona's overrides.
pub struct SessionCtx<'a> {
    /// The record shared across hand-offs. Write-once by contract.
    pub state: &'a mut SessionData,
    pub(crate) llm: Arc<dyn LanguageModel>,
    pub(crate) tts: Arc<dyn SpeechSynthesizer>,
    pub(crate) room: Arc<dyn RoomHandle>,
    pub(crate) history: Arc<Mutex<Vec<ChatTurn>>>,
    pub(crate) instructions: String,
    pub(crate) current_generation: &'a mut Option<JoinHandle<()>>,
    pub(crate) metrics_tx: broadcast::Sender<MetricsEvent>,
}

pub(crate) fn lock_history(history: &Mutex<Vec<ChatTurn>>) -> MutexGuard<'_, Vec<ChatTurn>> {
    history.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SessionCtx<'_> {
    pub fn room_name(&self) -> &str {
        self.room.room_name()
    }

    /// Starts an interruptible reply generation in the background: the
    /// language backend produces text from this persona's instructions
    /// and the conversation so far, which is synthesized and published.
    /// Any previous in-flight generation is replaced.
    pub fn generate_reply(&mut self) {
        self.interrupt();

        let llm = self.llm.clone();
        let tts = self.tts.clone();
        let room = self.room.clone();
        let history = self.history.clone();
        let instructions = self.instructions.clone();
        let metrics_tx = self.metrics_tx.clone();

        let handle = tokio::spawn(async move {
            let snapshot: Vec<ChatTurn> = lock_history(&history).clone();
            let request = GenerationRequest {
                instructions: &instructions,
                history: &snapshot,
                capabilities: &[],
            };

            let generation: Generation = match llm.generate(request).await {
                Ok(generation) => generation,
                Err(e) => {
                    warn!("reply generation failed: {e}");
                    return;
                }
            };
            let _ = metrics_tx.send(MetricsEvent::LlmGeneration {
                provider: llm.provider(),
                usage: generation.usage,
            });

            let Some(text) = generation.text else {
                return;
            };
            match tts.synthesize(&text).await {
                Ok(audio) => {
                    if let Err(e) = room.publish_audio(&audio).await {
                        warn!("failed to publish reply audio: {e}");
                        return;
                    }
                    let _ = metrics_tx.send(MetricsEvent::SpeechSynthesis {
                        provider: tts.provider(),
                        characters: text.chars().count(),
                    });
                    lock_history(&history).push(ChatTurn::assistant(text));
                }
                Err(e) => warn!("reply synthesis failed: {e}"),
            }
        });

        *self.current_generation = Some(handle);
    }

    /// Generates and fully delivers a reply with interruption disabled.
    /// Returns only after the audio has been published, so callers can
    /// sequence hard side effects (such as room teardown) after it.
    pub async fn generate_uninterruptible(
        &mut self,
        directive: &str,
    ) -> Result<String, SessionError> {
        let instructions = format!("{}\n{directive}", self.instructions);
        let snapshot: Vec<ChatTurn> = lock_history(&self.history).clone();

        let generation = self
            .llm
            .generate(GenerationRequest {
                instructions: &instructions,
                history: &snapshot,
                capabilities: &[],
            })
            .await?;
        let _ = self.metrics_tx.send(MetricsEvent::LlmGeneration {
            provider: self.llm.provider(),
            usage: generation.usage,
        });

        let text = generation.text.ok_or(SessionError::EmptyReply)?;
        self.say(&text).await?;
        Ok(text)
    }

    /// Synthesizes and publishes a fixed line, recording it in the
    /// conversation history.
    pub async fn say(&mut self, text: &str) -> Result<(), SessionError> {
        let audio = self.tts.synthesize(text).await?;
        self.room.publish_audio(&audio).await?;
        let _ = self.metrics_tx.send(MetricsEvent::SpeechSynthesis {
            provider: self.tts.provider(),
            characters: text.chars().count(),
        });
        lock_history(&self.history).push(ChatTurn::assistant(text));
        Ok(())
    }

    /// Aborts any in-flight reply generation.
    pub fn interrupt(&mut self) {
        if let Some(handle) = self.current_generation.take() {
            handle.abort();
        }
    }

    /// Deletes the room on the server, ending the session for everyone.
    pub async fn close_room(&self) -> Result<(), SessionError> {
        self.room.close().await?;
        Ok(())
    }
}
