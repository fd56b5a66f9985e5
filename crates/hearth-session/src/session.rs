//! The session: one active persona, the shared record, and the hand-off
//! machinery.

use crate::error::SessionError;
use crate::metrics::MetricsEvent;
use crate::persona::{
    lock_history, CapabilityOutcome, Persona, SessionCtx, Transition,
};
use hearth_types::{CapabilityCall, ChatTurn, SessionData};
use hearth_voice::{GenerationRequest, LanguageModel, RoomHandle, SpeechSynthesizer};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Capacity of the metrics broadcast channel.
const METRICS_BROADCAST_CAPACITY: usize = 64;

/// A single voice session: owns the shared [`SessionData`], the active
/// persona, the default backends, and the room handle.
///
/// The session serializes persona operations: an activation hook or a
/// capability is awaited to completion before the next one is accepted,
/// which is what lets `SessionData` stay lock-free.
pub struct StorySession {
    state: SessionData,
    active: Option<Box<dyn Persona>>,
    llm: Arc<dyn LanguageModel>,
    tts: Arc<dyn SpeechSynthesizer>,
    room: Arc<dyn RoomHandle>,
    history: Arc<Mutex<Vec<ChatTurn>>>,
    current_generation: Option<JoinHandle<()>>,
    metrics_tx: broadcast::Sender<MetricsEvent>,
    terminated: bool,
}

impl StorySession {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        tts: Arc<dyn SpeechSynthesizer>,
        room: Arc<dyn RoomHandle>,
        userdata: SessionData,
    ) -> Self {
        let (metrics_tx, _) = broadcast::channel(METRICS_BROADCAST_CAPACITY);
        Self {
            state: userdata,
            active: None,
            llm,
            tts,
            room,
            history: Arc::new(Mutex::new(Vec::new())),
            current_generation: None,
            metrics_tx,
            terminated: false,
        }
    }

    /// Subscribes to metrics emitted by this session's generations.
    pub fn subscribe_metrics(&self) -> broadcast::Receiver<MetricsEvent> {
        self.metrics_tx.subscribe()
    }

    pub fn state(&self) -> &SessionData {
        &self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Name of the currently active persona, if any.
    pub fn active_persona(&self) -> Option<&'static str> {
        self.active.as_deref().map(|p| p.name())
    }

    /// Instruction text of the currently active persona, if any.
    pub fn active_instructions(&self) -> Option<String> {
        self.active.as_deref().map(|p| p.instructions().to_string())
    }

    /// Activates the starting persona.
    pub async fn start(&mut self, persona: Box<dyn Persona>) -> Result<(), SessionError> {
        if self.terminated {
            return Err(SessionError::Terminated);
        }
        info!(persona = persona.name(), "session starting");
        self.active = Some(persona);
        self.activate().await
    }

    /// Feeds one transcribed user utterance through the active persona:
    /// the language backend replies with text to speak, a capability to
    /// invoke, or both.
    pub async fn handle_user_turn(&mut self, text: &str) -> Result<(), SessionError> {
        if self.terminated {
            return Err(SessionError::Terminated);
        }
        // A fresh utterance preempts whatever the agent was saying.
        if let Some(handle) = self.current_generation.take() {
            handle.abort();
        }

        lock_history(&self.history).push(ChatTurn::user(text));
        let _ = self.metrics_tx.send(MetricsEvent::Transcription {
            characters: text.chars().count(),
        });

        let persona = self.active.take().ok_or(SessionError::NoActivePersona)?;
        let capabilities = persona.capabilities();
        let instructions = persona.instructions().to_string();
        let overrides = persona.overrides();
        let llm = overrides.llm.unwrap_or_else(|| self.llm.clone());
        let tts = overrides.tts.unwrap_or_else(|| self.tts.clone());

        let snapshot: Vec<ChatTurn> = lock_history(&self.history).clone();
        let generation = match llm
            .generate(GenerationRequest {
                instructions: &instructions,
                history: &snapshot,
                capabilities: &capabilities,
            })
            .await
        {
            Ok(generation) => generation,
            Err(e) => {
                self.active = Some(persona);
                return Err(e.into());
            }
        };
        let _ = self.metrics_tx.send(MetricsEvent::LlmGeneration {
            provider: llm.provider(),
            usage: generation.usage,
        });

        if let Some(reply) = &generation.text {
            let spoken = async {
                let audio = tts.synthesize(reply).await?;
                self.room.publish_audio(&audio).await
            }
            .await;
            match spoken {
                Ok(()) => {
                    let _ = self.metrics_tx.send(MetricsEvent::SpeechSynthesis {
                        provider: tts.provider(),
                        characters: reply.chars().count(),
                    });
                    lock_history(&self.history).push(ChatTurn::assistant(reply.clone()));
                }
                Err(e) => {
                    self.active = Some(persona);
                    return Err(e.into());
                }
            }
        }

        match generation.capability_call {
            Some(call) => {
                debug!(capability = call.name.as_str(), "model requested capability");
                self.dispatch(persona, &call).await
            }
            None => {
                self.active = Some(persona);
                Ok(())
            }
        }
    }

    /// Invokes a capability on the active persona directly.
    pub async fn invoke_capability(&mut self, call: &CapabilityCall) -> Result<(), SessionError> {
        if self.terminated {
            return Err(SessionError::Terminated);
        }
        let persona = self.active.take().ok_or(SessionError::NoActivePersona)?;
        self.dispatch(persona, call).await
    }

    /// Runs a capability on `persona` and applies the outcome. `persona`
    /// has been taken out of `self.active` by the caller.
    async fn dispatch(
        &mut self,
        persona: Box<dyn Persona>,
        call: &CapabilityCall,
    ) -> Result<(), SessionError> {
        let outcome = {
            let mut ctx = self.ctx_for(&*persona);
            persona.on_capability(call, &mut ctx).await
        };

        match outcome {
            Err(e) => {
                self.active = Some(persona);
                Err(e)
            }
            Ok(CapabilityOutcome::Continue) => {
                self.active = Some(persona);
                Ok(())
            }
            Ok(CapabilityOutcome::Handoff(Transition { next, utterance })) => {
                info!(
                    from = persona.name(),
                    to = next.name(),
                    "persona hand-off"
                );
                self.speak(&utterance).await?;
                self.active = Some(next);
                self.activate().await
            }
            Ok(CapabilityOutcome::Terminate) => {
                info!(persona = persona.name(), "session terminated");
                self.terminated = true;
                self.active = None;
                Ok(())
            }
        }
    }

    /// Runs the active persona's activation hook.
    async fn activate(&mut self) -> Result<(), SessionError> {
        let persona = self.active.take().ok_or(SessionError::NoActivePersona)?;
        let result = {
            let mut ctx = self.ctx_for(&*persona);
            persona.on_enter(&mut ctx).await
        };
        self.active = Some(persona);
        result
    }

    /// Builds the context for one persona call, resolving its backend
    /// overrides against the session defaults.
    fn ctx_for(&mut self, persona: &dyn Persona) -> SessionCtx<'_> {
        let overrides = persona.overrides();
        SessionCtx {
            state: &mut self.state,
            llm: overrides.llm.unwrap_or_else(|| self.llm.clone()),
            tts: overrides.tts.unwrap_or_else(|| self.tts.clone()),
            room: self.room.clone(),
            history: self.history.clone(),
            instructions: persona.instructions().to_string(),
            current_generation: &mut self.current_generation,
            metrics_tx: self.metrics_tx.clone(),
        }
    }

    /// Speaks a fixed line through the session defaults.
    async fn speak(&mut self, text: &str) -> Result<(), SessionError> {
        let audio = self.tts.synthesize(text).await?;
        self.room.publish_audio(&audio).await?;
        let _ = self.metrics_tx.send(MetricsEvent::SpeechSynthesis {
            provider: self.tts.provider(),
            characters: text.chars().count(),
        });
        lock_history(&self.history).push(ChatTurn::assistant(text));
        Ok(())
    }
}
