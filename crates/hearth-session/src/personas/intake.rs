//! The intake persona: greets the caller and captures a name and a
//! location, then hands the session to the storyteller.

use super::{storyteller::StoryAgent, COMMON_INSTRUCTIONS};
use crate::error::SessionError;
use crate::persona::{
    BackendOverrides, CapabilityOutcome, Persona, SessionCtx, Transition,
};
use async_trait::async_trait;
use hearth_types::{CapabilityCall, CapabilitySpec};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

const INFORMATION_GATHERED: &str = "information_gathered";

/// Fixed line spoken while switching to the storyteller.
const TRANSITION_LINE: &str = "Let's start the story!";

pub struct IntakeAgent {
    instructions: String,
    /// Backends baked into the storyteller on hand-off, so the next
    /// persona runs on its own model and voice.
    story_backends: BackendOverrides,
}

impl IntakeAgent {
    pub fn new(story_backends: BackendOverrides) -> Self {
        Self {
            instructions: format!(
                "{COMMON_INSTRUCTIONS} Your goal is to gather a few pieces of information \
                 from the user to make the story personalized and engaging. You should ask \
                 the user for their name and where they are from. Start the conversation \
                 with a short introduction."
            ),
            story_backends,
        }
    }
}

#[derive(Debug, Deserialize)]
struct InformationGatheredArgs {
    name: String,
    location: String,
}

#[async_trait]
impl Persona for IntakeAgent {
    fn name(&self) -> &'static str {
        "intake"
    }

    fn instructions(&self) -> &str {
        &self.instructions
    }

    fn capabilities(&self) -> Vec<CapabilitySpec> {
        vec![CapabilitySpec::new(
            INFORMATION_GATHERED,
            "Called when the user has provided the information needed to make the story \
             personalized and engaging.",
            json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "The name of the user"
                    },
                    "location": {
                        "type": "string",
                        "description": "The location of the user"
                    }
                },
                "required": ["name", "location"]
            }),
        )]
    }

    async fn on_enter(&self, ctx: &mut SessionCtx<'_>) -> Result<(), SessionError> {
        // The greeting comes from the model, not a fixed line.
        ctx.generate_reply();
        Ok(())
    }

    async fn on_capability(
        &self,
        call: &CapabilityCall,
        ctx: &mut SessionCtx<'_>,
    ) -> Result<CapabilityOutcome, SessionError> {
        if call.name != INFORMATION_GATHERED {
            return Err(SessionError::UnknownCapability(call.name.clone()));
        }

        let args: InformationGatheredArgs = serde_json::from_value(call.arguments.clone())?;
        let name = args.name.trim();
        let location = args.location.trim();

        if name.is_empty() || location.is_empty() {
            warn!("refusing information_gathered with empty fields");
            return Ok(CapabilityOutcome::Continue);
        }
        if ctx.state.is_complete() {
            // Write-once: the first captured values stand.
            warn!("information already gathered; keeping the first values");
            return Ok(CapabilityOutcome::Continue);
        }

        ctx.state.set_name(name);
        ctx.state.set_location(location);

        let story_agent = StoryAgent::new(name, location, self.story_backends.clone());
        info!(
            state = ?ctx.state,
            "switching to the story agent with the provided user data"
        );

        Ok(CapabilityOutcome::Handoff(Transition {
            next: Box::new(story_agent),
            utterance: TRANSITION_LINE.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advertises_the_gathering_capability() {
        let agent = IntakeAgent::new(BackendOverrides::default());
        let capabilities = agent.capabilities();
        assert_eq!(capabilities.len(), 1);
        assert_eq!(capabilities[0].name, INFORMATION_GATHERED);
        assert_eq!(
            capabilities[0].parameters["required"],
            serde_json::json!(["name", "location"])
        );
    }

    #[test]
    fn instructions_ask_for_name_and_origin() {
        let agent = IntakeAgent::new(BackendOverrides::default());
        assert!(agent.instructions().contains("their name"));
        assert!(agent.instructions().contains("where they are from"));
    }
}
