//! The storytelling persona: improvises a personalized story, and ends
//! the session with a farewell followed by room teardown.

use super::COMMON_INSTRUCTIONS;
use crate::error::SessionError;
use crate::persona::{BackendOverrides, CapabilityOutcome, Persona, SessionCtx};
use async_trait::async_trait;
use hearth_types::{CapabilityCall, CapabilitySpec};
use serde_json::json;

const STORY_FINISHED: &str = "story_finished";

pub struct StoryAgent {
    instructions: String,
    overrides: BackendOverrides,
}

impl StoryAgent {
    /// Builds the storyteller with the captured values interpolated into
    /// its instruction text, and with its own language and synthesis
    /// backends distinct from the session defaults.
    pub fn new(name: &str, location: &str, overrides: BackendOverrides) -> Self {
        Self {
            instructions: format!(
                "{COMMON_INSTRUCTIONS}. You should use the user's information in order to \
                 make the story personalized. Create the entire story, weaving in elements \
                 of their information, and make it interactive, occasionally interacting \
                 with the user. Do not end on a statement where the user is not expected to \
                 respond. When interrupted, ask if the user would like to continue or end. \
                 The user's name is {name}, from {location}."
            ),
            overrides,
        }
    }
}

#[async_trait]
impl Persona for StoryAgent {
    fn name(&self) -> &'static str {
        "storyteller"
    }

    fn instructions(&self) -> &str {
        &self.instructions
    }

    fn capabilities(&self) -> Vec<CapabilitySpec> {
        vec![CapabilitySpec::new(
            STORY_FINISHED,
            "When you are finished telling the story (and the user confirms they don't \
             want any more), call this function to end the conversation.",
            json!({
                "type": "object",
                "properties": {}
            }),
        )]
    }

    fn overrides(&self) -> BackendOverrides {
        self.overrides.clone()
    }

    async fn on_enter(&self, ctx: &mut SessionCtx<'_>) -> Result<(), SessionError> {
        // Open the narrative; the model improvises from the instructions.
        ctx.generate_reply();
        Ok(())
    }

    async fn on_capability(
        &self,
        call: &CapabilityCall,
        ctx: &mut SessionCtx<'_>,
    ) -> Result<CapabilityOutcome, SessionError> {
        if call.name != STORY_FINISHED {
            return Err(SessionError::UnknownCapability(call.name.clone()));
        }

        // Cut off any in-flight narration so the farewell is the only
        // speech in flight.
        ctx.interrupt();

        let listener = ctx
            .state
            .name
            .clone()
            .unwrap_or_else(|| "our listener".to_string());
        // Awaited to completion: the farewell must be fully delivered
        // before the room goes away.
        ctx.generate_uninterruptible(&format!("Say goodbye to {listener}."))
            .await?;

        ctx.close_room().await?;
        Ok(CapabilityOutcome::Terminate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instructions_carry_the_captured_values_verbatim() {
        for (name, location) in [
            ("Ada", "London"),
            ("Grace", "New York"),
            ("Núria", "Sant Cugat del Vallès"),
        ] {
            let agent = StoryAgent::new(name, location, BackendOverrides::default());
            assert!(agent.instructions().contains(name));
            assert!(agent.instructions().contains(location));
        }
    }

    #[test]
    fn advertises_the_finishing_capability() {
        let agent = StoryAgent::new("Ada", "London", BackendOverrides::default());
        let capabilities = agent.capabilities();
        assert_eq!(capabilities.len(), 1);
        assert_eq!(capabilities[0].name, STORY_FINISHED);
    }
}
