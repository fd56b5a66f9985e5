//! The two scripted personas: intake first, then the storyteller.

mod intake;
mod storyteller;

pub use intake::IntakeAgent;
pub use storyteller::StoryAgent;

/// Instruction text shared by both personas.
pub(crate) const COMMON_INSTRUCTIONS: &str =
    "Your name is Echo. You are a story teller that interacts with the user via voice. \
     You are curious and friendly, with a sense of humor.";
