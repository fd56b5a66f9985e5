//! The persona hand-off core of the Hearth storytelling agent.
//!
//! A session drives exactly one active persona at a time. Personas are
//! trait objects exposing an activation hook and named capabilities; a
//! capability may return a [`persona::Transition`] (a new persona plus a
//! spoken transition line) which the session applies in place, carrying
//! the shared [`hearth_types::SessionData`] forward.
//!
//! Persona operations are serialized by construction: the session owns
//! the active persona and awaits each hook before accepting the next, so
//! the shared record needs no lock.

pub mod error;
pub mod metrics;
pub mod persona;
pub mod personas;
pub mod session;

pub use error::SessionError;
pub use metrics::{MetricsEvent, UsageCollector, UsageSummary};
pub use persona::{
    BackendOverrides, CapabilityOutcome, Persona, SessionCtx, Transition,
};
pub use personas::{IntakeAgent, StoryAgent};
pub use session::StorySession;
