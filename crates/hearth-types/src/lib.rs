//! Shared types for the Hearth voice agent.
//!
//! Plain data carried across crate boundaries: the session record that
//! survives persona hand-offs, chat turns exchanged with the language
//! backend, and the capability descriptors a persona advertises to it.

pub mod chat;
pub mod session;

pub use chat::{CapabilityCall, CapabilitySpec, ChatRole, ChatTurn, TokenUsage};
pub use session::SessionData;
