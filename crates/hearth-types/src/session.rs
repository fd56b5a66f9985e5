//! The shared record threaded through every persona of one session.

use serde::{Deserialize, Serialize};

/// Mutable state shared by all personas for the lifetime of one session.
///
/// Created empty when the session starts. The intake persona populates
/// both fields exactly once; every later persona only reads them. The
/// setters are write-once: a write to a field that already holds a value
/// is refused and the stored value is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    /// The listener's name, as extracted by the intake persona.
    pub name: Option<String>,
    /// Where the listener is from.
    pub location: Option<String>,
}

impl SessionData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the listener's name. Returns `false` without writing if a
    /// name is already present.
    pub fn set_name(&mut self, name: impl Into<String>) -> bool {
        if self.name.is_some() {
            return false;
        }
        self.name = Some(name.into());
        true
    }

    /// Records the listener's location. Returns `false` without writing
    /// if a location is already present.
    pub fn set_location(&mut self, location: impl Into<String>) -> bool {
        if self.location.is_some() {
            return false;
        }
        self.location = Some(location.into());
        true
    }

    /// True once both fields have been captured.
    pub fn is_complete(&self) -> bool {
        self.name.is_some() && self.location.is_some()
    }
}
