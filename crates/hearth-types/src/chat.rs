//! Chat turns, capability descriptors, and usage counters shared by the
//! language-backend seam and the session.

use serde::{Deserialize, Serialize};

/// Who produced a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One turn of the conversation history handed to the language backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A named operation a persona exposes for the language model to invoke.
///
/// `parameters` is a JSON Schema object in the shape function-calling
/// APIs expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilitySpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl CapabilitySpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// A capability invocation requested by the language model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityCall {
    pub name: String,
    /// Arguments as a JSON object, already parsed.
    pub arguments: serde_json::Value,
}

/// Token counts reported by the language backend for one generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Folds another generation's counts into this one.
    pub fn accumulate(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chat_role_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(ChatTurn::user("hello")).unwrap(),
            json!({"role": "user", "content": "hello"})
        );
    }

    #[test]
    fn usage_accumulates() {
        let mut total = TokenUsage::default();
        total.accumulate(&TokenUsage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        });
        total.accumulate(&TokenUsage {
            prompt_tokens: 1,
            completion_tokens: 2,
            total_tokens: 3,
        });
        assert_eq!(total.prompt_tokens, 11);
        assert_eq!(total.completion_tokens, 7);
        assert_eq!(total.total_tokens, 18);
    }

    #[test]
    fn capability_call_round_trips() {
        let call = CapabilityCall {
            name: "information_gathered".into(),
            arguments: json!({"name": "Ada", "location": "London"}),
        };
        let json = serde_json::to_string(&call).unwrap();
        let back: CapabilityCall = serde_json::from_str(&json).unwrap();
        assert_eq!(back, call);
    }
}
