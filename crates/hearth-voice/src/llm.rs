//! Language-generation seam and the OpenAI-compatible provider behind it.

use crate::error::VoiceError;
use async_trait::async_trait;
use hearth_types::{CapabilityCall, CapabilitySpec, ChatRole, ChatTurn, TokenUsage};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Request timeout for generation calls.
const LLM_TIMEOUT: Duration = Duration::from_secs(60);

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// What a persona asks the language backend to produce.
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    /// The active persona's instruction text (system prompt).
    pub instructions: &'a str,
    /// Conversation so far, oldest first.
    pub history: &'a [ChatTurn],
    /// Capabilities the model may invoke instead of (or alongside)
    /// replying with text. Empty when the reply is unconditional, such
    /// as a greeting or a farewell.
    pub capabilities: &'a [CapabilitySpec],
}

/// One reply from the language backend.
#[derive(Debug, Clone, Default)]
pub struct Generation {
    /// Text to speak, if any.
    pub text: Option<String>,
    /// A capability the model chose to invoke, if any.
    pub capability_call: Option<CapabilityCall>,
    pub usage: TokenUsage,
}

/// Seam for language generation. The session and personas depend on this
/// trait; providers live behind it.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn provider(&self) -> &'static str;

    async fn generate(&self, request: GenerationRequest<'_>) -> Result<Generation, VoiceError>;
}

/// Chat-completions client for OpenAI-compatible endpoints.
pub struct OpenAiLlm {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiLlm {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, VoiceError> {
        Ok(Self {
            client: Client::builder().timeout(LLM_TIMEOUT).build()?,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// Points the client at a different OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LanguageModel for OpenAiLlm {
    fn provider(&self) -> &'static str {
        "openai"
    }

    async fn generate(&self, request: GenerationRequest<'_>) -> Result<Generation, VoiceError> {
        let mut messages = Vec::with_capacity(request.history.len() + 1);
        messages.push(ApiMessage {
            role: "system".to_string(),
            content: request.instructions.to_string(),
        });
        for turn in request.history {
            messages.push(ApiMessage {
                role: match turn.role {
                    ChatRole::System => "system",
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                }
                .to_string(),
                content: turn.content.clone(),
            });
        }

        let tools: Vec<ToolDecl> = request
            .capabilities
            .iter()
            .map(|spec| ToolDecl {
                kind: "function".to_string(),
                function: FunctionDecl {
                    name: spec.name.clone(),
                    description: spec.description.clone(),
                    parameters: spec.parameters.clone(),
                },
            })
            .collect();

        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            tools: if tools.is_empty() { None } else { Some(tools) },
        };

        debug!(model = self.model.as_str(), "requesting chat completion");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(VoiceError::Llm(format!(
                "chat completion failed with {status}: {detail}"
            )));
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        generation_from_response(parsed)
    }
}

fn generation_from_response(response: ChatCompletionResponse) -> Result<Generation, VoiceError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| VoiceError::Llm("chat completion returned no choices".to_string()))?;

    let capability_call = match choice.message.tool_calls.and_then(|c| c.into_iter().next()) {
        Some(call) => Some(CapabilityCall {
            name: call.function.name,
            // The API delivers arguments as a JSON-encoded string.
            arguments: serde_json::from_str(&call.function.arguments)
                .map_err(|e| VoiceError::Llm(format!("malformed tool arguments: {e}")))?,
        }),
        None => None,
    };

    let usage = response
        .usage
        .map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        })
        .unwrap_or_default();

    Ok(Generation {
        text: choice.message.content.filter(|t| !t.is_empty()),
        capability_call,
        usage,
    })
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolDecl>>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ToolDecl {
    #[serde(rename = "type")]
    kind: String,
    function: FunctionDecl,
}

#[derive(Debug, Serialize)]
struct FunctionDecl {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ApiChoiceMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ApiToolCall {
    function: ApiToolFunction,
}

#[derive(Debug, Deserialize)]
struct ApiToolFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_text_reply() {
        let response: ChatCompletionResponse = serde_json::from_str(
            r#"{
                "choices": [{"message": {"content": "Once upon a time"}}],
                "usage": {"prompt_tokens": 42, "completion_tokens": 7, "total_tokens": 49}
            }"#,
        )
        .unwrap();

        let generation = generation_from_response(response).unwrap();
        assert_eq!(generation.text.as_deref(), Some("Once upon a time"));
        assert!(generation.capability_call.is_none());
        assert_eq!(generation.usage.prompt_tokens, 42);
        assert_eq!(generation.usage.completion_tokens, 7);
    }

    #[test]
    fn maps_tool_call_with_string_encoded_arguments() {
        let response: ChatCompletionResponse = serde_json::from_str(
            r#"{
                "choices": [{"message": {
                    "content": null,
                    "tool_calls": [{"function": {
                        "name": "information_gathered",
                        "arguments": "{\"name\": \"Ada\", \"location\": \"London\"}"
                    }}]
                }}]
            }"#,
        )
        .unwrap();

        let generation = generation_from_response(response).unwrap();
        assert!(generation.text.is_none());
        let call = generation.capability_call.unwrap();
        assert_eq!(call.name, "information_gathered");
        assert_eq!(call.arguments["name"], "Ada");
        assert_eq!(call.arguments["location"], "London");
    }

    #[test]
    fn empty_choices_is_an_error() {
        let response: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(generation_from_response(response).is_err());
    }
}
