use serde::{Deserialize, Serialize};
use std::fmt;

fn default_token_ttl_seconds() -> u64 {
    3600
}

/// Connection settings for the LiveKit control plane.
///
/// The secret never appears in `Debug` output or serialized form.
#[derive(Clone, Serialize, Deserialize)]
pub struct LiveKitConfig {
    /// Server URL, e.g. `wss://example.livekit.cloud`.
    pub url: String,
    pub api_key: String,
    #[serde(skip_serializing)]
    pub api_secret: String,
    /// JWT TTL in seconds for room join tokens issued to the agent.
    #[serde(default = "default_token_ttl_seconds")]
    pub token_ttl_seconds: u64,
}

impl LiveKitConfig {
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            token_ttl_seconds: default_token_ttl_seconds(),
        }
    }
}

impl Default for LiveKitConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            token_ttl_seconds: default_token_ttl_seconds(),
        }
    }
}

impl fmt::Debug for LiveKitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveKitConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_secret() {
        let config = LiveKitConfig::new("wss://example.livekit.cloud", "key", "hunter2");
        let rendered = format!("{config:?}");
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn toml_defaults_token_ttl() {
        let config: LiveKitConfig = toml::from_str(
            r#"
            url = "ws://localhost:7880"
            api_key = "key"
            api_secret = "secret"
            "#,
        )
        .expect("parse TOML");
        assert_eq!(config.token_ttl_seconds, 3600);
    }
}
