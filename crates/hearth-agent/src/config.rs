//! Worker configuration: an optional TOML file merged with environment
//! variables (environment wins), then validation of the required
//! secrets. Secrets come from the environment alone and never from the
//! file.

use hearth_voice::LiveKitConfig;
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Required environment variables and their descriptions. A startup
/// failure enumerates every missing one.
pub const REQUIRED_ENV_VARS: &[(&str, &str)] = &[
    ("LIVEKIT_URL", "LiveKit server URL"),
    ("LIVEKIT_API_KEY", "LiveKit API key"),
    ("LIVEKIT_API_SECRET", "LiveKit API secret"),
    ("OPENAI_API_KEY", "OpenAI API key"),
];

/// Optional environment variables: execution degrades without them.
pub const OPTIONAL_ENV_VARS: &[(&str, &str)] = &[
    (
        "DEEPGRAM_API_KEY",
        "Deepgram API key (fallback to OpenAI Whisper STT if missing)",
    ),
    ("ELEVEN_API_KEY", "ElevenLabs API key"),
];

/// File-backed part of the configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Worker process settings.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Port for the auxiliary health listener.
    #[serde(default = "default_health_port")]
    pub health_port: u16,

    /// Port reported for the main worker process (platform-supplied
    /// `PORT` wins).
    #[serde(default = "default_worker_port")]
    pub port: u16,

    /// Room the agent joins.
    #[serde(default = "default_room_name")]
    pub room_name: String,

    /// Chat model used for both personas.
    #[serde(default = "default_llm_model")]
    pub llm_model: String,

    /// Timeout for joining the room during initialization, in seconds.
    #[serde(default = "default_init_timeout_secs")]
    pub init_timeout_secs: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "hearth_agent=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_health_port() -> u16 {
    8080
}

fn default_worker_port() -> u16 {
    8081
}

fn default_room_name() -> String {
    "hearth-story".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_init_timeout_secs() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            health_port: default_health_port(),
            port: default_worker_port(),
            room_name: default_room_name(),
            llm_model: default_llm_model(),
            init_timeout_secs: default_init_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Fully resolved worker configuration.
#[derive(Clone)]
pub struct AgentConfig {
    pub livekit: LiveKitConfig,
    pub openai_api_key: String,
    pub deepgram_api_key: Option<String>,
    pub eleven_api_key: Option<String>,
    pub worker: WorkerConfig,
    pub logging: LoggingConfig,
}

impl AgentConfig {
    /// Optional variables that were not set, as `NAME (description)`
    /// entries for the single startup warning.
    pub fn missing_optional(&self) -> Vec<String> {
        let mut missing = Vec::new();
        for (name, description) in OPTIONAL_ENV_VARS {
            let present = match *name {
                "DEEPGRAM_API_KEY" => self.deepgram_api_key.is_some(),
                "ELEVEN_API_KEY" => self.eleven_api_key.is_some(),
                _ => true,
            };
            if !present {
                missing.push(format!("{name} ({description})"));
            }
        }
        missing
    }
}

impl fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentConfig")
            .field("livekit", &self.livekit)
            .field("openai_api_key", &"[REDACTED]")
            .field("deepgram_api_key", &self.deepgram_api_key.as_deref().map(|_| "[REDACTED]"))
            .field("eleven_api_key", &self.eleven_api_key.as_deref().map(|_| "[REDACTED]"))
            .field("worker", &self.worker)
            .field("logging", &self.logging)
            .finish()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// One or more required environment variables are not set.
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingRequired(Vec<String>),
}

/// Loads configuration from an optional TOML file and the process
/// environment.
///
/// Environment variable overrides:
/// - `HEALTH_PORT` overrides `worker.health_port`
/// - `PORT` overrides `worker.port`
/// - `HEARTH_ROOM` overrides `worker.room_name`
/// - `HEARTH_LOG_LEVEL` overrides `logging.level`
/// - `HEARTH_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or
/// parsed, or if any required variable is missing; the error message
/// lists every missing name with its description.
pub fn load_config(path: Option<&str>) -> Result<AgentConfig, ConfigError> {
    load_config_with(path, |name| std::env::var(name).ok())
}

fn load_config_with(
    path: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<AgentConfig, ConfigError> {
    let mut file = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str::<FileConfig>(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                FileConfig::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => FileConfig::default(),
    };

    // Environment overrides for the non-secret settings.
    if let Some(port) = env("HEALTH_PORT").and_then(|v| v.parse().ok()) {
        file.worker.health_port = port;
    }
    if let Some(port) = env("PORT").and_then(|v| v.parse().ok()) {
        file.worker.port = port;
    }
    if let Some(room) = env("HEARTH_ROOM") {
        file.worker.room_name = room;
    }
    if let Some(level) = env("HEARTH_LOG_LEVEL") {
        file.logging.level = level;
    }
    if let Some(json) = env("HEARTH_LOG_JSON") {
        file.logging.json = json == "true" || json == "1";
    }

    let mut missing = Vec::new();
    for (name, description) in REQUIRED_ENV_VARS {
        if env(name).map_or(true, |v| v.trim().is_empty()) {
            missing.push(format!("{name} ({description})"));
        }
    }
    if !missing.is_empty() {
        return Err(ConfigError::MissingRequired(missing));
    }

    let get = |name: &str| env(name).unwrap_or_default();
    let not_blank = |v: String| if v.trim().is_empty() { None } else { Some(v) };

    Ok(AgentConfig {
        livekit: LiveKitConfig::new(
            get("LIVEKIT_URL"),
            get("LIVEKIT_API_KEY"),
            get("LIVEKIT_API_SECRET"),
        ),
        openai_api_key: get("OPENAI_API_KEY"),
        deepgram_api_key: env("DEEPGRAM_API_KEY").and_then(not_blank),
        eleven_api_key: env("ELEVEN_API_KEY").and_then(not_blank),
        worker: file.worker,
        logging: file.logging,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        move |name| map.get(name).map(|v| v.to_string())
    }

    const ALL_REQUIRED: &[(&str, &str)] = &[
        ("LIVEKIT_URL", "wss://example.livekit.cloud"),
        ("LIVEKIT_API_KEY", "lk-key"),
        ("LIVEKIT_API_SECRET", "lk-secret"),
        ("OPENAI_API_KEY", "sk-test"),
    ];

    #[test]
    fn loads_with_all_required_vars() {
        let config = load_config_with(None, env_from(ALL_REQUIRED)).unwrap();
        assert_eq!(config.livekit.url, "wss://example.livekit.cloud");
        assert_eq!(config.openai_api_key, "sk-test");
        assert_eq!(config.worker.health_port, 8080);
        assert_eq!(config.worker.port, 8081);
        assert_eq!(config.worker.init_timeout_secs, 60);
        assert_eq!(config.deepgram_api_key, None);
        assert_eq!(config.eleven_api_key, None);
    }

    #[test]
    fn missing_required_vars_are_all_enumerated() {
        let err = load_config_with(
            None,
            env_from(&[("LIVEKIT_URL", "wss://example.livekit.cloud")]),
        )
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("LIVEKIT_API_KEY (LiveKit API key)"));
        assert!(message.contains("LIVEKIT_API_SECRET (LiveKit API secret)"));
        assert!(message.contains("OPENAI_API_KEY (OpenAI API key)"));
        assert!(!message.contains("LIVEKIT_URL (LiveKit server URL)"));
    }

    #[test]
    fn blank_required_var_counts_as_missing() {
        let mut vars = ALL_REQUIRED.to_vec();
        vars[3] = ("OPENAI_API_KEY", "   ");
        let err = load_config_with(None, env_from(&vars)).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn missing_optional_vars_do_not_fail_startup() {
        let config = load_config_with(None, env_from(ALL_REQUIRED)).unwrap();
        let missing = config.missing_optional();
        assert_eq!(missing.len(), 2);
        assert!(missing[0].starts_with("DEEPGRAM_API_KEY"));
        assert!(missing[1].starts_with("ELEVEN_API_KEY"));
    }

    #[test]
    fn optional_vars_are_picked_up() {
        let mut vars = ALL_REQUIRED.to_vec();
        vars.push(("DEEPGRAM_API_KEY", "dg-key"));
        vars.push(("ELEVEN_API_KEY", "el-key"));
        let config = load_config_with(None, env_from(&vars)).unwrap();
        assert_eq!(config.deepgram_api_key.as_deref(), Some("dg-key"));
        assert_eq!(config.eleven_api_key.as_deref(), Some("el-key"));
        assert!(config.missing_optional().is_empty());
    }

    #[test]
    fn ports_come_from_the_environment() {
        let mut vars = ALL_REQUIRED.to_vec();
        vars.push(("HEALTH_PORT", "9090"));
        vars.push(("PORT", "9091"));
        let config = load_config_with(None, env_from(&vars)).unwrap();
        assert_eq!(config.worker.health_port, 9090);
        assert_eq!(config.worker.port, 9091);
    }

    #[test]
    fn file_config_parses_with_partial_sections() {
        let file: FileConfig = toml::from_str(
            r#"
            [worker]
            room_name = "fireside"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(file.worker.room_name, "fireside");
        assert_eq!(file.worker.health_port, 8080);
        assert_eq!(file.logging.level, "debug");
        assert!(!file.logging.json);
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut vars = ALL_REQUIRED.to_vec();
        vars.push(("DEEPGRAM_API_KEY", "dg-secret-key"));
        let config = load_config_with(None, env_from(&vars)).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-test"));
        assert!(!rendered.contains("dg-secret-key"));
        assert!(!rendered.contains("lk-secret"));
    }
}
