use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    #[serde(default = "default_model_retries")]
    pub model_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            max_steps: default_max_steps(),
            tool_timeout_secs: default_tool_timeout_secs(),
            model_retries: default_model_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

fn default_system_prompt() -> String {
    "You are a helpful travel-planning assistant.".into()
}

fn default_max_steps() -> usize {
    8
}

fn default_tool_timeout_secs() -> u64 {
    30
}

fn default_model_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    250
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_model_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            base_url: default_base_url(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_model_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "openai".into()
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_temperature() -> f32 {
    0.4
}

fn default_max_tokens() -> u32 {
    400
}

fn default_model_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

/// Settings for the travel toolkit's HTTP-backed tools.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TravelConfig {
    #[serde(default = "default_overpass_url")]
    pub overpass_url: String,
    #[serde(default = "default_opensky_url")]
    pub opensky_url: String,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

impl Default for TravelConfig {
    fn default() -> Self {
        Self {
            overpass_url: default_overpass_url(),
            opensky_url: default_opensky_url(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

fn default_overpass_url() -> String {
    "https://overpass-api.de/api/interpreter".into()
}

fn default_opensky_url() -> String {
    "https://opensky-network.org/api/states/all".into()
}

fn default_http_timeout_secs() -> u64 {
    25
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub travel: TravelConfig,
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw)
            .map_err(|err| AgentError::Config(format!("Failed to parse configuration: {err}")))
    }

    /// Loads `path` when it exists (defaults otherwise) and applies `ROAM_*`
    /// environment overrides.
    pub fn from_env_or_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut cfg = if path.exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };
        cfg.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_env(&mut self) {
        if let Ok(provider) = env::var("ROAM_PROVIDER") {
            self.model.provider = provider;
        }
        if let Ok(model) = env::var("ROAM_MODEL") {
            self.model.model = model;
        }
        if let Ok(key) = env::var("ROAM_API_KEY").or_else(|_| env::var("OPENAI_API_KEY")) {
            self.model.api_key = Some(key);
        }
        if let Ok(url) = env::var("ROAM_BASE_URL") {
            self.model.base_url = url;
        }
        if let Ok(steps) = env::var("ROAM_MAX_STEPS") {
            if let Ok(parsed) = steps.parse::<usize>() {
                self.agent.max_steps = parsed;
            }
        }
        if let Ok(timeout) = env::var("ROAM_TOOL_TIMEOUT_SECS") {
            if let Ok(parsed) = timeout.parse::<u64>() {
                self.agent.tool_timeout_secs = parsed;
            }
        }
        if let Ok(level) = env::var("ROAM_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(json) = env::var("ROAM_LOG_JSON") {
            if let Ok(parsed) = json.parse::<bool>() {
                self.logging.json = parsed;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.agent.max_steps == 0 {
            return Err(AgentError::Config("agent.max_steps must be at least 1".into()));
        }
        if self.agent.tool_timeout_secs == 0 {
            return Err(AgentError::Config(
                "agent.tool_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
