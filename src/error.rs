use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("tool `{0}` not found")]
    ToolNotFound(String),

    #[error("tool `{name}` failed: {message}")]
    ToolExecution { name: String, message: String },

    #[error("tool `{name}` timed out after {}s", timeout.as_secs_f32())]
    ToolTimeout { name: String, timeout: Duration },

    #[error("could not parse model output: {0}")]
    Parse(String),

    #[error("language model error: {0}")]
    LanguageModel(String),

    #[error("agent reached the step limit ({steps} steps) without a final answer")]
    StepLimitExhausted { steps: usize },

    #[error("agent run cancelled")]
    Cancelled,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl AgentError {
    /// Builds a `ToolExecution` error from anything printable.
    pub fn tool(name: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::ToolExecution {
            name: name.into(),
            message: message.to_string(),
        }
    }
}
