//! Tool dispatch with uniform error reporting.
//!
//! Every failure mode of a tool call (unknown name, `Err`, panic, timeout) is
//! rendered as an observation string so the model can read it on its next
//! turn. Nothing here returns an error to the agent loop.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::tool::ToolRegistry;

/// Prefix shared by every executor-generated error observation.
pub const ERROR_PREFIX: &str = "Error:";

pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Invokes `name` with `input` and returns the observation text.
    pub async fn execute(&self, name: &str, input: &str) -> String {
        match self.try_execute(name, input).await {
            Ok(output) => output,
            Err(err) => {
                tracing::warn!(tool = %name, error = %err, "tool call failed");
                self.render_error(&err)
            }
        }
    }

    async fn try_execute(&self, name: &str, input: &str) -> Result<String> {
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| AgentError::ToolNotFound(name.to_string()))?;

        let call = AssertUnwindSafe(tool.call(input)).catch_unwind();
        match tokio::time::timeout(self.timeout, call).await {
            Err(_) => Err(AgentError::ToolTimeout {
                name: name.to_string(),
                timeout: self.timeout,
            }),
            Ok(Err(panic)) => Err(AgentError::tool(name, panic_message(panic.as_ref()))),
            Ok(Ok(Err(err @ AgentError::ToolExecution { .. }))) => Err(err),
            Ok(Ok(Err(err))) => Err(AgentError::tool(name, err)),
            Ok(Ok(Ok(output))) => Ok(output),
        }
    }

    fn render_error(&self, err: &AgentError) -> String {
        match err {
            AgentError::ToolNotFound(name) => {
                let available = self.registry.names();
                let listing = if available.is_empty() {
                    "none".to_string()
                } else {
                    available.join(", ")
                };
                format!("{ERROR_PREFIX} tool `{name}` not found. Available tools: {listing}")
            }
            other => format!("{ERROR_PREFIX} {other}"),
        }
    }
}

/// Whether an observation reports a failed call: either an executor error or
/// a tool's in-band `{"error": ...}` payload.
pub fn is_failure_observation(observation: &str) -> bool {
    if observation.starts_with(ERROR_PREFIX) {
        return true;
    }
    let trimmed = observation.trim_start();
    trimmed.starts_with('{')
        && serde_json::from_str::<Value>(trimmed)
            .map(|value| value.get("error").is_some_and(|e| !e.is_null()))
            .unwrap_or(false)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {msg}")
    } else {
        "panicked".to_string()
    }
}
