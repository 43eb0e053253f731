use async_trait::async_trait;

use crate::error::Result;
use crate::message::Message;
use crate::parser::ToolInvocation;

/// Observer of the agent loop. Every method defaults to a no-op; returning an
/// error ends the run with `fatal_error`.
#[async_trait]
pub trait AgentHook: Send + Sync {
    async fn before_model(&self, _messages: &[Message]) -> Result<()> {
        Ok(())
    }

    async fn after_model(&self, _raw_response: &str) -> Result<()> {
        Ok(())
    }

    async fn before_tool_call(&self, _call: &ToolInvocation) -> Result<()> {
        Ok(())
    }

    async fn after_observation(&self, _tool: &str, _observation: &str) -> Result<()> {
        Ok(())
    }
}
