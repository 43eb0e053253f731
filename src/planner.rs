//! One think step: prompt the model, then interpret its reply.
//!
//! The planner moves through `AwaitingModel -> Parsing` and ends in one of
//! `ActionReady`, `FinalReady` or `ParseFailed`. Model faults surface as
//! `Err` after the retry budget is spent; everything else is an outcome.

use std::sync::Arc;

use crate::error::Result;
use crate::llm::LanguageModel;
use crate::memory::ConversationMemory;
use crate::message::Message;
use crate::parser::{parse_response, AgentStep, Intent, ToolInvocation};
use crate::retry::RetryPolicy;
use crate::tool::ToolRegistry;

/// Observation appended when the model's reply does not fit the grammar.
pub const CORRECTIVE_OBSERVATION: &str =
    "Could not parse model output; respond using the required format: either \
`Thought:` / `Action:` / `Action Input:` lines or a `Final Answer:` line.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerState {
    AwaitingModel,
    Parsing,
    ActionReady,
    FinalReady,
    ParseFailed,
}

/// Terminal state of one planning pass, with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannerOutcome {
    ActionReady {
        raw: String,
        thought: Option<String>,
        call: ToolInvocation,
    },
    FinalReady {
        raw: String,
        thought: Option<String>,
        answer: String,
    },
    ParseFailed { raw: String, reason: String },
}

impl PlannerOutcome {
    pub fn state(&self) -> PlannerState {
        match self {
            PlannerOutcome::ActionReady { .. } => PlannerState::ActionReady,
            PlannerOutcome::FinalReady { .. } => PlannerState::FinalReady,
            PlannerOutcome::ParseFailed { .. } => PlannerState::ParseFailed,
        }
    }

    pub fn raw(&self) -> &str {
        match self {
            PlannerOutcome::ActionReady { raw, .. }
            | PlannerOutcome::FinalReady { raw, .. }
            | PlannerOutcome::ParseFailed { raw, .. } => raw,
        }
    }
}

pub struct Planner<M: LanguageModel + ?Sized> {
    model: Arc<M>,
    tools: Arc<ToolRegistry>,
    system_prompt: String,
    retry: RetryPolicy,
}

impl<M: LanguageModel + ?Sized> Planner<M> {
    pub fn new(model: Arc<M>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            model,
            tools,
            system_prompt: "You are a helpful agent.".to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Full request for the next model call: the system message followed by
    /// the transcript in insertion order.
    pub fn build_request(&self, memory: &ConversationMemory) -> Vec<Message> {
        let mut request = Vec::with_capacity(memory.len() + 1);
        request.push(Message::system(self.build_system_message()));
        request.extend(memory.iter().cloned());
        request
    }

    pub fn build_system_message(&self) -> String {
        let mut prompt = String::new();
        prompt.push_str(&self.system_prompt);
        prompt.push_str("\n\n");
        if self.tools.is_empty() {
            prompt.push_str("No tools are available.\n\n");
        } else {
            prompt.push_str("Available tools:\n");
            for tool in self.tools.describe() {
                prompt.push_str(&format!("- {}: {}\n", tool.name, tool.description));
            }
            prompt.push('\n');
        }
        prompt.push_str("Respond in exactly one of these formats.\n\n");
        prompt.push_str("To use a tool:\n");
        prompt.push_str("Thought: <your reasoning>\n");
        prompt.push_str("Action: <tool name>\n");
        prompt.push_str("Action Input: <tool input, usually a JSON object>\n\n");
        prompt.push_str("When you are done:\n");
        prompt.push_str("Thought: <your reasoning>\n");
        prompt.push_str("Final Answer: <the complete answer for the user>\n\n");
        prompt.push_str(
            "Tool results are returned to you as observations. Never invent an observation.",
        );
        prompt
    }

    /// Calls the model once (retrying transport failures) and returns its raw reply.
    pub async fn invoke(&self, request: &[Message]) -> Result<String> {
        tracing::trace!(state = ?PlannerState::AwaitingModel, messages = request.len());
        self.retry
            .retry("model invocation", |_| self.model.invoke(request))
            .await
    }

    /// Interprets a raw model reply.
    pub fn interpret(&self, raw: String) -> PlannerOutcome {
        tracing::trace!(state = ?PlannerState::Parsing, bytes = raw.len());
        match parse_response(&raw) {
            Ok(AgentStep { thought, intent }) => match intent {
                Intent::FinalAnswer(answer) => PlannerOutcome::FinalReady {
                    raw,
                    thought,
                    answer,
                },
                Intent::Action(call) => PlannerOutcome::ActionReady { raw, thought, call },
            },
            Err(reason) => PlannerOutcome::ParseFailed { raw, reason },
        }
    }

    /// One full planning pass over `memory`.
    pub async fn next_step(&self, memory: &ConversationMemory) -> Result<PlannerOutcome> {
        let request = self.build_request(memory);
        let raw = self.invoke(&request).await?;
        Ok(self.interpret(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::error::AgentError;
    use crate::llm::StubModel;
    use crate::tool::Tool;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Returns its input unchanged"
        }

        async fn call(&self, input: &str) -> Result<String> {
            Ok(input.to_string())
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        let mut tools = ToolRegistry::new();
        tools.register(Echo).unwrap();
        Arc::new(tools)
    }

    #[tokio::test]
    async fn prompt_lists_tools_and_format() {
        let model = StubModel::new(vec!["Final Answer: ok".into()]);
        let planner = Planner::new(model.clone(), registry()).with_system_prompt("Be brief.");

        let mut memory = ConversationMemory::default();
        memory.push(Message::user("ping"));
        planner.next_step(&memory).await.unwrap();

        let requests = model.requests();
        let sent = &requests[0];
        assert_eq!(sent.len(), 2);
        assert!(sent[0].content.starts_with("Be brief."));
        assert!(sent[0].content.contains("- echo: Returns its input unchanged"));
        assert!(sent[0].content.contains("Final Answer:"));
        assert_eq!(sent[1], Message::user("ping"));
    }

    #[tokio::test]
    async fn classifies_outcomes() {
        let model = StubModel::new(vec![
            "Action: echo\nAction Input: hi".into(),
            "Final Answer: bye".into(),
            "just chatting".into(),
        ]);
        let planner = Planner::new(model, registry());
        let memory = ConversationMemory::default();

        let outcomes = [
            planner.next_step(&memory).await.unwrap(),
            planner.next_step(&memory).await.unwrap(),
            planner.next_step(&memory).await.unwrap(),
        ];
        let states: Vec<PlannerState> = outcomes.iter().map(PlannerOutcome::state).collect();
        assert_eq!(outcomes[2].raw(), "just chatting");
        assert_eq!(outcomes[0].raw(), "Action: echo\nAction Input: hi");

        assert_eq!(
            states,
            vec![
                PlannerState::ActionReady,
                PlannerState::FinalReady,
                PlannerState::ParseFailed
            ]
        );
    }

    #[tokio::test]
    async fn surfaces_model_failure_after_retries() {
        let model = StubModel::new(Vec::new());
        let planner = Planner::new(model.clone(), registry()).with_retry(RetryPolicy {
            max_retries: 2,
            backoff: std::time::Duration::from_millis(1),
        });

        let err = planner
            .next_step(&ConversationMemory::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::LanguageModel(_)));
        assert_eq!(model.requests().len(), 3);
    }
}
