use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::executor::{is_failure_observation, ToolExecutor};
use crate::hooks::AgentHook;
use crate::llm::LanguageModel;
use crate::memory::ConversationMemory;
use crate::message::Message;
use crate::metrics::{MetricsTracker, RunGuard};
use crate::parser::{AgentStep, Intent, ToolInvocation};
use crate::planner::{Planner, PlannerOutcome, CORRECTIVE_OBSERVATION};
use crate::retry::RetryPolicy;
use crate::tool::ToolRegistry;

/// Consecutive unparseable replies that turn an exhausted budget into a fatal error.
const PARSE_FAILURE_STREAK: usize = 2;

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    FinalAnswer,
    StepLimit,
    FatalError,
    Cancelled,
}

/// What ended a run with `FatalError`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum RunFailure {
    /// The model backend stayed unreachable after retries.
    Model(String),
    /// The step budget ran out while the model kept replying off-grammar.
    Parse(String),
    /// A hook rejected the run.
    Hook(String),
}

/// Tagged result of one run, including the transcript it produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRun {
    pub run_id: Uuid,
    pub memory: ConversationMemory,
    pub steps_taken: usize,
    pub max_steps: usize,
    pub terminated_reason: TerminationReason,
    /// The final answer, or the best partial content for other outcomes.
    pub answer: Option<String>,
    pub failure: Option<RunFailure>,
    pub tool_calls: Vec<ToolInvocation>,
}

impl AgentRun {
    pub fn is_success(&self) -> bool {
        self.terminated_reason == TerminationReason::FinalAnswer
    }

    /// Collapses the run into its answer, mapping every other outcome to an error.
    pub fn into_result(self) -> Result<String> {
        match self.terminated_reason {
            TerminationReason::FinalAnswer => Ok(self.answer.unwrap_or_default()),
            TerminationReason::StepLimit => Err(AgentError::StepLimitExhausted {
                steps: self.steps_taken,
            }),
            TerminationReason::Cancelled => Err(AgentError::Cancelled),
            TerminationReason::FatalError => Err(match self.failure {
                Some(RunFailure::Model(msg)) => AgentError::LanguageModel(msg),
                Some(RunFailure::Parse(msg)) => AgentError::Parse(msg),
                Some(RunFailure::Hook(msg)) => AgentError::Protocol(msg),
                None => AgentError::Protocol("run failed".into()),
            }),
        }
    }
}

/// Per-run overrides.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub max_steps: Option<usize>,
    pub memory: Option<ConversationMemory>,
    pub cancel: Option<CancellationToken>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    /// Continue an earlier conversation instead of starting from scratch.
    pub fn with_memory(mut self, memory: ConversationMemory) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// A ReAct agent that alternates between the model and registered tools.
///
/// The agent itself is immutable while running: every run owns its memory,
/// so one agent can serve many concurrent runs.
pub struct Agent<M: LanguageModel + ?Sized> {
    planner: Planner<M>,
    executor: ToolExecutor,
    max_steps: usize,
    hooks: Vec<Arc<dyn AgentHook>>,
    metrics: Option<MetricsTracker>,
}

impl<M: LanguageModel + ?Sized> Agent<M> {
    pub fn new(model: Arc<M>) -> Self {
        let tools = Arc::new(ToolRegistry::new());
        Self {
            planner: Planner::new(model, tools.clone()),
            executor: ToolExecutor::new(tools),
            max_steps: 6,
            hooks: Vec::new(),
            metrics: None,
        }
    }

    pub fn from_config(model: Arc<M>, tools: ToolRegistry, cfg: &AgentConfig) -> Self {
        Self::new(model)
            .with_tools(tools)
            .with_system_prompt(cfg.system_prompt.clone())
            .with_max_steps(cfg.max_steps)
            .with_tool_timeout(Duration::from_secs(cfg.tool_timeout_secs))
            .with_retry(RetryPolicy {
                max_retries: cfg.model_retries,
                backoff: Duration::from_millis(cfg.retry_backoff_ms),
            })
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.planner = self.planner.with_system_prompt(prompt);
        self
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        let tools = Arc::new(tools);
        self.planner = self.planner.with_tools(tools.clone());
        self.executor = ToolExecutor::new(tools).with_timeout(self.executor.timeout());
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.executor = self.executor.with_timeout(timeout);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.planner = self.planner.with_retry(retry);
        self
    }

    /// A budget of zero is honoured: runs stop with `step_limit` before the
    /// model is asked anything.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_hook(mut self, hook: Arc<dyn AgentHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsTracker) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        self.executor.registry()
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Runs one request to completion and returns the answer, or an error for
    /// any outcome other than a final answer.
    pub async fn respond(&self, request: impl Into<String>) -> Result<String> {
        self.run(request, RunOptions::default()).await.into_result()
    }

    /// Blocking variant of [`Agent::run`]. Spins up a current-thread runtime,
    /// so it must not be called from inside an async context.
    pub fn run_blocking(&self, request: impl Into<String>, options: RunOptions) -> Result<AgentRun> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(runtime.block_on(self.run(request, options)))
    }

    /// Runs the think/act/observe loop for `request`.
    pub async fn run(&self, request: impl Into<String>, options: RunOptions) -> AgentRun {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("agent_run", %run_id);
        self.drive(run_id, request.into(), options)
            .instrument(span)
            .await
    }

    async fn drive(&self, run_id: Uuid, request: String, options: RunOptions) -> AgentRun {
        let max_steps = options.max_steps.unwrap_or(self.max_steps);
        let cancel = options.cancel.unwrap_or_default();
        let mut run = RunState {
            run_id,
            memory: options.memory.unwrap_or_default(),
            steps_taken: 0,
            max_steps,
            tool_calls: Vec::new(),
            last_parse_failure: None,
            parse_streak: 0,
            guard: self.metrics.as_ref().map(MetricsTracker::start_run),
        };
        run.memory.push(Message::user(request));
        tracing::info!(max_steps, seeded = run.memory.len() - 1, "agent run started");

        while run.steps_taken < max_steps {
            if cancel.is_cancelled() {
                return run.finish(TerminationReason::Cancelled, None);
            }

            let request = self.planner.build_request(&run.memory);
            if let Err(err) = self.before_model(&request).await {
                return run.fail(RunFailure::Hook(err.to_string()));
            }
            let raw = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return run.finish(TerminationReason::Cancelled, None);
                }
                reply = self.planner.invoke(&request) => match reply {
                    Ok(raw) => raw,
                    Err(err) => {
                        tracing::error!(error = %err, "model invocation failed");
                        return run.fail(RunFailure::Model(err.to_string()));
                    }
                },
            };
            if let Err(err) = self.after_model(&raw).await {
                return run.fail(RunFailure::Hook(err.to_string()));
            }

            match self.planner.interpret(raw) {
                PlannerOutcome::FinalReady { answer, .. } => {
                    run.memory.push(Message::assistant(answer.clone()));
                    return run.finish(TerminationReason::FinalAnswer, Some(answer));
                }
                PlannerOutcome::ActionReady { thought, call, .. } => {
                    tracing::debug!(step = run.steps_taken + 1, tool = %call.tool, "dispatching tool");
                    let step = AgentStep {
                        thought,
                        intent: Intent::Action(call.clone()),
                    };
                    run.memory.push(Message::assistant(step.to_string()));
                    if let Err(err) = self.before_tool_call(&call).await {
                        return run.fail(RunFailure::Hook(err.to_string()));
                    }
                    let observation = self.executor.execute(&call.tool, &call.input).await;
                    if let Some(guard) = run.guard.as_mut() {
                        guard.record_tool_call(is_failure_observation(&observation));
                    }
                    // Commit the step before hooks can end the run.
                    run.memory.push(Message::observation(observation.clone()));
                    run.tool_calls.push(call.clone());
                    run.last_parse_failure = None;
                    run.parse_streak = 0;
                    run.steps_taken += 1;
                    if let Err(err) = self.after_observation(&call.tool, &observation).await {
                        return run.fail(RunFailure::Hook(err.to_string()));
                    }
                }
                PlannerOutcome::ParseFailed { raw, reason } => {
                    tracing::warn!(step = run.steps_taken + 1, %reason, "unparseable model reply");
                    run.memory.push(Message::assistant(raw));
                    run.memory.push(Message::observation(CORRECTIVE_OBSERVATION));
                    if let Some(guard) = run.guard.as_mut() {
                        guard.record_parse_failure();
                    }
                    run.last_parse_failure = Some(reason);
                    run.parse_streak += 1;
                    run.steps_taken += 1;
                }
            }
        }

        let recurring = run.parse_streak >= PARSE_FAILURE_STREAK.min(max_steps);
        match run.last_parse_failure.take() {
            Some(reason) if recurring => run.fail(RunFailure::Parse(reason)),
            _ => {
                let partial = run.memory.last_assistant().map(|m| m.content.clone());
                run.finish(TerminationReason::StepLimit, partial)
            }
        }
    }

    async fn before_model(&self, request: &[Message]) -> Result<()> {
        for hook in &self.hooks {
            hook.before_model(request).await?;
        }
        Ok(())
    }

    async fn after_model(&self, raw: &str) -> Result<()> {
        for hook in &self.hooks {
            hook.after_model(raw).await?;
        }
        Ok(())
    }

    async fn before_tool_call(&self, call: &ToolInvocation) -> Result<()> {
        for hook in &self.hooks {
            hook.before_tool_call(call).await?;
        }
        Ok(())
    }

    async fn after_observation(&self, tool: &str, observation: &str) -> Result<()> {
        for hook in &self.hooks {
            hook.after_observation(tool, observation).await?;
        }
        Ok(())
    }
}

struct RunState {
    run_id: Uuid,
    memory: ConversationMemory,
    steps_taken: usize,
    max_steps: usize,
    tool_calls: Vec<ToolInvocation>,
    last_parse_failure: Option<String>,
    parse_streak: usize,
    guard: Option<RunGuard>,
}

impl RunState {
    fn fail(self, failure: RunFailure) -> AgentRun {
        let partial = self.memory.last_assistant().map(|m| m.content.clone());
        self.conclude(TerminationReason::FatalError, partial, Some(failure))
    }

    fn finish(self, reason: TerminationReason, answer: Option<String>) -> AgentRun {
        self.conclude(reason, answer, None)
    }

    fn conclude(
        self,
        reason: TerminationReason,
        answer: Option<String>,
        failure: Option<RunFailure>,
    ) -> AgentRun {
        if let Some(guard) = self.guard {
            guard.finish(reason);
        }
        tracing::info!(?reason, steps = self.steps_taken, "agent run finished");
        AgentRun {
            run_id: self.run_id,
            memory: self.memory,
            steps_taken: self.steps_taken,
            max_steps: self.max_steps,
            terminated_reason: reason,
            answer,
            failure,
            tool_calls: self.tool_calls,
        }
    }
}
