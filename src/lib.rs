//! A ReAct-style tool-using agent.
//!
//! The crate provides a small runtime with:
//! - A language model abstraction (`LanguageModel`) with a scripted stub and an
//!   OpenAI-compatible client.
//! - A tool interface (`Tool`, `ToolRegistry`) and a fault-isolating `ToolExecutor`.
//! - A `Planner` that turns model replies into tool calls or final answers.
//! - An `Agent` that loops between the two under a step limit, with
//!   cancellation, hooks and per-run metrics.
//! - `Session`s that carry a conversation across runs via a `TranscriptStore`.
//! - A travel-planning toolkit (`travel_toolkit`).

mod agent;
mod config;
mod error;
mod executor;
mod hooks;
mod llm;
mod logging;
mod memory;
mod message;
mod metrics;
mod parser;
mod planner;
mod retry;
mod session;
mod storage;
mod tool;
mod toolkit;
pub mod tools;

pub use agent::{Agent, AgentRun, RunFailure, RunOptions, TerminationReason};
pub use config::{AgentConfig, AppConfig, LoggingConfig, ModelConfig, TravelConfig};
pub use error::{AgentError, Result};
pub use executor::{is_failure_observation, ToolExecutor, DEFAULT_TOOL_TIMEOUT, ERROR_PREFIX};
pub use hooks::AgentHook;
pub use llm::{build_model, LanguageModel, OpenAiClient, StubModel};
pub use logging::init_logging;
pub use memory::ConversationMemory;
pub use message::{Message, Role};
pub use metrics::{MetricsTracker, RunGuard, RunReport};
pub use parser::{parse_response, AgentStep, Intent, ToolInvocation};
pub use planner::{Planner, PlannerOutcome, PlannerState, CORRECTIVE_OBSERVATION};
pub use retry::RetryPolicy;
pub use session::Session;
pub use storage::{JsonlTranscriptStore, TranscriptStore};
pub use tool::{Tool, ToolDescription, ToolRegistry};
pub use toolkit::{offline_toolkit, travel_toolkit};

pub use tokio_util::sync::CancellationToken;
