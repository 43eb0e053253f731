use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use roam_agent::{
    offline_toolkit, Agent, AgentError, CancellationToken, ConversationMemory, LanguageModel,
    Message, Result, Role, RunFailure, RunOptions, StubModel, TerminationReason, Tool,
    ToolExecutor, ToolRegistry, CORRECTIVE_OBSERVATION,
};

struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes its input back"
    }

    async fn call(&self, input: &str) -> Result<String> {
        Ok(input.to_string())
    }
}

struct BrokenTool;

#[async_trait]
impl Tool for BrokenTool {
    fn name(&self) -> &str {
        "broken"
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    async fn call(&self, _input: &str) -> Result<String> {
        Err(AgentError::tool("broken", "disk on fire"))
    }
}

/// Answers with whatever the most recent user message said.
struct ParrotModel;

#[async_trait]
impl LanguageModel for ParrotModel {
    async fn invoke(&self, messages: &[Message]) -> Result<String> {
        tokio::task::yield_now().await;
        let last = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(format!("Final Answer: {last}"))
    }
}

/// Never answers within a test's lifetime.
struct StalledModel;

#[async_trait]
impl LanguageModel for StalledModel {
    async fn invoke(&self, _messages: &[Message]) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok("Final Answer: too late".into())
    }
}

fn tools() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(EchoTool).unwrap();
    registry.register(BrokenTool).unwrap();
    registry
}

#[tokio::test]
async fn registry_lookup_matches_registration() {
    let registry = tools();
    assert_eq!(registry.get("echo").unwrap().name(), "echo");
    assert!(registry.get("ECHO").is_none());
    assert_eq!(registry.names(), vec!["echo", "broken"]);
}

#[tokio::test]
async fn executor_turns_tool_failures_into_observations() {
    let executor = ToolExecutor::new(Arc::new(tools()));

    let observation = executor.execute("broken", "{}").await;

    assert!(observation.starts_with("Error:"));
    assert!(observation.contains("disk on fire"));
}

#[tokio::test]
async fn echo_scenario_takes_one_step() {
    let model = StubModel::new(vec![
        "Thought: I should echo.\nAction: echo\nAction Input: hello".into(),
        "Thought: done\nFinal Answer: hello".into(),
    ]);
    let agent = Agent::new(model).with_tools(tools());

    let run = agent.run("Please echo hello", RunOptions::default()).await;

    assert_eq!(run.terminated_reason, TerminationReason::FinalAnswer);
    assert_eq!(run.answer.as_deref(), Some("hello"));
    assert_eq!(run.steps_taken, 1);
    assert_eq!(run.tool_calls.len(), 1);
    assert_eq!(run.tool_calls[0].tool, "echo");
    assert_eq!(run.tool_calls[0].input, "hello");
}

#[tokio::test]
async fn step_limit_stops_a_model_that_never_finishes() {
    let model = StubModel::repeating("Action: echo\nAction Input: again", 10);
    let agent = Agent::new(model.clone()).with_tools(tools());

    let run = agent
        .run("loop forever", RunOptions::new().with_max_steps(4))
        .await;

    assert_eq!(run.terminated_reason, TerminationReason::StepLimit);
    assert_eq!(run.steps_taken, 4);
    assert_eq!(run.tool_calls.len(), 4);
    assert_eq!(model.requests().len(), 4);
    assert!(run.answer.is_some());
    assert!(matches!(
        run.into_result(),
        Err(AgentError::StepLimitExhausted { steps: 4 })
    ));
}

#[tokio::test]
async fn unparseable_replies_end_in_fatal_error() {
    let model = StubModel::repeating("I am not sure what to do.", 3);
    let agent = Agent::new(model).with_tools(tools());

    let run = agent
        .run("help", RunOptions::new().with_max_steps(3))
        .await;

    assert_eq!(run.terminated_reason, TerminationReason::FatalError);
    assert!(matches!(run.failure, Some(RunFailure::Parse(_))));
    assert_eq!(run.steps_taken, 3);
    // user request plus three (reply, correction) pairs
    assert_eq!(run.memory.len(), 7);
    assert_eq!(
        run.memory.messages()[2],
        Message::observation(CORRECTIVE_OBSERVATION)
    );
}

#[tokio::test]
async fn parse_failure_can_be_recovered() {
    let model = StubModel::new(vec!["hmm".into(), "Final Answer: recovered".into()]);
    let agent = Agent::new(model).with_tools(tools());

    let run = agent.run("go", RunOptions::default()).await;

    assert!(run.is_success());
    assert_eq!(run.steps_taken, 1);
    assert_eq!(run.answer.as_deref(), Some("recovered"));
}

#[tokio::test]
async fn final_answer_wins_over_action() {
    let model = StubModel::new(vec![
        "Thought: both\nAction: echo\nAction Input: x\nFinal Answer: 42".into(),
    ]);
    let agent = Agent::new(model).with_tools(tools());

    let run = agent.run("what is it", RunOptions::default()).await;

    assert_eq!(run.answer.as_deref(), Some("42"));
    assert!(run.tool_calls.is_empty());
    assert_eq!(run.steps_taken, 0);
}

#[tokio::test]
async fn failing_tool_does_not_end_the_run() {
    let model = StubModel::new(vec![
        "Action: broken\nAction Input: {}".into(),
        "Final Answer: the tool failed".into(),
    ]);
    let agent = Agent::new(model).with_tools(tools());

    let run = agent.run("try it", RunOptions::default()).await;

    assert!(run.is_success());
    assert!(run.memory.messages()[2].content.starts_with("Error:"));
}

#[tokio::test]
async fn replaying_a_script_is_deterministic() {
    let script = vec![
        "Action: echo\nAction Input: one".to_string(),
        "Action: echo\nAction Input: two".to_string(),
        "Final Answer: one two".to_string(),
    ];

    let first = Agent::new(StubModel::new(script.clone()))
        .with_tools(tools())
        .run("count", RunOptions::default())
        .await;
    let second = Agent::new(StubModel::new(script))
        .with_tools(tools())
        .run("count", RunOptions::default())
        .await;

    assert_eq!(first.memory, second.memory);
    assert_eq!(first.answer, second.answer);
    assert_eq!(first.steps_taken, second.steps_taken);
    assert_ne!(first.run_id, second.run_id);
}

#[tokio::test]
async fn seeded_memory_is_continued() {
    let seeded = ConversationMemory::with_messages(vec![
        Message::user("My name is Ada."),
        Message::assistant("Nice to meet you, Ada."),
    ]);
    let model = StubModel::new(vec!["Final Answer: Ada".into()]);
    let agent = Agent::new(model.clone());

    let run = agent
        .run("What is my name?", RunOptions::new().with_memory(seeded))
        .await;

    assert_eq!(run.memory.len(), 4);
    assert_eq!(run.memory.messages()[0].content, "My name is Ada.");
    // system prompt, seeded history, new request
    let request = &model.requests()[0];
    assert_eq!(request.len(), 4);
    assert_eq!(request[0].role, Role::System);
    assert_eq!(request[3], Message::user("What is my name?"));
}

#[tokio::test]
async fn concurrent_runs_do_not_share_memory() {
    let agent = Agent::new(Arc::new(ParrotModel)).with_tools(tools());

    let runs = futures::future::join_all(
        (0..8).map(|i| agent.run(format!("request {i}"), RunOptions::default())),
    )
    .await;

    for (i, run) in runs.iter().enumerate() {
        assert_eq!(run.answer.as_deref(), Some(format!("request {i}").as_str()));
        assert_eq!(run.memory.len(), 2);
    }
}

#[tokio::test]
async fn cancellation_interrupts_a_pending_model_call() {
    let agent = Agent::new(Arc::new(StalledModel));
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let run = tokio::time::timeout(
        Duration::from_secs(5),
        agent.run("wait", RunOptions::new().with_cancellation(token)),
    )
    .await
    .expect("cancellation should stop the run promptly");

    assert_eq!(run.terminated_reason, TerminationReason::Cancelled);
    assert_eq!(run.steps_taken, 0);
}

#[tokio::test]
async fn budget_tool_reports_invalid_input_to_the_model() {
    let model = StubModel::new(vec![
        "Action: trip_budget\nAction Input: two people for a week".into(),
        "Final Answer: I need numbers".into(),
    ]);
    let agent = Agent::new(model).with_tools(offline_toolkit().unwrap());

    let run = agent.run("what will it cost", RunOptions::default()).await;

    assert!(run.is_success());
    assert_eq!(
        run.memory.messages()[2].content,
        r#"{"error":"Invalid JSON input"}"#
    );
}

#[tokio::test]
async fn json_directives_drive_tools_too() {
    let model = StubModel::new(vec![
        r#"{"action": "call_tool", "name": "trip_budget", "arguments": {"travelers": 2, "misc": 10}}"#
            .into(),
        r#"{"final_answer": "about $10"}"#.into(),
    ]);
    let agent = Agent::new(model).with_tools(offline_toolkit().unwrap());

    let run = agent.run("budget", RunOptions::default()).await;

    assert_eq!(run.answer.as_deref(), Some("about $10"));
    assert_eq!(run.tool_calls[0].tool, "trip_budget");
    assert!(run.memory.messages()[2].content.contains("\"total_group_cost\""));
}

#[test]
fn agents_can_be_shared_across_tasks() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Agent<dyn LanguageModel>>();
    assert_send_sync::<Agent<StubModel>>();
}
