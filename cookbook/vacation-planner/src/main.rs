use std::env;

use roam_agent::{
    build_model, init_logging, travel_toolkit, Agent, AppConfig, CancellationToken,
    JsonlTranscriptStore, RunOptions, Session,
};

const DEFAULT_CONFIG: &str = "roam.toml";

const DEMO_REQUEST: &str = "Build a 2-day Miami vacation plan for two people. \
Include restaurants, activities, flights from DEN, hotel, and budget. \
Format with structured_output_formatter.";

/// Usage: `vacation-planner [--config PATH] [--session PATH] [REQUEST...]`
///
/// With `--session`, the conversation is loaded from and appended to a JSONL
/// transcript so follow-up requests see earlier turns.
#[tokio::main]
async fn main() -> roam_agent::Result<()> {
    let mut args = env::args().skip(1).peekable();
    let mut config_path = DEFAULT_CONFIG.to_string();
    let mut session_path = None;
    while let Some(flag) = args.next_if(|arg| arg == "--config" || arg == "--session") {
        let Some(value) = args.next() else { break };
        if flag == "--config" {
            config_path = value;
        } else {
            session_path = Some(value);
        }
    }
    let request = {
        let words: Vec<String> = args.collect();
        if words.is_empty() {
            DEMO_REQUEST.to_string()
        } else {
            words.join(" ")
        }
    };

    let config = AppConfig::from_env_or_file(&config_path)?;
    init_logging(&config.logging)?;
    tracing::info!(
        config = %config_path,
        provider = %config.model.provider,
        model = %config.model.model,
        "starting vacation planner"
    );

    let model = build_model(&config.model)?;
    let tools = travel_toolkit(&config.travel)?;
    let agent = Agent::from_config(model, tools, &config.agent);

    let mut session = match &session_path {
        Some(path) => Some(Session::open(JsonlTranscriptStore::new(path)).await?),
        None => None,
    };
    let options = session
        .as_ref()
        .map(Session::run_options)
        .unwrap_or_else(RunOptions::new);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling run");
            on_interrupt.cancel();
        }
    });

    let run = agent
        .run(request, options.with_cancellation(cancel))
        .await;

    if let Some(session) = session.as_mut() {
        let saved = session.record(&run).await?;
        tracing::info!(saved, total = session.transcript().len(), "session transcript updated");
    }

    println!("{}", serde_json::to_string_pretty(&run)?);
    if let Some(answer) = run.answer.as_deref() {
        println!("\nFINAL OUTPUT ({:?}):\n\n{answer}", run.terminated_reason);
    }
    Ok(())
}
