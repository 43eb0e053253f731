//! Language model abstraction and backends.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::ModelConfig;
use crate::error::{AgentError, Result};
use crate::message::{Message, Role};

/// Opaque function from conversation history to reply text.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn invoke(&self, messages: &[Message]) -> Result<String>;
}

/// A deterministic model used for tests and demos.
///
/// Replies are popped from a script in order; every request is recorded.
#[derive(Default)]
pub struct StubModel {
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl StubModel {
    pub fn new(responses: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// A model that returns `reply` for the next `times` invocations.
    pub fn repeating(reply: impl Into<String>, times: usize) -> Arc<Self> {
        let reply = reply.into();
        Self::new(vec![reply; times])
    }

    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().map(|guard| guard.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LanguageModel for StubModel {
    async fn invoke(&self, messages: &[Message]) -> Result<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages.to_vec());
        }
        let mut locked = self
            .responses
            .lock()
            .map_err(|_| AgentError::LanguageModel("stub model poisoned".into()))?;
        locked.pop_front().ok_or_else(|| {
            AgentError::LanguageModel("StubModel ran out of scripted responses".into())
        })
    }
}

fn coalesce_error(status: reqwest::StatusCode, body: &str, provider: &str) -> AgentError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return AgentError::LanguageModel(format!("{provider} rate limit exceeded: {body}"));
    }
    AgentError::LanguageModel(format!("{provider} request failed with {status}: {body}"))
}

/// Client for OpenAI-compatible chat completion endpoints.
#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    model: String,
    api_key: String,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiClient {
    pub fn from_config(cfg: &ModelConfig) -> Result<Self> {
        let api_key = cfg.api_key.clone().ok_or_else(|| {
            AgentError::Config("missing API key for the openai provider".into())
        })?;
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(cfg.timeout_secs))
                .build()
                .map_err(|err| AgentError::LanguageModel(format!("http client error: {err}")))?,
            model: cfg.model.clone(),
            api_key,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
        })
    }

    fn to_openai_messages(messages: &[Message]) -> Vec<OpenAiMessage> {
        messages
            .iter()
            .map(|message| match message.role {
                Role::System => OpenAiMessage::new("system", &message.content),
                Role::User => OpenAiMessage::new("user", &message.content),
                Role::Assistant => OpenAiMessage::new("assistant", &message.content),
                Role::Observation => {
                    OpenAiMessage::new("user", format!("Observation: {}", message.content))
                }
            })
            .collect()
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn invoke(&self, messages: &[Message]) -> Result<String> {
        let payload = json!({
            "model": self.model,
            "messages": Self::to_openai_messages(messages),
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| AgentError::LanguageModel(format!("OpenAI request error: {err}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(coalesce_error(status, &body, "openai"));
        }

        let body: OpenAiResponse = resp
            .json()
            .await
            .map_err(|err| AgentError::LanguageModel(format!("invalid OpenAI response: {err}")))?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AgentError::LanguageModel("OpenAI returned no content".into()))
    }
}

/// Builds the backend selected by `cfg.provider`.
pub fn build_model(cfg: &ModelConfig) -> Result<Arc<dyn LanguageModel>> {
    match cfg.provider.to_ascii_lowercase().as_str() {
        "openai" => Ok(Arc::new(OpenAiClient::from_config(cfg)?)),
        "stub" => Ok(StubModel::new(vec![
            "Final Answer: The stub model has no plan for this request.".into(),
        ])),
        other => Err(AgentError::Config(format!("unknown model provider `{other}`"))),
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct OpenAiMessage {
    role: String,
    content: String,
}

impl OpenAiMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_replays_script_then_errors() {
        let model = StubModel::new(vec!["one".into(), "two".into()]);
        let history = vec![Message::user("hi")];
        assert_eq!(model.remaining(), 2);

        assert_eq!(model.invoke(&history).await.unwrap(), "one");
        assert_eq!(model.invoke(&history).await.unwrap(), "two");
        assert_eq!(model.remaining(), 0);
        assert!(matches!(
            model.invoke(&history).await,
            Err(AgentError::LanguageModel(_))
        ));
        assert_eq!(model.requests().len(), 3);
    }

    #[test]
    fn observations_are_sent_as_user_turns() {
        let converted = OpenAiClient::to_openai_messages(&[
            Message::system("sys"),
            Message::observation("{\"ok\":true}"),
        ]);

        assert_eq!(converted[0], OpenAiMessage::new("system", "sys"));
        assert_eq!(
            converted[1],
            OpenAiMessage::new("user", "Observation: {\"ok\":true}")
        );
    }

    #[test]
    fn parses_chat_completion_body() {
        let body: OpenAiResponse = serde_json::from_str(
            r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"Final Answer: hi"}}]}"#,
        )
        .unwrap();
        assert_eq!(
            body.choices[0].message.content.as_deref(),
            Some("Final Answer: hi")
        );
    }

    #[test]
    fn openai_requires_a_key() {
        let cfg = ModelConfig::default();
        assert!(matches!(
            OpenAiClient::from_config(&cfg),
            Err(AgentError::Config(_))
        ));
        assert!(build_model(&ModelConfig {
            provider: "mystery".into(),
            ..ModelConfig::default()
        })
        .is_err());
    }
}
