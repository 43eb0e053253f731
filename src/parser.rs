//! Grammar for model replies.
//!
//! Two surface forms are accepted. The ReAct text form:
//!
//! ```text
//! Thought: I should look up hotels first.
//! Action: hotel_search
//! Action Input: {"city": "miami"}
//! ```
//!
//! or `Final Answer: <text>` in place of the action lines. Markers are
//! case-insensitive and must start a line. `Action:` may also carry an inline
//! `{"tool_name": ..., "tool_input": ...}` object.
//!
//! The JSON form is a single object: `{"action":"respond","content":...}`,
//! `{"action":"call_tool","name":...,"arguments":...}`, or the keyed variant
//! `{"thought":...,"final_answer":...}` /
//! `{"thought":...,"action":{"tool_name":...,"tool_input":...}}`.
//!
//! In both forms a final answer outranks an action.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool: String,
    pub input: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Action(ToolInvocation),
    FinalAnswer(String),
}

/// One parsed decision of the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStep {
    pub thought: Option<String>,
    pub intent: Intent,
}

impl AgentStep {
    pub fn action(&self) -> Option<&ToolInvocation> {
        match &self.intent {
            Intent::Action(call) => Some(call),
            Intent::FinalAnswer(_) => None,
        }
    }

    pub fn final_answer(&self) -> Option<&str> {
        match &self.intent {
            Intent::FinalAnswer(text) => Some(text),
            Intent::Action(_) => None,
        }
    }
}

/// Canonical ReAct rendering, used when the step is recorded in memory.
impl fmt::Display for AgentStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(thought) = &self.thought {
            writeln!(f, "Thought: {thought}")?;
        }
        match &self.intent {
            Intent::Action(call) => write!(f, "Action: {}\nAction Input: {}", call.tool, call.input),
            Intent::FinalAnswer(text) => write!(f, "Final Answer: {text}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Thought,
    Action,
    ActionInput,
    FinalAnswer,
}

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?im)^[ \t>*#]*(thought|action[ _]input|action|final[ _]answer)[ \t*]*:")
            .expect("marker pattern is valid")
    })
}

/// Parses a raw model reply. `Err` carries a short reason for the failure.
pub fn parse_response(raw: &str) -> Result<AgentStep, String> {
    let text = strip_code_fence(raw.trim());
    if text.is_empty() {
        return Err("empty response".into());
    }
    if text.starts_with('{') {
        if let Ok(value) = serde_json::from_str::<Value>(text) {
            return parse_json_directive(&value);
        }
    }
    parse_react(text)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(body_start) = rest.find('\n') else {
        return text;
    };
    let body = &rest[body_start + 1..];
    body.trim_end()
        .strip_suffix("```")
        .map(str::trim)
        .unwrap_or(text)
}

fn parse_react(text: &str) -> Result<AgentStep, String> {
    let markers: Vec<(Marker, usize, usize)> = marker_regex()
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let label = caps.get(1)?.as_str().to_ascii_lowercase().replace('_', " ");
            let marker = match label.as_str() {
                "thought" => Marker::Thought,
                "action" => Marker::Action,
                "action input" => Marker::ActionInput,
                _ => Marker::FinalAnswer,
            };
            Some((marker, whole.start(), whole.end()))
        })
        .collect();

    let section = |wanted: Marker| -> Option<String> {
        markers.iter().enumerate().find_map(|(i, (marker, _, body_start))| {
            if *marker != wanted {
                return None;
            }
            let body_end = if wanted == Marker::FinalAnswer {
                text.len()
            } else {
                markers.get(i + 1).map(|(_, start, _)| *start).unwrap_or(text.len())
            };
            Some(text[*body_start..body_end].trim().to_string())
        })
    };

    let thought = section(Marker::Thought).filter(|t| !t.is_empty());

    if let Some(answer) = section(Marker::FinalAnswer) {
        if answer.is_empty() {
            return Err("`Final Answer:` is empty".into());
        }
        return Ok(AgentStep {
            thought,
            intent: Intent::FinalAnswer(answer),
        });
    }

    let Some(action) = section(Marker::Action) else {
        return Err("no `Action:` or `Final Answer:` marker found".into());
    };

    if action.starts_with('{') {
        let value: Value = serde_json::from_str(&action)
            .map_err(|err| format!("inline action is not valid JSON: {err}"))?;
        let invocation = invocation_from_keyed(&value)?;
        return Ok(AgentStep {
            thought,
            intent: Intent::Action(invocation),
        });
    }

    let tool = clean_tool_name(action.lines().next().unwrap_or_default());
    if tool.is_empty() {
        return Err("`Action:` does not name a tool".into());
    }
    let input = section(Marker::ActionInput)
        .map(|raw| strip_code_fence(&raw).to_string())
        .unwrap_or_default();

    Ok(AgentStep {
        thought,
        intent: Intent::Action(ToolInvocation { tool, input }),
    })
}

fn clean_tool_name(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| c == '`' || c == '"' || c == '\'' || c == '*')
        .trim()
        .to_string()
}

fn parse_json_directive(value: &Value) -> Result<AgentStep, String> {
    let Some(obj) = value.as_object() else {
        return Err("JSON reply is not an object".into());
    };
    let thought = obj
        .get("thought")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    if let Some(answer) = obj.get("final_answer").filter(|v| !v.is_null()) {
        return Ok(AgentStep {
            thought,
            intent: Intent::FinalAnswer(value_to_text(answer)),
        });
    }

    match obj.get("action") {
        Some(Value::String(kind)) if kind == "respond" => {
            let content = obj
                .get("content")
                .map(value_to_text)
                .ok_or("`respond` directive is missing `content`")?;
            Ok(AgentStep {
                thought,
                intent: Intent::FinalAnswer(content),
            })
        }
        Some(Value::String(kind)) if kind == "call_tool" => {
            let tool = obj
                .get("name")
                .and_then(Value::as_str)
                .map(clean_tool_name)
                .filter(|n| !n.is_empty())
                .ok_or("`call_tool` directive is missing `name`")?;
            let input = obj.get("arguments").map(value_to_text).unwrap_or_default();
            Ok(AgentStep {
                thought,
                intent: Intent::Action(ToolInvocation { tool, input }),
            })
        }
        Some(nested @ Value::Object(_)) => Ok(AgentStep {
            thought,
            intent: Intent::Action(invocation_from_keyed(nested)?),
        }),
        Some(other) => Err(format!("unsupported `action` value: {other}")),
        None => Err("JSON reply has neither `action` nor `final_answer`".into()),
    }
}

fn invocation_from_keyed(value: &Value) -> Result<ToolInvocation, String> {
    let tool = value
        .get("tool_name")
        .or_else(|| value.get("name"))
        .and_then(Value::as_str)
        .map(clean_tool_name)
        .filter(|n| !n.is_empty())
        .ok_or("action object is missing `tool_name`")?;
    let input = value
        .get("tool_input")
        .or_else(|| value.get("arguments"))
        .map(value_to_text)
        .unwrap_or_default();
    Ok(ToolInvocation { tool, input })
}

/// Strings pass through verbatim; anything else becomes compact JSON text.
fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
