use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use crate::error::Result;
use crate::tool::Tool;

/// Turns a day-by-day itinerary into a `Day | Activity | Restaurant` table.
pub struct StructuredOutputFormatterTool;

const VENUE: &str = r"\b(?:eat at|dinner at|lunch at|breakfast at|at)\s+([A-Z][\w’'& .-]+)";

fn day_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)Day\s*(\d+)").expect("day pattern is valid"))
}

fn day_prefix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)Day\s*\d+[:\-]?\s*").expect("prefix pattern is valid"))
}

fn venue_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!("(?i){VENUE}")).expect("venue pattern is valid"))
}

#[derive(Debug, PartialEq, Eq)]
struct Row {
    day: String,
    activity: String,
    restaurant: Option<String>,
}

fn parse_line(line: &str, index: usize) -> Row {
    let day = day_regex()
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| (index + 1).to_string());

    let restaurant = venue_regex()
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().trim_end_matches(['.', ',']).trim().to_string())
        .filter(|name| !name.is_empty());

    let mut activity = day_prefix_regex().replace_all(line, "").into_owned();
    if restaurant.is_some() {
        activity = venue_regex().replace_all(&activity, "").into_owned();
    }
    let activity = activity
        .trim_matches(|c: char| c == ',' || c == '.' || c.is_whitespace())
        .to_string();

    Row {
        day,
        activity,
        restaurant,
    }
}

/// Renders the Markdown table for `itinerary`.
pub fn format_itinerary(itinerary: &str) -> String {
    let rows: Vec<Row> = itinerary
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(index, line)| parse_line(line, index))
        .collect();

    let mut table = String::from("Day | Activity | Restaurant\n");
    table.push_str("----|-----------|-----------\n");
    for row in rows {
        table.push_str(&format!(
            "{} | {} | {}\n",
            row.day,
            row.activity,
            row.restaurant.as_deref().unwrap_or("—")
        ));
    }
    table
}

#[async_trait]
impl Tool for StructuredOutputFormatterTool {
    fn name(&self) -> &str {
        "structured_output_formatter"
    }

    fn description(&self) -> &str {
        "Formats an unstructured itinerary into a clean Markdown table. Input should contain \
day-by-day text describing activities and restaurants, either raw or as {\"itinerary\": string}. \
Example: 'Day 1: Fly to Miami, dinner at Joe's Stone Crab.'"
    }

    async fn call(&self, input: &str) -> Result<String> {
        let text = match serde_json::from_str::<Value>(input.trim()) {
            Ok(Value::Object(map)) => match map.get("itinerary").and_then(Value::as_str) {
                Some(itinerary) => itinerary.to_string(),
                None => return Ok(super::error_payload("Missing required field: itinerary")),
            },
            Ok(Value::String(itinerary)) => itinerary,
            _ => input.to_string(),
        };
        Ok(format_itinerary(&text))
    }
}
