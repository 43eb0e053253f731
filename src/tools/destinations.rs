use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::Result;
use crate::tool::Tool;

use super::parse_object;

const BEACHES: [(&str, f64); 3] = [
    ("Miami, Florida", 0.92),
    ("San Diego, California", 0.87),
    ("Myrtle Beach, South Carolina", 0.81),
];

/// Suggests beach destinations for a set of preferred activities.
pub struct DestinationMatcherTool;

#[async_trait]
impl Tool for DestinationMatcherTool {
    fn name(&self) -> &str {
        "destination_matcher"
    }

    fn description(&self) -> &str {
        "Given a list of preferred activities and a starting state, picks 3 beach destinations \
that match the user's preferences. Input must be a JSON object with 'activities' and 'starting_state'."
    }

    async fn call(&self, input: &str) -> Result<String> {
        let data = match parse_object(input) {
            Ok(data) => data,
            Err(payload) => return Ok(payload),
        };
        let activities = data.get("activities").cloned().unwrap_or_else(|| json!([]));
        let starting_state = data
            .get("starting_state")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let recommended: Vec<Value> = BEACHES
            .iter()
            .map(|(destination, score)| json!({"destination": destination, "match": score}))
            .collect();

        Ok(json!({
            "recommended_destinations": recommended,
            "starting_state": starting_state,
            "activities_considered": activities,
        })
        .to_string())
    }
}
