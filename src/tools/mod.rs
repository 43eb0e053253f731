//! Travel-planning tools.
//!
//! - Budget: trip cost breakdown
//! - Formatter: itinerary text to a Markdown table
//! - Destinations: beach destination suggestions
//! - Flights: live aircraft near airports (OpenSky)
//! - Places: hotels, activities and restaurants near a city (Overpass)
//!
//! Every tool takes a JSON object as text. Bad input is answered with an
//! `{"error": "..."}` payload rather than an `Err`.

pub mod budget;
pub mod destinations;
pub mod flights;
pub mod formatter;
pub mod places;

use serde_json::{json, Map, Value};

pub use budget::BudgetTool;
pub use destinations::DestinationMatcherTool;
pub use flights::FlightSearchTool;
pub use formatter::StructuredOutputFormatterTool;
pub use places::{PlaceCategory, PlaceSearchTool};

pub(crate) fn error_payload(message: impl Into<String>) -> String {
    json!({ "error": message.into() }).to_string()
}

/// Parses a tool input into a JSON object, or returns the error payload to
/// hand back to the model.
pub(crate) fn parse_object(input: &str) -> std::result::Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(input.trim()) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(error_payload("Invalid JSON input")),
    }
}

pub(crate) fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
