use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::TravelConfig;
use crate::error::Result;
use crate::tool::Tool;

use super::{error_payload, parse_object, pretty};

const AIRPORTS: [(&str, f64, f64); 6] = [
    ("DEN", 39.8561, -104.6737),
    ("MIA", 25.7959, -80.2871),
    ("DFW", 32.8998, -97.0403),
    ("LAX", 33.9416, -118.4085),
    ("JFK", 40.6413, -73.7781),
    ("ATL", 33.6407, -84.4277),
];

const BOX_DEGREES: f64 = 1.5;
const MAX_FLIGHTS: usize = 10;

/// Latitude/longitude bounds handed to OpenSky as query parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub lamin: f64,
    pub lamax: f64,
    pub lomin: f64,
    pub lomax: f64,
}

impl BoundingBox {
    fn query(&self) -> [(&'static str, f64); 4] {
        [
            ("lamin", self.lamin),
            ("lamax", self.lamax),
            ("lomin", self.lomin),
            ("lomax", self.lomax),
        ]
    }
}

/// Box around a supported airport, `None` for unknown codes.
pub fn airport_box(iata: &str) -> Option<BoundingBox> {
    AIRPORTS
        .iter()
        .find(|(code, _, _)| *code == iata)
        .map(|(_, lat, lon)| BoundingBox {
            lamin: lat - BOX_DEGREES,
            lamax: lat + BOX_DEGREES,
            lomin: lon - BOX_DEGREES,
            lomax: lon + BOX_DEGREES,
        })
}

/// Live aircraft near two airports, from the OpenSky state vectors API.
pub struct FlightSearchTool {
    client: reqwest::Client,
    url: String,
}

impl FlightSearchTool {
    pub fn new(config: &TravelConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.opensky_url.clone(),
        })
    }

    async fn fetch_states(&self, bounds: BoundingBox) -> Vec<Value> {
        let response = match self.client.get(&self.url).query(&bounds.query()).send().await {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(error = %err, "opensky request failed");
                return Vec::new();
            }
        };
        match response.json::<Value>().await {
            Ok(body) => body
                .get("states")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            Err(err) => {
                tracing::debug!(error = %err, "opensky returned an unreadable body");
                Vec::new()
            }
        }
    }
}

fn format_state(state: &Value) -> Value {
    let field = |idx: usize| state.get(idx).cloned().unwrap_or(Value::Null);
    let callsign = state
        .get(1)
        .and_then(Value::as_str)
        .map(|s| Value::String(s.trim().to_string()))
        .unwrap_or(Value::Null);
    json!({
        "icao24": field(0),
        "callsign": callsign,
        "country": field(2),
        "altitude": field(13),
        "velocity_mps": field(9),
        "heading_deg": field(10),
    })
}

fn format_states(states: &[Value]) -> Vec<Value> {
    states.iter().take(MAX_FLIGHTS).map(format_state).collect()
}

#[async_trait]
impl Tool for FlightSearchTool {
    fn name(&self) -> &str {
        "flight_search"
    }

    fn description(&self) -> &str {
        "Returns real currently-airborne flights near origin and destination airports using \
the OpenSky API. Input: {\"origin\": IATA code, \"destination\": IATA code}. \
Supported: DEN, MIA, DFW, LAX, JFK, ATL."
    }

    async fn call(&self, input: &str) -> Result<String> {
        let data = match parse_object(input) {
            Ok(data) => data,
            Err(payload) => return Ok(payload),
        };
        let origin = data.get("origin").and_then(Value::as_str).unwrap_or_default();
        let destination = data
            .get("destination")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if origin.is_empty() || destination.is_empty() {
            return Ok(error_payload("origin and destination required"));
        }

        let (Some(origin_box), Some(destination_box)) =
            (airport_box(origin), airport_box(destination))
        else {
            return Ok(error_payload("Unsupported IATA code"));
        };

        let (near_origin, near_destination) = tokio::join!(
            self.fetch_states(origin_box),
            self.fetch_states(destination_box)
        );

        Ok(pretty(&json!({
            "origin_airport": origin,
            "destination_airport": destination,
            "flights_near_origin": format_states(&near_origin),
            "flights_near_destination": format_states(&near_destination),
            "note": "These are real aircraft currently near each airport (OpenSky live data).",
        })))
    }
}
