use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::config::TravelConfig;
use crate::error::Result;
use crate::tool::Tool;

use super::{error_payload, parse_object, pretty};

const CITIES: [(&str, f64, f64); 7] = [
    ("miami", 25.7617, -80.1918),
    ("denver", 39.7392, -104.9903),
    ("orlando", 28.5383, -81.3792),
    ("los angeles", 34.0522, -118.2437),
    ("new york", 40.7128, -74.0060),
    ("chicago", 41.8781, -87.6298),
    ("dallas", 32.7767, -96.7970),
];

const MAX_PLACES: usize = 20;

pub fn city_coordinates(city: &str) -> Option<(f64, f64)> {
    let city = city.trim().to_lowercase();
    CITIES
        .iter()
        .find(|(name, _, _)| *name == city)
        .map(|(_, lat, lon)| (*lat, *lon))
}

/// The kind of place a [`PlaceSearchTool`] looks up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceCategory {
    Hotel,
    Activity,
    Restaurant,
}

impl PlaceCategory {
    pub fn tool_name(self) -> &'static str {
        match self {
            PlaceCategory::Hotel => "hotel_search",
            PlaceCategory::Activity => "activity_search",
            PlaceCategory::Restaurant => "restaurant_search",
        }
    }

    fn description(self) -> &'static str {
        match self {
            PlaceCategory::Hotel => {
                "Finds hotels, motels, guest houses, hostels, and lodging near a city using the \
OpenStreetMap Overpass API. Input: {\"city\": string, \"radius_km\": number (optional, default 4)}."
            }
            PlaceCategory::Activity => {
                "Finds attractions, museums, parks, beaches, and activities near a city using the \
OpenStreetMap Overpass API. Input: {\"city\": string, \"radius_km\": number (optional, default 5)}."
            }
            PlaceCategory::Restaurant => {
                "Finds restaurants, cafes, and bars near a city using the OpenStreetMap Overpass \
API. Input: {\"city\": string, \"radius_km\": number (optional, default 3)}."
            }
        }
    }

    pub fn default_radius_km(self) -> f64 {
        match self {
            PlaceCategory::Hotel => 4.0,
            PlaceCategory::Activity => 5.0,
            PlaceCategory::Restaurant => 3.0,
        }
    }

    /// Key of the result list in the tool output.
    fn plural(self) -> &'static str {
        match self {
            PlaceCategory::Hotel => "hotels",
            PlaceCategory::Activity => "activities",
            PlaceCategory::Restaurant => "restaurants",
        }
    }

    fn filters(self) -> &'static [(&'static str, &'static str)] {
        match self {
            PlaceCategory::Hotel => &[
                ("tourism", "hotel"),
                ("tourism", "motel"),
                ("tourism", "hostel"),
                ("tourism", "guest_house"),
                ("amenity", "hotel"),
                ("amenity", "lodging"),
            ],
            PlaceCategory::Activity => &[
                ("tourism", "attraction"),
                ("tourism", "museum"),
                ("tourism", "gallery"),
                ("tourism", "zoo"),
                ("tourism", "aquarium"),
                ("tourism", "theme_park"),
                ("leisure", "park"),
                ("leisure", "beach_resort"),
                ("natural", "beach"),
            ],
            PlaceCategory::Restaurant => &[
                ("amenity", "restaurant"),
                ("amenity", "cafe"),
                ("amenity", "fast_food"),
                ("amenity", "bar"),
            ],
        }
    }

    /// Tag keys consulted, in order, for a result's `type`.
    fn type_keys(self) -> &'static [&'static str] {
        match self {
            PlaceCategory::Hotel => &["tourism", "amenity"],
            PlaceCategory::Activity => &["tourism", "leisure", "natural"],
            PlaceCategory::Restaurant => &["amenity", "cuisine"],
        }
    }

    fn fallback_type(self) -> Value {
        match self {
            PlaceCategory::Hotel => Value::from("lodging"),
            PlaceCategory::Activity => Value::Null,
            PlaceCategory::Restaurant => Value::from("restaurant"),
        }
    }

    /// Overpass QL selecting every node of this category around a point.
    pub fn overpass_query(self, lat: f64, lon: f64, radius_km: f64) -> String {
        let radius_m = radius_km * 1000.0;
        let mut query = String::from("[out:json];\n(\n");
        for (key, value) in self.filters() {
            query.push_str(&format!(
                "  node[\"{key}\"=\"{value}\"](around:{radius_m},{lat},{lon});\n"
            ));
        }
        query.push_str(");\nout;\n");
        query
    }

    fn place(self, element: &Value) -> Value {
        let empty = Map::new();
        let tags = element
            .get("tags")
            .and_then(Value::as_object)
            .unwrap_or(&empty);
        let kind = self
            .type_keys()
            .iter()
            .find_map(|key| tags.get(*key).filter(|v| !v.is_null()).cloned())
            .unwrap_or_else(|| self.fallback_type());
        json!({
            "name": tags.get("name").cloned().unwrap_or_else(|| Value::from("Unnamed")),
            "type": kind,
            "lat": element.get("lat").cloned().unwrap_or(Value::Null),
            "lon": element.get("lon").cloned().unwrap_or(Value::Null),
        })
    }
}

/// Searches OpenStreetMap for one [`PlaceCategory`] near a supported city.
pub struct PlaceSearchTool {
    category: PlaceCategory,
    client: reqwest::Client,
    overpass_url: String,
}

impl PlaceSearchTool {
    pub fn new(category: PlaceCategory, config: &TravelConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        Ok(Self {
            category,
            client,
            overpass_url: config.overpass_url.clone(),
        })
    }

    pub fn category(&self) -> PlaceCategory {
        self.category
    }

    async fn query_overpass(&self, query: String) -> std::result::Result<Value, reqwest::Error> {
        self.client
            .post(&self.overpass_url)
            .form(&[("data", query)])
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await
    }
}

#[async_trait]
impl Tool for PlaceSearchTool {
    fn name(&self) -> &str {
        self.category.tool_name()
    }

    fn description(&self) -> &str {
        self.category.description()
    }

    async fn call(&self, input: &str) -> Result<String> {
        let data = match parse_object(input) {
            Ok(data) => data,
            Err(payload) => return Ok(payload),
        };
        let city = match data.get("city").and_then(Value::as_str) {
            Some(city) if !city.trim().is_empty() => city,
            _ => return Ok(error_payload("Missing required field: city")),
        };
        let radius_km = data
            .get("radius_km")
            .and_then(Value::as_f64)
            .unwrap_or_else(|| self.category.default_radius_km());

        let Some((lat, lon)) = city_coordinates(city) else {
            return Ok(error_payload(format!("City '{city}' not supported.")));
        };

        let query = self.category.overpass_query(lat, lon, radius_km);
        let body = match self.query_overpass(query).await {
            Ok(body) => body,
            Err(err) => return Ok(error_payload(format!("Overpass API error: {err}"))),
        };

        let places: Vec<Value> = body
            .get("elements")
            .and_then(Value::as_array)
            .map(|elements| elements.iter().map(|el| self.category.place(el)).collect())
            .unwrap_or_default();

        let mut out = Map::new();
        out.insert("city".into(), Value::from(city.trim().to_lowercase()));
        out.insert("radius_km".into(), json!(radius_km));
        out.insert("count".into(), Value::from(places.len()));
        out.insert(
            self.category.plural().into(),
            Value::Array(places.into_iter().take(MAX_PLACES).collect()),
        );
        Ok(pretty(&Value::Object(out)))
    }
}
