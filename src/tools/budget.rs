use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::error::Result;
use crate::tool::Tool;

use super::{parse_object, pretty};

/// Computes a trip cost breakdown from per-unit prices.
pub struct BudgetTool;

fn number(data: &Map<String, Value>, key: &str, default: f64) -> f64 {
    data.get(key).and_then(Value::as_f64).unwrap_or(default)
}

#[async_trait]
impl Tool for BudgetTool {
    fn name(&self) -> &str {
        "trip_budget"
    }

    fn description(&self) -> &str {
        "Calculates trip cost. Inputs: travelers, days, flight_cost, hotel_per_night, \
food_per_day, activities_total, misc, tax_multiplier. Returns detailed breakdown."
    }

    async fn call(&self, input: &str) -> Result<String> {
        let data = match parse_object(input) {
            Ok(data) => data,
            Err(payload) => return Ok(payload),
        };

        let travelers = number(&data, "travelers", 1.0);
        let days = number(&data, "days", 1.0);
        let flight_cost = number(&data, "flight_cost", 0.0);
        let hotel_per_night = number(&data, "hotel_per_night", 0.0);
        let food_per_day = number(&data, "food_per_day", 0.0);
        let activities_total = number(&data, "activities_total", 0.0);
        let misc = number(&data, "misc", 0.0);
        let tax_multiplier = number(&data, "tax_multiplier", 1.0);

        let flight_total = flight_cost * travelers;
        let hotel_total = hotel_per_night * days;
        let food_total = food_per_day * days * travelers;
        let subtotal = flight_total + hotel_total + food_total + activities_total + misc;
        let total = subtotal * tax_multiplier;
        let per_person = if travelers > 0.0 { total / travelers } else { total };

        Ok(pretty(&json!({
            "inputs": Value::Object(data),
            "breakdown": {
                "flight_total": flight_total,
                "hotel_total": hotel_total,
                "food_total": food_total,
                "activities_total": activities_total,
                "misc_total": misc,
                "subtotal": subtotal,
                "tax_multiplier": tax_multiplier,
                "total_after_tax": total,
            },
            "per_person_cost": per_person,
            "total_group_cost": total,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(input: &str) -> Value {
        let raw = BudgetTool.call(input).await.unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    #[tokio::test]
    async fn computes_breakdown() {
        let out = run(
            r#"{"travelers": 2, "days": 3, "flight_cost": 300, "hotel_per_night": 200,
                "food_per_day": 50, "activities_total": 120, "misc": 30, "tax_multiplier": 1.1}"#,
        )
        .await;

        assert_eq!(out["breakdown"]["flight_total"], 600.0);
        assert_eq!(out["breakdown"]["hotel_total"], 600.0);
        assert_eq!(out["breakdown"]["food_total"], 300.0);
        assert_eq!(out["breakdown"]["subtotal"], 1650.0);
        let total = out["total_group_cost"].as_f64().unwrap();
        assert!((total - 1815.0).abs() < 1e-9);
        let per_person = out["per_person_cost"].as_f64().unwrap();
        assert!((per_person - 907.5).abs() < 1e-9);
        assert_eq!(out["inputs"]["travelers"], 2);
    }

    #[tokio::test]
    async fn zero_travelers_reports_group_total() {
        let out = run(r#"{"travelers": 0, "misc": 10}"#).await;
        assert_eq!(out["per_person_cost"], 10.0);
    }

    #[tokio::test]
    async fn rejects_non_json_input() {
        let raw = BudgetTool.call("two people, three days").await.unwrap();
        assert_eq!(raw, r#"{"error":"Invalid JSON input"}"#);
    }
}
