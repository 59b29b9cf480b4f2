//! Deterministic tool implementations for the travel scenario.
//!
//! Every tool is a pure function over its parameters and the weather fixture,
//! so identical runs produce identical traces.

use serde_json::{Value, json};
use std::collections::BTreeMap;

use crate::registry::{ToolFailure, ToolRegistry};

/// Fixed conditions for one city.
#[derive(Debug, Clone, PartialEq)]
pub struct CityConditions {
    pub temperature_f: f64,
    pub condition: &'static str,
    pub precipitation_chance: u64,
}

/// The weather the `get_weather` tool reports, keyed by city.
#[derive(Debug, Clone, Default)]
pub struct WeatherFixture {
    cities: BTreeMap<String, CityConditions>,
}

impl WeatherFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_city(
        mut self,
        city: &str,
        temperature_f: f64,
        condition: &'static str,
        precipitation_chance: u64,
    ) -> Self {
        self.cities.insert(
            city.to_string(),
            CityConditions {
                temperature_f,
                condition,
                precipitation_chance,
            },
        );
        self
    }

    /// San Francisco and Miami above 55F, Atlanta below.
    pub fn two_above() -> Self {
        Self::new()
            .with_city("San Francisco", 60.0, "Partly Cloudy", 20)
            .with_city("Miami", 58.0, "Sunny", 40)
            .with_city("Atlanta", 50.0, "Clear", 10)
    }

    /// All three cities above 55F; San Francisco is the coolest.
    pub fn all_above() -> Self {
        Self::new()
            .with_city("San Francisco", 62.0, "Partly Cloudy", 15)
            .with_city("Miami", 78.0, "Sunny", 35)
            .with_city("Atlanta", 70.0, "Clear", 10)
    }

    /// Only Miami above 55F.
    pub fn one_above() -> Self {
        Self::new()
            .with_city("San Francisco", 50.0, "Foggy", 45)
            .with_city("Miami", 58.0, "Sunny", 20)
            .with_city("Atlanta", 45.0, "Overcast", 30)
    }

    /// All three cities below 55F.
    pub fn all_below() -> Self {
        Self::new()
            .with_city("San Francisco", 48.0, "Foggy", 50)
            .with_city("Miami", 52.0, "Windy", 30)
            .with_city("Atlanta", 45.0, "Overcast", 25)
    }

    pub fn get(&self, city: &str) -> Option<&CityConditions> {
        self.cities.get(city)
    }
}

/// Register the six scenario tools against `fixture`.
pub fn register_travel_tools(registry: &mut ToolRegistry, fixture: WeatherFixture) {
    registry.register(
        "get_weather",
        move |params: &Value| {
            let city = required_str(params, "city")?;
            let conditions = fixture
                .get(city)
                .ok_or_else(|| ToolFailure::new(format!("no weather data for '{city}'")))?;
            Ok(json!({
                "city": city,
                "temperature_f": conditions.temperature_f,
                "condition": conditions.condition,
                "precipitation_chance": conditions.precipitation_chance,
                "api_ref": format!("wx-{}-001", city.replace(' ', "").to_lowercase()),
            }))
        },
        "Get current weather for a city (temperature, condition, precipitation)",
    );

    registry.register(
        "send_email",
        |params: &Value| {
            let recipient = required_str(params, "recipient")?;
            let subject = required_str(params, "subject")?;
            let body = required_str(params, "body")?;
            Ok(json!({
                "status": "sent",
                "recipient": recipient,
                "subject": subject,
                "message_id": format!("msg-{:04}", checksum(body)),
            }))
        },
        "Send email notification with subject and body",
    );

    registry.register(
        "generate_image",
        |params: &Value| {
            let description = required_str(params, "description")?;
            Ok(json!({
                "status": "generated",
                "description": description,
                "image_url": format!(
                    "https://placeholder.example/weather/{}.jpg",
                    description.replace(' ', "_")
                ),
                "format": "JPEG",
                "size": "1024x768",
            }))
        },
        "Generate weather visualization image from description",
    );

    registry.register(
        "cancel_trip",
        |params: &Value| {
            let reason = required_str(params, "reason")?;
            Ok(json!({
                "status": "cancelled",
                "reason": reason,
                "refund_initiated": true,
            }))
        },
        "Cancel travel plans with specified reason",
    );

    registry.register(
        "recommend_snacks",
        |params: &Value| {
            let preference = params
                .get("preferences")
                .and_then(Value::as_str)
                .unwrap_or("general");
            let snacks = snack_list(preference);
            Ok(json!({
                "status": "recommended",
                "preference": preference,
                "snacks": snacks,
                "total_items": snacks.len(),
            }))
        },
        "Get convenience store snack recommendations",
    );

    registry.register(
        "check_umbrella",
        |params: &Value| {
            let city = required_str(params, "city")?;
            let chance = params
                .get("precipitation_chance")
                .and_then(Value::as_u64)
                .ok_or_else(|| ToolFailure::new("missing parameter 'precipitation_chance'"))?;
            Ok(json!({
                "city": city,
                "precipitation_chance": chance,
                "recommendation": umbrella_advice(chance),
            }))
        },
        "Determine if an umbrella is needed based on precipitation",
    );
}

pub fn umbrella_advice(precipitation_chance: u64) -> &'static str {
    if precipitation_chance > 30 {
        "Bring an umbrella"
    } else {
        "No umbrella needed"
    }
}

fn snack_list(preference: &str) -> Vec<&'static str> {
    match preference {
        "sweet" => vec![
            "Choco Pie",
            "Market O Brownies",
            "Custard Cake",
            "Pepero Almond",
            "Crown Sando",
        ],
        "savory" => vec![
            "Honey Butter Chips",
            "Shin Ramyun Cup",
            "Squid Peanut Snack",
            "Turtle Chips",
            "Seaweed Snack",
        ],
        _ => vec![
            "Honey Butter Chips",
            "Choco Pie",
            "Pepero Sticks",
            "Shin Ramyun Cup",
            "Market O Brownies",
        ],
    }
}

fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, ToolFailure> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolFailure::new(format!("missing parameter '{key}'")))
}

fn checksum(s: &str) -> u32 {
    s.bytes().map(u32::from).sum::<u32>() % 10_000
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        register_travel_tools(&mut registry, WeatherFixture::two_above());
        registry
    }

    #[test]
    fn test_get_weather_is_deterministic() {
        let registry = registry();
        let params = json!({"city": "Miami"});
        let first = registry.invoke("get_weather", &params).unwrap();
        let second = registry.invoke("get_weather", &params).unwrap();
        assert_eq!(first, second);
        assert_eq!(first["temperature_f"], 58.0);
        assert_eq!(first["api_ref"], "wx-miami-001");
    }

    #[test]
    fn test_get_weather_unknown_city_fails() {
        let err = registry()
            .invoke("get_weather", &json!({"city": "Oslo"}))
            .unwrap_err();
        assert!(err.to_string().contains("no weather data"));
    }

    #[test]
    fn test_send_email_requires_all_fields() {
        let registry = registry();
        let err = registry
            .invoke("send_email", &json!({"recipient": "a@b.c"}))
            .unwrap_err();
        assert!(err.to_string().contains("missing parameter 'subject'"));

        let sent = registry
            .invoke(
                "send_email",
                &json!({"recipient": "a@b.c", "subject": "hi", "body": "hello"}),
            )
            .unwrap();
        assert_eq!(sent["status"], "sent");
        assert!(sent["message_id"].as_str().unwrap().starts_with("msg-"));
    }

    #[test]
    fn test_cancel_trip_reports_refund() {
        let cancelled = registry()
            .invoke("cancel_trip", &json!({"reason": "too cold"}))
            .unwrap();
        assert_eq!(cancelled["status"], "cancelled");
        assert_eq!(cancelled["refund_initiated"], true);
    }

    #[test]
    fn test_snack_preferences() {
        let registry = registry();
        let general = registry.invoke("recommend_snacks", &json!({})).unwrap();
        assert_eq!(general["preference"], "general");
        assert_eq!(general["total_items"], 5);

        let sweet = registry
            .invoke("recommend_snacks", &json!({"preferences": "sweet"}))
            .unwrap();
        assert_eq!(sweet["snacks"][0], "Choco Pie");
    }

    #[test]
    fn test_umbrella_threshold() {
        assert_eq!(umbrella_advice(31), "Bring an umbrella");
        assert_eq!(umbrella_advice(30), "No umbrella needed");
    }
}
