//! Weather-based travel planning scenario.
//!
//! The end-to-end demonstration the engine ships with: gather weather for
//! three cities, then branch on how many sit above a reference temperature —
//! all above travels to the coolest and renders an image, two above emails
//! the cooler of the pair, one above emails that city, none above cancels the
//! trip and recommends snacks instead. The scenario supplies deterministic
//! tools, a scripted reasoning provider, and the task-specific
//! `validate_conditional_branches` rule.

mod planner;
mod tools;

pub use planner::{TravelPlanner, validate_conditional_branches};
pub use tools::{CityConditions, WeatherFixture, register_travel_tools};

use std::collections::BTreeSet;

use serde_json::json;

use crate::policy::PolicySet;
use crate::registry::ToolRegistry;
use crate::task::Task;

pub const DEFAULT_BASE_TEMPERATURE: f64 = 55.0;
pub const DEFAULT_CITIES: [&str; 3] = ["San Francisco", "Miami", "Atlanta"];

/// Decision-class tools: executing one of these commits the run to an
/// outcome.
pub const TERMINAL_TOOLS: [&str; 3] = ["send_email", "generate_image", "cancel_trip"];

pub fn terminal_tools() -> BTreeSet<String> {
    TERMINAL_TOOLS.iter().map(|s| s.to_string()).collect()
}

/// The travel-planning task with the default cities and threshold.
pub fn travel_task() -> Task {
    Task::new(
        "When the base temperature is 55F, check the weather in San Francisco, \
         Miami, and Atlanta, then plan a trip: if all three regions are above \
         the reference temperature, travel to the coolest one and draw an image \
         of that place's weather; if only two are above, choose the cooler of \
         them and send an email naming the selected destination; if only one is \
         above, travel there; if all three are below, cancel the trip and \
         recommend convenience store snacks instead. Say whether to bring an \
         umbrella if a trip is decided.",
        json!({
            "base_temperature": DEFAULT_BASE_TEMPERATURE,
            "cities": DEFAULT_CITIES,
        }),
    )
}

/// The full governance set for the scenario: the built-in rules plus the
/// task-specific branch check.
pub fn travel_policies() -> PolicySet {
    PolicySet::standard(&terminal_tools()).with_rule(validate_conditional_branches(
        DEFAULT_CITIES.iter().map(|s| s.to_string()).collect(),
        DEFAULT_BASE_TEMPERATURE,
    ))
}

/// Registry carrying the six scenario tools against the given fixture.
pub fn build_registry(fixture: WeatherFixture) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    register_travel_tools(&mut registry, fixture);
    registry
}
