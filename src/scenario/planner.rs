//! Scripted reasoning provider for the travel scenario.
//!
//! Deterministic: proposals depend only on the task parameters and the run
//! state it is shown, so identical runs replay identically. The planner
//! gathers weather for each city in task order, then applies the four-way
//! branch rule over what it observed.

use anyhow::Result;
use serde_json::{Value, json};
use std::cmp::Ordering;

use crate::evidence::evidence_id;
use crate::policy::{PolicyRule, RuleOutcome};
use crate::reasoning::{ProposedAction, ReasoningProvider};
use crate::state::StateSnapshot;
use crate::task::{RetrievalPlan, Task};

use super::{DEFAULT_BASE_TEMPERATURE, DEFAULT_CITIES, terminal_tools, tools::umbrella_advice};

const EMAIL_RECIPIENT: &str = "test-scl@test.com";

#[derive(Debug, Clone)]
struct Observation {
    city: String,
    temperature_f: f64,
    condition: String,
    precipitation_chance: u64,
}

/// Reasoning provider implementing the travel task's decision logic.
#[derive(Debug)]
pub struct TravelPlanner {
    cities: Vec<String>,
    base_temperature: f64,
    collected: Vec<Observation>,
    cancelled: bool,
}

impl TravelPlanner {
    pub fn new() -> Self {
        Self {
            cities: Vec::new(),
            base_temperature: DEFAULT_BASE_TEMPERATURE,
            collected: Vec::new(),
            cancelled: false,
        }
    }

    /// Fold the previous action's result into what the planner knows.
    fn ingest(&mut self, context: &StateSnapshot) {
        let Some(last) = context.stored_values.get("last_action_result") else {
            return;
        };
        if last.get("status").and_then(Value::as_str) != Some("completed") {
            return;
        }
        match last.get("tool_name").and_then(Value::as_str) {
            Some("get_weather") => {
                let result = &last["result"];
                let (Some(city), Some(temperature_f)) = (
                    result.get("city").and_then(Value::as_str),
                    result.get("temperature_f").and_then(Value::as_f64),
                ) else {
                    return;
                };
                if self.collected.iter().any(|o| o.city == city) {
                    return;
                }
                self.collected.push(Observation {
                    city: city.to_string(),
                    temperature_f,
                    condition: result
                        .get("condition")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown")
                        .to_string(),
                    precipitation_chance: result
                        .get("precipitation_chance")
                        .and_then(Value::as_u64)
                        .unwrap_or(0),
                });
            }
            Some("cancel_trip") => self.cancelled = true,
            _ => {}
        }
    }

    /// Evidence ids of every weather observation gathered so far.
    fn observed_refs(&self) -> Vec<String> {
        self.collected
            .iter()
            .map(|o| evidence_id("get_weather", &json!({"city": o.city})))
            .collect()
    }

    fn next_unobserved(&self) -> Option<&str> {
        self.cities
            .iter()
            .find(|c| !self.collected.iter().any(|o| &o.city == *c))
            .map(String::as_str)
    }

    fn decide(&self) -> ProposedAction {
        let above: Vec<&Observation> = self
            .collected
            .iter()
            .filter(|o| o.temperature_f > self.base_temperature)
            .collect();
        let coolest = above.iter().copied().min_by(|a, b| {
            a.temperature_f
                .partial_cmp(&b.temperature_f)
                .unwrap_or(Ordering::Equal)
        });
        let refs = self.observed_refs();

        match (above.len(), coolest) {
            (0, _) | (_, None) => {
                if self.cancelled {
                    ProposedAction {
                        tool_name: "recommend_snacks".into(),
                        parameters: json!({"preferences": "general"}),
                        rationale: "Trip is cancelled; recommend convenience store snacks to enjoy at home.".into(),
                        evidence_refs: refs,
                        is_final: true,
                        branch: None,
                    }
                } else {
                    ProposedAction {
                        tool_name: "cancel_trip".into(),
                        parameters: json!({
                            "reason": "all destinations below the comfortable temperature threshold",
                        }),
                        rationale: format!(
                            "Every region is at or below {}F; cancel the trip.",
                            self.base_temperature
                        ),
                        evidence_refs: refs,
                        is_final: false,
                        branch: Some("all_below_threshold".into()),
                    }
                }
            }
            (n, Some(coolest)) if n == self.cities.len() => ProposedAction {
                tool_name: "generate_image".into(),
                parameters: json!({
                    "description": format!(
                        "{} weather: {}, {}F",
                        coolest.city, coolest.condition, coolest.temperature_f
                    ),
                }),
                rationale: format!(
                    "All {} regions are above {}F; travel to the coolest, {} at {}F, and render its weather.",
                    self.cities.len(), self.base_temperature, coolest.city, coolest.temperature_f
                ),
                evidence_refs: refs,
                is_final: true,
                branch: Some("all_above_threshold".into()),
            },
            (1, Some(only)) => email_proposal(only, "one_above_threshold", refs, self.base_temperature),
            (_, Some(cooler)) => {
                email_proposal(cooler, "two_above_threshold", refs, self.base_temperature)
            }
        }
    }
}

impl ReasoningProvider for TravelPlanner {
    fn plan(&mut self, task: &Task) -> Result<RetrievalPlan> {
        self.base_temperature = task
            .parameters
            .get("base_temperature")
            .and_then(Value::as_f64)
            .unwrap_or(DEFAULT_BASE_TEMPERATURE);
        self.cities = task
            .parameters
            .get("cities")
            .and_then(Value::as_array)
            .map(|cities| {
                cities
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_else(|| DEFAULT_CITIES.iter().map(|s| s.to_string()).collect());

        Ok(RetrievalPlan {
            evidence_needed: self.cities.iter().map(|c| format!("weather:{c}")).collect(),
            tools_required: vec![
                "get_weather".into(),
                "send_email".into(),
                "generate_image".into(),
                "cancel_trip".into(),
            ],
            parameters: json!({"base_temperature": self.base_temperature}),
        })
    }

    fn propose(&mut self, _prompt: &str, context: &StateSnapshot) -> Result<ProposedAction> {
        self.ingest(context);

        if let Some(city) = self.next_unobserved() {
            let city = city.to_string();
            return Ok(ProposedAction {
                tool_name: "get_weather".into(),
                parameters: json!({"city": city}),
                rationale: format!(
                    "No stored weather for {city}; query it before any decision."
                ),
                evidence_refs: self.observed_refs(),
                is_final: false,
                branch: None,
            });
        }

        Ok(self.decide())
    }
}

fn email_proposal(
    destination: &Observation,
    branch: &str,
    refs: Vec<String>,
    base_temperature: f64,
) -> ProposedAction {
    ProposedAction {
        tool_name: "send_email".into(),
        parameters: json!({
            "recipient": EMAIL_RECIPIENT,
            "subject": format!("Travel plan confirmed: {}", destination.city),
            "body": format!(
                "Traveling to {}. Temperature: {}F, condition: {}. {}.",
                destination.city,
                destination.temperature_f,
                destination.condition,
                umbrella_advice(destination.precipitation_chance),
            ),
        }),
        rationale: format!(
            "{} is the cooler destination above {}F; notify by email.",
            destination.city, base_temperature
        ),
        evidence_refs: refs,
        is_final: true,
        branch: Some(branch.to_string()),
    }
}

/// Task-specific rule: a decision's declared branch must match the branch the
/// stored weather evidence implies.
pub fn validate_conditional_branches(cities: Vec<String>, base_temperature: f64) -> PolicyRule {
    let terminal = terminal_tools();
    PolicyRule::new("validate_conditional_branches", move |action, ctx| {
        if !terminal.contains(&action.tool_name) {
            return RuleOutcome::Pass;
        }

        let mut temps = Vec::with_capacity(cities.len());
        for city in &cities {
            let id = evidence_id("get_weather", &json!({"city": city}));
            match ctx
                .evidence
                .get(&id)
                .and_then(|r| r.content.get("temperature_f"))
                .and_then(Value::as_f64)
            {
                Some(t) => temps.push(t),
                None => {
                    return RuleOutcome::fail(format!(
                        "decision proposed before weather for {city} was observed"
                    ));
                }
            }
        }

        let above = temps.iter().filter(|t| **t > base_temperature).count();
        let expected = match above {
            n if n == cities.len() => "all_above_threshold",
            0 => "all_below_threshold",
            1 => "one_above_threshold",
            _ => "two_above_threshold",
        };

        match action.branch.as_deref() {
            Some(branch) if branch == expected => RuleOutcome::Pass,
            Some(branch) => RuleOutcome::fail(format!(
                "branch '{branch}' does not match evidence-implied '{expected}'"
            )),
            None => RuleOutcome::fail(format!(
                "decision carries no branch label (expected '{expected}')"
            )),
        }
    })
}
