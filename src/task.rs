//! Task input and the evidence-gathering plan produced by Retrieval.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Immutable run input: a natural-language goal plus reference parameters
/// (thresholds, entity lists, whatever the task's branching logic needs).
///
/// Created once when the orchestrator starts; never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub goal: String,
    /// Reference parameter set consulted by the reasoning provider and by
    /// task-specific policy rules.
    #[serde(default)]
    pub parameters: Value,
}

impl Task {
    pub fn new(goal: impl Into<String>, parameters: Value) -> Self {
        Self {
            goal: goal.into(),
            parameters,
        }
    }
}

/// Output of the Retrieval phase: what evidence the run needs, which tools it
/// expects to use, and any parameters extracted from the task text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalPlan {
    /// Labels of the evidence the run must gather before deciding.
    pub evidence_needed: Vec<String>,
    /// Tool names the plan expects the run to invoke.
    pub tools_required: Vec<String>,
    /// Parameters the planner extracted from the task (e.g. a temperature
    /// threshold).
    #[serde(default)]
    pub parameters: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_roundtrip() {
        let task = Task::new("check the weather", json!({"base_temperature": 55}));
        let json = serde_json::to_string(&task).unwrap();
        let parsed: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(task, parsed);
    }

    #[test]
    fn test_retrieval_plan_defaults_parameters() {
        let json = r#"{
            "evidence_needed": ["weather:Miami"],
            "tools_required": ["get_weather"]
        }"#;
        let plan: RetrievalPlan = serde_json::from_str(json).unwrap();
        assert_eq!(plan.parameters, Value::Null);
        assert_eq!(plan.evidence_needed, vec!["weather:Miami"]);
    }
}
