//! Per-run execution state.
//!
//! One `ExecutionState` exists per run, owned exclusively by the loop
//! orchestrator and mutated once per phase call. Phases see it either by
//! reference (Control) or through an immutable [`StateSnapshot`] (Cognition);
//! nothing outside the orchestrator holds it across iterations.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The task-specific termination predicate was satisfied.
    TaskComplete,
    /// The cognition-cycle budget ran out.
    MaxLoopsExceeded,
    /// The violation budget was exceeded by rejected proposals.
    PolicyViolationLimit,
    /// A required tool failed (or the reasoning provider did).
    ActionFatalError,
    /// The run was cancelled between iterations.
    Cancelled,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TerminationReason::TaskComplete => "task_complete",
            TerminationReason::MaxLoopsExceeded => "max_loops_exceeded",
            TerminationReason::PolicyViolationLimit => "policy_violation_limit",
            TerminationReason::ActionFatalError => "action_fatal_error",
            TerminationReason::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// A `(tool_name, parameters)` pair that executed successfully, kept for
/// structural-equality redundancy checks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletedCall {
    pub tool_name: String,
    pub parameters: Value,
}

/// Mutable run state, created at Retrieval and frozen into the final report
/// at termination.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionState {
    /// Keyed working values (task text, retrieval plan, last action result).
    pub stored_values: BTreeMap<String, Value>,
    pub evidence_count: usize,
    /// Completed iterations (incremented by the Memory phase).
    pub loop_count: u32,
    pub violation_count: u32,
    pub terminated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination_reason: Option<TerminationReason>,
    /// Calls that executed successfully in this run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub completed_calls: Vec<CompletedCall>,
    /// The terminal action that has succeeded, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_action: Option<String>,
    /// Set once an executed action flagged as final has completed.
    #[serde(default)]
    pub final_action_done: bool,
}

impl ExecutionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if an identical call (by structural equality of parameters) has
    /// already executed successfully in this run.
    pub fn has_completed_call(&self, tool_name: &str, parameters: &Value) -> bool {
        self.completed_calls
            .iter()
            .any(|c| c.tool_name == tool_name && &c.parameters == parameters)
    }

    pub fn terminate(&mut self, reason: TerminationReason) {
        self.terminated = true;
        self.termination_reason = Some(reason);
    }
}

/// Immutable view of the run handed to the reasoning provider each cognition
/// step.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub stored_values: BTreeMap<String, Value>,
    /// Ids of every evidence record gathered so far, in insertion order.
    pub available_evidence: Vec<String>,
    pub loop_count: u32,
    pub violation_count: u32,
    /// Why the previous proposal was rejected, when re-planning after a
    /// Control failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_rejection: Option<String>,
}
