//! Reasoning provider capability and the proposal it produces.
//!
//! The engine never computes reasoning itself: each cognition step hands a
//! prompt (governance instructions + state summary + available tools) and a
//! [`StateSnapshot`](crate::state::StateSnapshot) to an external provider and
//! gets back one [`ProposedAction`]. Providers must be deterministic given
//! identical inputs, or seedable, so runs are replayable.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::registry::ToolDescriptor;
use crate::state::StateSnapshot;
use crate::task::{RetrievalPlan, Task};

/// An action proposed by the reasoning provider for one loop iteration.
///
/// Transient: consumed by Control and Action within the same iteration and
/// persisted only as part of a trace record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProposedAction {
    pub tool_name: String,
    #[serde(default)]
    pub parameters: Value,
    pub rationale: String,
    /// Ids of evidence records supporting this proposal.
    #[serde(default)]
    pub evidence_refs: Vec<String>,
    /// The provider's claim that this action completes the task.
    #[serde(default)]
    pub is_final: bool,
    /// The conditional branch this decision takes, when the task's logic
    /// branches on gathered evidence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

/// External reasoning capability.
pub trait ReasoningProvider: Send {
    /// Produce the evidence-gathering plan for the Retrieval phase.
    fn plan(&mut self, task: &Task) -> Result<RetrievalPlan>;

    /// Propose the next action given the assembled prompt and state snapshot.
    fn propose(&mut self, prompt: &str, context: &StateSnapshot) -> Result<ProposedAction>;
}

/// Assemble the cognition prompt: governance instructions, current state,
/// available tools, and the task itself.
pub fn build_prompt(
    instructions: &str,
    snapshot: &StateSnapshot,
    tools: &[ToolDescriptor],
    task: &Task,
) -> String {
    let state_block = serde_json::to_string_pretty(snapshot)
        .unwrap_or_else(|e| format!("{{\"state_unavailable\": \"{e}\"}}"));
    let tools_block = serde_json::to_string_pretty(tools)
        .unwrap_or_else(|e| format!("{{\"tools_unavailable\": \"{e}\"}}"));

    format!(
        "{instructions}\n\n\
         CURRENT STATE:\n{state_block}\n\n\
         AVAILABLE TOOLS:\n{tools_block}\n\n\
         TASK:\n{goal}\n\n\
         Determine the next action, cite the evidence ids that support it, \
         and mark the action final only when it completes the task.",
        goal = task.goal,
    )
}
