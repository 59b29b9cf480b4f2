//! Action executor: dispatches validated proposals to the tool registry.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::reasoning::ProposedAction;
use crate::registry::{ToolError, ToolRegistry};

/// What came back from dispatching one validated action.
///
/// Failures are data, not errors: they flow to the Memory phase and into the
/// trace like any other outcome. Only the orchestrator's termination policy
/// decides whether a failure is fatal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionOutcome {
    Completed {
        tool_name: String,
        parameters: Value,
        result: Value,
    },
    Failed {
        tool_name: String,
        error_detail: String,
    },
}

impl ActionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ActionOutcome::Completed { .. })
    }

    pub fn tool_name(&self) -> &str {
        match self {
            ActionOutcome::Completed { tool_name, .. } => tool_name,
            ActionOutcome::Failed { tool_name, .. } => tool_name,
        }
    }
}

pub struct ActionExecutor {
    registry: Arc<ToolRegistry>,
}

impl ActionExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Execute a validated action. Never panics and never propagates tool
    /// errors: unknown tools and invocation failures are both captured as
    /// [`ActionOutcome::Failed`].
    pub fn execute(&self, action: &ProposedAction) -> ActionOutcome {
        match self.registry.invoke(&action.tool_name, &action.parameters) {
            Ok(result) => {
                tracing::info!(tool = %action.tool_name, "action executed");
                ActionOutcome::Completed {
                    tool_name: action.tool_name.clone(),
                    parameters: action.parameters.clone(),
                    result,
                }
            }
            Err(err) => {
                tracing::warn!(tool = %action.tool_name, error = %err, "action failed");
                let error_detail = match &err {
                    ToolError::Unknown { .. } => err.to_string(),
                    ToolError::Invocation { failure, .. } => failure.detail.clone(),
                };
                ActionOutcome::Failed {
                    tool_name: action.tool_name.clone(),
                    error_detail,
                }
            }
        }
    }
}
