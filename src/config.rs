//! Engine configuration.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::errors::ConfigError;
use crate::state::ExecutionState;

/// Task-specific predicate deciding when a run is complete.
pub type TerminationPredicate = Arc<dyn Fn(&ExecutionState) -> bool + Send + Sync>;

/// Runtime configuration for one run.
///
/// Everything the loop needs that is not a capability: budgets, the terminal
/// action classification, the completion predicate, and where (if anywhere)
/// the audit trail lands on disk.
#[derive(Clone)]
pub struct EngineConfig {
    /// Upper bound on cognition cycles. Must be positive.
    pub max_loops: u32,
    /// Rejected proposals tolerated before the run aborts with
    /// `policy_violation_limit`. Zero aborts on the first violation.
    pub violation_budget: u32,
    /// Decision-class tool names; at most one of these may succeed per run
    /// when `enforce_single_terminal` is set.
    pub terminal_tools: BTreeSet<String>,
    /// Tools classified required-for-completion: a failure of one of these
    /// terminates the run with `action_fatal_error`.
    pub required_tools: BTreeSet<String>,
    /// Reject terminal proposals after one terminal action has succeeded,
    /// independent of whatever rules the policy set carries.
    pub enforce_single_terminal: bool,
    /// When set, the run writes a durable JSONL trail under this directory.
    pub audit_dir: Option<PathBuf>,
    /// Completion predicate evaluated after each Memory phase.
    pub termination: TerminationPredicate,
}

impl EngineConfig {
    pub fn new(max_loops: u32) -> Self {
        Self {
            max_loops,
            violation_budget: 3,
            terminal_tools: BTreeSet::new(),
            required_tools: BTreeSet::new(),
            enforce_single_terminal: true,
            audit_dir: None,
            termination: Arc::new(|state| state.final_action_done),
        }
    }

    pub fn with_violation_budget(mut self, budget: u32) -> Self {
        self.violation_budget = budget;
        self
    }

    pub fn with_terminal_tools(mut self, tools: impl IntoIterator<Item = String>) -> Self {
        self.terminal_tools = tools.into_iter().collect();
        self
    }

    pub fn with_required_tools(mut self, tools: impl IntoIterator<Item = String>) -> Self {
        self.required_tools = tools.into_iter().collect();
        self
    }

    pub fn with_audit_dir(mut self, dir: PathBuf) -> Self {
        self.audit_dir = Some(dir);
        self
    }

    pub fn with_termination<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ExecutionState) -> bool + Send + Sync + 'static,
    {
        self.termination = Arc::new(predicate);
        self
    }

    pub fn is_terminal(&self, tool_name: &str) -> bool {
        self.terminal_tools.contains(tool_name)
    }

    pub fn is_required(&self, tool_name: &str) -> bool {
        self.required_tools.contains(tool_name)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_loops == 0 {
            return Err(ConfigError::InvalidMaxLoops {
                value: self.max_loops,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("max_loops", &self.max_loops)
            .field("violation_budget", &self.violation_budget)
            .field("terminal_tools", &self.terminal_tools)
            .field("required_tools", &self.required_tools)
            .field("enforce_single_terminal", &self.enforce_single_terminal)
            .field("audit_dir", &self.audit_dir)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_max_loops_is_invalid() {
        let config = EngineConfig::new(0);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidMaxLoops { value: 0 }));
    }

    #[test]
    fn test_positive_max_loops_is_valid() {
        assert!(EngineConfig::new(1).validate().is_ok());
        assert!(EngineConfig::new(20).validate().is_ok());
    }

    #[test]
    fn test_terminal_classification() {
        let config = EngineConfig::new(10)
            .with_terminal_tools(["send_email".to_string(), "cancel_trip".to_string()]);
        assert!(config.is_terminal("send_email"));
        assert!(!config.is_terminal("get_weather"));
    }

    #[test]
    fn test_default_termination_tracks_final_action() {
        let config = EngineConfig::new(10);
        let mut state = ExecutionState::new();
        assert!(!(config.termination)(&state));
        state.final_action_done = true;
        assert!((config.termination)(&state));
    }

    #[test]
    fn test_custom_termination_predicate() {
        let config = EngineConfig::new(10).with_termination(|state| state.loop_count >= 2);
        let mut state = ExecutionState::new();
        state.loop_count = 2;
        assert!((config.termination)(&state));
    }
}
