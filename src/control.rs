//! Control validator: the governance checkpoint between cognition and action.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::policy::{ControlContext, PolicySet, RuleOutcome};
use crate::reasoning::ProposedAction;

/// One failing rule, with the reason it failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Violation {
    pub rule_name: String,
    pub reason: String,
}

/// Outcome of validating one proposed action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationResult {
    pub passed: bool,
    /// Every failing rule, in the policy set's evaluation order.
    pub violations: Vec<Violation>,
}

impl ValidationResult {
    pub fn pass() -> Self {
        Self {
            passed: true,
            violations: Vec::new(),
        }
    }

    pub fn reject(&mut self, rule_name: impl Into<String>, reason: impl Into<String>) {
        self.passed = false;
        self.violations.push(Violation {
            rule_name: rule_name.into(),
            reason: reason.into(),
        });
    }

    /// All violation reasons joined for feedback to the reasoning provider.
    pub fn rejection_summary(&self) -> String {
        self.violations
            .iter()
            .map(|v| format!("{}: {}", v.rule_name, v.reason))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Evaluates every rule in the policy set against a proposed action.
pub struct ControlValidator {
    policies: Arc<PolicySet>,
}

impl ControlValidator {
    pub fn new(policies: Arc<PolicySet>) -> Self {
        Self { policies }
    }

    /// Validate `action` against the current run context. Never fails and
    /// never short-circuits: every rule runs, so `violations` lists each
    /// failing rule rather than only the first.
    pub fn validate(&self, action: &ProposedAction, ctx: &ControlContext<'_>) -> ValidationResult {
        let mut result = ValidationResult::pass();
        for rule in self.policies.iter() {
            match rule.evaluate(action, ctx) {
                RuleOutcome::Pass => {
                    tracing::debug!(rule = rule.name(), tool = %action.tool_name, "rule passed");
                }
                RuleOutcome::Fail { reason } => {
                    tracing::debug!(rule = rule.name(), tool = %action.tool_name, %reason, "rule failed");
                    result.reject(rule.name(), reason);
                }
            }
        }
        result
    }
}
