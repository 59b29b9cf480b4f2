//! Policy set: the named governance rules applied at the Control step.
//!
//! Rules are pure predicates over `(proposed action, run context)`, identified
//! by a stable name. The set is an ordered list — adding a domain-specific
//! rule means registering another entry, never modifying the validator's
//! control flow. Read-only during a run; shareable across runs behind an
//! `Arc`.

use std::collections::BTreeSet;

use crate::evidence::EvidenceStore;
use crate::reasoning::ProposedAction;
use crate::state::ExecutionState;

/// Governance instructions included in every cognition prompt.
pub const GOVERNANCE_INSTRUCTIONS: &str = "\
You are operating under symbolic control within a structured cognitive loop.

MANDATORY CONSTRAINTS:
1. Consult stored state before proposing actions
2. Cite gathered evidence by id in all reasoning
3. Never execute final actions without Control validation
4. Apply the task's conditional logic exactly as specified
5. Avoid redundant tool calls by checking stored evidence first

REASONING PROTOCOL:
- State the current goal explicitly
- Reference stored evidence by id
- Propose one action with a clear rationale
- Wait for Control validation before execution";

/// Read-only view of the run handed to each rule.
pub struct ControlContext<'a> {
    pub state: &'a ExecutionState,
    pub evidence: &'a EvidenceStore,
}

/// Result of evaluating one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    Pass,
    Fail { reason: String },
}

impl RuleOutcome {
    pub fn fail(reason: impl Into<String>) -> Self {
        RuleOutcome::Fail {
            reason: reason.into(),
        }
    }
}

type RuleCheck = Box<dyn Fn(&ProposedAction, &ControlContext<'_>) -> RuleOutcome + Send + Sync>;

/// A named, pure validation rule.
pub struct PolicyRule {
    name: String,
    check: RuleCheck,
}

impl PolicyRule {
    pub fn new<F>(name: &str, check: F) -> Self
    where
        F: Fn(&ProposedAction, &ControlContext<'_>) -> RuleOutcome + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            check: Box::new(check),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn evaluate(&self, action: &ProposedAction, ctx: &ControlContext<'_>) -> RuleOutcome {
        (self.check)(action, ctx)
    }
}

/// Ordered collection of named rules plus the governance instruction text.
pub struct PolicySet {
    rules: Vec<PolicyRule>,
    instructions: String,
}

impl PolicySet {
    /// An empty set with the default governance instructions.
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            instructions: GOVERNANCE_INSTRUCTIONS.to_string(),
        }
    }

    /// The built-in rule set, in its fixed evaluation order. `terminal_tools`
    /// names the decision-class actions the citation and single-final checks
    /// apply to.
    pub fn standard(terminal_tools: &BTreeSet<String>) -> Self {
        Self::new()
            .with_rule(must_cite_stored_evidence(terminal_tools.clone()))
            .with_rule(no_final_answer_without_control_pass())
            .with_rule(single_final_action(terminal_tools.clone()))
            .with_rule(avoid_redundant_tool_calls())
    }

    pub fn with_rule(mut self, rule: PolicyRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn rule_names(&self) -> Vec<String> {
        self.rules.iter().map(|r| r.name.clone()).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PolicyRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for PolicySet {
    fn default() -> Self {
        Self::new()
    }
}

/// Fails when a cited evidence id is not in the store, or when a
/// decision-class action cites nothing at all. Information-gathering calls
/// may legitimately run before any evidence exists.
pub fn must_cite_stored_evidence(terminal_tools: BTreeSet<String>) -> PolicyRule {
    PolicyRule::new("must_cite_stored_evidence", move |action, ctx| {
        if let Some(missing) = action
            .evidence_refs
            .iter()
            .find(|id| !ctx.evidence.contains(id))
        {
            return RuleOutcome::fail(format!("cited evidence '{missing}' is not in the store"));
        }
        if action.evidence_refs.is_empty() && terminal_tools.contains(&action.tool_name) {
            return RuleOutcome::fail("decision action cites no evidence");
        }
        RuleOutcome::Pass
    })
}

/// Structural: the orchestrator only reaches Action after a passing Control
/// result, so there is nothing to re-check here. Registered so reports list
/// the guarantee by name.
pub fn no_final_answer_without_control_pass() -> PolicyRule {
    PolicyRule::new("no_final_answer_without_control_pass", |_, _| {
        RuleOutcome::Pass
    })
}

/// Fails when a terminal action is proposed after one has already succeeded
/// in this run.
pub fn single_final_action(terminal_tools: BTreeSet<String>) -> PolicyRule {
    PolicyRule::new("single_final_action", move |action, ctx| {
        if terminal_tools.contains(&action.tool_name) {
            if let Some(done) = &ctx.state.terminal_action {
                return RuleOutcome::fail(format!(
                    "terminal action '{done}' already executed this run"
                ));
            }
        }
        RuleOutcome::Pass
    })
}

/// Fails when an identical `(tool_name, parameters)` pair already executed
/// successfully, compared by structural equality.
pub fn avoid_redundant_tool_calls() -> PolicyRule {
    PolicyRule::new("avoid_redundant_tool_calls", |action, ctx| {
        if ctx
            .state
            .has_completed_call(&action.tool_name, &action.parameters)
        {
            return RuleOutcome::fail(format!(
                "identical call to '{}' already executed",
                action.tool_name
            ));
        }
        RuleOutcome::Pass
    })
}
