//! The loop orchestrator: Retrieval once, then Cognition → Control → Action
//! → Memory until a termination condition.
//!
//! The orchestrator is the only owner of the run's mutable state and audit
//! log. Phases execute strictly sequentially; each one's trace record is
//! appended (and flushed, when a durable sink is attached) before the next
//! phase starts. Only configuration and persistence failures abort a run
//! without producing a report — every other condition terminates normally and
//! is inspectable in the trace.

use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use crate::action::{ActionExecutor, ActionOutcome};
use crate::audit::{AuditLog, AuditLogger, AuditReport, JsonlSink, Module, RunSummary, TraceRecord};
use crate::config::EngineConfig;
use crate::control::ControlValidator;
use crate::errors::{ConfigError, EngineError};
use crate::evidence::EvidenceStore;
use crate::memory::MemoryManager;
use crate::policy::{ControlContext, PolicySet};
use crate::reasoning::{ReasoningProvider, build_prompt};
use crate::registry::ToolRegistry;
use crate::state::{ExecutionState, StateSnapshot, TerminationReason};
use crate::task::Task;

/// Cooperative cancellation handle, checked between loop iterations.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

pub struct LoopOrchestrator {
    config: EngineConfig,
    registry: Arc<ToolRegistry>,
    policies: Arc<PolicySet>,
    provider: Box<dyn ReasoningProvider>,
    cancel: CancelFlag,
}

impl LoopOrchestrator {
    pub fn new(
        config: EngineConfig,
        registry: Arc<ToolRegistry>,
        policies: Arc<PolicySet>,
        provider: Box<dyn ReasoningProvider>,
    ) -> Self {
        Self {
            config,
            registry,
            policies,
            provider,
            cancel: CancelFlag::new(),
        }
    }

    /// Handle for cancelling this run from another thread. Cancellation takes
    /// effect at the next iteration boundary; the partial trail is flushed
    /// and reported.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Drive the full loop for `task` and return the audit report.
    pub fn run(mut self, task: Task) -> Result<AuditReport, EngineError> {
        self.config.validate()?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mut log = self.open_audit_log(run_id)?;
        let mut evidence = EvidenceStore::new();
        let mut state = ExecutionState::new();
        let validator = ControlValidator::new(self.policies.clone());
        let executor = ActionExecutor::new(self.registry.clone());
        let memory = MemoryManager;

        tracing::info!(run_id = %run_id, goal = %task.goal, "run started");

        // Retrieval, exactly once.
        match self.provider.plan(&task) {
            Ok(plan) => {
                state
                    .stored_values
                    .insert("task".to_string(), Value::String(task.goal.clone()));
                state
                    .stored_values
                    .insert("retrieval_plan".to_string(), to_json(&plan));
                log.append(TraceRecord::new(
                    Module::Retrieval.loop_id(1),
                    Module::Retrieval,
                    json!({"task": task.goal, "parameters": task.parameters}),
                    to_json(&plan),
                ))?;
                tracing::info!(evidence_needed = plan.evidence_needed.len(), "retrieval planned");
            }
            Err(e) => {
                log.append(TraceRecord::new(
                    Module::Retrieval.loop_id(1),
                    Module::Retrieval,
                    json!({"task": task.goal, "parameters": task.parameters}),
                    json!({"error": e.to_string()}),
                ))?;
                tracing::warn!(error = %e, "retrieval failed");
                state.terminate(TerminationReason::ActionFatalError);
            }
        }

        let mut cycle: u32 = 0;
        let mut last_rejection: Option<String> = None;

        while !state.terminated {
            if self.cancel.is_cancelled() {
                tracing::info!(cycle, "run cancelled");
                state.terminate(TerminationReason::Cancelled);
                break;
            }
            if cycle >= self.config.max_loops {
                state.terminate(TerminationReason::MaxLoopsExceeded);
                break;
            }
            cycle += 1;

            // Cognition
            let snapshot = StateSnapshot {
                stored_values: state.stored_values.clone(),
                available_evidence: evidence.ids(),
                loop_count: state.loop_count,
                violation_count: state.violation_count,
                last_rejection: last_rejection.take(),
            };
            let prompt = build_prompt(
                self.policies.instructions(),
                &snapshot,
                &self.registry.descriptors(),
                &task,
            );
            let action = match self.provider.propose(&prompt, &snapshot) {
                Ok(action) => action,
                Err(e) => {
                    log.append(TraceRecord::new(
                        Module::Cognition.loop_id(cycle),
                        Module::Cognition,
                        to_json(&snapshot),
                        json!({"error": e.to_string()}),
                    ))?;
                    tracing::warn!(cycle, error = %e, "reasoning provider failed");
                    state.terminate(TerminationReason::ActionFatalError);
                    break;
                }
            };
            tracing::info!(cycle, tool = %action.tool_name, is_final = action.is_final, "action proposed");
            log.append(
                TraceRecord::new(
                    Module::Cognition.loop_id(cycle),
                    Module::Cognition,
                    to_json(&snapshot),
                    to_json(&action),
                )
                .with_evidence_refs(action.evidence_refs.clone()),
            )?;

            // Control
            let mut result = {
                let ctx = ControlContext {
                    state: &state,
                    evidence: &evidence,
                };
                validator.validate(&action, &ctx)
            };
            // Structural guarantee, above whatever the policy set checks: once
            // a terminal action has succeeded, no further terminal action may
            // run this cycle onward.
            if result.passed
                && self.config.enforce_single_terminal
                && self.config.is_terminal(&action.tool_name)
                && state.terminal_action.is_some()
            {
                result.reject(
                    "single_final_action",
                    "terminal action already executed this run",
                );
            }
            log.append(
                TraceRecord::new(
                    Module::Control.loop_id(cycle),
                    Module::Control,
                    to_json(&action),
                    to_json(&result),
                )
                .with_decision(if result.passed { "pass" } else { "reject" })
                .with_validation(result.clone()),
            )?;

            if !result.passed {
                state.violation_count += 1;
                let summary = result.rejection_summary();
                tracing::warn!(cycle, %summary, "proposal rejected");
                if state.violation_count > self.config.violation_budget {
                    state.terminate(TerminationReason::PolicyViolationLimit);
                } else {
                    last_rejection = Some(summary);
                }
                continue;
            }

            // Action
            let outcome = executor.execute(&action);
            let mut action_record = TraceRecord::new(
                Module::Action.loop_id(cycle),
                Module::Action,
                to_json(&action),
                to_json(&outcome),
            );
            if let Some(branch) = &action.branch {
                action_record = action_record.with_decision(branch.clone());
            }
            log.append(action_record)?;

            // Memory
            memory.commit(cycle, &outcome, &mut evidence, &mut state, &mut log)?;

            match &outcome {
                ActionOutcome::Completed { tool_name, .. } => {
                    if self.config.is_terminal(tool_name) {
                        state.terminal_action = Some(tool_name.clone());
                    }
                    if action.is_final {
                        state.final_action_done = true;
                    }
                }
                ActionOutcome::Failed { tool_name, .. } => {
                    if self.config.is_required(tool_name) {
                        tracing::warn!(cycle, tool = %tool_name, "required tool failed");
                        state.terminate(TerminationReason::ActionFatalError);
                        continue;
                    }
                }
            }

            if (self.config.termination)(&state) {
                state.terminate(TerminationReason::TaskComplete);
            }
        }

        let ended_at = Utc::now();
        let records = log.into_records();
        let policy_violations = records
            .iter()
            .filter(|r| r.validation_result.as_ref().is_some_and(|v| !v.passed))
            .count() as u32;
        let success_rate = if cycle == 0 {
            1.0
        } else {
            (1.0 - f64::from(policy_violations) / f64::from(cycle)).clamp(0.0, 1.0)
        };

        tracing::info!(
            run_id = %run_id,
            total_loops = cycle,
            policy_violations,
            reason = state.termination_reason.map(|r| r.to_string()).unwrap_or_default(),
            "run finished"
        );

        Ok(AuditReport {
            run_id,
            task: task.goal,
            started_at,
            ended_at,
            policies: self.policies.rule_names(),
            log: records,
            summary: RunSummary {
                total_loops: cycle,
                policy_violations,
                success_rate,
                final_state: state,
            },
        })
    }

    fn open_audit_log(&self, run_id: Uuid) -> Result<AuditLog, EngineError> {
        let Some(dir) = &self.config.audit_dir else {
            return Ok(AuditLog::new());
        };
        fs::create_dir_all(dir.join("runs")).map_err(|source| ConfigError::AuditDir {
            path: dir.clone(),
            source,
        })?;
        let trace_path = AuditLogger::new(dir).trace_path(run_id);
        let sink = JsonlSink::create(&trace_path)?;
        Ok(AuditLog::with_sink(Box::new(sink)))
    }
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value)
        .unwrap_or_else(|e| json!({"serialization_error": e.to_string()}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reasoning::ProposedAction;
    use crate::registry::ToolFailure;
    use crate::task::RetrievalPlan;
    use anyhow::Result;
    use std::collections::VecDeque;

    /// Scripted provider: replays a fixed sequence of proposals, repeating
    /// the last one once the script runs out.
    struct ScriptedProvider {
        script: VecDeque<ProposedAction>,
        last: Option<ProposedAction>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<ProposedAction>) -> Self {
            Self {
                script: script.into(),
                last: None,
            }
        }
    }

    impl ReasoningProvider for ScriptedProvider {
        fn plan(&mut self, _task: &Task) -> Result<RetrievalPlan> {
            Ok(RetrievalPlan {
                evidence_needed: vec!["weather:Miami".into()],
                tools_required: vec!["get_weather".into()],
                parameters: json!({}),
            })
        }

        fn propose(&mut self, _prompt: &str, _context: &StateSnapshot) -> Result<ProposedAction> {
            if let Some(next) = self.script.pop_front() {
                self.last = Some(next.clone());
                return Ok(next);
            }
            self.last
                .clone()
                .ok_or_else(|| anyhow::anyhow!("script exhausted"))
        }
    }

    fn weather_call(city: &str, is_final: bool) -> ProposedAction {
        ProposedAction {
            tool_name: "get_weather".into(),
            parameters: json!({"city": city}),
            rationale: format!("need weather for {city}"),
            evidence_refs: vec![],
            is_final,
            branch: None,
        }
    }

    fn test_registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(
            "get_weather",
            |params: &Value| Ok(json!({"city": params["city"], "temperature_f": 58})),
            "Fetch weather",
        );
        registry.register(
            "broken",
            |_: &Value| Err(ToolFailure::new("upstream down")),
            "Always fails",
        );
        Arc::new(registry)
    }

    fn orchestrator(
        config: EngineConfig,
        script: Vec<ProposedAction>,
    ) -> LoopOrchestrator {
        LoopOrchestrator::new(
            config,
            test_registry(),
            Arc::new(PolicySet::standard(&Default::default())),
            Box::new(ScriptedProvider::new(script)),
        )
    }

    fn task() -> Task {
        Task::new("check the weather", json!({}))
    }

    #[test]
    fn test_zero_max_loops_is_configuration_error() {
        let orch = orchestrator(EngineConfig::new(0), vec![weather_call("Miami", false)]);
        let err = orch.run(task()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Config(ConfigError::InvalidMaxLoops { value: 0 })
        ));
    }

    #[test]
    fn test_every_phase_produces_exactly_one_record() {
        let orch = orchestrator(
            EngineConfig::new(2),
            vec![
                weather_call("Miami", false),
                weather_call("Atlanta", true),
            ],
        );
        let report = orch.run(task()).unwrap();

        // 1 Retrieval + 2 full cycles of 4 records each.
        assert_eq!(report.log.len(), 9);
        let count = |m: Module| report.log.iter().filter(|r| r.module == m).count();
        assert_eq!(count(Module::Retrieval), 1);
        assert_eq!(count(Module::Cognition), 2);
        assert_eq!(count(Module::Control), 2);
        assert_eq!(count(Module::Action), 2);
        assert_eq!(count(Module::Memory), 2);
        assert_eq!(
            report.summary.final_state.termination_reason,
            Some(TerminationReason::TaskComplete)
        );
    }

    #[test]
    fn test_max_loops_exceeded_keeps_partial_trace() {
        // The script repeats distinct-parameter calls never marked final.
        let orch = orchestrator(
            EngineConfig::new(1),
            vec![weather_call("Miami", false), weather_call("Atlanta", false)],
        );
        let report = orch.run(task()).unwrap();

        assert!(report.summary.final_state.terminated);
        assert_eq!(
            report.summary.final_state.termination_reason,
            Some(TerminationReason::MaxLoopsExceeded)
        );
        assert_eq!(report.summary.total_loops, 1);
        // Retrieval + one full cycle; nothing silently dropped.
        assert_eq!(report.log.len(), 5);
    }

    #[test]
    fn test_violation_budget_bounds_rejected_cycles() {
        // Redundant identical calls are rejected by policy after the first
        // success; budget 1 allows one rejection, the second aborts.
        let orch = orchestrator(
            EngineConfig::new(10).with_violation_budget(1),
            vec![weather_call("Miami", false)],
        );
        let report = orch.run(task()).unwrap();

        assert_eq!(
            report.summary.final_state.termination_reason,
            Some(TerminationReason::PolicyViolationLimit)
        );
        assert_eq!(report.summary.policy_violations, 2);
        assert_eq!(report.summary.final_state.violation_count, 2);
        // Violations counted in the report match failing validation results.
        let failed = report
            .log
            .iter()
            .filter(|r| r.validation_result.as_ref().is_some_and(|v| !v.passed))
            .count();
        assert_eq!(failed, 2);
    }

    #[test]
    fn test_required_tool_failure_is_fatal() {
        let mut call = weather_call("Miami", false);
        call.tool_name = "broken".into();
        let orch = orchestrator(
            EngineConfig::new(5).with_required_tools(["broken".to_string()]),
            vec![call],
        );
        let report = orch.run(task()).unwrap();

        assert_eq!(
            report.summary.final_state.termination_reason,
            Some(TerminationReason::ActionFatalError)
        );
        // The failure itself is in the trail: Retrieval + CCAM + CTL + ACT + MEM.
        assert_eq!(report.log.len(), 5);
    }

    #[test]
    fn test_unknown_tool_is_recorded_and_run_continues() {
        let mut unknown = weather_call("Miami", false);
        unknown.tool_name = "teleport".into();
        let orch = orchestrator(
            EngineConfig::new(2),
            vec![unknown, weather_call("Miami", true)],
        );
        let report = orch.run(task()).unwrap();

        assert_eq!(
            report.summary.final_state.termination_reason,
            Some(TerminationReason::TaskComplete)
        );
        let failed_action = report
            .log
            .iter()
            .find(|r| r.module == Module::Action && r.output_state["status"] == "failed")
            .expect("failed action must be traced");
        assert!(
            failed_action.output_state["error_detail"]
                .as_str()
                .unwrap()
                .contains("not registered")
        );
    }

    #[test]
    fn test_cancel_before_first_cycle_flushes_retrieval_record() {
        let orch = orchestrator(EngineConfig::new(5), vec![weather_call("Miami", false)]);
        orch.cancel_flag().cancel();
        let report = orch.run(task()).unwrap();

        assert_eq!(
            report.summary.final_state.termination_reason,
            Some(TerminationReason::Cancelled)
        );
        assert_eq!(report.log.len(), 1);
        assert_eq!(report.log[0].module, Module::Retrieval);
    }

    #[test]
    fn test_structural_guard_rejects_second_terminal_even_without_rule() {
        // Policy set is empty: only the orchestrator's structural guard is in
        // play. Two terminal proposals, neither flagged final.
        let terminal = ["get_weather".to_string()];
        let orch = LoopOrchestrator::new(
            EngineConfig::new(3)
                .with_terminal_tools(terminal.clone())
                .with_violation_budget(0),
            test_registry(),
            Arc::new(PolicySet::new()),
            Box::new(ScriptedProvider::new(vec![
                weather_call("Miami", false),
                weather_call("Atlanta", false),
            ])),
        );
        let report = orch.run(task()).unwrap();

        assert_eq!(
            report.summary.final_state.termination_reason,
            Some(TerminationReason::PolicyViolationLimit)
        );
        let rejected = report
            .log
            .iter()
            .filter_map(|r| r.validation_result.as_ref())
            .find(|v| !v.passed)
            .expect("structural rejection must be traced");
        assert_eq!(rejected.violations[0].rule_name, "single_final_action");
    }

    #[test]
    fn test_success_rate_reflects_violations() {
        let orch = orchestrator(
            EngineConfig::new(10).with_violation_budget(1),
            vec![weather_call("Miami", false)],
        );
        let report = orch.run(task()).unwrap();
        // 3 cycles: 1 pass + 2 rejections.
        assert_eq!(report.summary.total_loops, 3);
        let expected = 1.0 - 2.0 / 3.0;
        assert!((report.summary.success_rate - expected).abs() < 1e-9);
    }
}
