//! Memory manager: the only writer of evidence and loop counters.
//!
//! `commit` extracts evidence from an action outcome (it never invents any),
//! updates the run counters, and appends exactly one Memory trace record. A
//! failed audit append is fatal: the orchestrator aborts the run rather than
//! continue with a silent gap in the trail.

use serde_json::json;

use crate::action::ActionOutcome;
use crate::audit::{AuditLog, Module, TraceRecord};
use crate::errors::PersistenceError;
use crate::evidence::{EvidenceRecord, EvidenceStore, evidence_id};
use crate::state::{CompletedCall, ExecutionState};

pub struct MemoryManager;

impl MemoryManager {
    /// Persist the outcome of one iteration.
    ///
    /// Successful outcomes yield one evidence record keyed by the executed
    /// call; failed outcomes only advance the loop counter (the failure
    /// itself is already in the Action trace).
    pub fn commit(
        &self,
        cycle: u32,
        outcome: &ActionOutcome,
        evidence: &mut EvidenceStore,
        state: &mut ExecutionState,
        log: &mut AuditLog,
    ) -> Result<(), PersistenceError> {
        let mut appended: Vec<String> = Vec::new();

        if let ActionOutcome::Completed {
            tool_name,
            parameters,
            result,
        } = outcome
        {
            let id = evidence_id(tool_name, parameters);
            if evidence.append(EvidenceRecord::new(id.clone(), tool_name.clone(), result.clone())) {
                appended.push(id);
            }
            state.completed_calls.push(CompletedCall {
                tool_name: tool_name.clone(),
                parameters: parameters.clone(),
            });
        }

        let outcome_json = serde_json::to_value(outcome).map_err(PersistenceError::Serialize)?;
        state
            .stored_values
            .insert("last_action_result".to_string(), outcome_json.clone());
        state.evidence_count = evidence.len();
        state.loop_count += 1;

        tracing::debug!(
            cycle,
            evidence_count = state.evidence_count,
            loop_count = state.loop_count,
            "memory committed"
        );

        let record = TraceRecord::new(
            Module::Memory.loop_id(cycle),
            Module::Memory,
            outcome_json,
            json!({
                "evidence_appended": appended,
                "evidence_count": state.evidence_count,
                "loop_count": state.loop_count,
            }),
        )
        .with_evidence_refs(appended.clone());

        log.append(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::TraceSink;
    use serde_json::{Value, json};

    fn completed(tool: &str, params: Value, result: Value) -> ActionOutcome {
        ActionOutcome::Completed {
            tool_name: tool.to_string(),
            parameters: params,
            result,
        }
    }

    #[test]
    fn test_commit_extracts_evidence_and_counts() {
        let memory = MemoryManager;
        let mut evidence = EvidenceStore::new();
        let mut state = ExecutionState::new();
        let mut log = AuditLog::new();

        let outcome = completed(
            "get_weather",
            json!({"city": "Miami"}),
            json!({"temperature_f": 58}),
        );
        memory
            .commit(1, &outcome, &mut evidence, &mut state, &mut log)
            .unwrap();

        assert_eq!(evidence.len(), 1);
        assert_eq!(state.evidence_count, 1);
        assert_eq!(state.loop_count, 1);
        assert!(state.has_completed_call("get_weather", &json!({"city": "Miami"})));

        // Exactly one Memory trace, citing the new evidence.
        assert_eq!(log.len(), 1);
        let record = &log.records()[0];
        assert_eq!(record.module, Module::Memory);
        assert_eq!(record.loop_id, "MEM-001");
        assert_eq!(record.evidence_refs.len(), 1);
        assert!(record.evidence_refs[0].starts_with("evidence_get_weather_"));
    }

    #[test]
    fn test_commit_failure_outcome_advances_counter_without_evidence() {
        let memory = MemoryManager;
        let mut evidence = EvidenceStore::new();
        let mut state = ExecutionState::new();
        let mut log = AuditLog::new();

        let outcome = ActionOutcome::Failed {
            tool_name: "get_weather".into(),
            error_detail: "timeout".into(),
        };
        memory
            .commit(2, &outcome, &mut evidence, &mut state, &mut log)
            .unwrap();

        assert!(evidence.is_empty());
        assert_eq!(state.loop_count, 1);
        assert!(state.completed_calls.is_empty());
        assert_eq!(log.records()[0].loop_id, "MEM-002");
    }

    #[test]
    fn test_repeated_identical_result_does_not_duplicate_evidence() {
        let memory = MemoryManager;
        let mut evidence = EvidenceStore::new();
        let mut state = ExecutionState::new();
        let mut log = AuditLog::new();

        let outcome = completed("get_weather", json!({"city": "Miami"}), json!(58));
        memory
            .commit(1, &outcome, &mut evidence, &mut state, &mut log)
            .unwrap();
        memory
            .commit(2, &outcome, &mut evidence, &mut state, &mut log)
            .unwrap();

        assert_eq!(evidence.len(), 1);
        assert_eq!(state.loop_count, 2);
        // Second Memory record cites nothing new.
        assert!(log.records()[1].evidence_refs.is_empty());
    }

    #[test]
    fn test_commit_surfaces_persistence_error() {
        struct FailingSink;
        impl TraceSink for FailingSink {
            fn append(&mut self, _: &TraceRecord) -> Result<(), PersistenceError> {
                Err(PersistenceError::TraceAppend {
                    path: "/dev/full".into(),
                    source: std::io::Error::other("disk full"),
                })
            }
        }

        let memory = MemoryManager;
        let mut evidence = EvidenceStore::new();
        let mut state = ExecutionState::new();
        let mut log = AuditLog::with_sink(Box::new(FailingSink));

        let outcome = completed("get_weather", json!({"city": "Miami"}), json!(58));
        let result = memory.commit(1, &outcome, &mut evidence, &mut state, &mut log);
        assert!(matches!(result, Err(PersistenceError::TraceAppend { .. })));
    }
}
