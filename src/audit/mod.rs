//! Audit trail data model: trace records, the append-only log, and the final
//! report.
//!
//! Every phase invocation appends exactly one [`TraceRecord`] before control
//! returns to the orchestrator. Records are immutable once appended; when a
//! durable sink is attached, each record reaches it (and is flushed) before
//! the in-memory append completes, so no phase starts until its predecessor's
//! record is down.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::control::ValidationResult;
use crate::errors::PersistenceError;
use crate::state::ExecutionState;

pub mod logger;
pub use logger::AuditLogger;

/// The five phases of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Module {
    Retrieval,
    Cognition,
    Control,
    Action,
    Memory,
}

impl Module {
    /// Loop-id prefix for this phase.
    pub fn prefix(self) -> &'static str {
        match self {
            Module::Retrieval => "R",
            Module::Cognition => "CCAM",
            Module::Control => "CTL",
            Module::Action => "ACT",
            Module::Memory => "MEM",
        }
    }

    /// Phase-prefixed, zero-padded loop id (`CCAM-003`), unique within a run.
    pub fn loop_id(self, cycle: u32) -> String {
        format!("{}-{:03}", self.prefix(), cycle)
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Module::Retrieval => "Retrieval",
            Module::Cognition => "Cognition",
            Module::Control => "Control",
            Module::Action => "Action",
            Module::Memory => "Memory",
        };
        f.write_str(s)
    }
}

/// One immutable audit entry for one phase invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceRecord {
    pub loop_id: String,
    pub timestamp: DateTime<Utc>,
    pub module: Module,
    pub input_state: Value,
    pub output_state: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_result: Option<ValidationResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence_refs: Vec<String>,
}

impl TraceRecord {
    pub fn new(loop_id: impl Into<String>, module: Module, input_state: Value, output_state: Value) -> Self {
        Self {
            loop_id: loop_id.into(),
            timestamp: Utc::now(),
            module,
            input_state,
            output_state,
            decision: None,
            validation_result: None,
            evidence_refs: Vec::new(),
        }
    }

    pub fn with_decision(mut self, decision: impl Into<String>) -> Self {
        self.decision = Some(decision.into());
        self
    }

    pub fn with_validation(mut self, result: ValidationResult) -> Self {
        self.validation_result = Some(result);
        self
    }

    pub fn with_evidence_refs(mut self, refs: Vec<String>) -> Self {
        self.evidence_refs = refs;
        self
    }
}

/// Durable destination for trace records.
///
/// `append` must not return until the record is out of process buffers; the
/// orchestrator relies on that to guarantee no phase runs ahead of the trail.
pub trait TraceSink: Send {
    fn append(&mut self, record: &TraceRecord) -> Result<(), PersistenceError>;
}

/// JSON Lines sink: one record per line, flushed per append.
pub struct JsonlSink {
    path: PathBuf,
    file: fs::File,
}

impl JsonlSink {
    pub fn create(path: &Path) -> Result<Self, PersistenceError> {
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| PersistenceError::TraceOpen {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }
}

impl TraceSink for JsonlSink {
    fn append(&mut self, record: &TraceRecord) -> Result<(), PersistenceError> {
        let line = serde_json::to_string(record).map_err(PersistenceError::Serialize)?;
        let write = |file: &mut fs::File| -> std::io::Result<()> {
            writeln!(file, "{line}")?;
            file.flush()
        };
        write(&mut self.file).map_err(|source| PersistenceError::TraceAppend {
            path: self.path.clone(),
            source,
        })
    }
}

/// Append-only, insertion-ordered log of trace records for one run.
#[derive(Default)]
pub struct AuditLog {
    records: Vec<TraceRecord>,
    sink: Option<Box<dyn TraceSink>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(sink: Box<dyn TraceSink>) -> Self {
        Self {
            records: Vec::new(),
            sink: Some(sink),
        }
    }

    /// Append one record, writing through to the durable sink first. A sink
    /// failure leaves the in-memory log unchanged and is fatal to the run.
    pub fn append(&mut self, record: TraceRecord) -> Result<(), PersistenceError> {
        if let Some(sink) = &mut self.sink {
            sink.append(&record)?;
        }
        self.records.push(record);
        Ok(())
    }

    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<TraceRecord> {
        self.records
    }
}

/// Summary statistics block of a finished run.
///
/// Field names and nesting are a stable contract consumed by external
/// comparison tooling; do not rename.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    /// Cognition cycles driven (including cycles rejected by Control).
    pub total_loops: u32,
    /// Validation results with `passed == false`.
    pub policy_violations: u32,
    /// `1 - violations/loops`, clamped to `[0, 1]`; 1.0 for an empty run.
    pub success_rate: f64,
    pub final_state: ExecutionState,
}

/// The complete, persisted outcome of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub run_id: Uuid,
    pub task: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Names of the rules that governed the run, in evaluation order.
    pub policies: Vec<String>,
    /// Full trace record sequence, in append order.
    pub log: Vec<TraceRecord>,
    pub summary: RunSummary,
}
