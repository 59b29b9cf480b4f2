//! Typed error hierarchy for the scl engine.
//!
//! Three levels cover the engine's failure taxonomy:
//! - `ConfigError` — invalid setup, surfaced before any phase runs
//! - `PersistenceError` — the audit trail cannot accept a write (fatal)
//! - `EngineError` — top-level run failures
//!
//! Everything else (policy violations, tool failures, unknown tools) is data
//! carried inside the audit report, not an error type: a run that hits those
//! conditions still produces a complete, inspectable trace.

use std::path::PathBuf;
use thiserror::Error;

/// Invalid engine setup. Fatal and surfaced immediately; no partial run is
/// attempted.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("max_loops must be positive, got {value}")]
    InvalidMaxLoops { value: u32 },

    #[error("Failed to prepare audit directory {path}: {source}")]
    AuditDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The audit log could not accept a write.
///
/// Treated as fatal: an engine that cannot guarantee audit completeness must
/// not silently continue.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Failed to append trace record to {path}: {source}")]
    TraceAppend {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open trace file at {path}: {source}")]
    TraceOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize trace record: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Top-level run failure. Only `Config` and `Persistence` abort a run without
/// a final trace record; every other condition terminates the run normally
/// and is representable inside the audit report.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Audit trail write failed: {0}")]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
