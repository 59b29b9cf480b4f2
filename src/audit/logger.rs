//! Persistence of finished audit reports.
//!
//! Reports land under `<audit_dir>/runs/` as pretty-printed JSON, one file per
//! run, named by start time and run id so a directory listing reads as a
//! chronology. The per-record JSONL trail written during the run lives next
//! to them.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::AuditReport;

pub struct AuditLogger {
    audit_dir: PathBuf,
}

impl AuditLogger {
    pub fn new(audit_dir: &Path) -> Self {
        Self {
            audit_dir: audit_dir.to_path_buf(),
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(self.audit_dir.join("runs"))
            .context("Failed to create audit runs directory")?;
        Ok(())
    }

    /// Path of the durable per-record trail for a run.
    pub fn trace_path(&self, run_id: Uuid) -> PathBuf {
        self.audit_dir
            .join(format!("trace-{}.jsonl", short_id(run_id)))
    }

    /// Persist a finished report. Returns the file it was written to.
    pub fn save_report(&self, report: &AuditReport) -> Result<PathBuf> {
        let filename = format!(
            "{}_{}.json",
            report.started_at.format("%Y-%m-%dT%H-%M-%S"),
            short_id(report.run_id)
        );
        let path = self.audit_dir.join("runs").join(filename);

        let json =
            serde_json::to_string_pretty(report).context("Failed to serialize audit report")?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write audit report to {}", path.display()))?;
        Ok(path)
    }

    /// Saved report files, most recent first.
    pub fn list_runs(&self) -> Result<Vec<PathBuf>> {
        let runs_dir = self.audit_dir.join("runs");
        if !runs_dir.exists() {
            return Ok(Vec::new());
        }

        let mut runs: Vec<PathBuf> = fs::read_dir(&runs_dir)
            .context("Failed to read audit runs directory")?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|e| e == "json").unwrap_or(false))
            .collect();

        runs.sort();
        runs.reverse();
        Ok(runs)
    }

    pub fn load_report(&self, path: &Path) -> Result<AuditReport> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read audit report {}", path.display()))?;
        let report: AuditReport = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse audit report {}", path.display()))?;
        Ok(report)
    }
}

fn short_id(run_id: Uuid) -> String {
    run_id.to_string()[..8].to_string()
}
