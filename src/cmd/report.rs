//! Saved-report inspection — `scl report` and `scl list`.

use anyhow::Result;
use console::style;
use std::path::Path;

use scl::audit::AuditLogger;

pub fn cmd_report(file: &Path) -> Result<()> {
    let dir = file.parent().unwrap_or_else(|| Path::new("."));
    let report = AuditLogger::new(dir).load_report(file)?;

    println!("{} {}", style("Run").bold(), report.run_id);
    println!("  Task: {}", report.task);
    println!("  Started: {}", report.started_at.to_rfc3339());
    println!("  Policies:");
    for name in &report.policies {
        println!("    - {name}");
    }

    println!("\n  {}", style("Trace").bold());
    for record in &report.log {
        let detail = match record.module {
            scl::audit::Module::Control => record
                .decision
                .clone()
                .unwrap_or_else(|| "-".to_string()),
            _ => record.input_state["tool_name"]
                .as_str()
                .unwrap_or("-")
                .to_string(),
        };
        println!("    {:<10} {:<10} {}", record.loop_id, record.module.to_string(), detail);
    }

    let summary = &report.summary;
    println!("\n  {}", style("Summary").bold());
    println!(
        "    total_loops={} policy_violations={} success_rate={:.3}",
        summary.total_loops, summary.policy_violations, summary.success_rate
    );
    if let Some(reason) = summary.final_state.termination_reason {
        println!("    termination_reason={reason}");
    }

    Ok(())
}

pub fn cmd_list(audit_dir: &Path) -> Result<()> {
    let runs = AuditLogger::new(audit_dir).list_runs()?;
    if runs.is_empty() {
        println!("No saved runs under {}", audit_dir.display());
        return Ok(());
    }
    println!("{} saved run(s), most recent first:", runs.len());
    for run in runs {
        println!("  {}", run.display());
    }
    Ok(())
}
