//! Scenario execution — `scl run`.

use anyhow::{Context, Result, bail};
use console::style;
use std::path::Path;
use std::sync::Arc;

use scl::audit::{AuditLogger, AuditReport, Module};
use scl::config::EngineConfig;
use scl::orchestrator::LoopOrchestrator;
use scl::scenario::{self, TravelPlanner, WeatherFixture};

pub fn cmd_run(
    scenario_name: &str,
    max_loops: u32,
    violation_budget: u32,
    audit_dir: &Path,
) -> Result<()> {
    let fixture = fixture_for(scenario_name)?;

    let config = EngineConfig::new(max_loops)
        .with_violation_budget(violation_budget)
        .with_terminal_tools(scenario::terminal_tools())
        .with_audit_dir(audit_dir.to_path_buf());
    let registry = Arc::new(scenario::build_registry(fixture));
    let policies = Arc::new(scenario::travel_policies());
    let orchestrator =
        LoopOrchestrator::new(config, registry, policies, Box::new(TravelPlanner::new()));

    println!(
        "{} travel planning ({scenario_name})",
        style("Running").green().bold()
    );

    let report = orchestrator
        .run(scenario::travel_task())
        .context("Run aborted before a report could be assembled")?;

    print_summary(&report);

    let logger = AuditLogger::new(audit_dir);
    logger.ensure_directories()?;
    let path = logger.save_report(&report)?;
    println!("\n  Audit report saved to {}", style(path.display()).cyan());

    Ok(())
}

fn fixture_for(name: &str) -> Result<WeatherFixture> {
    Ok(match name {
        "two-above" => WeatherFixture::two_above(),
        "all-above" => WeatherFixture::all_above(),
        "one-above" => WeatherFixture::one_above(),
        "all-below" => WeatherFixture::all_below(),
        _ => bail!(
            "Unknown scenario '{name}' (expected two-above, all-above, one-above, or all-below)"
        ),
    })
}

fn print_summary(report: &AuditReport) {
    let summary = &report.summary;
    let reason = summary
        .final_state
        .termination_reason
        .map(|r| r.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    println!();
    println!("  Task: {}", truncate(&report.task, 90));
    println!(
        "  Terminated: {} ({})",
        style(&reason).bold(),
        if summary.final_state.terminated {
            "clean"
        } else {
            "incomplete"
        }
    );
    println!(
        "  Loops: {}  Violations: {}  Success rate: {:.1}%",
        summary.total_loops,
        summary.policy_violations,
        summary.success_rate * 100.0
    );

    println!("\n  {}", style("Actions").bold());
    for record in report.log.iter().filter(|r| r.module == Module::Action) {
        let status = record.output_state["status"].as_str().unwrap_or("?");
        let tool = record.input_state["tool_name"].as_str().unwrap_or("?");
        let marker = if status == "completed" {
            style("ok").green()
        } else {
            style("failed").red()
        };
        println!("    {} {} {}", record.loop_id, tool, marker);
    }

    println!("\n  {}", style("Trace").bold());
    println!(
        "    {} records across {} phases",
        report.log.len(),
        report
            .log
            .iter()
            .map(|r| r.module)
            .collect::<std::collections::BTreeSet<_>>()
            .len()
    );
}

fn truncate(s: &str, limit: usize) -> String {
    if s.len() <= limit {
        s.to_string()
    } else {
        format!("{}...", &s[..limit])
    }
}
