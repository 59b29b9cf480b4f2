use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "scl")]
#[command(version, about = "Structured cognitive loop engine")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory for durable traces and saved audit reports.
    #[arg(long, default_value = ".scl/audit", global = true)]
    pub audit_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the weather-based travel planning scenario
    Run {
        /// Weather fixture: two-above, all-above, one-above, or all-below
        #[arg(long, default_value = "two-above")]
        scenario: String,

        /// Upper bound on cognition cycles
        #[arg(long, default_value = "20")]
        max_loops: u32,

        /// Rejected proposals tolerated before the run aborts
        #[arg(long, default_value = "3")]
        violation_budget: u32,
    },
    /// Print a saved audit report
    Report { file: PathBuf },
    /// List saved audit reports
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Run {
            scenario,
            max_loops,
            violation_budget,
        } => cmd::cmd_run(scenario, *max_loops, *violation_budget, &cli.audit_dir)?,
        Commands::Report { file } => cmd::cmd_report(file)?,
        Commands::List => cmd::cmd_list(&cli.audit_dir)?,
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "scl=debug" } else { "scl=warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
