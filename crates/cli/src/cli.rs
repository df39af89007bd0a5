use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Parameter-sweep benchmark harness.
///
/// Expands a job's parameter declarations into concrete tasks and
/// schedules their run stages onto a fixed pool of CPU cores.
#[derive(Parser, Debug)]
#[command(name = "sweepbench", about = "Parameter-sweep benchmark harness")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a specific experiment job
    Run(RunArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the job YAML file
    pub file: PathBuf,

    /// CPUs to run experiments on, e.g. "1-4" or "0,2,4"
    #[arg(long = "cpu-sets", default_value_t = default_cpu_sets())]
    pub cpu_sets: String,

    /// Schedule without executing stage commands
    #[arg(short = 'D', long)]
    pub dry_run: bool,

    /// Seconds to gracefully wait in the scheduler between iterations
    #[arg(short = 'g', long = "schedule-grace-time", default_value_t = 1)]
    pub schedule_grace: u64,

    /// Scratch directory for stages that declare no working path
    #[arg(long, default_value = ".sweepbench")]
    pub work_dir: PathBuf,
}

/// Default pool: every core but 0, which is left to the OS.
fn default_cpu_sets() -> String {
    let ncpu = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2);
    format!("1-{ncpu}")
}
