mod cli;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use sweepbench_core::{parse_cpu_sets, RuntimeConfig};
use sweepbench_job::Job;
use sweepbench_run::{DryRunFactory, ProcessRunnerFactory, RunnerFactory};
use sweepbench_sched::Scheduler;

use crate::cli::{CliArgs, Command, RunArgs};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    match args.command {
        Command::Run(run_args) => run(run_args).await,
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let cpus = parse_cpu_sets(&args.cpu_sets).context("could not parse CPU sets")?;
    let cfg = RuntimeConfig {
        cpus,
        schedule_grace: args.schedule_grace,
        dry_run: args.dry_run,
    };

    let job = Job::load(&args.file, &cfg).context("could not load job")?;
    info!(
        tasks = job.tasks.len(),
        cores = cfg.cpus.len(),
        "job loaded"
    );

    let factory: Arc<dyn RunnerFactory> = if cfg.dry_run {
        Arc::new(DryRunFactory)
    } else {
        Arc::new(ProcessRunnerFactory::new(args.work_dir))
    };

    let mut scheduler = Scheduler::new(job.tasks, &cfg, factory);

    let shutdown = scheduler.shutdown_signal();
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("shutdown signal received; cancelling pending tasks");
        shutdown.store(true, Ordering::Relaxed);
    });

    // The scheduler is synchronous; keep it off the async runtime.
    let scheduler = tokio::task::spawn_blocking(move || {
        scheduler.run();
        scheduler
    })
    .await
    .context("scheduler thread panicked")?;

    let metrics = scheduler.metrics();
    info!(
        succeeded = metrics.stages_succeeded.values().sum::<u64>(),
        failed = metrics.stages_failed.values().sum::<u64>(),
        cancelled = metrics.tasks_cancelled,
        "run complete"
    );

    Ok(())
}

/// Wait for SIGINT or SIGTERM (Unix) or Ctrl+C (cross-platform fallback).
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT");
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM");
        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl_c");
    }
}
