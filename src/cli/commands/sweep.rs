//! `panelsync sweep` and `panelsync daemon`.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::context::AppContext;
use crate::cli::output::{heading, output, spinner, CommandOutput};
use crate::domain::models::{Config, SweepReport};
use crate::services::{StopSignal, SweepDaemon, SweepDaemonConfig, SweepDaemonEvent};

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Also drain pending on-demand variation checks
    #[arg(long)]
    pub drain_queue: bool,
}

#[derive(Args, Debug)]
pub struct DaemonArgs {
    /// Run only the periodic sweep, without the variation-check worker
    #[arg(long)]
    pub no_worker: bool,

    /// Skip the sweep that normally runs on start
    #[arg(long)]
    pub no_startup_sweep: bool,
}

#[derive(Debug, Serialize)]
pub struct SweepOutput {
    #[serde(flatten)]
    pub report: SweepReport,
    pub queue_processed: Option<usize>,
    pub queue_failed: Option<usize>,
}

impl CommandOutput for SweepOutput {
    fn to_human(&self) -> String {
        let r = &self.report;
        let mut lines = vec![heading("Completion sweep")];
        lines.push(format!("  Active tests seen:     {}", r.tests_seen));
        lines.push(format!("  Reconciled:            {}", r.tests_reconciled));
        lines.push(format!("  Skipped:               {}", r.tests_skipped));
        lines.push(format!("  Tests completed:       {}", r.tests_completed));
        lines.push(format!("  Variations completed:  {}", r.variations_completed));
        lines.push(format!("  Provider failures:     {}", r.variation_failures));
        lines.push(format!("  Reminders sent:        {}", r.reminders_sent));
        if let (Some(processed), Some(failed)) = (self.queue_processed, self.queue_failed) {
            lines.push(format!("  Queue jobs processed:  {processed} ({failed} failed)"));
        }
        if !r.test_errors.is_empty() {
            lines.push(format!("\n{}", heading("Errors")));
            for (test_id, error) in &r.test_errors {
                lines.push(format!("  {test_id}: {error}"));
            }
        }
        lines.join("\n")
    }
}

pub async fn execute_sweep(args: SweepArgs, config: Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;
    let reconciler = ctx.reconciler()?;

    let pb = spinner("Reconciling active tests", json_mode);
    let report = reconciler
        .daily_sweep()
        .await
        .context("Failed to enumerate active tests")?;

    let (queue_processed, queue_failed) = if args.drain_queue {
        pb.set_message("Draining variation checks");
        let worker = ctx.worker(reconciler);
        worker.maintain().await.context("Failed to maintain check queue")?;
        let drained = worker.drain().await.context("Failed to drain check queue")?;
        (Some(drained.processed), Some(drained.failed))
    } else {
        (None, None)
    };
    pb.finish_and_clear();

    output(
        &SweepOutput {
            report,
            queue_processed,
            queue_failed,
        },
        json_mode,
    );
    Ok(())
}

/// Run the sweep loop (and the queue worker) until Ctrl-C.
pub async fn execute_daemon(args: DaemonArgs, config: Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;
    let reconciler = ctx.reconciler()?;
    let stop = StopSignal::new();

    let mut daemon_config = SweepDaemonConfig::from(&ctx.config.reconcile);
    if args.no_startup_sweep {
        daemon_config.run_on_startup = false;
    }
    let daemon = SweepDaemon::new(reconciler.clone(), daemon_config).with_stop_signal(stop.clone());
    let handle = daemon.handle();
    let mut events = daemon.run();

    let worker_task = if args.no_worker {
        None
    } else {
        let worker = ctx.worker(reconciler);
        let stop = stop.clone();
        Some(tokio::spawn(async move { worker.run(stop).await }))
    };

    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received; shutting down");
            }
            stop.stop();
        });
    }

    while let Some(event) = events.recv().await {
        match event {
            SweepDaemonEvent::SweepCompleted { report, .. } => {
                output(
                    &SweepOutput {
                        report,
                        queue_processed: None,
                        queue_failed: None,
                    },
                    json_mode,
                );
            }
            SweepDaemonEvent::SweepFailed { run_number, error } => {
                warn!(run_number, error = %error, "Sweep failed");
            }
            SweepDaemonEvent::Stopped { reason } => {
                info!(?reason, "Sweep daemon stopped");
                break;
            }
            SweepDaemonEvent::Started | SweepDaemonEvent::SweepStarted { .. } => {}
        }
    }

    // The daemon may stop on its own after repeated failures.
    stop.stop();
    if let Some(task) = worker_task {
        task.await.context("Variation check worker panicked")?;
    }

    let status = handle.status().await;
    info!(
        total_runs = status.total_runs,
        failed_runs = status.failed_runs,
        tests_completed = status.tests_completed,
        "Daemon exited"
    );
    Ok(())
}
