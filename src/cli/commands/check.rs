//! Single-variation commands: `check-variation`, `enqueue-check`, `finalize`.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use uuid::Uuid;

use crate::cli::context::AppContext;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, FinalizeOutcome, VariationCheckOutcome, VariationType};

fn parse_variation_type(s: &str) -> Result<VariationType, String> {
    VariationType::from_str(s).ok_or_else(|| format!("unknown variation '{s}', expected a, b or c"))
}

#[derive(Args, Debug)]
pub struct VariationArgs {
    /// External study id at the panel provider
    #[arg(long)]
    pub study_id: String,

    /// Test id
    #[arg(long)]
    pub test_id: Uuid,

    /// Variation (a, b or c)
    #[arg(long, value_parser = parse_variation_type)]
    pub variation: VariationType,
}

#[derive(Args, Debug)]
pub struct EnqueueArgs {
    #[command(flatten)]
    pub variation: VariationArgs,

    /// Queue even when reconcile.enqueue_on_dispatch is off
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct FinalizeArgs {
    /// Test id
    pub test_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CheckOutput {
    pub study_id: String,
    pub test_id: Uuid,
    pub variation_type: VariationType,
    #[serde(flatten)]
    pub outcome: VariationCheckOutcome,
}

impl CommandOutput for CheckOutput {
    fn to_human(&self) -> String {
        let detail = match &self.outcome {
            VariationCheckOutcome::Completed {
                finalization,
                insights_error,
                ..
            } => format!(
                "marked complete; test {}{}",
                describe_finalization(finalization),
                describe_insights_error(insights_error.as_deref())
            ),
            VariationCheckOutcome::AlreadyComplete {
                finalization,
                insights_error,
                ..
            } => format!(
                "already complete; test {}{}",
                describe_finalization(finalization),
                describe_insights_error(insights_error.as_deref())
            ),
            VariationCheckOutcome::NotComplete {
                provider_status,
                reminder_sent,
            } => format!(
                "not complete (provider status {provider_status}); reminder {}",
                if *reminder_sent { "sent" } else { "not sent" }
            ),
            VariationCheckOutcome::Blocked => "test is blocked; nothing changed".to_string(),
            VariationCheckOutcome::NotActive { status } => {
                format!("test is {status}, not active; nothing changed")
            }
        };
        format!(
            "Variation {} of test {} (study {}): {detail}",
            self.variation_type, self.test_id, self.study_id
        )
    }
}

fn describe_finalization(outcome: &FinalizeOutcome) -> String {
    if outcome.completed {
        "finalized as complete".to_string()
    } else {
        format!("remains {}", outcome.status)
    }
}

fn describe_insights_error(error: Option<&str>) -> String {
    error.map_or_else(String::new, |e| format!(" (insights failed: {e})"))
}

#[derive(Debug, Serialize)]
pub struct EnqueueOutput {
    pub queued: bool,
    pub job_id: Option<Uuid>,
    pub pending: u64,
}

impl CommandOutput for EnqueueOutput {
    fn to_human(&self) -> String {
        match self.job_id {
            Some(id) => format!("Queued check {id} ({} pending)", self.pending),
            None => "On-demand checks are disabled (reconcile.enqueue_on_dispatch = false); \
                     the periodic sweep will pick this variation up. Use --force to queue anyway."
                .to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FinalizeOutput {
    pub test_id: Uuid,
    #[serde(flatten)]
    pub outcome: FinalizeOutcome,
}

impl CommandOutput for FinalizeOutput {
    fn to_human(&self) -> String {
        format!("Test {} {}", self.test_id, describe_finalization(&self.outcome))
    }
}

pub async fn execute_check(args: VariationArgs, config: Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;
    let outcome = ctx
        .reconciler()?
        .reconcile_one_variation(&args.study_id, args.test_id, args.variation)
        .await
        .context("Variation check failed")?;

    output(
        &CheckOutput {
            study_id: args.study_id,
            test_id: args.test_id,
            variation_type: args.variation,
            outcome,
        },
        json_mode,
    );
    Ok(())
}

pub async fn execute_enqueue(args: EnqueueArgs, config: Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;
    let worker = ctx.worker(ctx.reconciler()?);
    let v = &args.variation;

    let job_id = if args.force {
        Some(worker.enqueue_unconditionally(&v.study_id, v.test_id, v.variation).await?)
    } else {
        worker.enqueue_check(&v.study_id, v.test_id, v.variation).await?
    };
    let pending = ctx.queue_pending().await?;

    output(
        &EnqueueOutput {
            queued: job_id.is_some(),
            job_id,
            pending,
        },
        json_mode,
    );
    Ok(())
}

pub async fn execute_finalize(args: FinalizeArgs, config: Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;
    let outcome = ctx
        .reconciler()?
        .finalize_if_complete(args.test_id)
        .await
        .context("Finalize failed")?;

    output(
        &FinalizeOutput {
            test_id: args.test_id,
            outcome,
        },
        json_mode,
    );
    Ok(())
}
