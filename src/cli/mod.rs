//! Command-line interface.

pub mod commands;
pub mod context;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::check::{EnqueueArgs, FinalizeArgs, VariationArgs};
use commands::init::InitArgs;
use commands::insights::InsightsArgs;
use commands::sweep::{DaemonArgs, SweepArgs};

/// Completion reconciliation and insights for panel-hosted A/B tests.
#[derive(Parser, Debug)]
#[command(name = "panelsync", version, about, long_about = None)]
pub struct Cli {
    /// Emit machine-readable JSON instead of human output
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file to use instead of .panelsync/config.yaml and local.yaml
    #[arg(long, global = true, env = "PANELSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create .panelsync/ with a starter config and a migrated database
    Init(InitArgs),
    /// Run one completion sweep over all active tests
    Sweep(SweepArgs),
    /// Run the periodic sweep and the variation-check worker until interrupted
    Daemon(DaemonArgs),
    /// Check one variation against its external study now
    CheckVariation(VariationArgs),
    /// Queue an on-demand check for a dispatched variation
    EnqueueCheck(EnqueueArgs),
    /// Re-derive a test's completion from its variations
    Finalize(FinalizeArgs),
    /// Generate or show insights
    Insights(InsightsArgs),
}

/// Print an error the same way regardless of which command failed, then exit non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let chain: Vec<String> = err.chain().map(ToString::to_string).collect();
        let body = serde_json::json!({
            "success": false,
            "error": err.to_string(),
            "causes": chain.iter().skip(1).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::VariationType;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_check_variation() {
        let cli = Cli::try_parse_from([
            "panelsync",
            "--json",
            "check-variation",
            "--study-id",
            "60f1c0ffee",
            "--test-id",
            "6a0f1f3e-8f0b-4d6e-9c1e-1b2a3c4d5e6f",
            "--variation",
            "c",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::CheckVariation(args) => {
                assert_eq!(args.study_id, "60f1c0ffee");
                assert_eq!(args.variation, VariationType::C);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["panelsync", "sweep", "--config", "ops.yaml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("ops.yaml")));
    }

    #[test]
    fn test_rejects_bad_test_id() {
        assert!(Cli::try_parse_from(["panelsync", "finalize", "not-a-uuid"]).is_err());
    }
}
