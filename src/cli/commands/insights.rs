//! `panelsync insights` commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use crate::cli::context::AppContext;
use crate::cli::output::{heading, list_table, output, CommandOutput};
use crate::domain::models::{Config, InsightsGeneration, InsightsReport};

#[derive(Args, Debug)]
pub struct InsightsArgs {
    #[command(subcommand)]
    pub command: InsightsCommands,
}

#[derive(Subcommand, Debug)]
pub enum InsightsCommands {
    /// Compute and store variant summaries and competitive insights
    Generate {
        /// Test id
        test_id: Uuid,
    },
    /// Show the insights report for a test
    Report {
        /// Test id
        test_id: Uuid,
    },
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct GenerateOutput(pub InsightsGeneration);

impl CommandOutput for GenerateOutput {
    fn to_human(&self) -> String {
        let g = &self.0;
        let variants: Vec<&str> = g.variants.iter().map(|v| v.as_str()).collect();
        format!(
            "Insights for test {}: {} variant(s) [{}], {} summary row(s) and {} competitive row(s) inserted",
            g.test_id,
            g.variants.len(),
            variants.join(", "),
            g.summaries_inserted,
            g.competitive_inserted
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct ReportOutput(pub InsightsReport);

impl CommandOutput for ReportOutput {
    fn to_human(&self) -> String {
        let report = &self.0;
        let test = &report.test;
        let mut lines = vec![heading(&format!("{} ({})", test.name, test.id))];
        lines.push(format!("  Status:      {}", test.status));
        if let Some(objective) = &test.objective {
            lines.push(format!("  Objective:   {objective}"));
        }
        if let Some(term) = &test.search_term {
            lines.push(format!("  Search term: {term}"));
        }

        if let Some(demo) = &report.demographics {
            lines.push(format!("\n{}", heading("Demographics")));
            lines.push(format!("  Testers:   {}", demo.tester_count));
            lines.push(format!("  Ages:      {}", demo.age_ranges.join(", ")));
            lines.push(format!("  Genders:   {}", demo.genders.join(", ")));
            lines.push(format!("  Locations: {}", demo.locations.join(", ")));
            if !demo.interests.is_empty() {
                lines.push(format!("  Interests: {}", demo.interests.join(", ")));
            }
        }

        lines.push(format!("\n{}", heading("Variant summaries")));
        if report.summaries.is_empty() {
            lines.push("  No summaries yet. Run 'panelsync insights generate'.".to_string());
        } else {
            let mut table = list_table(&["variant", "share of buy", "share of click", "value score", "win"]);
            for s in &report.summaries {
                table.add_row(vec![
                    s.variant_type.to_string(),
                    format!("{:.1}%", s.share_of_buy),
                    format!("{:.1}%", s.share_of_click),
                    format!("{:.1}", s.value_score),
                    if s.win { "yes" } else { "" }.to_string(),
                ]);
            }
            lines.push(table.to_string());
        }

        for competitor in &report.competitors {
            lines.push(format!(
                "\n{}",
                heading(&format!("vs. competitor {}", competitor.competitor_product_id))
            ));
            let mut table = list_table(&[
                "variant",
                "share of buy",
                "value",
                "aesthetics",
                "utility",
                "trust",
                "convenience",
            ]);
            for i in &competitor.insights {
                table.add_row(vec![
                    i.variant_type.to_string(),
                    format!("{:.1}%", i.share_of_buy),
                    format!("{:.1}", i.value),
                    format!("{:.1}", i.aesthetics),
                    format!("{:.1}", i.utility),
                    format!("{:.1}", i.trust),
                    format!("{:.1}", i.convenience),
                ]);
            }
            lines.push(table.to_string());
        }

        lines.join("\n")
    }
}

pub async fn execute(args: InsightsArgs, config: Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;
    let aggregator = ctx.aggregator();

    match args.command {
        InsightsCommands::Generate { test_id } => {
            let generation = aggregator
                .generate_for_test(test_id)
                .await
                .context("Failed to generate insights")?;
            output(&GenerateOutput(generation), json_mode);
        }
        InsightsCommands::Report { test_id } => {
            let report = aggregator
                .build_insights_report(test_id)
                .await
                .context("Failed to build insights report")?;
            output(&ReportOutput(report), json_mode);
        }
    }
    Ok(())
}
