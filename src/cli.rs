//
// cli.rs
// Seg-Audit
//
// Defines the CLI surface with Clap and dispatches user-selected commands to the pipelines.
//
// Thales Matheus Mendonça Santos - November 2025

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::config::{
    load_config, FeatureExtractorConfig, MetricExtractorConfig, DEFAULT_FEATURE_CONFIG,
    DEFAULT_METRIC_CONFIG,
};
use crate::{compare, feature_extractor, logging, metric_extractor, report};

/// Command-line interface glue code: defines the available verbs and dispatches to modules.
#[derive(Parser)]
#[command(name = "seg-audit")]
#[command(about = "Audit tools for medical image segmentation models", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compute per-subject, per-region segmentation metrics for every model
    MetricExtractor {
        #[arg(short, long, default_value = DEFAULT_METRIC_CONFIG)]
        config: PathBuf,
    },
    /// Compute spatial, statistical, texture and tumour features for every subject
    FeatureExtractor {
        #[arg(short, long, default_value = DEFAULT_FEATURE_CONFIG)]
        config: PathBuf,
    },
    /// Compare one metric between two models of a metric table
    Compare {
        #[arg(long)]
        metrics: PathBuf,
        #[arg(long)]
        metric: String,
        #[arg(long)]
        baseline: String,
        #[arg(long)]
        candidate: String,
        #[arg(long)]
        region: Option<String>,
    },
}

pub fn run() -> anyhow::Result<()> {
    // Parse the raw CLI arguments once and dispatch to a subcommand handler.
    let cli = Cli::parse();
    execute(cli.command)
}

/// Runs one parsed command.
pub fn execute(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::MetricExtractor { config } => {
            let config: MetricExtractorConfig = load_config(&config)
                .with_context(|| format!("Failed to load metric extractor config {:?}", config))?;
            logging::init_logging(config.logs_path.as_deref())?;
            let output = metric_extractor::run(&config)?;
            println!("Metrics written to {:?}", output);
        }
        Commands::FeatureExtractor { config } => {
            let config: FeatureExtractorConfig = load_config(&config)
                .with_context(|| format!("Failed to load feature extractor config {:?}", config))?;
            logging::init_logging(config.logs_path.as_deref())?;
            for output in feature_extractor::run(&config)? {
                println!("Features written to {:?}", output);
            }
        }
        Commands::Compare {
            metrics,
            metric,
            baseline,
            candidate,
            region,
        } => {
            logging::init_logging(None)?;
            let rows = report::read_metric_table(&metrics)?;
            info!("Loaded {} rows from {:?}", rows.len(), metrics);
            let comparison =
                compare::compare_models(&rows, &metric, &baseline, &candidate, region.as_deref())?;
            print!("{comparison}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_point_to_configs_directory() {
        let cli = Cli::try_parse_from(["seg-audit", "metric-extractor"]).expect("parse");
        match cli.command {
            Commands::MetricExtractor { config } => {
                assert_eq!(config, PathBuf::from("./configs/metric_extractor.json"))
            }
            _ => panic!("unexpected command"),
        }
    }

    #[test]
    fn missing_config_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = execute(Commands::FeatureExtractor {
            config: dir.path().join("nope.json"),
        })
        .unwrap_err();
        assert!(format!("{err:#}").contains("configuration file not found"));
    }
}
