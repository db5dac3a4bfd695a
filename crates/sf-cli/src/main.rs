//! strikefit command-line driver
//!
//! Reads a panel CSV, runs the model comparison and writes the prediction,
//! performance and parameter tables of every family.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use sf_core::data::io::read_panel_csv;
use sf_models::{EvaluationReport, Evaluator, FamilyKind, PipelineConfig, ResultExporter};

#[derive(Parser)]
#[command(name = "strikefit")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Fit and compare lightning strike-rate models", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit, predict and score every selected family
    Run {
        /// Panel CSV with strikes and climate covariates
        panel: PathBuf,

        /// Output directory for the tables
        #[arg(short, long)]
        out: PathBuf,

        /// JSON pipeline configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Seed of the train/test split and of the sampler
        #[arg(long)]
        seed: Option<u64>,

        /// Number of MCMC chains
        #[arg(long)]
        chains: Option<usize>,

        /// Post-warmup draws per chain
        #[arg(long)]
        draws: Option<usize>,

        /// Warmup iterations per chain
        #[arg(long)]
        warmup: Option<usize>,

        /// Families to run (linear, glm, bayes, chen, np), comma separated
        #[arg(long, value_delimiter = ',')]
        families: Option<Vec<FamilyKind>>,
    },

    /// Print the default configuration as JSON
    Config {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            panel,
            out,
            config,
            seed,
            chains,
            draws,
            warmup,
            families,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(seed) = seed {
                config.seed = seed;
                config.sampler.seed = seed;
            }
            if let Some(chains) = chains {
                config.sampler.chains = chains;
            }
            if let Some(draws) = draws {
                config.sampler.draws = draws;
            }
            if let Some(warmup) = warmup {
                config.sampler.warmup = warmup;
            }
            if let Some(families) = families {
                config.families = families;
            }
            cmd_run(&panel, &out, config)?;
        }
        Commands::Config { output } => {
            let json = serde_json::to_string_pretty(&PipelineConfig::default())?;
            match output {
                Some(path) => fs::write(&path, json)
                    .with_context(|| format!("writing config to {}", path.display()))?,
                None => println!("{}", json),
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let text = fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

fn cmd_run(panel_path: &Path, out: &Path, config: PipelineConfig) -> anyhow::Result<()> {
    let start = Instant::now();

    let panel = read_panel_csv(panel_path)
        .with_context(|| format!("loading panel {}", panel_path.display()))?;
    info!(rows = panel.nrows(), path = %panel_path.display(), "Loaded panel");

    let report = Evaluator::new(config).run(&panel).context("running model comparison")?;

    let files = ResultExporter::new(out)
        .export(&report)
        .with_context(|| format!("writing tables to {}", out.display()))?;

    print_summary(&report);
    info!(
        families = files.len(),
        elapsed_s = start.elapsed().as_secs_f64(),
        "Done"
    );
    Ok(())
}

fn print_summary(report: &EvaluationReport) {
    println!(
        "{:<16} {:<6} {:<36} {:>10} {:>8} {:>8}",
        "group", "model", "predictors", "rmse", "cor", "sscore"
    );
    for family in &report.families {
        for record in &family.performance {
            let cor = record
                .cor
                .map(|c| format!("{:.3}", c))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:<16} {:<6} {:<36} {:>10.4} {:>8} {:>8.3}",
                record.group_name, record.model_name, record.predictors, record.rmse, cor, record.sscore
            );
        }
        for failure in &family.failures {
            println!(
                "{:<16} {:<6} {:<36} failed: {}",
                family.family.group_name(),
                failure.model,
                failure.predictors,
                failure.message
            );
        }
    }
}
