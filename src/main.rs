//! Knowledge-Guided Statistical Analysis Agency
//!
//! Command-line entry point: analyzes one CSV dataset and writes its result
//! document into the output directory.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use stat_agency::telemetry::init_logging;
use stat_agency::{ConfigLoader, DatasetPipeline};

#[derive(Parser, Debug)]
#[command(name = "stat_agency", version, about = "Knowledge-guided statistical analysis of a CSV dataset")]
struct Args {
    /// CSV file to analyze
    dataset: PathBuf,

    /// Free-text description of the dataset and known relationships
    #[arg(short, long, default_value = "")]
    context: String,

    /// JSON or YAML configuration file
    #[arg(long, default_value = "stat_agency.yaml")]
    config: PathBuf,

    /// Overrides the configured output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also log to a daily rolling file in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    let _guard = init_logging(args.log_dir.as_deref());

    let mut config = ConfigLoader::new(&args.config)
        .load()
        .await
        .with_context(|| format!("Failed to load config {}", args.config.display()))?;
    config.apply_env_overrides(|key| std::env::var(key).ok())?;
    if let Some(output) = args.output {
        config.paths.output_dir = output;
    }
    config.validate()?;
    info!(model = %config.oracle.model, provider = ?config.oracle.provider, "Configuration loaded");

    let pipeline = DatasetPipeline::from_config(&config)
        .await
        .context("Failed to initialize the analysis pipeline")?;
    let path = pipeline
        .run(&args.dataset, &args.context)
        .await
        .with_context(|| format!("Analysis of {} failed", args.dataset.display()))?;

    println!("{}", path.display());
    Ok(())
}
