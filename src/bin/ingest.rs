use anyhow::Result;
use catalog_ingest::config::AppConfig;
use catalog_ingest::pipeline::{Pipeline, RunPlan};
use catalog_ingest::telemetry;
use clap::Parser;
use std::time::Instant;

#[derive(Parser)]
#[command(
    name = "catalog-ingest",
    about = "List matching catalog datasets, fetch one file and load it into Snowflake"
)]
struct Cli {
    /// Optional settings file (TOML); defaults and INGEST_* variables apply otherwise
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let now = Instant::now();
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    config.validate()?;
    telemetry::init_telemetry(&config.telemetry)?;
    tracing::info!(
        data_dir = %config.paths.data_dir.display(),
        cleanup = ?config.warehouse.cleanup,
        "Configuration loaded"
    );

    let pipeline = Pipeline::from_config(&config)?;
    let result = pipeline
        .run(&RunPlan::default(), std::io::stdout().lock())
        .await;

    match &result {
        Ok(_) => tracing::info!("Run finished in {}ms", now.elapsed().as_millis()),
        Err(e) => tracing::error!("Run failed: {:#}", e),
    }

    telemetry::shutdown_telemetry();
    result.map(|_| ())
}
