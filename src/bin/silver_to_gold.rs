//! Silver to gold stage
//!
//! Aggregates one silver partition into the monthly sales-by-region and
//! top-products marts. The stage report is printed to stdout as JSON.

use retail_lakehouse::config::{ComponentFactory, RunConfig};
use retail_lakehouse::partition::{IngestionDate, PartitionLayout};
use retail_lakehouse::pipeline::Pipeline;
use retail_lakehouse::telemetry::Telemetry;

use clap::Parser;
use tracing::info;

/// Retail lakehouse silver-to-gold stage
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Partition to process (YYYY-MM-DD); defaults to today
    #[arg(long, env = "INGESTION_DATE")]
    ingestion_date: Option<String>,

    /// Storage backend (local, memory)
    #[arg(long, env = "STORAGE_BACKEND")]
    storage_backend: Option<String>,

    /// Root directory of the local backend
    #[arg(long, env = "DATA_ROOT")]
    data_root: Option<std::path::PathBuf>,

    /// Key prefix shared by all tiers
    #[arg(long, env = "LAKEHOUSE_PREFIX")]
    prefix: Option<String>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let _telemetry = Telemetry::init_for_component("retail-silver-to-gold", &args.log_level)?;

    let date = match args.ingestion_date.as_deref() {
        Some(raw) => raw.parse::<IngestionDate>()?,
        None => IngestionDate::today(),
    };
    let storage_config = ComponentFactory::resolve_storage_config(
        args.storage_backend.as_deref(),
        args.data_root.as_deref(),
    )?;
    let layout = args
        .prefix
        .map(PartitionLayout::with_prefix)
        .unwrap_or_default();

    let pipeline = Pipeline::new(
        ComponentFactory::create_object_store(&storage_config)?,
        RunConfig::new(date).with_layout(layout),
    );
    info!(run_id = %pipeline.run_id(), "Starting silver-to-gold");

    let report = pipeline.silver_to_gold().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
