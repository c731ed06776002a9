//! Warehouse load stage
//!
//! Loads one gold partition into Postgres in a single serializable
//! transaction. Connection settings come from `DB_HOST`, `DB_PORT`,
//! `DB_NAME`, `DB_USER`, `DB_PASSWORD` and `DB_SCHEMA`.

use retail_lakehouse::config::{ComponentFactory, RunConfig, WarehouseConfig};
use retail_lakehouse::partition::{IngestionDate, PartitionLayout};
use retail_lakehouse::pipeline::Pipeline;
use retail_lakehouse::telemetry::Telemetry;
use retail_lakehouse::warehouse::PostgresWarehouse;

use clap::Parser;
use tracing::info;

/// Retail lakehouse warehouse load stage
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Partition to load (YYYY-MM-DD); defaults to today
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

    let _telemetry = Telemetry::init_for_component("retail-load-warehouse", &args.log_level)?;

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
    let warehouse_config = WarehouseConfig::from_env()?;

    let pipeline = Pipeline::new(
        ComponentFactory::create_object_store(&storage_config)?,
        RunConfig::new(date)
            .with_layout(layout)
            .with_warehouse(warehouse_config),
    );
    info!(
        run_id = %pipeline.run_id(),
        warehouse = ?pipeline.config().warehouse,
        "Starting warehouse load"
    );

    let mut warehouse = PostgresWarehouse::connect(&pipeline.config().warehouse).await?;
    let report = pipeline.load_warehouse(&mut warehouse).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
