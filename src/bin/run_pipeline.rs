//! Full pipeline run
//!
//! Runs bronze-to-silver, silver-to-gold and the warehouse load for one
//! partition, stopping at the first failing stage. With `--warehouse memory`
//! the load targets an in-memory warehouse, which needs no database.

use retail_lakehouse::config::{ComponentFactory, RunConfig, WarehouseConfig};
use retail_lakehouse::partition::{IngestionDate, PartitionLayout};
use retail_lakehouse::pipeline::Pipeline;
use retail_lakehouse::silver::DuplicateOrderPolicy;
use retail_lakehouse::telemetry::Telemetry;
use retail_lakehouse::warehouse::{MemoryWarehouse, PostgresWarehouse, Warehouse};

use clap::{Parser, ValueEnum};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum WarehouseBackend {
    Postgres,
    Memory,
}

/// Retail lakehouse pipeline
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

    /// Which row survives when an order_id repeats (first, latest)
    #[arg(long, env = "DUPLICATE_POLICY", default_value = "first")]
    duplicate_policy: DuplicateOrderPolicy,

    /// Warehouse to load into
    #[arg(long, env = "WAREHOUSE_BACKEND", value_enum, default_value = "postgres")]
    warehouse: WarehouseBackend,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let _telemetry = Telemetry::init_for_component("retail-run-pipeline", &args.log_level)?;

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
    let run_config = RunConfig::new(date)
        .with_layout(layout)
        .with_warehouse(WarehouseConfig::from_env()?)
        .with_duplicate_policy(args.duplicate_policy);

    let pipeline = Pipeline::new(
        ComponentFactory::create_object_store(&storage_config)?,
        run_config,
    );
    info!(
        run_id = %pipeline.run_id(),
        ingestion_date = %date,
        warehouse = ?args.warehouse,
        "Starting pipeline run"
    );

    let mut warehouse: Box<dyn Warehouse> = match args.warehouse {
        WarehouseBackend::Postgres => {
            Box::new(PostgresWarehouse::connect(&pipeline.config().warehouse).await?)
        }
        WarehouseBackend::Memory => Box::new(MemoryWarehouse::new()),
    };

    let reports = pipeline.run_all(warehouse.as_mut()).await?;
    println!("{}", serde_json::to_string_pretty(&reports)?);

    info!(run_id = %pipeline.run_id(), stages = reports.len(), "Pipeline run complete");
    Ok(())
}
