//! Bronze data generator
//!
//! Writes one synthetic bronze partition (orders and order lines) with the
//! defects the silver rules are meant to repair.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin generate-bronze -- \
//!   --ingestion-date 2026-01-12 \
//!   --orders 10000 \
//!   --seed 42
//! ```

use retail_lakehouse::bronze::{self, BronzeGenerator, GeneratorConfig};
use retail_lakehouse::config::ComponentFactory;
use retail_lakehouse::partition::{IngestionDate, PartitionLayout};
use retail_lakehouse::storage::PartitionStore;
use retail_lakehouse::telemetry::Telemetry;

use clap::Parser;
use tracing::info;

/// Retail lakehouse bronze generator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Partition to write (YYYY-MM-DD); defaults to today
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

    /// Distinct orders to generate before duplicates are injected
    #[arg(long, default_value = "10000")]
    orders: usize,

    /// Number of distinct products
    #[arg(long, default_value = "500")]
    products: u32,

    /// Number of distinct customers
    #[arg(long, default_value = "2500")]
    customers: u32,

    /// Seed for a reproducible partition
    #[arg(long, env = "GENERATOR_SEED")]
    seed: Option<u64>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let _telemetry = Telemetry::init_for_component("retail-generate-bronze", &args.log_level)?;

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
    let store = PartitionStore::new(
        ComponentFactory::create_object_store(&storage_config)?,
        layout,
    );

    let mut generator = BronzeGenerator::new(GeneratorConfig {
        orders: args.orders,
        products: args.products,
        customers: args.customers,
        seed: args.seed,
        ..GeneratorConfig::default()
    })?;
    let partition = generator.generate(date);
    let (orders_path, items_path) = bronze::write_partition(&store, date, &partition).await?;

    info!(
        orders_path = %orders_path,
        items_path = %items_path,
        orders = partition.orders.len(),
        items = partition.items.len(),
        "Bronze partition generated"
    );

    Ok(())
}
