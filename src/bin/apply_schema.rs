//! Warehouse schema provisioning
//!
//! Creates the warehouse schema, dimensions and facts if they do not exist.
//! Connection settings come from `DB_HOST`, `DB_PORT`, `DB_NAME`, `DB_USER`,
//! `DB_PASSWORD` and `DB_SCHEMA`.

use retail_lakehouse::config::WarehouseConfig;
use retail_lakehouse::telemetry::Telemetry;
use retail_lakehouse::warehouse::PostgresWarehouse;

use clap::Parser;
use tracing::info;

/// Retail lakehouse warehouse schema provisioning
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Print the DDL instead of executing it
    #[arg(long)]
    dry_run: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let _telemetry = Telemetry::init_for_component("retail-apply-schema", &args.log_level)?;

    let config = WarehouseConfig::from_env()?;
    if args.dry_run {
        println!("{}", retail_lakehouse::warehouse::schema_ddl(config.schema()));
        return Ok(());
    }

    info!(warehouse = ?config, "Applying warehouse schema");
    let warehouse = PostgresWarehouse::connect(&config).await?;
    warehouse.apply_schema().await?;

    Ok(())
}
