//! # Retail Lakehouse
//!
//! A batch pipeline that takes raw retail orders through three quality tiers
//! and loads the results into a dimensional warehouse.
//!
//! ## Tiers
//!
//! - **Bronze**: raw orders and order lines as CSV, one partition per ingestion date
//! - **Silver**: cleaned, deduplicated and referentially consistent Parquet tables
//! - **Gold**: monthly sales KPIs by region and the monthly top-10 products
//!
//! ## Stages
//!
//! Data flows one way, Bronze → Silver → Gold → Warehouse. Each stage
//! materializes its complete output in memory before writing, so a stage
//! either produces its whole partition or nothing. The warehouse load is a
//! single transaction that upserts facts and inserts missing dimension rows,
//! which makes reruns idempotent.

pub mod bronze;
pub mod config;
pub mod gold;
pub mod partition;
pub mod pipeline;
pub mod schema;
pub mod silver;
pub mod storage;
pub mod telemetry;
pub mod warehouse;

mod error;

pub use error::{Error, Result};

use std::path::PathBuf;

/// Where the lakehouse tiers are stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root directory for the local backend
    pub root: PathBuf,
}

/// Supported object store backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Local,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Local => "local",
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "local" | "file" | "fs" => Ok(Self::Local),
            other => Err(format!(
                "unknown storage backend '{}'; expected one of memory, local",
                other
            )),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            root: PathBuf::from("data"),
        }
    }
}

/// Re-exports for convenience
pub mod prelude {
    pub use crate::bronze::{BronzeGenerator, BronzeReader, GeneratorConfig};
    pub use crate::config::{ComponentFactory, RunConfig, WarehouseConfig};
    pub use crate::gold::{GoldAggregator, GoldTables};
    pub use crate::partition::{Dataset, IngestionDate, PartitionLayout};
    pub use crate::pipeline::{Pipeline, StageReport};
    pub use crate::silver::{DuplicateOrderPolicy, SilverCleaner, SilverTables};
    pub use crate::storage::PartitionStore;
    pub use crate::warehouse::{
        MemoryWarehouse, PostgresWarehouse, Warehouse, WarehouseLoader,
    };
    pub use crate::{Error, Result, StorageBackend, StorageConfig};
}
