//! Dimensional warehouse load
//!
//! The gold marts are loaded into a star schema with two dimensions
//! (`dim_time`, `dim_region`) and two facts (`fact_sales_monthly`,
//! `fact_top_products_monthly`). Dimension rows are inserted if absent and
//! never updated; fact rows are upserted on their natural grain, so loading
//! the same gold partition twice leaves the warehouse unchanged.
//!
//! The backend is abstracted behind [`Warehouse`] so the load can run against
//! Postgres in production and an in-memory model in tests.

mod loader;
mod memory;
mod postgres;

pub use loader::{LoadSummary, WarehouseLoader};
pub use memory::{FailPoint, MemoryWarehouse, WarehouseSnapshot};
pub use postgres::{apply_schema, schema_ddl, PostgresWarehouse};

use crate::schema::YearMonth;
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// `fact_sales_monthly` row with surrogate keys resolved
#[derive(Debug, Clone, PartialEq)]
pub struct SalesFactRow {
    pub time_id: i32,
    pub region_id: i32,
    pub orders_count: i64,
    pub items_sold: i64,
    pub gross_revenue: f64,
    pub net_revenue: f64,
    pub aov_net: f64,
}

/// `fact_top_products_monthly` row with the time key resolved
#[derive(Debug, Clone, PartialEq)]
pub struct TopProductFactRow {
    pub time_id: i32,
    pub product_id: String,
    pub items_sold: i64,
    pub net_revenue: f64,
    pub rank_by_net_revenue: i32,
}

/// A warehouse that can open load transactions
#[async_trait]
pub trait Warehouse: Send {
    /// Start a transaction; nothing it writes is visible until commit
    async fn begin<'a>(&'a mut self) -> Result<Box<dyn WarehouseTx + 'a>>;
}

/// Operations of one load transaction.
///
/// Row counts returned by the insert and upsert methods are rows actually
/// written: dimension inserts skip natural keys that already exist.
#[async_trait]
pub trait WarehouseTx: Send {
    /// Insert (year, month) pairs missing from `dim_time`
    async fn insert_time_keys(&mut self, keys: &[YearMonth]) -> Result<u64>;

    /// Insert region names missing from `dim_region`
    async fn insert_regions(&mut self, regions: &[String]) -> Result<u64>;

    /// Full reload of `dim_time` as natural key -> time_id
    async fn time_lookup(&mut self) -> Result<HashMap<YearMonth, i32>>;

    /// Full reload of `dim_region` as region -> region_id
    async fn region_lookup(&mut self) -> Result<HashMap<String, i32>>;

    /// Insert or overwrite on (time_id, region_id)
    async fn upsert_sales(&mut self, rows: &[SalesFactRow]) -> Result<u64>;

    /// Insert or overwrite on (time_id, product_id)
    async fn upsert_top_products(&mut self, rows: &[TopProductFactRow]) -> Result<u64>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
