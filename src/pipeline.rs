//! Stage orchestration for one ingestion partition
//!
//! Every stage reads its complete input, transforms it in memory and encodes
//! all of its outputs before the first write. The outputs are then written
//! with [`PartitionStore::put_partition`], which rolls back the objects
//! already written if a later write fails, so a failing stage leaves the
//! previous contents of its output partition in place.

use crate::bronze::BronzeReader;
use crate::config::RunConfig;
use crate::gold::GoldAggregator;
use crate::partition::Dataset;
use crate::schema::{Order, OrderItem, SalesByRegionRow, TopProductRow};
use crate::silver::{CleaningReport, SilverCleaner};
use crate::storage::PartitionStore;
use crate::warehouse::{LoadSummary, Warehouse, WarehouseLoader};
use crate::Result;

use object_store::ObjectStore;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    BronzeToSilver,
    SilverToGold,
    LoadWarehouse,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::BronzeToSilver => "bronze_to_silver",
            Stage::SilverToGold => "silver_to_gold",
            Stage::LoadWarehouse => "load_warehouse",
        }
    }
}

/// What a completed stage read and wrote
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    pub run_id: String,
    pub stage: Stage,
    pub ingestion_date: String,
    pub rows_read: usize,
    pub rows_written: usize,
    /// Object keys written by the stage
    pub outputs: Vec<String>,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleaning: Option<CleaningReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load: Option<LoadSummary>,
}

/// Runs the stages of one partition against one object store.
pub struct Pipeline {
    store: PartitionStore,
    config: RunConfig,
    run_id: Uuid,
}

impl Pipeline {
    pub fn new(object_store: Arc<dyn ObjectStore>, config: RunConfig) -> Self {
        Self {
            store: PartitionStore::new(object_store, config.layout.clone()),
            config,
            run_id: Uuid::new_v4(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn store(&self) -> &PartitionStore {
        &self.store
    }

    fn span(&self, stage: Stage) -> tracing::Span {
        info_span!(
            "pipeline.stage",
            stage = stage.as_str(),
            run_id = %self.run_id,
            ingestion_date = %self.config.ingestion_date
        )
    }

    fn report(&self, stage: Stage, started: Instant) -> StageReport {
        StageReport {
            run_id: self.run_id.to_string(),
            stage,
            ingestion_date: self.config.ingestion_date.to_string(),
            rows_read: 0,
            rows_written: 0,
            outputs: Vec::new(),
            elapsed_ms: started.elapsed().as_millis() as u64,
            cleaning: None,
            load: None,
        }
    }

    /// Clean the bronze partition into the silver partition
    pub async fn bronze_to_silver(&self) -> Result<StageReport> {
        let stage = Stage::BronzeToSilver;
        async {
            let started = Instant::now();
            let date = self.config.ingestion_date;

            let bronze = BronzeReader::new(&self.store).read(date).await?;
            let rows_read = bronze.orders.len() + bronze.items.len();

            let silver = SilverCleaner::new(self.config.duplicate_policy)
                .clean(bronze.orders, bronze.items)?;

            let orders = self.store.encode_parquet(&silver.orders)?;
            let items = self.store.encode_parquet(&silver.items)?;
            let [orders_path, items_path] = self
                .store
                .put_partition(
                    date,
                    [(Dataset::SilverOrders, orders), (Dataset::SilverOrderItems, items)],
                )
                .await?;

            let report = StageReport {
                rows_read,
                rows_written: silver.orders.len() + silver.items.len(),
                outputs: vec![orders_path.to_string(), items_path.to_string()],
                cleaning: Some(silver.report),
                ..self.report(stage, started)
            };
            info!(
                rows_read = report.rows_read,
                rows_written = report.rows_written,
                elapsed_ms = report.elapsed_ms,
                "Stage complete"
            );
            Ok(report)
        }
        .instrument(self.span(stage))
        .await
    }

    /// Aggregate the silver partition into the gold marts
    pub async fn silver_to_gold(&self) -> Result<StageReport> {
        let stage = Stage::SilverToGold;
        async {
            let started = Instant::now();
            let date = self.config.ingestion_date;

            let orders: Vec<Order> = self.store.read_parquet(Dataset::SilverOrders, date).await?;
            let items: Vec<OrderItem> =
                self.store.read_parquet(Dataset::SilverOrderItems, date).await?;

            let gold = GoldAggregator::new().aggregate(&orders, &items)?;

            let sales = self.store.encode_parquet(&gold.sales)?;
            let top_products = self.store.encode_parquet(&gold.top_products)?;
            let [sales_path, top_path] = self
                .store
                .put_partition(
                    date,
                    [
                        (Dataset::GoldSalesByRegion, sales),
                        (Dataset::GoldTopProducts, top_products),
                    ],
                )
                .await?;

            let report = StageReport {
                rows_read: orders.len() + items.len(),
                rows_written: gold.sales.len() + gold.top_products.len(),
                outputs: vec![sales_path.to_string(), top_path.to_string()],
                ..self.report(stage, started)
            };
            info!(
                rows_read = report.rows_read,
                rows_written = report.rows_written,
                elapsed_ms = report.elapsed_ms,
                "Stage complete"
            );
            Ok(report)
        }
        .instrument(self.span(stage))
        .await
    }

    /// Load the gold marts into `warehouse` in one transaction
    pub async fn load_warehouse(&self, warehouse: &mut dyn Warehouse) -> Result<StageReport> {
        let stage = Stage::LoadWarehouse;
        async move {
            let started = Instant::now();
            let date = self.config.ingestion_date;

            let sales: Vec<SalesByRegionRow> = self
                .store
                .read_parquet(Dataset::GoldSalesByRegion, date)
                .await?;
            let top_products: Vec<TopProductRow> =
                self.store.read_parquet(Dataset::GoldTopProducts, date).await?;

            let summary = WarehouseLoader::load(warehouse, &sales, &top_products).await?;

            let report = StageReport {
                rows_read: sales.len() + top_products.len(),
                rows_written: (summary.sales_rows_upserted + summary.top_product_rows_upserted)
                    as usize,
                load: Some(summary),
                ..self.report(stage, started)
            };
            info!(
                rows_read = report.rows_read,
                rows_written = report.rows_written,
                elapsed_ms = report.elapsed_ms,
                "Stage complete"
            );
            Ok(report)
        }
        .instrument(self.span(stage))
        .await
    }

    /// Run every stage in order, stopping at the first failure
    pub async fn run_all(&self, warehouse: &mut dyn Warehouse) -> Result<Vec<StageReport>> {
        Ok(vec![
            self.bronze_to_silver().await?,
            self.silver_to_gold().await?,
            self.load_warehouse(warehouse).await?,
        ])
    }
}
