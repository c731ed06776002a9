//! Bronze tier: raw orders and order lines as landed
//!
//! Bronze partitions are never modified by the pipeline. The reader loads
//! both CSV files of a partition and fails with
//! [`Error::MissingInput`](crate::Error::MissingInput) if either is absent.

mod generator;

pub use generator::{BronzeGenerator, GeneratorConfig, ORPHAN_ORDER_ID};

use crate::partition::{Dataset, IngestionDate};
use crate::schema::{BronzeOrder, BronzeOrderItem};
use crate::storage::PartitionStore;
use crate::Result;

use object_store::path::Path;
use tracing::info;

/// Both raw tables of one ingestion partition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BronzePartition {
    pub orders: Vec<BronzeOrder>,
    pub items: Vec<BronzeOrderItem>,
}

/// Loads bronze partitions from a [`PartitionStore`].
pub struct BronzeReader<'a> {
    store: &'a PartitionStore,
}

impl<'a> BronzeReader<'a> {
    pub fn new(store: &'a PartitionStore) -> Self {
        Self { store }
    }

    /// Read orders and order lines of `date`
    pub async fn read(&self, date: IngestionDate) -> Result<BronzePartition> {
        let orders: Vec<BronzeOrder> = self.store.read_csv(Dataset::BronzeOrders, date).await?;
        let items: Vec<BronzeOrderItem> =
            self.store.read_csv(Dataset::BronzeOrderItems, date).await?;

        info!(
            ingestion_date = %date,
            orders = orders.len(),
            items = items.len(),
            "Loaded bronze partition"
        );

        Ok(BronzePartition { orders, items })
    }
}

/// Land a bronze partition, replacing whatever was there.
///
/// Both files are encoded before either is written, and a failed write rolls
/// the other back.
pub async fn write_partition(
    store: &PartitionStore,
    date: IngestionDate,
    partition: &BronzePartition,
) -> Result<(Path, Path)> {
    let orders = store.encode_csv(&partition.orders)?;
    let items = store.encode_csv(&partition.items)?;

    let [orders_path, items_path] = store
        .put_partition(
            date,
            [(Dataset::BronzeOrders, orders), (Dataset::BronzeOrderItems, items)],
        )
        .await?;

    info!(
        ingestion_date = %date,
        orders = partition.orders.len(),
        items = partition.items.len(),
        "Wrote bronze partition"
    );

    Ok((orders_path, items_path))
}
